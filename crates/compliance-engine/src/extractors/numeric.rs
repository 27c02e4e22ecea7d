// Numeric coercion for captured drawing text
use lazy_static::lazy_static;
use pontoon_types::ValueType;
use regex::Regex;

use crate::error::CoercionError;

lazy_static! {
    /// Digits with optional comma thousands grouping and a period decimal point
    static ref LOCALE_FIXED_NUMBER: Regex =
        Regex::new(r"^(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?$").unwrap();

    static ref RANGE_SEPARATOR: Regex = Regex::new(r"(?i)\s*(?:-|–|—|\bto\b)\s*").unwrap();
}

/// Parses "33,000", "3.5" or "1,250.75". Commas are only ever thousands separators.
pub fn parse_number(raw: &str) -> Result<f64, CoercionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoercionError::Empty);
    }
    if !LOCALE_FIXED_NUMBER.is_match(trimmed) {
        return Err(CoercionError::malformed(raw, ValueType::Float));
    }

    trimmed
        .replace(',', "")
        .parse::<f64>()
        .map_err(|_| CoercionError::malformed(raw, ValueType::Float))
}

/// Whole numbers only; "55.5" is rejected rather than truncated
pub fn parse_int(raw: &str) -> Result<i64, CoercionError> {
    let value = parse_number(raw).map_err(|e| retype(e, ValueType::Int))?;
    if value.fract() != 0.0 || value > i64::MAX as f64 {
        return Err(CoercionError::malformed(raw, ValueType::Int));
    }
    Ok(value as i64)
}

/// "$1,250.00", "AUD 1,250" or "A$1250"
pub fn parse_money(raw: &str) -> Result<f64, CoercionError> {
    let upper = raw.trim().to_uppercase();
    let stripped = upper
        .trim_start_matches("AUD")
        .trim_start_matches("A$")
        .trim_start_matches('$')
        .trim_end_matches("AUD");
    parse_number(stripped).map_err(|e| retype(e, ValueType::Money))
}

/// "1:12" becomes (1, 12); the consequent may not be zero
pub fn parse_ratio(raw: &str) -> Result<(f64, f64), CoercionError> {
    let (antecedent, consequent) = raw
        .split_once(':')
        .ok_or_else(|| CoercionError::malformed(raw, ValueType::Ratio))?;
    let antecedent = parse_number(antecedent).map_err(|e| retype(e, ValueType::Ratio))?;
    let consequent = parse_number(consequent).map_err(|e| retype(e, ValueType::Ratio))?;
    if consequent == 0.0 {
        return Err(CoercionError::malformed(raw, ValueType::Ratio));
    }
    Ok((antecedent, consequent))
}

/// "300-400" or "300 TO 400" resolves to the midpoint; a lone number passes through
pub fn parse_range_midpoint(raw: &str) -> Result<f64, CoercionError> {
    let parts: Vec<&str> = RANGE_SEPARATOR
        .split(raw.trim())
        .filter(|p| !p.is_empty())
        .collect();

    match parts.as_slice() {
        [single] => parse_number(single).map_err(|e| retype(e, ValueType::Range)),
        [low, high] => {
            let low = parse_number(low).map_err(|e| retype(e, ValueType::Range))?;
            let high = parse_number(high).map_err(|e| retype(e, ValueType::Range))?;
            Ok((low + high) / 2.0)
        }
        [] => Err(CoercionError::Empty),
        _ => Err(CoercionError::malformed(raw, ValueType::Range)),
    }
}

fn retype(err: CoercionError, expected: ValueType) -> CoercionError {
    match err {
        CoercionError::Malformed { raw, .. } => CoercionError::Malformed { raw, expected },
        other => other,
    }
}
