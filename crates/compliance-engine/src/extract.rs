//! Field Extraction Engine
//!
//! A pure function of (text, registry). Each extraction rule tries its
//! patterns in declared order; a field takes its value from the first
//! matching pattern that names it, and a match binds every field its pattern
//! names or none of them. Fields nothing matched fall back to the registry's
//! default policy, or stay absent.

use std::collections::BTreeMap;

use pontoon_types::{ExtractedField, FieldSource, FieldValue, ValueType};
use regex::Captures;
use tracing::{debug, warn};

use crate::error::{CoercionError, OverrideError};
use crate::extractors::coerce;
use crate::extractors::text::collapse_whitespace;
use crate::fields::{CompiledPattern, DefaultPolicy, ExtractionRule, FieldRegistry, FieldSpec};

/// Ordered extraction output for one document
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    fields: Vec<ExtractedField>,
    missing_required: Vec<String>,
}

impl Extraction {
    /// One entry per registry field, in registry order
    pub fn fields(&self) -> &[ExtractedField] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&ExtractedField> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn value(&self, key: &str) -> Option<&FieldValue> {
        self.get(key).and_then(|f| f.value.as_ref())
    }

    /// Required fields with no value after defaults were applied
    pub fn missing_required(&self) -> &[String] {
        &self.missing_required
    }

    pub fn present_count(&self) -> usize {
        self.fields.iter().filter(|f| f.present).count()
    }

    pub fn absent_count(&self) -> usize {
        self.fields.len() - self.present_count()
    }

    pub fn into_parts(self) -> (Vec<ExtractedField>, Vec<String>) {
        (self.fields, self.missing_required)
    }
}

/// Reviewer-supplied values, in canonical units, keyed by field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    values: BTreeMap<String, FieldValue>,
}

impl Overrides {
    /// Check every key against the registry and fit each value to its field type
    pub fn validate(
        values: BTreeMap<String, FieldValue>,
        registry: &FieldRegistry,
    ) -> Result<Self, OverrideError> {
        let mut fitted = BTreeMap::new();
        for (key, value) in values {
            let spec = registry
                .field(&key)
                .ok_or_else(|| OverrideError::UnknownField(key.clone()))?;
            let value = fit_override(spec, value).ok_or_else(|| OverrideError::TypeMismatch {
                key: key.clone(),
                expected: spec.value_type,
            })?;
            fitted.insert(key, value);
        }
        Ok(Self { values: fitted })
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn fit_override(spec: &FieldSpec, value: FieldValue) -> Option<FieldValue> {
    match (spec.value_type, value) {
        (ValueType::Text, FieldValue::Text(s)) => Some(FieldValue::Text(s)),
        (ValueType::Text, _) | (_, FieldValue::Text(_)) => None,
        (ValueType::Ratio, value @ FieldValue::Ratio { .. }) => Some(value),
        (ValueType::Ratio, other) => other.as_f64().and_then(|v| spec.assumed_value(v)),
        (ValueType::Int, FieldValue::Int(v)) => Some(FieldValue::Int(v)),
        (ValueType::Int, other) => other
            .as_f64()
            .filter(|v| v.fract() == 0.0)
            .map(|v| FieldValue::Int(v as i64)),
        (ValueType::Money, other) => other.as_f64().map(FieldValue::Money),
        (ValueType::Float | ValueType::Range, other) => other.as_f64().map(FieldValue::Float),
    }
}

pub fn extract(text: &str, registry: &FieldRegistry) -> Extraction {
    extract_with_overrides(text, registry, &Overrides::default())
}

/// Overrides take precedence over matches and are visible to derived defaults
pub fn extract_with_overrides(
    text: &str,
    registry: &FieldRegistry,
    overrides: &Overrides,
) -> Extraction {
    let normalized = collapse_whitespace(text);
    let mut fields: Vec<ExtractedField> = Vec::new();
    let mut missing_required = Vec::new();

    for rule in registry.rules() {
        let mut matched = match_rule(rule, &normalized);

        for (idx, spec) in rule.fields.iter().enumerate() {
            let unit = spec.unit.as_deref();
            let field = if let Some(value) = overrides.get(&spec.key) {
                ExtractedField::with_value(
                    &spec.key,
                    value.clone(),
                    FieldSource::Override,
                    None,
                    unit,
                )
            } else if let Some((value, raw)) = matched[idx].take() {
                ExtractedField::with_value(
                    &spec.key,
                    value,
                    FieldSource::Extracted,
                    Some(raw),
                    unit,
                )
            } else {
                apply_default(spec, &fields).unwrap_or_else(|| ExtractedField::absent(&spec.key, unit))
            };

            if rule.required && !field.present {
                warn!(field = %spec.key, "required field not found in document");
                missing_required.push(spec.key.clone());
            }
            fields.push(field);
        }
    }

    Extraction {
        fields,
        missing_required,
    }
}

/// Patterns are tried in priority order until every field of the rule is
/// settled. A field is settled by the first matching pattern that names it,
/// whether or not that match coerced; later patterns only fill fields that
/// are still unsettled. Returns one slot per rule field.
fn match_rule(rule: &ExtractionRule, text: &str) -> Vec<Option<(FieldValue, String)>> {
    let mut bound = vec![None; rule.fields.len()];
    let mut settled = vec![false; rule.fields.len()];

    for (priority, pattern) in rule.patterns.iter().enumerate() {
        if settled.iter().all(|&s| s) {
            break;
        }
        if pattern.bindings.iter().all(|&(field_idx, _)| settled[field_idx]) {
            continue;
        }
        let Some(caps) = pattern.regex.captures(text) else {
            continue;
        };

        let result = bind_all(rule, pattern, &caps);
        let open: Vec<usize> = pattern
            .bindings
            .iter()
            .map(|&(field_idx, _)| field_idx)
            .filter(|&field_idx| !settled[field_idx])
            .collect();

        match result {
            Ok(values) => {
                debug!(rule = %rule.id, priority, "pattern matched");
                for (field_idx, value, raw) in values {
                    if open.contains(&field_idx) {
                        bound[field_idx] = Some((value, raw));
                    }
                }
            }
            Err(err) => {
                warn!(
                    rule = %rule.id,
                    priority,
                    error = %err,
                    "discarding match; its fields stay absent"
                );
            }
        }
        for field_idx in open {
            settled[field_idx] = true;
        }
    }

    bound
}

// All-or-nothing: one failed capture discards the whole match
fn bind_all(
    rule: &ExtractionRule,
    pattern: &CompiledPattern,
    caps: &Captures<'_>,
) -> Result<Vec<(usize, FieldValue, String)>, CoercionError> {
    pattern
        .bindings
        .iter()
        .map(|&(field_idx, group)| {
            let raw = caps
                .get(group)
                .map(|m| m.as_str())
                .ok_or(CoercionError::Empty)?;
            let value = coerce(raw, &rule.fields[field_idx])?;
            Ok((field_idx, value, raw.trim().to_string()))
        })
        .collect()
}

fn apply_default(spec: &FieldSpec, earlier: &[ExtractedField]) -> Option<ExtractedField> {
    let unit = spec.unit.as_deref();
    match spec.default.as_ref()? {
        DefaultPolicy::Assumed(value) => {
            let value = spec.assumed_value(*value)?;
            debug!(field = %spec.key, %value, "assumed default applied");
            Some(ExtractedField::with_value(
                &spec.key,
                value,
                FieldSource::Assumed,
                None,
                unit,
            ))
        }
        DefaultPolicy::Derived(expr) => {
            let lookup = |key: &str| {
                earlier
                    .iter()
                    .find(|f| f.key == key)
                    .and_then(|f| f.value.as_ref())
            };
            let value = expr.resolve(lookup)?;
            let value = match (spec.value_type, value.as_f64()) {
                (ValueType::Int, Some(v)) => FieldValue::Int(v.round() as i64),
                (ValueType::Money, Some(v)) => FieldValue::Money(v),
                _ => value,
            };
            debug!(field = %spec.key, %value, "derived default applied");
            Some(ExtractedField::with_value(
                &spec.key,
                value,
                FieldSource::Derived,
                None,
                unit,
            ))
        }
    }
}
