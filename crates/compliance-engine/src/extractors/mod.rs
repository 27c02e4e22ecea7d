pub mod numeric;
pub mod text;

use pontoon_types::{FieldValue, ValueType};

use crate::error::CoercionError;
use crate::fields::FieldSpec;

/// Coerce one captured string to the field's declared type, then apply its
/// unit conversion.
pub fn coerce(raw: &str, spec: &FieldSpec) -> Result<FieldValue, CoercionError> {
    let value = match spec.value_type {
        ValueType::Float => FieldValue::Float(numeric::parse_number(raw)?),
        ValueType::Int => FieldValue::Int(numeric::parse_int(raw)?),
        ValueType::Money => FieldValue::Money(numeric::parse_money(raw)?),
        ValueType::Range => FieldValue::Float(numeric::parse_range_midpoint(raw)?),
        ValueType::Ratio => {
            let (antecedent, consequent) = numeric::parse_ratio(raw)?;
            FieldValue::Ratio {
                antecedent,
                consequent,
            }
        }
        ValueType::Text => FieldValue::Text(text::canonicalize(
            raw,
            spec.text_format.unwrap_or_default(),
            spec.suffix.as_deref(),
        )?),
    };

    Ok(match spec.conversion {
        Some(conversion) => conversion.apply_to(value),
        None => value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::UnitConversion;

    fn spec(value_type: ValueType) -> FieldSpec {
        FieldSpec::new("probe", value_type)
    }

    #[test]
    fn test_conversion_applies_after_coercion() {
        let mut wave = spec(ValueType::Int);
        wave.conversion = Some(UnitConversion::MillimetresToMetres);
        assert_eq!(coerce("500", &wave), Ok(FieldValue::Float(0.5)));
    }

    #[test]
    fn test_coerce_each_type() {
        assert_eq!(
            coerce("33,000", &spec(ValueType::Int)),
            Ok(FieldValue::Int(33000))
        );
        assert_eq!(
            coerce("350-400", &spec(ValueType::Range)),
            Ok(FieldValue::Float(375.0))
        );
        assert_eq!(
            coerce("1:12", &spec(ValueType::Ratio)),
            Ok(FieldValue::Ratio {
                antecedent: 1.0,
                consequent: 12.0
            })
        );
        assert_eq!(
            coerce("$2,500", &spec(ValueType::Money)),
            Ok(FieldValue::Money(2500.0))
        );
        assert_eq!(
            coerce("f17", &spec(ValueType::Text)),
            Ok(FieldValue::Text("F17".to_string()))
        );
    }

    #[test]
    fn test_non_numeric_capture_fails() {
        assert!(coerce("abc", &spec(ValueType::Float)).is_err());
    }
}
