//! Declarative expressions over field keys
//!
//! Used in two places: derived defaults in the field registry
//! (`berth_length = vessel_length × 1.1`) and rule subjects that combine
//! several fields (`berth_length / vessel_length ≥ 1.1`).

use pontoon_types::FieldValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expression {
    /// The field's value, unchanged (text included)
    Field { field: String },
    Scaled { field: String, factor: f64 },
    Ratio {
        numerator: String,
        denominator: String,
    },
    Difference { minuend: String, subtrahend: String },
    /// ½·m·v² in kilojoules, mass in kg and velocity in m/s
    KineticEnergy { mass: String, velocity: String },
}

impl Expression {
    pub fn field(key: &str) -> Self {
        Expression::Field {
            field: key.to_string(),
        }
    }

    /// Field keys the expression reads, in declaration order
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Expression::Field { field } | Expression::Scaled { field, .. } => vec![field.as_str()],
            Expression::Ratio {
                numerator,
                denominator,
            } => vec![numerator.as_str(), denominator.as_str()],
            Expression::Difference {
                minuend,
                subtrahend,
            } => vec![minuend.as_str(), subtrahend.as_str()],
            Expression::KineticEnergy { mass, velocity } => vec![mass.as_str(), velocity.as_str()],
        }
    }

    /// Everything except a bare field reference produces a number
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Expression::Field { .. })
    }

    /// Resolve against a lookup. Any absent input, non-numeric input or
    /// division by zero yields `None`.
    pub fn resolve<'a, F>(&self, lookup: F) -> Option<FieldValue>
    where
        F: Fn(&str) -> Option<&'a FieldValue>,
    {
        let number = |key: &str| lookup(key).and_then(FieldValue::as_f64);

        match self {
            Expression::Field { field } => lookup(field).cloned(),
            Expression::Scaled { field, factor } => {
                number(field).map(|v| FieldValue::Float(v * factor))
            }
            Expression::Ratio {
                numerator,
                denominator,
            } => {
                let n = number(numerator)?;
                let d = number(denominator)?;
                if d == 0.0 {
                    None
                } else {
                    Some(FieldValue::Float(n / d))
                }
            }
            Expression::Difference {
                minuend,
                subtrahend,
            } => Some(FieldValue::Float(number(minuend)? - number(subtrahend)?)),
            Expression::KineticEnergy { mass, velocity } => {
                let m = number(mass)?;
                let v = number(velocity)?;
                Some(FieldValue::Float(0.5 * m * v * v / 1000.0))
            }
        }
    }
}
