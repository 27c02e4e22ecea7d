//! Verdict-producing predicates
//!
//! Every numeric predicate states its direction, and every predicate that can
//! fail states which status a shortfall produces. Severity is part of the
//! rule definition, never inferred from threshold logic.

use pontoon_types::{ComplianceStatus, FieldValue};
use serde::{Deserialize, Serialize};

use crate::extractors::text::comparable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Value must be greater than or equal to the threshold
    AtLeast,
    /// Value must be less than or equal to the threshold
    AtMost,
}

impl Direction {
    fn meets(&self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::AtLeast => value >= threshold,
            Direction::AtMost => value <= threshold,
        }
    }
}

fn review() -> ComplianceStatus {
    ComplianceStatus::Review
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    AtLeast {
        min: f64,
        #[serde(default = "review")]
        shortfall: ComplianceStatus,
    },
    AtMost {
        max: f64,
        #[serde(default = "review")]
        shortfall: ComplianceStatus,
    },
    /// Inclusive on both ends
    Between {
        min: f64,
        max: f64,
        #[serde(default = "review")]
        shortfall: ComplianceStatus,
    },
    /// Two thresholds: meeting `compliant` is Compliant, meeting only
    /// `conditional` is Conditional, anything else is the shortfall
    Tiered {
        direction: Direction,
        compliant: f64,
        conditional: f64,
        #[serde(default = "review")]
        shortfall: ComplianceStatus,
    },
    Equals {
        value: String,
        #[serde(default = "review")]
        shortfall: ComplianceStatus,
    },
    Contains {
        value: String,
        #[serde(default = "review")]
        shortfall: ComplianceStatus,
    },
    OneOf {
        values: Vec<String>,
        #[serde(default = "review")]
        shortfall: ComplianceStatus,
    },
    /// The drawing states the value at all
    Stated,
}

/// What kind of value a predicate can judge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Numeric,
    Text,
    Any,
}

impl Predicate {
    pub fn name(&self) -> &'static str {
        match self {
            Predicate::AtLeast { .. } => "at_least",
            Predicate::AtMost { .. } => "at_most",
            Predicate::Between { .. } => "between",
            Predicate::Tiered { .. } => "tiered",
            Predicate::Equals { .. } => "equals",
            Predicate::Contains { .. } => "contains",
            Predicate::OneOf { .. } => "one_of",
            Predicate::Stated => "stated",
        }
    }

    pub fn operand(&self) -> Operand {
        match self {
            Predicate::AtLeast { .. }
            | Predicate::AtMost { .. }
            | Predicate::Between { .. }
            | Predicate::Tiered { .. } => Operand::Numeric,
            Predicate::Equals { .. } | Predicate::Contains { .. } | Predicate::OneOf { .. } => {
                Operand::Text
            }
            Predicate::Stated => Operand::Any,
        }
    }

    pub fn shortfall(&self) -> Option<ComplianceStatus> {
        match self {
            Predicate::AtLeast { shortfall, .. }
            | Predicate::AtMost { shortfall, .. }
            | Predicate::Between { shortfall, .. }
            | Predicate::Tiered { shortfall, .. }
            | Predicate::Equals { shortfall, .. }
            | Predicate::Contains { shortfall, .. }
            | Predicate::OneOf { shortfall, .. } => Some(*shortfall),
            Predicate::Stated => None,
        }
    }

    /// Internal consistency of thresholds; `Err` carries the reason
    pub fn check_definition(&self) -> Result<(), String> {
        if let Some(shortfall) = self.shortfall() {
            if !matches!(
                shortfall,
                ComplianceStatus::Review | ComplianceStatus::Conditional
            ) {
                return Err(format!("shortfall must be Review or Conditional, not {:?}", shortfall));
            }
        }

        match self {
            Predicate::AtLeast { min: t, .. } | Predicate::AtMost { max: t, .. } => {
                finite(&[*t])
            }
            Predicate::Between { min, max, .. } => {
                finite(&[*min, *max])?;
                if min > max {
                    return Err(format!("between min {} exceeds max {}", min, max));
                }
                Ok(())
            }
            Predicate::Tiered {
                direction,
                compliant,
                conditional,
                shortfall,
            } => {
                finite(&[*compliant, *conditional])?;
                // The Compliant tier must be the stricter one
                if !direction.meets(*compliant, *conditional) {
                    return Err(format!(
                        "compliant threshold {} is weaker than conditional threshold {}",
                        compliant, conditional
                    ));
                }
                if *shortfall == ComplianceStatus::Conditional {
                    return Err("tiered shortfall must be Review".to_string());
                }
                Ok(())
            }
            Predicate::Equals { value, .. } | Predicate::Contains { value, .. } => {
                if comparable(value).is_empty() {
                    return Err("empty comparison text".to_string());
                }
                Ok(())
            }
            Predicate::OneOf { values, .. } => {
                if values.is_empty() || values.iter().any(|v| comparable(v).is_empty()) {
                    return Err("one_of needs non-empty values".to_string());
                }
                Ok(())
            }
            Predicate::Stated => Ok(()),
        }
    }

    /// Judge a present value. `None` when the value is the wrong kind for
    /// this predicate.
    pub fn judge(&self, value: &FieldValue) -> Option<ComplianceStatus> {
        let pass_or = |ok: bool, shortfall: &ComplianceStatus| {
            if ok {
                ComplianceStatus::Compliant
            } else {
                *shortfall
            }
        };

        match self {
            Predicate::AtLeast { min, shortfall } => {
                Some(pass_or(value.as_f64()? >= *min, shortfall))
            }
            Predicate::AtMost { max, shortfall } => {
                Some(pass_or(value.as_f64()? <= *max, shortfall))
            }
            Predicate::Between {
                min,
                max,
                shortfall,
            } => {
                let v = value.as_f64()?;
                Some(pass_or(v >= *min && v <= *max, shortfall))
            }
            Predicate::Tiered {
                direction,
                compliant,
                conditional,
                shortfall,
            } => {
                let v = value.as_f64()?;
                Some(if direction.meets(v, *compliant) {
                    ComplianceStatus::Compliant
                } else if direction.meets(v, *conditional) {
                    ComplianceStatus::Conditional
                } else {
                    *shortfall
                })
            }
            Predicate::Equals {
                value: expected,
                shortfall,
            } => {
                let actual = comparable(value.as_text()?);
                Some(pass_or(actual == comparable(expected), shortfall))
            }
            Predicate::Contains {
                value: needle,
                shortfall,
            } => {
                let actual = comparable(value.as_text()?);
                Some(pass_or(actual.contains(&comparable(needle)), shortfall))
            }
            Predicate::OneOf { values, shortfall } => {
                let actual = comparable(value.as_text()?);
                Some(pass_or(
                    values.iter().any(|v| comparable(v) == actual),
                    shortfall,
                ))
            }
            Predicate::Stated => Some(ComplianceStatus::Compliant),
        }
    }
}

fn finite(values: &[f64]) -> Result<(), String> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err("thresholds must be finite numbers".to_string())
    }
}
