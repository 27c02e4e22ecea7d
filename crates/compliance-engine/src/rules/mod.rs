//! Rule Registry
//!
//! Declarative compliance rules: a subject (one field, or an expression over
//! several), a predicate, and a citation. The registry is validated against
//! the field registry when it is built, so a rule that points at an
//! undeclared field or applies the wrong kind of check never reaches a
//! document.

pub mod evaluate;
pub mod predicate;

use std::collections::HashSet;
use std::path::Path;

use pontoon_types::{ComplianceStatus, FieldValue};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::expression::Expression;
use crate::fields::FieldRegistry;
use predicate::{Operand, Predicate};

/// Status a rule reports when its inputs are absent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbsencePolicy {
    #[default]
    NotApplicable,
    Review,
}

impl AbsencePolicy {
    pub fn status(&self) -> ComplianceStatus {
        match self {
            AbsencePolicy::NotApplicable => ComplianceStatus::NotApplicable,
            AbsencePolicy::Review => ComplianceStatus::Review,
        }
    }
}

fn first_revision() -> u32 {
    1
}

/// A rule as written in the registry file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    pub description: String,
    /// Shorthand for `subject = { op = "field", field = ... }`
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub subject: Option<Expression>,
    pub predicate: Predicate,
    pub citation: String,
    #[serde(default)]
    pub when_absent: AbsencePolicy,
    #[serde(default = "first_revision")]
    pub revision: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRegistryConfig {
    #[serde(default = "first_revision")]
    pub version: u32,
    #[serde(rename = "rule")]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceRule {
    pub id: String,
    pub description: String,
    pub subject: Expression,
    pub predicate: Predicate,
    pub citation: String,
    pub when_absent: AbsencePolicy,
    pub revision: u32,
}

impl ComplianceRule {
    pub fn field_keys(&self) -> Vec<&str> {
        self.subject.fields()
    }

    /// The present/absent wrapper is explicit: absence maps to the rule's
    /// absence policy, a value of the wrong kind to `NotApplicable`.
    pub fn judge(&self, value: Option<&FieldValue>) -> ComplianceStatus {
        match value {
            None => self.when_absent.status(),
            Some(v) => self.predicate.judge(v).unwrap_or_else(|| {
                tracing::warn!(
                    rule = %self.id,
                    predicate = self.predicate.name(),
                    "value has the wrong kind for this check"
                );
                ComplianceStatus::NotApplicable
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleRegistry {
    version: u32,
    rules: Vec<ComplianceRule>,
}

impl RuleRegistry {
    pub fn from_toml_str(s: &str, fields: &FieldRegistry) -> Result<Self, RegistryError> {
        let config: RuleRegistryConfig = toml::from_str(s)?;
        Self::from_config(config, fields)
    }

    pub fn from_file<P: AsRef<Path>>(path: P, fields: &FieldRegistry) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, fields)
    }

    pub fn from_config(
        config: RuleRegistryConfig,
        fields: &FieldRegistry,
    ) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        let rules = config
            .rules
            .into_iter()
            .map(|spec| {
                if !seen.insert(spec.id.clone()) {
                    return Err(RegistryError::DuplicateRuleId(spec.id));
                }
                compile_rule(spec, fields)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version: config.version,
            rules,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComplianceRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ComplianceRule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

fn compile_rule(spec: RuleSpec, fields: &FieldRegistry) -> Result<ComplianceRule, RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidRule {
        rule: spec.id.clone(),
        reason,
    };

    let subject = match (&spec.field, &spec.subject) {
        (Some(field), None) => Expression::field(field),
        (None, Some(subject)) => subject.clone(),
        _ => {
            return Err(invalid(
                "exactly one of `field` or `subject` is required".to_string(),
            ))
        }
    };

    spec.predicate.check_definition().map_err(invalid)?;

    for key in subject.fields() {
        let field = fields.field(key).ok_or_else(|| RegistryError::UnknownField {
            rule: spec.id.clone(),
            field: key.to_string(),
        })?;

        let value_type = field.value_type;
        let compatible = match spec.predicate.operand() {
            Operand::Any => true,
            Operand::Numeric => value_type.is_numeric(),
            // Combined expressions always produce numbers
            Operand::Text => !value_type.is_numeric() && !subject.is_numeric(),
        };
        if !compatible || (subject.is_numeric() && !value_type.is_numeric()) {
            return Err(RegistryError::IncompatiblePredicate {
                rule: spec.id.clone(),
                predicate: spec.predicate.name(),
                value_type,
            });
        }
    }

    Ok(ComplianceRule {
        id: spec.id,
        description: spec.description,
        subject,
        predicate: spec.predicate,
        citation: spec.citation,
        when_absent: spec.when_absent,
        revision: spec.revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &str = r#"
        [[extraction]]
        id = "concrete_cover"
        patterns = ['COVER\s*({num})\s*mm']
        fields = [{ key = "concrete_cover", type = "int", unit = "mm" }]

        [[extraction]]
        id = "aluminium_grade"
        patterns = ['GRADE\s*(\d{4}\s*-?\s*T\d)']
        fields = [{ key = "aluminium_grade", type = "text", text_format = "designation" }]

        [[extraction]]
        id = "vessel"
        patterns = ['VESSEL (?P<vessel_length>{num}) m x (?P<vessel_beam>{num}) m']
        fields = [
            { key = "vessel_length", type = "float", unit = "m" },
            { key = "vessel_beam", type = "float", unit = "m" },
        ]
    "#;

    fn fields() -> FieldRegistry {
        FieldRegistry::from_toml_str(FIELDS).unwrap()
    }

    #[test]
    fn test_loads_rules_in_declared_order() {
        let toml = r#"
            version = 4

            [[rule]]
            id = "cover"
            description = "Concrete cover for exposure class C"
            field = "concrete_cover"
            citation = "AS 3600:2018 Table 4.10.3.2"
            revision = 2
            predicate = { kind = "tiered", direction = "at_least", compliant = 65.0, conditional = 50.0 }

            [[rule]]
            id = "aspect"
            description = "Vessel aspect ratio"
            subject = { op = "ratio", numerator = "vessel_length", denominator = "vessel_beam" }
            citation = "AS 3962:2020"
            when_absent = "Review"
            predicate = { kind = "at_least", min = 2.5 }
        "#;
        let registry = RuleRegistry::from_toml_str(toml, &fields()).unwrap();
        assert_eq!(registry.version(), 4);
        assert_eq!(
            registry.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["cover", "aspect"]
        );
        let aspect = registry.get("aspect").unwrap();
        assert_eq!(aspect.field_keys(), vec!["vessel_length", "vessel_beam"]);
        assert_eq!(aspect.when_absent, AbsencePolicy::Review);
        assert_eq!(registry.get("cover").unwrap().revision, 2);
    }

    #[test]
    fn test_rejects_unknown_field() {
        let toml = r#"
            [[rule]]
            id = "freeboard"
            description = "Freeboard"
            field = "freeboard_dead"
            citation = "AS 3962:2020"
            predicate = { kind = "at_least", min = 300.0 }
        "#;
        assert!(matches!(
            RuleRegistry::from_toml_str(toml, &fields()),
            Err(RegistryError::UnknownField { field, .. }) if field == "freeboard_dead"
        ));
    }

    #[test]
    fn test_rejects_numeric_check_on_text() {
        let toml = r#"
            [[rule]]
            id = "grade"
            description = "Aluminium grade"
            field = "aluminium_grade"
            citation = "AS/NZS 1664.1"
            predicate = { kind = "at_least", min = 6061.0 }
        "#;
        assert!(matches!(
            RuleRegistry::from_toml_str(toml, &fields()),
            Err(RegistryError::IncompatiblePredicate { .. })
        ));
    }

    #[test]
    fn test_rejects_text_check_on_number() {
        let toml = r#"
            [[rule]]
            id = "cover"
            description = "Cover"
            field = "concrete_cover"
            citation = "AS 3600"
            predicate = { kind = "equals", value = "65" }
        "#;
        assert!(matches!(
            RuleRegistry::from_toml_str(toml, &fields()),
            Err(RegistryError::IncompatiblePredicate { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_rule_id() {
        let rule = r#"
            [[rule]]
            id = "cover"
            description = "Cover"
            field = "concrete_cover"
            citation = "AS 3600"
            predicate = { kind = "stated" }
        "#;
        let toml = format!("{}{}", rule, rule);
        assert!(matches!(
            RuleRegistry::from_toml_str(&toml, &fields()),
            Err(RegistryError::DuplicateRuleId(id)) if id == "cover"
        ));
    }

    #[test]
    fn test_rejects_field_and_subject_together() {
        let toml = r#"
            [[rule]]
            id = "cover"
            description = "Cover"
            field = "concrete_cover"
            subject = { op = "field", field = "concrete_cover" }
            citation = "AS 3600"
            predicate = { kind = "stated" }
        "#;
        assert!(matches!(
            RuleRegistry::from_toml_str(toml, &fields()),
            Err(RegistryError::InvalidRule { .. })
        ));
    }

    #[test]
    fn test_judge_handles_absence_explicitly() {
        let rule = ComplianceRule {
            id: "wind".into(),
            description: "Ultimate wind speed".into(),
            subject: Expression::field("wind_ultimate"),
            predicate: Predicate::AtLeast {
                min: 64.0,
                shortfall: ComplianceStatus::Review,
            },
            citation: "AS/NZS 1170.2:2021".into(),
            when_absent: AbsencePolicy::NotApplicable,
            revision: 1,
        };
        assert_eq!(rule.judge(None), ComplianceStatus::NotApplicable);
        assert_eq!(
            rule.judge(Some(&FieldValue::Int(55))),
            ComplianceStatus::Review
        );
        assert_eq!(
            rule.judge(Some(&FieldValue::Text("FAST".into()))),
            ComplianceStatus::NotApplicable
        );
    }
}
