//! Compliance evaluation
//!
//! Each rule is judged independently against the present field values.
//! Results keep the rule registry's order.

use std::collections::HashMap;

use pontoon_types::{ComplianceResult, ExtractedField, FieldValue};
use tracing::debug;

use super::{ComplianceRule, RuleRegistry};

pub fn evaluate(fields: &[ExtractedField], rules: &RuleRegistry) -> Vec<ComplianceResult> {
    let present: HashMap<&str, &FieldValue> = fields
        .iter()
        .filter_map(|f| f.value.as_ref().map(|v| (f.key.as_str(), v)))
        .collect();

    rules.iter().map(|rule| evaluate_rule(rule, &present)).collect()
}

fn evaluate_rule(rule: &ComplianceRule, present: &HashMap<&str, &FieldValue>) -> ComplianceResult {
    let value = rule.subject.resolve(|key| present.get(key).copied());
    let status = rule.judge(value.as_ref());

    debug!(rule = %rule.id, %status, "rule evaluated");

    ComplianceResult {
        rule_id: rule.id.clone(),
        description: rule.description.clone(),
        field_keys: rule.field_keys().into_iter().map(str::to_string).collect(),
        value_used: value,
        status,
        citation: rule.citation.clone(),
        revision: rule.revision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldRegistry;
    use pontoon_types::{ComplianceStatus, FieldSource};
    use pretty_assertions::assert_eq;

    const FIELDS: &str = r#"
        [[extraction]]
        id = "vessel"
        patterns = ['VESSEL (?P<vessel_length>{num}) m x (?P<vessel_beam>{num}) m']
        fields = [
            { key = "vessel_length", type = "float", unit = "m" },
            { key = "vessel_beam", type = "float", unit = "m" },
        ]

        [[extraction]]
        id = "berth_length"
        patterns = ['BERTH LENGTH ({num}) m']
        fields = [{ key = "berth_length", type = "float", unit = "m" }]

        [[extraction]]
        id = "timber_grade"
        patterns = ['TIMBER (F\d+)']
        fields = [{ key = "timber_grade", type = "text" }]
    "#;

    const RULES: &str = r#"
        [[rule]]
        id = "berth_length_ratio"
        description = "Berth length relative to design vessel"
        subject = { op = "ratio", numerator = "berth_length", denominator = "vessel_length" }
        citation = "AS 3962:2020 Section 2"
        predicate = { kind = "at_least", min = 1.1 }

        [[rule]]
        id = "timber_grade"
        description = "Timber stress grade"
        field = "timber_grade"
        citation = "AS 1720.1:2010"
        predicate = { kind = "one_of", values = ["F17", "F22"] }

        [[rule]]
        id = "vessel_beam_stated"
        description = "Design vessel beam stated"
        field = "vessel_beam"
        citation = "AS 3962:2020"
        when_absent = "Review"
        predicate = { kind = "stated" }
    "#;

    fn registries() -> (FieldRegistry, RuleRegistry) {
        let fields = FieldRegistry::from_toml_str(FIELDS).unwrap();
        let rules = RuleRegistry::from_toml_str(RULES, &fields).unwrap();
        (fields, rules)
    }

    fn present(key: &str, value: FieldValue) -> ExtractedField {
        ExtractedField::with_value(key, value, FieldSource::Extracted, None, None)
    }

    #[test]
    fn test_results_follow_rule_order() {
        let (_, rules) = registries();
        let results = evaluate(&[], &rules);
        assert_eq!(
            results.iter().map(|r| r.rule_id.as_str()).collect::<Vec<_>>(),
            vec!["berth_length_ratio", "timber_grade", "vessel_beam_stated"]
        );
        assert_eq!(results[0].status, ComplianceStatus::NotApplicable);
        assert_eq!(results[2].status, ComplianceStatus::Review);
    }

    #[test]
    fn test_multi_field_subject() {
        let (_, rules) = registries();
        let fields = vec![
            present("vessel_length", FieldValue::Float(12.0)),
            present("berth_length", FieldValue::Float(14.0)),
        ];
        let results = evaluate(&fields, &rules);
        let berth = &results[0];
        assert_eq!(berth.status, ComplianceStatus::Compliant);
        assert_eq!(berth.field_keys, vec!["berth_length", "vessel_length"]);
        let ratio = berth.value_used.as_ref().and_then(FieldValue::as_f64).unwrap();
        assert!((ratio - 14.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_absent_input_is_not_applicable() {
        let (_, rules) = registries();
        let fields = vec![present("berth_length", FieldValue::Float(14.0))];
        let results = evaluate(&fields, &rules);
        assert_eq!(results[0].status, ComplianceStatus::NotApplicable);
        assert_eq!(results[0].value_used, None);
    }

    #[test]
    fn test_wrong_kind_is_not_applicable() {
        let (_, rules) = registries();
        // An override could in principle smuggle a number into a text field
        let fields = vec![present("timber_grade", FieldValue::Int(17))];
        let results = evaluate(&fields, &rules);
        assert_eq!(results[1].status, ComplianceStatus::NotApplicable);
    }

    #[test]
    fn test_rules_are_independent() {
        let (_, rules) = registries();
        let fields = vec![
            present("timber_grade", FieldValue::Text("F8".into())),
            present("vessel_beam", FieldValue::Float(4.0)),
        ];
        let results = evaluate(&fields, &rules);
        assert_eq!(results[1].status, ComplianceStatus::Review);
        assert_eq!(results[2].status, ComplianceStatus::Compliant);
    }
}
