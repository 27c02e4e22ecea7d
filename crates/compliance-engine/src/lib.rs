pub mod builtin;
pub mod error;
pub mod expression;
pub mod extract;
pub mod extractors;
pub mod fields;
pub mod report;
pub mod rules;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use pontoon_types::{ComplianceResult, DesignDocument, EvaluationReport, FieldValue};
use tracing::info;

pub use error::{CoercionError, OverrideError, RegistryError};
pub use expression::Expression;
pub use extract::{extract, extract_with_overrides, Extraction, Overrides};
pub use fields::{FieldRegistry, FieldSpec};
pub use rules::evaluate::evaluate;
pub use rules::{ComplianceRule, RuleRegistry};

/// ComplianceEngine entry point. Cheap to clone; registries are shared.
#[derive(Debug, Clone)]
pub struct ComplianceEngine {
    fields: Arc<FieldRegistry>,
    rules: Arc<RuleRegistry>,
}

impl ComplianceEngine {
    /// Engine over the embedded pontoon registries
    pub fn builtin() -> Result<Self, RegistryError> {
        let (fields, rules) =
            builtin::registries().map_err(|e| RegistryError::Builtin(e.to_string()))?;
        Ok(Self { fields, rules })
    }

    pub fn with_registries(fields: FieldRegistry, rules: RuleRegistry) -> Self {
        Self {
            fields: Arc::new(fields),
            rules: Arc::new(rules),
        }
    }

    /// Replace either registry from disk. A replacement rule file is
    /// validated against whichever field registry ends up in use.
    pub fn from_files(
        fields_path: Option<&Path>,
        rules_path: Option<&Path>,
    ) -> Result<Self, RegistryError> {
        let builtin = Self::builtin()?;

        let fields = match fields_path {
            Some(path) => Arc::new(FieldRegistry::from_file(path)?),
            None => builtin.fields,
        };
        let rules = match rules_path {
            Some(path) => Arc::new(RuleRegistry::from_file(path, &fields)?),
            None if fields_path.is_some() => Arc::new(RuleRegistry::from_toml_str(
                builtin::RULES_TOML,
                &fields,
            )?),
            None => builtin.rules,
        };

        Ok(Self { fields, rules })
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn extract(&self, text: &str) -> Extraction {
        extract(text, &self.fields)
    }

    pub fn validate_overrides(
        &self,
        values: BTreeMap<String, FieldValue>,
    ) -> Result<Overrides, OverrideError> {
        Overrides::validate(values, &self.fields)
    }

    pub fn evaluate(&self, extraction: &Extraction) -> Vec<ComplianceResult> {
        evaluate(extraction.fields(), &self.rules)
    }

    pub fn evaluate_document(&self, document: &DesignDocument) -> EvaluationReport {
        self.evaluate_document_with_overrides(document, &Overrides::default())
    }

    pub fn evaluate_document_with_overrides(
        &self,
        document: &DesignDocument,
        overrides: &Overrides,
    ) -> EvaluationReport {
        // Combine all pages into a single text for analysis
        let full_text = document.full_text();

        let extraction = extract_with_overrides(&full_text, &self.fields, overrides);
        let results = self.evaluate(&extraction);
        let (fields, missing_required) = extraction.into_parts();
        let report = EvaluationReport::new(&document.id, fields, results, missing_required);

        info!(
            document = %report.document_id,
            compliant = report.summary.compliant,
            conditional = report.summary.conditional,
            review = report.summary.review,
            not_applicable = report.summary.not_applicable,
            risk = %report.risk,
            "document evaluated"
        );
        report
    }

    /// Evaluate raw text as a one-page document
    pub fn check_text(&self, text: &str) -> EvaluationReport {
        self.evaluate_document(&DesignDocument::from_text("text", text))
    }

    pub fn render_markdown(&self, report: &EvaluationReport) -> String {
        report::render_markdown(report, &self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pontoon_types::{ComplianceStatus, FieldSource, RiskBand};

    const DRAWING_NOTES: &str = "\
        GENERAL NOTES\n\
        1. LIVE LOAD 3.5 kPa OR POINT LOAD 5.0 kN\n\
        2. ULTIMATE WIND SPEED V100 = 57m/s\n\
        3. DESIGN WAVE HEIGHT<500mm\n\
        4. DESIGN WET BERTH VESSEL LENGTH = 12.0 m\n\
        5. DESIGN WET BERTH VESSEL BEAM = 4.2 m\n\
        6. DESIGN WET BERTH VESSEL MASS = 33,000 kg\n\
        7. DEAD LOAD ONLY = 350-400mm\n\
        8. PONTOON CONCRETE STRENGTH TO BE 50 MPa\n\
        9. MINIMUM COVER TO THE REINFORCEMENT - 50 mm\n\
        10. ALUMINIUM MINIMUM GRADE 6061 T6\n";

    #[test]
    fn test_engine_evaluates_drawing_notes() {
        let engine = ComplianceEngine::builtin().unwrap();
        let report = engine.check_text(DRAWING_NOTES);

        assert_eq!(
            report.result("live_load_uniform_min").unwrap().status,
            ComplianceStatus::Compliant
        );
        assert_eq!(
            report.result("wind_ultimate_min").unwrap().status,
            ComplianceStatus::Review
        );
        assert_eq!(
            report.result("wave_height_max").unwrap().status,
            ComplianceStatus::Compliant
        );
        assert_eq!(
            report.result("freeboard_dead_range").unwrap().status,
            ComplianceStatus::Compliant
        );
        assert_eq!(
            report.result("concrete_cover_min").unwrap().status,
            ComplianceStatus::Conditional
        );
        assert_eq!(
            report.result("aluminium_grade").unwrap().status,
            ComplianceStatus::Compliant
        );
        assert!(report.missing_required.is_empty());
    }

    #[test]
    fn test_every_rule_reported_once() {
        let engine = ComplianceEngine::builtin().unwrap();
        let report = engine.check_text("");
        assert_eq!(report.compliance_results.len(), engine.rules().len());
        assert_eq!(report.summary.total(), engine.rules().len());
    }

    #[test]
    fn test_empty_text_records_missing_required() {
        let engine = ComplianceEngine::builtin().unwrap();
        let report = engine.check_text("");
        assert_eq!(
            report.missing_required,
            vec!["live_load_uniform", "live_load_point", "wind_ultimate"]
        );
        // Two rules treat absence as Review
        assert_eq!(report.summary.review, 2);
        assert_eq!(report.risk, RiskBand::Medium);
    }

    #[test]
    fn test_defaults_visible_in_report() {
        let engine = ComplianceEngine::builtin().unwrap();
        let report = engine.check_text(DRAWING_NOTES);

        let berth = report.field("berth_length").unwrap();
        assert_eq!(berth.source, FieldSource::Derived);
        let energy = report.field("berthing_energy").unwrap();
        assert_eq!(energy.source, FieldSource::Derived);
        let kj = energy.value.as_ref().and_then(FieldValue::as_f64).unwrap();
        assert!((kj - 1.485).abs() < 1e-9);
        assert_eq!(
            report.field("gangway_width").unwrap().source,
            FieldSource::Assumed
        );
    }

    #[test]
    fn test_overrides_replace_extracted_values() {
        let engine = ComplianceEngine::builtin().unwrap();
        let mut values = BTreeMap::new();
        values.insert("concrete_cover".to_string(), FieldValue::Int(70));
        let overrides = engine.validate_overrides(values).unwrap();

        let document = DesignDocument::from_text("dwg-3", DRAWING_NOTES);
        let report = engine.evaluate_document_with_overrides(&document, &overrides);

        assert_eq!(report.field("concrete_cover").unwrap().source, FieldSource::Override);
        assert_eq!(
            report.result("concrete_cover_min").unwrap().status,
            ComplianceStatus::Compliant
        );
    }

    #[test]
    fn test_markdown_rendering_uses_labels() {
        let engine = ComplianceEngine::builtin().unwrap();
        let report = engine.check_text(DRAWING_NOTES);
        let md = engine.render_markdown(&report);
        assert!(md.contains("| Concrete cover | 50 | mm | Extracted |"));
        assert!(md.contains("**Risk:** Medium"));
    }
}
