use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignDocument {
    pub id: String,
    pub filename: Option<String>,
    pub text_content: Vec<String>, // Per-page text
}

impl DesignDocument {
    /// Wrap a single text blob as a one-page document
    pub fn from_text(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            filename: None,
            text_content: vec![text.to_string()],
        }
    }

    /// All pages joined into the blob the extractor consumes
    pub fn full_text(&self) -> String {
        self.text_content.join("\n")
    }
}

/// Declared type a captured string is coerced into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Float,
    Int,
    Text,
    Money,
    Ratio,
    /// "300-400" style span, stored as its midpoint
    Range,
}

impl ValueType {
    /// Numeric types can feed threshold predicates and expressions
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ValueType::Text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Text(String),
    Money(f64),
    Ratio { antecedent: f64, consequent: f64 },
}

impl FieldValue {
    /// Numeric view of the value; `None` for text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) | FieldValue::Money(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Ratio {
                antecedent,
                consequent,
            } => {
                if *consequent == 0.0 {
                    None
                } else {
                    Some(antecedent / consequent)
                }
            }
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", trim_float(*v)),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Money(v) => write!(f, "${:.2}", v),
            FieldValue::Ratio {
                antecedent,
                consequent,
            } => write!(f, "{}:{}", trim_float(*antecedent), trim_float(*consequent)),
        }
    }
}

// 0.1 + 0.2 style noise should not leak into reports
fn trim_float(v: f64) -> String {
    let rounded = (v * 1_000_000.0).round() / 1_000_000.0;
    format!("{}", rounded)
}

/// Where an extracted field's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// Matched by a registry pattern
    Extracted,
    /// Constant fallback declared by the registry
    Assumed,
    /// Computed from other fields
    Derived,
    /// Supplied by a reviewer
    Override,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub key: String,
    pub present: bool,
    pub value: Option<FieldValue>,
    pub raw_match: Option<String>, // Text the winning pattern captured
    pub source: FieldSource,
    pub unit: Option<String>,
}

impl ExtractedField {
    pub fn absent(key: &str, unit: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            present: false,
            value: None,
            raw_match: None,
            source: FieldSource::Absent,
            unit: unit.map(str::to_string),
        }
    }

    pub fn with_value(
        key: &str,
        value: FieldValue,
        source: FieldSource,
        raw_match: Option<String>,
        unit: Option<&str>,
    ) -> Self {
        Self {
            key: key.to_string(),
            present: true,
            value: Some(value),
            raw_match,
            source,
            unit: unit.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceStatus {
    /// Meets or exceeds the requirement
    Compliant,
    /// Meets a reduced or secondary threshold
    Conditional,
    /// Present but short of the requirement; needs engineering judgement
    Review,
    /// Inputs absent from the source document
    NotApplicable,
}

impl ComplianceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "Compliant",
            ComplianceStatus::Conditional => "Conditional",
            ComplianceStatus::Review => "Review",
            ComplianceStatus::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub rule_id: String,
    pub description: String,
    pub field_keys: Vec<String>,
    pub value_used: Option<FieldValue>,
    pub status: ComplianceStatus,
    pub citation: String, // e.g., "AS 3600:2018 Table 4.10.3.2"
    pub revision: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub compliant: usize,
    pub conditional: usize,
    pub review: usize,
    pub not_applicable: usize,
}

impl SummaryCounts {
    pub fn from_results(results: &[ComplianceResult]) -> Self {
        let mut counts = Self::default();
        for result in results {
            match result.status {
                ComplianceStatus::Compliant => counts.compliant += 1,
                ComplianceStatus::Conditional => counts.conditional += 1,
                ComplianceStatus::Review => counts.review += 1,
                ComplianceStatus::NotApplicable => counts.not_applicable += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.compliant + self.conditional + self.review + self.not_applicable
    }
}

/// Coarse risk classification derived from the summary counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_counts(counts: &SummaryCounts) -> Self {
        if counts.review >= 3 {
            RiskBand::High
        } else if counts.review >= 1 || counts.conditional >= 2 {
            RiskBand::Medium
        } else {
            RiskBand::Low
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskBand::Low => "Low",
            RiskBand::Medium => "Medium",
            RiskBand::High => "High",
        };
        f.write_str(label)
    }
}

/// Everything one document evaluation produced. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub document_id: String,
    pub extracted_fields: Vec<ExtractedField>,
    pub compliance_results: Vec<ComplianceResult>,
    pub summary: SummaryCounts,
    pub risk: RiskBand,
    pub missing_required: Vec<String>,
}

impl EvaluationReport {
    pub fn new(
        document_id: &str,
        extracted_fields: Vec<ExtractedField>,
        compliance_results: Vec<ComplianceResult>,
        missing_required: Vec<String>,
    ) -> Self {
        let summary = SummaryCounts::from_results(&compliance_results);
        Self {
            document_id: document_id.to_string(),
            risk: RiskBand::from_counts(&summary),
            extracted_fields,
            compliance_results,
            summary,
            missing_required,
        }
    }

    pub fn field(&self, key: &str) -> Option<&ExtractedField> {
        self.extracted_fields.iter().find(|f| f.key == key)
    }

    pub fn result(&self, rule_id: &str) -> Option<&ComplianceResult> {
        self.compliance_results.iter().find(|r| r.rule_id == rule_id)
    }
}
