pub mod audit;
pub mod types;

pub use types::{
    ComplianceResult, ComplianceStatus, DesignDocument, EvaluationReport, ExtractedField,
    FieldSource, FieldValue, RiskBand, SummaryCounts, ValueType,
};
