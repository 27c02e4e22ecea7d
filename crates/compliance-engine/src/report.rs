//! Report assembly and Markdown rendering

use std::fmt;

use pontoon_types::{ComplianceStatus, EvaluationReport, FieldSource};

use crate::fields::FieldRegistry;

/// Render a report as Markdown. Field labels come from the registry;
/// fields the registry does not know are shown by key.
pub fn render_markdown(report: &EvaluationReport, registry: &FieldRegistry) -> String {
    MarkdownReport { report, registry }.to_string()
}

/// Markdown view of a report
pub struct MarkdownReport<'a> {
    pub report: &'a EvaluationReport,
    pub registry: &'a FieldRegistry,
}

impl MarkdownReport<'_> {
    fn label(&self, key: &str) -> String {
        self.registry
            .field(key)
            .map(|f| f.display_label().to_string())
            .unwrap_or_else(|| key.to_string())
    }
}

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;

        writeln!(f, "# Pontoon Design Compliance Report")?;
        writeln!(f)?;
        writeln!(f, "**Document:** {}", report.document_id)?;
        writeln!(f, "**Risk:** {}", report.risk)?;
        writeln!(f)?;

        let s = &report.summary;
        writeln!(f, "## Summary")?;
        writeln!(f)?;
        writeln!(f, "| Status | Count |")?;
        writeln!(f, "|---|---|")?;
        writeln!(f, "| Compliant | {} |", s.compliant)?;
        writeln!(f, "| Conditional | {} |", s.conditional)?;
        writeln!(f, "| Review | {} |", s.review)?;
        writeln!(f, "| N/A | {} |", s.not_applicable)?;
        writeln!(f)?;

        writeln!(f, "## Design Parameters")?;
        writeln!(f)?;
        writeln!(f, "| Parameter | Value | Unit | Source |")?;
        writeln!(f, "|---|---|---|---|")?;
        for field in &report.extracted_fields {
            let value = field
                .value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "| {} | {} | {} | {} |",
                self.label(&field.key),
                escape(&value),
                field.unit.as_deref().unwrap_or(""),
                source_label(field.source)
            )?;
        }
        writeln!(f)?;

        writeln!(f, "## Compliance Checks")?;
        writeln!(f)?;
        writeln!(f, "| Check | Value | Status | Reference |")?;
        writeln!(f, "|---|---|---|---|")?;
        for result in &report.compliance_results {
            let value = result
                .value_used
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "| {} | {} | {} | {} |",
                escape(&result.description),
                escape(&value),
                result.status,
                escape(&result.citation)
            )?;
        }

        if !report.missing_required.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Missing Required Parameters")?;
            writeln!(f)?;
            for key in &report.missing_required {
                writeln!(f, "- {}", self.label(key))?;
            }
        }

        let assumptions: Vec<_> = report
            .extracted_fields
            .iter()
            .filter(|field| matches!(field.source, FieldSource::Assumed | FieldSource::Derived))
            .collect();
        if !assumptions.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Assumptions")?;
            writeln!(f)?;
            for field in assumptions {
                if let Some(value) = &field.value {
                    writeln!(
                        f,
                        "- {} {} {}{} (not stated on drawings)",
                        self.label(&field.key),
                        source_label(field.source).to_lowercase(),
                        value,
                        field.unit.as_deref().map(|u| format!(" {}", u)).unwrap_or_default()
                    )?;
                }
            }
        }

        let flagged: Vec<_> = report
            .compliance_results
            .iter()
            .filter(|r| matches!(r.status, ComplianceStatus::Review | ComplianceStatus::Conditional))
            .collect();
        if !flagged.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Recommendations")?;
            writeln!(f)?;
            for result in flagged {
                let action = match result.status {
                    ComplianceStatus::Review => "Engineering review required",
                    _ => "Confirm suitability of reduced provision",
                };
                writeln!(f, "- {}: {} ({}).", result.description, action, result.citation)?;
            }
        }

        Ok(())
    }
}

fn source_label(source: FieldSource) -> &'static str {
    match source {
        FieldSource::Extracted => "Extracted",
        FieldSource::Assumed => "Assumed",
        FieldSource::Derived => "Derived",
        FieldSource::Override => "Override",
        FieldSource::Absent => "Absent",
    }
}

// Pipes would split a table cell
fn escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}
