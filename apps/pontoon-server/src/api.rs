//! API handlers for the pontoon server
//!
//! Provides REST endpoints for:
//! - Field and rule registry listing
//! - Single and batch document evaluation
//! - Audit trail inspection

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};
use compliance_engine::fields::DefaultPolicy;
use compliance_engine::rules::predicate::Predicate;
use compliance_engine::rules::AbsencePolicy;
use compliance_engine::{ComplianceEngine, Overrides};
use pontoon_types::audit::{hash_text, AuditAction, AuditChain, AuditEvent};
use pontoon_types::{DesignDocument, EvaluationReport, FieldValue, ValueType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::AppState;

const ACTOR: &str = "pontoon-server";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub fields: usize,
    pub rules: usize,
}

/// Handler: GET /health
pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pontoon-server",
        version: env!("CARGO_PKG_VERSION"),
        fields: state.engine.fields().fields().count(),
        rules: state.engine.rules().len(),
    })
}

/// Field registry listing
#[derive(Serialize)]
pub struct FieldListResponse {
    pub success: bool,
    pub version: u32,
    pub fields: Vec<FieldInfo>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct FieldInfo {
    pub key: String,
    pub label: String,
    pub value_type: ValueType,
    pub unit: Option<String>,
    pub required: bool,
    /// "assumed" or "derived" when the field has a fallback
    pub default: Option<&'static str>,
}

/// Handler: GET /api/fields
pub async fn handle_list_fields(State(state): State<AppState>) -> Json<FieldListResponse> {
    let registry = state.engine.fields();
    let fields: Vec<FieldInfo> = registry
        .fields()
        .map(|f| FieldInfo {
            key: f.key.clone(),
            label: f.display_label().to_string(),
            value_type: f.value_type,
            unit: f.unit.clone(),
            required: registry.is_required(&f.key),
            default: f.default.as_ref().map(|d| match d {
                DefaultPolicy::Assumed(_) => "assumed",
                DefaultPolicy::Derived(_) => "derived",
            }),
        })
        .collect();

    let count = fields.len();

    Json(FieldListResponse {
        success: true,
        version: registry.version(),
        fields,
        count,
    })
}

/// Rule registry listing
#[derive(Serialize)]
pub struct RuleListResponse {
    pub success: bool,
    pub version: u32,
    pub rules: Vec<RuleInfo>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct RuleInfo {
    pub id: String,
    pub description: String,
    pub field_keys: Vec<String>,
    pub predicate: Predicate,
    pub citation: String,
    pub when_absent: AbsencePolicy,
    pub revision: u32,
}

/// Handler: GET /api/rules
pub async fn handle_list_rules(State(state): State<AppState>) -> Json<RuleListResponse> {
    let registry = state.engine.rules();
    let rules: Vec<RuleInfo> = registry
        .iter()
        .map(|r| RuleInfo {
            id: r.id.clone(),
            description: r.description.clone(),
            field_keys: r.field_keys().into_iter().map(str::to_string).collect(),
            predicate: r.predicate.clone(),
            citation: r.citation.clone(),
            when_absent: r.when_absent,
            revision: r.revision,
        })
        .collect();

    let count = rules.len();

    Json(RuleListResponse {
        success: true,
        version: registry.version(),
        rules,
        count,
    })
}

/// Evaluation request body
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    /// Caller's identifier; generated when omitted
    pub document_id: Option<String>,

    pub filename: Option<String>,

    /// Whole-document text. Exactly one of `text` and `pages` is required.
    pub text: Option<String>,

    /// Per-page text, joined with newlines before matching
    pub pages: Option<Vec<String>>,

    /// Output format: "json" or "markdown"
    #[serde(default = "default_format")]
    pub format: String,

    /// Reviewer-supplied values keyed by field, in the field's unit
    #[serde(default)]
    pub overrides: BTreeMap<String, serde_json::Value>,
}

fn default_format() -> String {
    "json".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Json,
    Markdown,
}

/// Evaluation response
#[derive(Serialize)]
pub struct EvaluateResponse {
    pub success: bool,
    pub report: EvaluationReport,
    /// Rendered report, present when `format = "markdown"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

/// Handler: POST /api/evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ServerError> {
    let format = parse_format(&req.format)?;
    let (document, overrides) = prepare(&state.engine, req)?;
    info!(
        "Evaluate request: document={}, pages={}, overrides={}",
        document.id,
        document.text_content.len(),
        overrides.keys().count()
    );

    let engine = state.engine.clone();
    let (document, overrides, report) = tokio::task::spawn_blocking(move || {
        let report = engine.evaluate_document_with_overrides(&document, &overrides);
        (document, overrides, report)
    })
    .await?;

    record_evaluation(&mut *state.audit.lock().await, &document, &overrides, &report);

    let markdown = match format {
        ReportFormat::Markdown => Some(state.engine.render_markdown(&report)),
        ReportFormat::Json => None,
    };

    Ok(Json(EvaluateResponse {
        success: true,
        report,
        markdown,
    }))
}

/// Batch evaluation request body
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub documents: Vec<EvaluateRequest>,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub reports: Vec<EvaluationReport>,
    pub count: usize,
}

/// Handler: POST /api/evaluate/batch
///
/// Every document is validated before any is evaluated; each then runs on
/// the blocking pool and the reports come back in request order.
pub async fn handle_evaluate_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ServerError> {
    let size = req.documents.len();
    if size == 0 {
        return Err(ServerError::InvalidRequest(
            "documents must not be empty".to_string(),
        ));
    }
    if size > state.max_batch {
        return Err(ServerError::BatchTooLarge {
            size,
            max: state.max_batch,
        });
    }
    info!("Batch evaluate request: {} documents", size);

    let prepared = req
        .documents
        .into_iter()
        .map(|doc| prepare(&state.engine, doc))
        .collect::<Result<Vec<_>, _>>()?;

    let handles: Vec<_> = prepared
        .into_iter()
        .map(|(document, overrides)| {
            let engine = state.engine.clone();
            tokio::task::spawn_blocking(move || {
                let report = engine.evaluate_document_with_overrides(&document, &overrides);
                (document, overrides, report)
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(size);
    for handle in handles {
        let (document, overrides, report) = handle.await?;
        record_evaluation(&mut *state.audit.lock().await, &document, &overrides, &report);
        reports.push(report);
    }

    Ok(Json(BatchResponse {
        success: true,
        count: reports.len(),
        reports,
    }))
}

const DEFAULT_AUDIT_PAGE: usize = 100;
const MAX_AUDIT_PAGE: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub document_id: Option<String>,
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct AuditResponse {
    pub success: bool,
    /// Whole-chain integrity, regardless of any document filter
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Retained events matching the filter
    pub total_events: usize,
    /// Events dropped from the front of the bounded chain
    pub pruned_events: u64,
    pub offset: usize,
    pub limit: usize,
    /// Events in this page
    pub event_count: usize,
    pub events: Vec<AuditEvent>,
}

/// Handler: GET /api/audit
///
/// The chain is snapshotted under the lock; hashing and paging happen on the
/// blocking pool so evaluations are not held up behind verification.
pub async fn handle_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditResponse>, ServerError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_PAGE)
        .clamp(1, MAX_AUDIT_PAGE);
    let snapshot = state.audit.lock().await.clone();

    let response = tokio::task::spawn_blocking(move || {
        let verification = snapshot.verify();
        if let Err(err) = &verification {
            warn!("Audit chain failed verification: {}", err);
        }

        let matching: Vec<&AuditEvent> = match &query.document_id {
            Some(id) => snapshot.for_document(id).collect(),
            None => snapshot.events.iter().collect(),
        };
        let events: Vec<AuditEvent> = matching
            .iter()
            .skip(query.offset)
            .take(limit)
            .map(|&e| e.clone())
            .collect();

        AuditResponse {
            success: true,
            verified: verification.is_ok(),
            error: verification.err().map(|e| e.to_string()),
            total_events: matching.len(),
            pruned_events: snapshot.pruned(),
            offset: query.offset,
            limit,
            event_count: events.len(),
            events,
        }
    })
    .await?;

    Ok(Json(response))
}

fn parse_format(format: &str) -> Result<ReportFormat, ServerError> {
    match format.to_lowercase().as_str() {
        "json" => Ok(ReportFormat::Json),
        "markdown" | "md" => Ok(ReportFormat::Markdown),
        other => Err(ServerError::InvalidRequest(format!(
            "Invalid format '{}'. Must be 'json' or 'markdown'",
            other
        ))),
    }
}

/// Build the document and validate overrides before any evaluation runs
fn prepare(
    engine: &ComplianceEngine,
    req: EvaluateRequest,
) -> Result<(DesignDocument, Overrides), ServerError> {
    let text_content = match (req.text, req.pages) {
        (Some(text), None) => vec![text],
        (None, Some(pages)) => pages,
        (Some(_), Some(_)) => {
            return Err(ServerError::InvalidRequest(
                "provide either text or pages, not both".to_string(),
            ))
        }
        (None, None) => {
            return Err(ServerError::InvalidRequest(
                "one of text or pages is required".to_string(),
            ))
        }
    };

    let values = req
        .overrides
        .into_iter()
        .map(|(key, value)| {
            let value = json_to_field_value(&key, value)?;
            Ok((key, value))
        })
        .collect::<Result<BTreeMap<_, _>, ServerError>>()?;
    let overrides = engine.validate_overrides(values)?;

    let document = DesignDocument {
        id: req
            .document_id
            .unwrap_or_else(|| format!("doc-{}", uuid::Uuid::new_v4())),
        filename: req.filename,
        text_content,
    };
    Ok((document, overrides))
}

fn json_to_field_value(key: &str, value: serde_json::Value) -> Result<FieldValue, ServerError> {
    match value {
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(FieldValue::Int(i)),
            None => n.as_f64().map(FieldValue::Float).ok_or_else(|| {
                ServerError::InvalidRequest(format!("override '{}' is not a finite number", key))
            }),
        },
        serde_json::Value::String(s) => Ok(FieldValue::Text(s)),
        other => Err(ServerError::InvalidRequest(format!(
            "override '{}' must be a number or a string, got {}",
            key, other
        ))),
    }
}

/// Append one document's evaluation to the audit chain
pub fn record_evaluation(
    chain: &mut AuditChain,
    document: &DesignDocument,
    overrides: &Overrides,
    report: &EvaluationReport,
) {
    let id = &document.id;
    chain.append(
        AuditAction::TextReceived {
            text_hash: hash_text(&document.full_text()),
            pages: document.text_content.len() as u32,
        },
        ACTOR,
        id,
        document.filename.clone(),
    );
    for key in overrides.keys() {
        chain.append(
            AuditAction::OverrideApplied {
                field_key: key.to_string(),
            },
            ACTOR,
            id,
            None,
        );
    }

    let present = report.extracted_fields.iter().filter(|f| f.present).count();
    chain.append(
        AuditAction::FieldsExtracted {
            present: present as u32,
            absent: (report.extracted_fields.len() - present) as u32,
        },
        ACTOR,
        id,
        None,
    );
    chain.append(
        AuditAction::rules_evaluated(&report.summary),
        ACTOR,
        id,
        None,
    );
    let issued = chain.append(
        AuditAction::ReportIssued { risk: report.risk },
        ACTOR,
        id,
        (!report.missing_required.is_empty())
            .then(|| format!("missing required: {}", report.missing_required.join(", "))),
    );
    debug!("Audit event {} appended for {}", issued.event_id, id);
}
