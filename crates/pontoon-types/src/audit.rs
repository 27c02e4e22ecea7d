//! Tamper-evident audit log for evaluation events

use std::collections::VecDeque;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{RiskBand, SummaryCounts};

/// Types of auditable events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    TextReceived {
        text_hash: String,
        pages: u32,
    },
    FieldsExtracted {
        present: u32,
        absent: u32,
    },
    OverrideApplied {
        field_key: String,
    },
    RulesEvaluated {
        compliant: u32,
        conditional: u32,
        review: u32,
        not_applicable: u32,
    },
    ReportIssued {
        risk: RiskBand,
    },
}

impl AuditAction {
    pub fn rules_evaluated(counts: &SummaryCounts) -> Self {
        AuditAction::RulesEvaluated {
            compliant: counts.compliant as u32,
            conditional: counts.conditional as u32,
            review: counts.review as u32,
            not_applicable: counts.not_applicable as u32,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AuditError {
    #[error("Chain broken at event {index}: expected prev {expected:?}, got {actual:?}")]
    ChainBroken {
        index: usize,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("Chain head mismatch: recorded {recorded:?}, computed {computed:?}")]
    HeadMismatch {
        recorded: Option<String>,
        computed: Option<String>,
    },

    #[error("Audit chain serialization failed: {0}")]
    Serialization(String),
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: String,
    pub action: AuditAction,
    pub actor: String,
    pub document_id: String,
    pub previous_hash: Option<String>,
    pub details: Option<String>,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        actor: &str,
        document_id: &str,
        previous_hash: Option<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            action,
            actor: actor.to_string(),
            document_id: document_id.to_string(),
            previous_hash,
            details,
        }
    }

    /// Compute the hash of this event (for chain linking)
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.event_id.as_bytes());
        hasher.update(self.timestamp.as_bytes());
        hasher.update(format!("{:?}", self.action).as_bytes());
        hasher.update(self.actor.as_bytes());
        hasher.update(self.document_id.as_bytes());
        if let Some(ref details) = self.details {
            hasher.update(details.as_bytes());
        }
        if let Some(ref prev) = self.previous_hash {
            hasher.update(prev.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Chain of audit events with hash linking
///
/// A bounded chain drops its oldest events once `max_events` is exceeded;
/// `anchor_hash` keeps the hash of the last dropped event so the retained
/// suffix still verifies. `head_hash` records the hash of the newest event,
/// which catches edits to the last entry.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AuditChain {
    pub events: VecDeque<AuditEvent>,
    pub created_at: String,
    #[serde(default)]
    max_events: Option<usize>,
    #[serde(default)]
    anchor_hash: Option<String>,
    #[serde(default)]
    head_hash: Option<String>,
    #[serde(default)]
    pruned: u64,
}

impl AuditChain {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now().to_rfc3339(),
            ..Self::default()
        }
    }

    /// Chain that retains at most `max_events` events (at least one)
    pub fn bounded(max_events: usize) -> Self {
        Self {
            max_events: Some(max_events.max(1)),
            ..Self::new()
        }
    }

    /// Get the hash of the last event (for linking)
    pub fn last_hash(&self) -> Option<String> {
        self.head_hash.clone()
    }

    pub fn max_events(&self) -> Option<usize> {
        self.max_events
    }

    /// Events dropped from the front of a bounded chain
    pub fn pruned(&self) -> u64 {
        self.pruned
    }

    /// Append an event, automatically linking to previous hash
    pub fn append(
        &mut self,
        action: AuditAction,
        actor: &str,
        document_id: &str,
        details: Option<String>,
    ) -> &AuditEvent {
        let previous_hash = self.last_hash();
        let event = AuditEvent::new(action, actor, document_id, previous_hash, details);
        self.head_hash = Some(event.compute_hash());
        self.events.push_back(event);

        if let Some(max) = self.max_events {
            while self.events.len() > max {
                if let Some(dropped) = self.events.pop_front() {
                    self.anchor_hash = Some(dropped.compute_hash());
                    self.pruned += 1;
                }
            }
        }

        &self.events[self.events.len() - 1]
    }

    /// Verify the integrity of the chain
    pub fn verify(&self) -> Result<(), AuditError> {
        let mut expected_prev = self.anchor_hash.clone();

        for (i, event) in self.events.iter().enumerate() {
            if event.previous_hash != expected_prev {
                return Err(AuditError::ChainBroken {
                    index: i,
                    expected: expected_prev,
                    actual: event.previous_hash.clone(),
                });
            }
            expected_prev = Some(event.compute_hash());
        }

        if expected_prev != self.head_hash {
            return Err(AuditError::HeadMismatch {
                recorded: self.head_hash.clone(),
                computed: expected_prev,
            });
        }

        Ok(())
    }

    /// Events recorded for one document, in append order
    pub fn for_document<'a>(&'a self, document_id: &'a str) -> impl Iterator<Item = &'a AuditEvent> {
        self.events
            .iter()
            .filter(move |e| e.document_id == document_id)
    }

    pub fn to_json(&self) -> Result<String, AuditError> {
        serde_json::to_string_pretty(self).map_err(|e| AuditError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, AuditError> {
        serde_json::from_str(json).map_err(|e| AuditError::Serialization(e.to_string()))
    }

    /// One line per event for log output
    pub fn summary(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|e| {
                format!(
                    "[{}] {} {} - {:?}",
                    e.timestamp.split('T').next().unwrap_or(&e.timestamp),
                    e.actor,
                    e.document_id,
                    e.action
                )
            })
            .collect()
    }
}

/// Compute SHA-256 hash of the document text
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
