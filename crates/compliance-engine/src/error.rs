//! Error types for registry loading, coercion and overrides

use std::path::PathBuf;

use pontoon_types::ValueType;
use thiserror::Error;

/// Registry configuration errors. Raised at load time, never per document.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read registry file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed registry TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Duplicate rule id '{0}'")]
    DuplicateRuleId(String),

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Rule '{rule}' references undeclared field '{field}'")]
    UnknownField { rule: String, field: String },

    #[error("Rule '{rule}' uses field '{field}' before it is declared")]
    ForwardReference { rule: String, field: String },

    #[error("Invalid pattern in rule '{rule}': {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("Pattern '{pattern}' in rule '{rule}' does not bind any field")]
    UnboundPattern { rule: String, pattern: String },

    #[error("Pattern in rule '{rule}' captures group '{group}' which is not a field of the rule")]
    UnknownGroup { rule: String, group: String },

    #[error("Rule '{rule}' cannot apply a {predicate} check to a {value_type:?} value")]
    IncompatiblePredicate {
        rule: String,
        predicate: &'static str,
        value_type: ValueType,
    },

    #[error("Rule '{rule}' is invalid: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("Built-in registry failed to load: {0}")]
    Builtin(String),
}

/// A captured string that cannot become the declared type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    #[error("empty capture")]
    Empty,

    #[error("cannot read '{raw}' as {expected:?}")]
    Malformed { raw: String, expected: ValueType },
}

impl CoercionError {
    pub(crate) fn malformed(raw: &str, expected: ValueType) -> Self {
        CoercionError::Malformed {
            raw: raw.to_string(),
            expected,
        }
    }
}

/// Reviewer-supplied values that do not fit the field registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverrideError {
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Field '{key}' expects a {expected:?} value")]
    TypeMismatch { key: String, expected: ValueType },
}
