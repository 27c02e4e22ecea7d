//! Text normalization shared by the extractor and categorical rules

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoercionError;
use pontoon_types::ValueType;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref DESIGNATION_SEPARATOR: Regex = Regex::new(r"[\s\-–_/]+").unwrap();
    static ref ALLOY_TEMPER_BOUNDARY: Regex = Regex::new(r"(\d)([A-Z])").unwrap();
}

/// How a captured text value is canonicalized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    /// Collapsed whitespace, upper case
    #[default]
    Plain,
    /// Material designations: "6061 T6" and "6061-T6" both become "6061-T6"
    Designation,
}

/// Collapse every whitespace run (line breaks included) to one space
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

/// Canonical form used when comparing categorical values
pub fn comparable(text: &str) -> String {
    collapse_whitespace(text).to_uppercase()
}

pub fn canonicalize(
    raw: &str,
    format: TextFormat,
    suffix: Option<&str>,
) -> Result<String, CoercionError> {
    let plain = comparable(raw);
    if plain.is_empty() {
        return Err(CoercionError::Empty);
    }

    let mut value = match format {
        TextFormat::Plain => plain,
        TextFormat::Designation => {
            let joined = DESIGNATION_SEPARATOR.replace_all(&plain, "-");
            let joined = ALLOY_TEMPER_BOUNDARY.replace_all(&joined, "$1-$2");
            let joined = joined.trim_matches('-');
            if joined.is_empty() {
                return Err(CoercionError::malformed(raw, ValueType::Text));
            }
            joined.to_string()
        }
    };

    if let Some(suffix) = suffix {
        value.push_str(suffix);
    }
    Ok(value)
}
