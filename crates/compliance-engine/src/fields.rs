//! Field Pattern Registry
//!
//! An ordered, declarative table of extraction rules. Each rule names one or
//! more fields and a list of patterns tried in priority order. Registries are
//! written in TOML, validated once at load time, and immutable afterwards.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use pontoon_types::{FieldValue, ValueType};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::expression::Expression;
use crate::extractors::text::TextFormat;

/// Expanded inside patterns before compiling. Period decimal point, comma
/// thousands grouping.
pub const NUMBER_MACRO: &str = "{num}";
pub const NUMBER_PATTERN: &str = r"\d+(?:,\d{3})*(?:\.\d+)?";

/// Flags every pattern is compiled with: case-insensitive, dot matches newline
const PATTERN_FLAGS: &str = "(?is)";

/// Scale conversions applied after coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitConversion {
    MillimetresToMetres,
    CentimetresToMetres,
    MetresToMillimetres,
    TonnesToKilograms,
    KilogramsToTonnes,
}

impl UnitConversion {
    pub fn factor(&self) -> f64 {
        match self {
            UnitConversion::MillimetresToMetres => 0.001,
            UnitConversion::CentimetresToMetres => 0.01,
            UnitConversion::MetresToMillimetres => 1000.0,
            UnitConversion::TonnesToKilograms => 1000.0,
            UnitConversion::KilogramsToTonnes => 0.001,
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        value * self.factor()
    }

    /// Inverse of [`apply`](Self::apply), back to the drawing's unit
    pub fn revert(&self, value: f64) -> f64 {
        value / self.factor()
    }

    /// Converted values are always floats; text and ratios pass through
    pub fn apply_to(&self, value: FieldValue) -> FieldValue {
        match value {
            FieldValue::Float(v) => FieldValue::Float(self.apply(v)),
            FieldValue::Int(v) => FieldValue::Float(self.apply(v as f64)),
            other => other,
        }
    }
}

/// What an absent field falls back to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicy {
    /// A design assumption, recorded as such
    Assumed(f64),
    /// Computed from fields declared earlier in the registry
    Derived(Expression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub conversion: Option<UnitConversion>,
    #[serde(default)]
    pub text_format: Option<TextFormat>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub default: Option<DefaultPolicy>,
    #[serde(default)]
    pub label: Option<String>,
}

impl FieldSpec {
    pub fn new(key: &str, value_type: ValueType) -> Self {
        Self {
            key: key.to_string(),
            value_type,
            unit: None,
            conversion: None,
            text_format: None,
            suffix: None,
            default: None,
            label: None,
        }
    }

    /// Human label for reports, falling back to the key
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }

    /// Value an `assumed` default produces for this field's type
    pub fn assumed_value(&self, value: f64) -> Option<FieldValue> {
        match self.value_type {
            ValueType::Float | ValueType::Range => Some(FieldValue::Float(value)),
            ValueType::Int => Some(FieldValue::Int(value.round() as i64)),
            ValueType::Money => Some(FieldValue::Money(value)),
            // 0.25 is stored as 1:4
            ValueType::Ratio if value > 0.0 => Some(FieldValue::Ratio {
                antecedent: 1.0,
                consequent: 1.0 / value,
            }),
            ValueType::Ratio | ValueType::Text => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRuleSpec {
    pub id: String,
    #[serde(default)]
    pub required: bool,
    pub fields: Vec<FieldSpec>,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRegistryConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(rename = "extraction")]
    pub rules: Vec<ExtractionRuleSpec>,
}

fn default_version() -> u32 {
    1
}

/// A compiled pattern and the capture groups it binds
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub source: String,
    pub regex: Regex,
    /// (field index within the rule, capture group index)
    pub bindings: Vec<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub id: String,
    pub required: bool,
    pub fields: Vec<FieldSpec>,
    pub patterns: Vec<CompiledPattern>,
}

impl ExtractionRule {
    /// Compound rules bind several fields from one match
    pub fn is_compound(&self) -> bool {
        self.fields.len() > 1
    }
}

#[derive(Debug, Clone)]
pub struct FieldRegistry {
    version: u32,
    rules: Vec<ExtractionRule>,
    /// key -> (rule index, field index)
    index: HashMap<String, (usize, usize)>,
}

impl FieldRegistry {
    pub fn from_toml_str(s: &str) -> Result<Self, RegistryError> {
        let config: FieldRegistryConfig = toml::from_str(s)?;
        Self::from_config(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_config(config: FieldRegistryConfig) -> Result<Self, RegistryError> {
        let mut rule_ids = HashSet::new();
        let mut index = HashMap::new();
        let mut rules = Vec::with_capacity(config.rules.len());

        for (rule_idx, spec) in config.rules.into_iter().enumerate() {
            if !rule_ids.insert(spec.id.clone()) {
                return Err(RegistryError::DuplicateRuleId(spec.id));
            }
            if spec.fields.is_empty() || spec.patterns.is_empty() {
                return Err(RegistryError::InvalidRule {
                    rule: spec.id,
                    reason: "an extraction rule needs at least one field and one pattern"
                        .to_string(),
                });
            }

            for (field_idx, field) in spec.fields.iter().enumerate() {
                validate_field(&spec.id, field, &index)?;
                if index
                    .insert(field.key.clone(), (rule_idx, field_idx))
                    .is_some()
                {
                    return Err(RegistryError::DuplicateField(field.key.clone()));
                }
            }

            let patterns = spec
                .patterns
                .iter()
                .map(|p| compile_pattern(&spec.id, &spec.fields, p))
                .collect::<Result<Vec<_>, _>>()?;

            rules.push(ExtractionRule {
                id: spec.id,
                required: spec.required,
                fields: spec.fields,
                patterns,
            });
        }

        Ok(Self {
            version: config.version,
            rules,
            index,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Every declared field, in registry order
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.rules.iter().flat_map(|r| r.fields.iter())
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.index
            .get(key)
            .map(|&(rule, field)| &self.rules[rule].fields[field])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn is_required(&self, key: &str) -> bool {
        self.index
            .get(key)
            .map(|&(rule, _)| self.rules[rule].required)
            .unwrap_or(false)
    }
}

fn validate_field(
    rule: &str,
    field: &FieldSpec,
    declared: &HashMap<String, (usize, usize)>,
) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidRule {
        rule: rule.to_string(),
        reason: format!("field '{}': {}", field.key, reason),
    };

    if field.conversion.is_some()
        && matches!(field.value_type, ValueType::Text | ValueType::Ratio)
    {
        return Err(invalid("unit conversion needs a dimensional numeric type"));
    }
    if (field.text_format.is_some() || field.suffix.is_some())
        && field.value_type != ValueType::Text
    {
        return Err(invalid("text_format and suffix only apply to text fields"));
    }

    match &field.default {
        Some(DefaultPolicy::Assumed(value)) => {
            if !value.is_finite() || field.assumed_value(*value).is_none() {
                return Err(invalid("assumed default does not fit the field type"));
            }
        }
        Some(DefaultPolicy::Derived(expr)) => {
            if !field.value_type.is_numeric() || !expr.is_numeric() {
                return Err(invalid("derived defaults must be numeric expressions"));
            }
            for input in expr.fields() {
                if input == field.key {
                    return Err(invalid("derived default refers to itself"));
                }
                if !declared.contains_key(input) {
                    return Err(RegistryError::ForwardReference {
                        rule: rule.to_string(),
                        field: input.to_string(),
                    });
                }
            }
        }
        None => {}
    }

    Ok(())
}

fn compile_pattern(
    rule: &str,
    fields: &[FieldSpec],
    pattern: &str,
) -> Result<CompiledPattern, RegistryError> {
    let expanded = pattern.replace(NUMBER_MACRO, NUMBER_PATTERN);
    let regex = Regex::new(&format!("{}{}", PATTERN_FLAGS, expanded)).map_err(|source| {
        RegistryError::InvalidPattern {
            rule: rule.to_string(),
            source: Box::new(source),
        }
    })?;

    let mut bindings = Vec::new();
    for (group_idx, name) in regex.capture_names().enumerate() {
        let Some(name) = name else { continue };
        let field_idx = fields
            .iter()
            .position(|f| f.key == name)
            .ok_or_else(|| RegistryError::UnknownGroup {
                rule: rule.to_string(),
                group: name.to_string(),
            })?;
        bindings.push((field_idx, group_idx));
    }

    // Unnamed patterns on single-field rules bind their first group
    if bindings.is_empty() && fields.len() == 1 && regex.captures_len() > 1 {
        bindings.push((0, 1));
    }

    if bindings.is_empty() {
        return Err(RegistryError::UnboundPattern {
            rule: rule.to_string(),
            pattern: pattern.to_string(),
        });
    }

    Ok(CompiledPattern {
        source: pattern.to_string(),
        regex,
        bindings,
    })
}
