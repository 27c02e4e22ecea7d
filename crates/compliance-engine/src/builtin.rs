//! Built-in pontoon registries, embedded at compile time

use std::sync::Arc;

use lazy_static::lazy_static;

use crate::error::RegistryError;
use crate::fields::FieldRegistry;
use crate::rules::RuleRegistry;

pub const FIELDS_TOML: &str = include_str!("../registry/fields.toml");
pub const RULES_TOML: &str = include_str!("../registry/rules.toml");

lazy_static! {
    static ref BUILTIN: Result<(Arc<FieldRegistry>, Arc<RuleRegistry>), RegistryError> = load();
}

fn load() -> Result<(Arc<FieldRegistry>, Arc<RuleRegistry>), RegistryError> {
    let fields = FieldRegistry::from_toml_str(FIELDS_TOML)?;
    let rules = RuleRegistry::from_toml_str(RULES_TOML, &fields)?;
    tracing::debug!(
        fields = fields.fields().count(),
        rules = rules.len(),
        "built-in registries compiled"
    );
    Ok((Arc::new(fields), Arc::new(rules)))
}

/// Compiled once per process and shared by every engine that uses them
pub fn registries() -> Result<(Arc<FieldRegistry>, Arc<RuleRegistry>), &'static RegistryError> {
    match &*BUILTIN {
        Ok((fields, rules)) => Ok((Arc::clone(fields), Arc::clone(rules))),
        Err(err) => Err(err),
    }
}
