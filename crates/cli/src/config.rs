use anyhow::{Context, Result};
use atlas_graph::{FieldCatalog, RelationSpec};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Contents of `atlas.toml`
///
/// ```toml
/// [relations.seeAlso]
/// default_type = "Reference"
///
/// [substitutions]
/// "medulla oblongata" = "myelencephalon"
/// "septum of telencephalon" = "-"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AtlasConfig {
    /// Relation fields added to (or overriding) the built-in catalog
    pub relations: BTreeMap<String, RelationSpec>,

    /// Atlas name -> terminology name used for lookup; `-` skips the lookup
    pub substitutions: BTreeMap<String, String>,
}

impl AtlasConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn catalog(&self) -> FieldCatalog {
        let mut catalog = FieldCatalog::atlas();
        catalog.overlay(self.relations.clone());
        catalog
    }
}
