use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ROOT_FIELD: &str = "root";
pub const MEMBER_FIELD: &str = "member";
pub const ANNOTATION_FIELD: &str = "annotation";
pub const SOURCE_SELECTOR_FIELD: &str = "sourceSelector";

/// Catalog entry for one relation field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    /// Type stamped on an embedded object that carries no `@type`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_type: Option<String>,
}

impl RelationSpec {
    pub fn typed(default_type: impl Into<String>) -> Self {
        Self {
            default_type: Some(default_type.into()),
        }
    }
}

/// Which fields hold identifier-valued relations.
///
/// Relation-ness is decided by field name alone, independent of node type.
/// Every stage that needs to tell relations from scalars asks the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCatalog {
    #[serde(default)]
    relations: BTreeMap<String, RelationSpec>,
}

impl FieldCatalog {
    /// Catalog with no relation fields at all
    pub fn empty() -> Self {
        Self {
            relations: BTreeMap::new(),
        }
    }

    /// Relation fields used by anatomical atlas documents
    pub fn atlas() -> Self {
        Self::empty()
            .with_relation(ROOT_FIELD, None)
            .with_relation(MEMBER_FIELD, None)
            .with_relation(SOURCE_SELECTOR_FIELD, Some("Selector"))
            .with_relation("baseURL", Some("BaseURL"))
            .with_relation("backgroundImage", Some("DataSource"))
            .with_relation("dataSource", Some("DataSource"))
            .with_relation(ANNOTATION_FIELD, Some("Annotation"))
            .with_relation("renderOption", Some("Style"))
    }

    pub fn with_relation(mut self, name: impl Into<String>, default_type: Option<&str>) -> Self {
        self.insert(
            name,
            RelationSpec {
                default_type: default_type.map(str::to_string),
            },
        );
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: RelationSpec) {
        self.relations.insert(name.into(), spec);
    }

    /// Add or replace entries; later entries win
    pub fn overlay(&mut self, entries: impl IntoIterator<Item = (String, RelationSpec)>) {
        self.relations.extend(entries);
    }

    pub fn is_relation(&self, field: &str) -> bool {
        self.relations.contains_key(field)
    }

    pub fn default_type(&self, field: &str) -> Option<&str> {
        self.relations
            .get(field)
            .and_then(|spec| spec.default_type.as_deref())
    }

    pub fn relation_fields(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Parse `[relations.<field>]` tables and lay them over the atlas defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let parsed: FieldCatalog =
            toml::from_str(source).map_err(|e| GraphError::config(e.to_string()))?;
        let mut catalog = Self::atlas();
        catalog.overlay(parsed.relations);
        Ok(catalog)
    }
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::atlas()
    }
}
