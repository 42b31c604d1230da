use crate::error::{GraphError, Result};
use crate::table::DerefTable;
use crate::types::{DerefNode, Typed, STRUCTURE_TYPE};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Filters for [`compose_field_values`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Only sub-nodes carrying one of these types contribute
    pub modifier_types: Option<Vec<String>>,

    /// Only these keys are copied
    pub subfields: Option<Vec<String>>,
}

impl ComposeOptions {
    pub fn modifier_type(mut self, modifier_type: impl Into<String>) -> Self {
        self.modifier_types
            .get_or_insert_with(Vec::new)
            .push(modifier_type.into());
        self
    }

    pub fn subfields<I, S>(mut self, subfields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subfields = Some(subfields.into_iter().map(Into::into).collect());
        self
    }

    fn accepts_type(&self, node: &impl Typed) -> bool {
        match &self.modifier_types {
            None => true,
            Some(wanted) => node.types().iter().any(|t| wanted.contains(t)),
        }
    }

    fn accepts_key(&self, key: &str) -> bool {
        !key.starts_with('@')
            && self
                .subfields
                .as_ref()
                .map_or(true, |keys| keys.iter().any(|k| k == key))
    }
}

/// Fold the non-reserved fields of `node[field]` sub-nodes into one mapping.
///
/// Sub-nodes are visited in sequence order, so a key defined by several of
/// them takes the last one's value. A missing field composes to an empty map.
pub fn compose_field_values(
    node: &DerefNode,
    field: &str,
    options: &ComposeOptions,
) -> Map<String, Value> {
    let mut composed = Map::new();
    for sub in node.targets(field) {
        if !options.accepts_type(sub) {
            continue;
        }
        for (key, value) in &sub.fields {
            if options.accepts_key(key) {
                composed.insert(key.clone(), value.clone());
            }
        }
        for (key, targets) in &sub.relations {
            if options.accepts_key(key) {
                let ids = targets.iter().cloned().map(Value::String).collect();
                composed.insert(key.clone(), Value::Array(ids));
            }
        }
    }
    composed
}

/// String value of one composed key, e.g. an annotation's `name`
pub fn composed_string(node: &DerefNode, field: &str, key: &str) -> Option<String> {
    compose_field_values(node, field, &ComposeOptions::default())
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// True when any of the node's types is among `types`
pub fn node_has_type(node: &impl Typed, types: &[&str]) -> bool {
    node.has_type(types)
}

/// Post-order listing of the hierarchy below `roots` along `field`.
///
/// Descendants precede the node that contains them. Nodes typed
/// `Structure`, or lacking `field`, are emitted as leaves. Re-entering a
/// node already on the current descent path is reported as a cycle.
pub fn node_tree<'a>(
    table: &'a DerefTable,
    roots: impl IntoIterator<Item = &'a DerefNode>,
    field: &str,
) -> Result<Vec<&'a DerefNode>> {
    let mut out = Vec::new();
    let mut path = HashSet::new();
    for root in roots {
        descend(table, root, field, &mut path, &mut out)?;
    }
    Ok(out)
}

fn descend<'a>(
    table: &'a DerefTable,
    node: &'a DerefNode,
    field: &str,
    path: &mut HashSet<&'a str>,
    out: &mut Vec<&'a DerefNode>,
) -> Result<()> {
    if node.has_type(&[STRUCTURE_TYPE]) || !node.has_field(field) {
        out.push(node);
        return Ok(());
    }
    if !path.insert(node.id.as_str()) {
        return Err(GraphError::cycle(node.id.as_str(), field));
    }

    for child in node.targets(field) {
        match table.get(&child.id) {
            Some(child) => descend(table, child, field, path, out)?,
            None => log::debug!("Skipping {} under {}: not in table", child.id, node.id),
        }
    }

    path.remove(node.id.as_str());
    out.push(node);
    Ok(())
}
