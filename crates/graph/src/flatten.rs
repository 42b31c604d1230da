use crate::catalog::FieldCatalog;
use crate::error::{value_kind, GraphError, Result};
use crate::ident::new_node_id;
use crate::types::{Node, ID_KEY, TYPE_KEY};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Converts nested documents into flat node records.
///
/// Embedded objects found in relation fields become nodes of their own and
/// are replaced in the parent by their identifier. Output is post-order: every
/// embedded node precedes the node that embedded it.
pub struct Flattener<'a> {
    catalog: &'a FieldCatalog,
}

impl<'a> Flattener<'a> {
    pub fn new(catalog: &'a FieldCatalog) -> Self {
        Self { catalog }
    }

    /// Flatten a single object or an array of objects
    pub fn flatten_document(&self, doc: &Value) -> Result<Vec<Node>> {
        match doc {
            Value::Array(items) => {
                let mut out = Vec::new();
                for (pos, item) in items.iter().enumerate() {
                    let object = item.as_object().ok_or_else(|| {
                        GraphError::invalid_document(format!(
                            "item {pos} is {}, expected object",
                            value_kind(item)
                        ))
                    })?;
                    self.flatten_top_level(object, &mut out)?;
                }
                Ok(out)
            }
            Value::Object(object) => self.flatten_node(object),
            other => Err(GraphError::invalid_document(format!(
                "top level is {}, expected object or array",
                value_kind(other)
            ))),
        }
    }

    pub fn flatten_node(&self, object: &Map<String, Value>) -> Result<Vec<Node>> {
        let mut out = Vec::new();
        self.flatten_top_level(object, &mut out)?;
        Ok(out)
    }

    fn flatten_top_level(&self, object: &Map<String, Value>, out: &mut Vec<Node>) -> Result<()> {
        let id = identifier_of(object)?.unwrap_or_else(new_node_id);
        let mut visiting = HashSet::from([id.clone()]);
        self.flatten_object(object, id, None, &mut visiting, out)
    }

    /// `visiting` holds the identifiers on the current embedding path
    fn flatten_object(
        &self,
        object: &Map<String, Value>,
        id: String,
        default_type: Option<&str>,
        visiting: &mut HashSet<String>,
        out: &mut Vec<Node>,
    ) -> Result<()> {
        let mut node = Node::new(id);
        node.types = match object.get(TYPE_KEY) {
            Some(value) => parse_types(&node.id, value)?,
            None => default_type.map(|t| vec![t.to_string()]).unwrap_or_default(),
        };

        for (name, value) in object {
            if name == ID_KEY || name == TYPE_KEY {
                continue;
            }
            if !self.catalog.is_relation(name) {
                node.fields.insert(name.clone(), value.clone());
                continue;
            }

            let mut targets: Vec<String> = Vec::new();
            for element in distinct_elements(value) {
                let target = match element {
                    Value::String(reference) => reference.clone(),
                    Value::Object(embedded) => {
                        let embedded_id = identifier_of(embedded)?.unwrap_or_else(new_node_id);
                        if !visiting.insert(embedded_id.clone()) {
                            return Err(GraphError::cycle(embedded_id, name.as_str()));
                        }
                        self.flatten_object(
                            embedded,
                            embedded_id.clone(),
                            self.catalog.default_type(name),
                            visiting,
                            out,
                        )?;
                        visiting.remove(&embedded_id);
                        embedded_id
                    }
                    other => {
                        return Err(GraphError::InvalidRelation {
                            node: node.id.clone(),
                            field: name.clone(),
                            found: value_kind(other).to_string(),
                        })
                    }
                };
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
            node.relations.insert(name.clone(), targets);
        }

        out.push(node);
        Ok(())
    }
}

/// Flatten `doc` against `catalog` in one call
pub fn flatten_document(doc: &Value, catalog: &FieldCatalog) -> Result<Vec<Node>> {
    Flattener::new(catalog).flatten_document(doc)
}

fn identifier_of(object: &Map<String, Value>) -> Result<Option<String>> {
    match object.get(ID_KEY) {
        None => Ok(None),
        Some(Value::String(id)) => Ok(Some(id.clone())),
        Some(other) => Err(GraphError::InvalidIdentifier(format!(
            "expected string, found {}",
            value_kind(other)
        ))),
    }
}

fn parse_types(node: &str, value: &Value) -> Result<Vec<String>> {
    let invalid = |found: &Value| GraphError::InvalidType {
        node: node.to_string(),
        found: value_kind(found).to_string(),
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(label) => Ok(vec![label.clone()]),
        Value::Array(labels) => labels
            .iter()
            .map(|label| label.as_str().map(str::to_string).ok_or_else(|| invalid(label)))
            .collect(),
        other => Err(invalid(other)),
    }
}

/// Coerce a relation value to a sequence, dropping deep-equal repeats
fn distinct_elements(value: &Value) -> Vec<&Value> {
    let elements: Vec<&Value> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    let mut distinct: Vec<&Value> = Vec::with_capacity(elements.len());
    for element in elements {
        if !distinct.contains(&element) {
            distinct.push(element);
        }
    }
    distinct
}
