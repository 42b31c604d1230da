use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const ID_KEY: &str = "@id";
pub const TYPE_KEY: &str = "@type";

/// Identifier of the node that points at the traversal entry point
pub const HEADER_ID: &str = "#__header__";

/// Terminal node type; subtree traversal never descends into it
pub const STRUCTURE_TYPE: &str = "Structure";
pub const GROUP_TYPE: &str = "Group";
pub const ANNOTATION_TYPE: &str = "Annotation";

/// Anything carrying an identifier and type labels
pub trait Typed {
    fn id(&self) -> &str;
    fn types(&self) -> &[String];

    /// True when any of the node's types is among `wanted`
    fn has_type(&self, wanted: &[&str]) -> bool {
        self.types().iter().any(|t| wanted.contains(&t.as_str()))
    }
}

/// Node in flat form: relation fields hold identifiers only
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub id: String,

    /// Type labels, always a sequence
    pub types: Vec<String>,

    /// Scalar (non-relation) fields, copied verbatim from the document
    pub fields: BTreeMap<String, Value>,

    /// Relation fields: ordered, duplicate-free identifier lists
    pub relations: BTreeMap<String, Vec<String>>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.types.push(node_type.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn with_relation<I, S>(mut self, name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations
            .insert(name.into(), targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn relation(&self, name: &str) -> Option<&[String]> {
        self.relations.get(name).map(Vec::as_slice)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.relations.contains_key(name)
    }

    pub fn stub(&self) -> NodeStub {
        NodeStub {
            id: self.id.clone(),
            types: self.types.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut object = header_object(&self.id, &self.types);
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.clone());
        }
        for (name, targets) in &self.relations {
            let ids = targets.iter().cloned().map(Value::String).collect();
            object.insert(name.clone(), Value::Array(ids));
        }
        Value::Object(object)
    }
}

impl Typed for Node {
    fn id(&self) -> &str {
        &self.id
    }

    fn types(&self) -> &[String] {
        &self.types
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Node in dereferenced form: relation fields hold the referenced flat nodes.
///
/// Substitution is one level deep; the referenced nodes still carry
/// identifiers in their own relation fields. `None` marks a dangling
/// reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerefNode {
    pub id: String,
    pub types: Vec<String>,
    pub fields: BTreeMap<String, Value>,
    pub relations: BTreeMap<String, Vec<Option<Arc<Node>>>>,
}

impl DerefNode {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn relation(&self, name: &str) -> Option<&[Option<Arc<Node>>]> {
        self.relations.get(name).map(Vec::as_slice)
    }

    /// Resolved targets of a relation field, skipping dangling references
    pub fn targets<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Node> + 'a {
        self.relations
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|target| target.as_deref())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.relations.contains_key(name)
    }

    pub fn stub(&self) -> NodeStub {
        NodeStub {
            id: self.id.clone(),
            types: self.types.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut object = header_object(&self.id, &self.types);
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.clone());
        }
        for (name, targets) in &self.relations {
            let embedded = targets
                .iter()
                .map(|target| target.as_ref().map_or(Value::Null, |node| node.to_json()))
                .collect();
            object.insert(name.clone(), Value::Array(embedded));
        }
        Value::Object(object)
    }
}

impl Typed for DerefNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn types(&self) -> &[String] {
        &self.types
    }
}

impl Serialize for DerefNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Lightweight node reference kept in the reverse index
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodeStub {
    pub id: String,
    pub types: Vec<String>,
}

impl Typed for NodeStub {
    fn id(&self) -> &str {
        &self.id
    }

    fn types(&self) -> &[String] {
        &self.types
    }
}

impl Serialize for NodeStub {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.types.is_empty() { 1 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(ID_KEY, &self.id)?;
        if !self.types.is_empty() {
            map.serialize_entry(TYPE_KEY, &self.types)?;
        }
        map.end()
    }
}

fn header_object(id: &str, types: &[String]) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert(ID_KEY.to_string(), Value::String(id.to_string()));
    if !types.is_empty() {
        let labels = types.iter().cloned().map(Value::String).collect();
        object.insert(TYPE_KEY.to_string(), Value::Array(labels));
    }
    object
}
