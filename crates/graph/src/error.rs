use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid @id: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid @type on node {node}: {found}")]
    InvalidType { node: String, found: String },

    /// Relation element that is neither an identifier nor an embedded node
    #[error("Invalid value in relation field '{field}' of node {node}: expected string or object, found {found}")]
    InvalidRelation {
        node: String,
        field: String,
        found: String,
    },

    #[error("Cycle detected at node {id} via field '{field}'")]
    Cycle { id: String, field: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GraphError {
    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    pub fn cycle(id: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Cycle {
            id: id.into(),
            field: field.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Short description of a JSON value's kind, used in error messages
pub(crate) fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
