//! # Atlas Graph
//!
//! Normalization engine for hierarchical atlas documents expressed as
//! JSON-LD style graphs (`@id`/`@type` nodes that reference each other).
//!
//! ## Features
//!
//! - **Flattening** - embedded objects become identifier-referenced nodes
//! - **Indexing & merging** - fold any number of documents into one table
//! - **Dereferencing** - one-level substitution of references by nodes
//! - **Reverse index** - incoming edges per relation field
//! - **Queries** - ancestor chains, field composition, subtree listing
//!
//! ## Architecture
//!
//! ```text
//! JSON document
//!     │
//!     ├──> Flattener (FieldCatalog decides which fields are relations)
//!     │      └─ Vec<Node>, relation fields hold identifiers
//!     │
//!     ├──> NodeTable (index in document order, last record wins)
//!     │      └─ merge: relations unioned, scalars right-biased
//!     │
//!     ├──> DerefTable (relation fields hold Arc<Node>)
//!     │
//!     ├──> ReverseIndex (id -> field -> referring stubs)
//!     │
//!     └──> Queries
//!            ├─ ancestors (first referrer, cycle-truncated)
//!            ├─ compose_field_values (annotation-like sub-nodes)
//!            └─ node_tree (post-order along a hierarchy field)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use atlas_graph::{compose_field_values, AtlasGraph, ComposeOptions, FieldCatalog};
//! use serde_json::json;
//!
//! let doc = json!({
//!     "@id": "n1",
//!     "annotation": [{"@type": "Annotation", "name": "Cerebellum"}]
//! });
//! let graph = AtlasGraph::from_document(&doc, FieldCatalog::atlas()).unwrap();
//!
//! let node = graph.node("n1").unwrap();
//! let composed = compose_field_values(node, "annotation", &ComposeOptions::default());
//! assert_eq!(composed["name"], "Cerebellum");
//! ```

mod atlas;
mod catalog;
mod error;
mod flatten;
mod graph;
mod ident;
mod ordered;
mod reverse;
mod table;
mod types;

pub use atlas::{AnnotationQuery, AtlasGraph};
pub use catalog::{
    FieldCatalog, RelationSpec, ANNOTATION_FIELD, MEMBER_FIELD, ROOT_FIELD, SOURCE_SELECTOR_FIELD,
};
pub use error::{GraphError, Result};
pub use flatten::{flatten_document, Flattener};
pub use graph::{compose_field_values, composed_string, node_has_type, node_tree, ComposeOptions};
pub use ident::new_node_id;
pub use reverse::{ReverseEntry, ReverseIndex};
pub use table::{merge_nodes, DerefTable, NodeTable};
pub use types::{
    DerefNode, Node, NodeStub, Typed, ANNOTATION_TYPE, GROUP_TYPE, HEADER_ID, ID_KEY,
    STRUCTURE_TYPE, TYPE_KEY,
};
