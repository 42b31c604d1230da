//! # Atlas Search
//!
//! In-memory name search over the structure and group nodes of an
//! [`atlas_graph::AtlasGraph`]. Each node is indexed under its composed
//! `annotation` name; queries are fuzzy per term with every term required.

mod error;
mod fuzzy;
mod index;

pub use error::{Result, SearchError};
pub use fuzzy::FuzzySearch;
pub use index::{NameIndex, SearchEntry, SearchHit};
