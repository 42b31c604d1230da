use crate::error::{Result, SearchError};
use crate::fuzzy::FuzzySearch;
use atlas_graph::{composed_string, AtlasGraph, Typed, ANNOTATION_FIELD, GROUP_TYPE, STRUCTURE_TYPE};
use serde::Serialize;

/// One searchable node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchEntry {
    #[serde(rename = "@id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(rename = "@id")]
    pub id: String,
    pub name: String,
    pub score: f32,
}

/// Name index over the structure and group nodes of an atlas graph
pub struct NameIndex {
    entries: Vec<SearchEntry>,
    fuzzy: FuzzySearch,
}

impl NameIndex {
    /// Index every `Structure`/`Group` node by its composed annotation name.
    /// Nodes without a name are left out.
    pub fn build(graph: &AtlasGraph) -> Self {
        let entries: Vec<SearchEntry> = graph
            .nodes()
            .filter(|node| node.has_type(&[STRUCTURE_TYPE, GROUP_TYPE]))
            .filter_map(|node| {
                composed_string(node, ANNOTATION_FIELD, "name").map(|name| SearchEntry {
                    id: node.id.clone(),
                    name,
                })
            })
            .collect();

        log::debug!("Name index: {} entries", entries.len());
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<SearchEntry>) -> Self {
        Self {
            entries,
            fuzzy: FuzzySearch::new(),
        }
    }

    pub fn entries(&self) -> &[SearchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn search(&mut self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        log::debug!("Name search: query='{}', limit={}", query, limit);

        let hits = self
            .fuzzy
            .search(query, &self.entries, limit)
            .into_iter()
            .map(|(idx, score)| {
                let entry = &self.entries[idx];
                SearchHit {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    score,
                }
            })
            .collect();
        Ok(hits)
    }
}
