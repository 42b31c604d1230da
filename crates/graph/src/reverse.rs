use crate::ordered::IdMap;
use crate::table::DerefTable;
use crate::types::NodeStub;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Incoming edges of one node, grouped by relation field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReverseEntry {
    #[serde(flatten)]
    pub node: NodeStub,

    /// field -> nodes whose `field` references this node, in document order
    #[serde(flatten)]
    pub referrers: BTreeMap<String, Vec<NodeStub>>,
}

impl ReverseEntry {
    pub fn referrers(&self, field: &str) -> &[NodeStub] {
        self.referrers.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Transpose of the forward relation graph.
///
/// Derived data only: it holds stubs, never node content, and is rebuilt
/// from a dereferenced table whenever the forward graph changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReverseIndex {
    entries: IdMap<ReverseEntry>,
}

impl ReverseIndex {
    pub fn build(table: &DerefTable) -> Self {
        let mut entries: IdMap<ReverseEntry> = table
            .nodes()
            .map(|node| {
                let entry = ReverseEntry {
                    node: node.stub(),
                    referrers: BTreeMap::new(),
                };
                (node.id.clone(), entry)
            })
            .collect();

        for source in table.nodes() {
            for (field, targets) in &source.relations {
                for target in targets.iter().flatten() {
                    let Some(entry) = entries.get_mut(&target.id) else {
                        continue;
                    };
                    let referrers = entry.referrers.entry(field.clone()).or_default();
                    if !referrers.iter().any(|stub| stub.id == source.id) {
                        referrers.push(source.stub());
                    }
                }
            }
        }

        Self { entries }
    }

    pub fn entry(&self, id: &str) -> Option<&ReverseEntry> {
        self.entries.get(id)
    }

    /// Nodes referencing `id` through `field`; empty when there are none
    pub fn referrers(&self, id: &str, field: &str) -> &[NodeStub] {
        self.entries
            .get(id)
            .map(|entry| entry.referrers(field))
            .unwrap_or(&[])
    }

    /// Follow the first referrer along `field` until the chain ends.
    ///
    /// Returns identifiers nearest first. A chain that loops back onto a
    /// node already seen (the start included) is truncated there.
    pub fn ancestor_ids(&self, id: &str, field: &str) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::from([id]);
        let mut chain = Vec::new();
        let mut current = id;

        while let Some(parent) = self.referrers(current, field).first() {
            if !visited.insert(parent.id.as_str()) {
                log::debug!("Ancestor chain of {id} via '{field}' loops at {}", parent.id);
                break;
            }
            chain.push(parent.id.clone());
            current = parent.id.as_str();
        }

        chain
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ReverseEntry> {
        self.entries.values()
    }
}
