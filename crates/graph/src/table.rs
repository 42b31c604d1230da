use crate::ordered::IdMap;
use crate::types::{DerefNode, Node};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Identifier -> flat node mapping, in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTable {
    nodes: IdMap<Node>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a flat node sequence; a repeated identifier keeps the later record
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut table = Self::new();
        for node in nodes {
            if let Some(previous) = table.insert(node) {
                log::debug!("Identifier collision on {}: later record wins", previous.id);
            }
        }
        table
    }

    /// Insert a node, returning the record it replaced.
    /// A replaced record keeps its original position.
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.id.clone(), node)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Total number of relation references across all nodes
    pub fn edge_count(&self) -> usize {
        self.nodes
            .values()
            .flat_map(|node| node.relations.values())
            .map(Vec::len)
            .sum()
    }

    /// Combine with `incoming` into a new table.
    ///
    /// Relation fields are unioned (base entries first, duplicates dropped);
    /// scalar fields and types take the incoming value when both define them.
    /// Identifiers new to `self` are appended after its own, in incoming order.
    pub fn merge(&self, incoming: &NodeTable) -> NodeTable {
        let mut nodes = self.nodes.clone();
        for (id, node) in incoming.nodes.iter() {
            let merged = match nodes.get(id) {
                Some(base) => merge_nodes(base, node),
                None => node.clone(),
            };
            nodes.insert(id.to_string(), merged);
        }
        NodeTable { nodes }
    }

    /// Replace identifier references with the referenced nodes, one level deep
    pub fn dereference(&self) -> DerefTable {
        let shared: HashMap<&str, Arc<Node>> = self
            .nodes
            .iter()
            .map(|(id, node)| (id, Arc::new(node.clone())))
            .collect();

        let nodes = self
            .nodes
            .iter()
            .map(|(id, node)| {
                let relations = node
                    .relations
                    .iter()
                    .map(|(field, targets)| {
                        let resolved = targets
                            .iter()
                            .map(|target| {
                                let found = shared.get(target.as_str()).cloned();
                                if found.is_none() {
                                    log::debug!("Dangling reference {id} -[{field}]-> {target}");
                                }
                                found
                            })
                            .collect();
                        (field.clone(), resolved)
                    })
                    .collect();

                let deref = DerefNode {
                    id: id.to_string(),
                    types: node.types.clone(),
                    fields: node.fields.clone(),
                    relations,
                };
                (id.to_string(), deref)
            })
            .collect();

        DerefTable { nodes }
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.nodes.values().map(Node::to_json).collect())
    }
}

impl FromIterator<Node> for NodeTable {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self::from_nodes(iter)
    }
}

/// Merge two records for the same identifier
pub fn merge_nodes(base: &Node, incoming: &Node) -> Node {
    let mut merged = base.clone();
    if !incoming.types.is_empty() {
        merged.types = incoming.types.clone();
    }
    for (name, value) in &incoming.fields {
        merged.relations.remove(name);
        merged.fields.insert(name.clone(), value.clone());
    }
    for (name, targets) in &incoming.relations {
        merged.fields.remove(name);
        let union = merged.relations.entry(name.clone()).or_default();
        for target in targets {
            if !union.contains(target) {
                union.push(target.clone());
            }
        }
    }
    merged
}

/// Identifier -> dereferenced node mapping, same order as its source table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerefTable {
    nodes: IdMap<DerefNode>,
}

impl DerefTable {
    pub fn get(&self, id: &str) -> Option<&DerefNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DerefNode> {
        self.nodes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn later_record_wins_on_collision() {
        let table = NodeTable::from_nodes([
            Node::new("n1").with_field("name", json!("first")),
            Node::new("n1").with_field("name", json!("second")),
        ]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("n1").unwrap().field("name"), Some(&json!("second")));
    }

    #[test]
    fn merge_unions_relations_base_first() {
        let base = NodeTable::from_nodes([Node::new("n1").with_relation("member", ["n2"])]);
        let incoming = NodeTable::from_nodes([Node::new("n1").with_relation("member", ["n3"])]);

        let merged = base.merge(&incoming);

        assert_eq!(
            merged.get("n1").unwrap().relation("member").unwrap(),
            ["n2".to_string(), "n3".to_string()]
        );
    }

    #[test]
    fn merge_prefers_incoming_scalars_and_keeps_the_rest() {
        let base = NodeTable::from_nodes([
            Node::new("n1")
                .with_type("Group")
                .with_field("name", json!("old"))
                .with_field("color", json!("red"))
                .with_relation("member", ["a", "b"]),
            Node::new("only-base"),
        ]);
        let incoming = NodeTable::from_nodes([
            Node::new("n1")
                .with_field("name", json!("new"))
                .with_relation("member", ["b", "c"]),
            Node::new("only-incoming"),
        ]);

        let merged = base.merge(&incoming);
        let n1 = merged.get("n1").unwrap();

        assert_eq!(merged.len(), 3);
        assert_eq!(n1.types, vec!["Group".to_string()]);
        assert_eq!(n1.field("name"), Some(&json!("new")));
        assert_eq!(n1.field("color"), Some(&json!("red")));
        assert_eq!(
            n1.relation("member").unwrap(),
            ["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn merge_leaves_inputs_untouched() {
        let base = NodeTable::from_nodes([Node::new("n1").with_relation("member", ["n2"])]);
        let incoming = NodeTable::from_nodes([Node::new("n1").with_relation("member", ["n3"])]);
        let base_before = base.clone();
        let incoming_before = incoming.clone();

        let _ = base.merge(&incoming);

        assert_eq!(base, base_before);
        assert_eq!(incoming, incoming_before);
    }

    #[test]
    fn dereference_substitutes_one_level() {
        let table = NodeTable::from_nodes([
            Node::new("a").with_relation("member", ["b"]),
            Node::new("b").with_relation("member", ["c"]),
            Node::new("c"),
        ]);

        let deref = table.dereference();
        let a = deref.get("a").unwrap();
        let b = a.targets("member").next().unwrap();

        assert_eq!(b.id, "b");
        // the substituted node still refers to its own members by identifier
        assert_eq!(b.relation("member").unwrap(), ["c".to_string()]);
        assert_eq!(deref.len(), 3);
    }

    #[test]
    fn dangling_reference_resolves_to_none() {
        let table = NodeTable::from_nodes([
            Node::new("a").with_relation("member", ["b", "ghost"]),
            Node::new("b"),
        ]);
        let deref = table.dereference();

        let members = deref.get("a").unwrap().relation("member").unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].as_ref().map(|n| n.id.as_str()), Some("b"));
        assert!(members[1].is_none());
        assert_eq!(deref.get("a").unwrap().targets("member").count(), 1);
    }

    #[test]
    fn table_keeps_document_order() {
        let table = NodeTable::from_nodes([
            Node::new("zeta"),
            Node::new("alpha"),
            Node::new("mid"),
            Node::new("zeta").with_field("name", json!("again")),
        ]);
        assert_eq!(table.ids().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);

        let merged = table.merge(&NodeTable::from_nodes([Node::new("beta"), Node::new("alpha")]));
        assert_eq!(
            merged.ids().collect::<Vec<_>>(),
            vec!["zeta", "alpha", "mid", "beta"]
        );
        assert_eq!(
            merged.dereference().ids().collect::<Vec<_>>(),
            vec!["zeta", "alpha", "mid", "beta"]
        );
        assert_eq!(
            merged.to_json()[0],
            json!({"@id": "zeta", "name": "again"})
        );
    }

    #[test]
    fn edge_count_sums_relation_entries() {
        let table = NodeTable::from_nodes([
            Node::new("a").with_relation("member", ["b", "c"]),
            Node::new("b").with_relation("annotation", ["x"]),
        ]);
        assert_eq!(table.edge_count(), 3);
    }
}
