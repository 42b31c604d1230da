use crate::catalog::{FieldCatalog, ANNOTATION_FIELD, ROOT_FIELD};
use crate::error::{GraphError, Result};
use crate::flatten::Flattener;
use crate::graph;
use crate::ident::new_node_id;
use crate::reverse::{ReverseEntry, ReverseIndex};
use crate::table::{DerefTable, NodeTable};
use crate::types::{DerefNode, Node, NodeStub, Typed, ANNOTATION_TYPE, HEADER_ID, ID_KEY, TYPE_KEY};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// Accumulated atlas graph.
///
/// Holds the merged flat table as the authoritative store and keeps the
/// dereferenced view, reverse index and type index in step with it.
#[derive(Debug, Clone, Default)]
pub struct AtlasGraph {
    catalog: FieldCatalog,
    id_table: NodeTable,
    node_table: DerefTable,
    reverse: ReverseIndex,
    type_index: BTreeMap<String, Vec<String>>,
}

/// Selection for [`AtlasGraph::nodes_with_annotation`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationQuery {
    /// Restrict results to nodes carrying one of these types (empty: any)
    pub node_types: Vec<String>,
    pub annotation_type: String,
    pub field: String,
}

impl Default for AnnotationQuery {
    fn default() -> Self {
        Self {
            node_types: Vec::new(),
            annotation_type: ANNOTATION_TYPE.to_string(),
            field: ANNOTATION_FIELD.to_string(),
        }
    }
}

impl AtlasGraph {
    pub fn new(catalog: FieldCatalog) -> Self {
        Self {
            catalog,
            ..Default::default()
        }
    }

    pub fn from_document(doc: &Value, catalog: FieldCatalog) -> Result<Self> {
        let mut graph = Self::new(catalog);
        graph.parse(doc)?;
        Ok(graph)
    }

    /// Flatten, index and fold `doc` into the accumulated graph
    pub fn parse(&mut self, doc: &Value) -> Result<()> {
        let flat = Flattener::new(&self.catalog).flatten_document(doc)?;
        self.merge_table(&NodeTable::from_nodes(flat));
        Ok(())
    }

    pub fn merge_table(&mut self, table: &NodeTable) {
        self.id_table = self.id_table.merge(table);
        self.rebuild();
    }

    /// Create an otherwise empty node with the given types and return its id
    pub fn insert_node<I, S>(&mut self, types: I, id: Option<String>) -> String
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.unwrap_or_else(new_node_id);
        let mut node = Node::new(id.clone());
        node.types = types.into_iter().map(Into::into).collect();
        self.merge_table(&NodeTable::from_nodes([node]));
        id
    }

    fn rebuild(&mut self) {
        self.node_table = self.id_table.dereference();
        self.reverse = ReverseIndex::build(&self.node_table);

        self.type_index.clear();
        for node in self.node_table.nodes() {
            for node_type in &node.types {
                self.type_index
                    .entry(node_type.clone())
                    .or_default()
                    .push(node.id.clone());
            }
        }

        log::info!(
            "Atlas graph: {} nodes, {} relation edges",
            self.id_table.len(),
            self.id_table.edge_count()
        );
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn flat_table(&self) -> &NodeTable {
        &self.id_table
    }

    pub fn node_table(&self) -> &DerefTable {
        &self.node_table
    }

    pub fn reverse_index(&self) -> &ReverseIndex {
        &self.reverse
    }

    pub fn node(&self, id: &str) -> Option<&DerefNode> {
        self.node_table.get(id)
    }

    pub fn nodes_by_id<'a, I>(&self, ids: I) -> Vec<Option<&DerefNode>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter().map(|id| self.node(id)).collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DerefNode> {
        self.node_table.nodes()
    }

    pub fn len(&self) -> usize {
        self.node_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_table.is_empty()
    }

    pub fn header(&self) -> Option<&DerefNode> {
        self.node(HEADER_ID)
    }

    /// Entry points of the main hierarchy, as named by the header's `root`
    pub fn header_roots(&self) -> Vec<&DerefNode> {
        self.header()
            .map(|header| {
                header
                    .targets(ROOT_FIELD)
                    .filter_map(|root| self.node(&root.id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn reverse_entry(&self, id: &str) -> Option<&ReverseEntry> {
        self.reverse.entry(id)
    }

    /// Nodes referencing `id` through `field`
    pub fn parents(&self, id: &str, field: &str) -> &[NodeStub] {
        self.reverse.referrers(id, field)
    }

    /// First node referencing `id` through `field`
    pub fn parent(&self, id: &str, field: &str) -> Option<&DerefNode> {
        self.parents(id, field)
            .first()
            .and_then(|stub| self.node(&stub.id))
    }

    /// Ancestor chain of `id` along `field`, nearest first
    pub fn ancestors(&self, id: &str, field: &str) -> Vec<&DerefNode> {
        self.reverse
            .ancestor_ids(id, field)
            .iter()
            .filter_map(|ancestor| self.node(ancestor))
            .collect()
    }

    pub fn nodes_of_type(&self, node_type: &str) -> Vec<&DerefNode> {
        self.type_index
            .get(node_type)
            .into_iter()
            .flatten()
            .filter_map(|id| self.node(id))
            .collect()
    }

    /// Nodes annotated by an annotation node that passes `filter`
    pub fn nodes_with_annotation<F>(&self, query: &AnnotationQuery, filter: F) -> Vec<&DerefNode>
    where
        F: Fn(&DerefNode) -> bool,
    {
        let node_types: Vec<&str> = query.node_types.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let mut subjects = Vec::new();

        for annotation in self.nodes_of_type(&query.annotation_type) {
            if !filter(annotation) {
                continue;
            }
            for stub in self.parents(&annotation.id, &query.field) {
                if !node_types.is_empty() && !stub.has_type(&node_types) {
                    continue;
                }
                if !seen.insert(stub.id.as_str()) {
                    continue;
                }
                if let Some(subject) = self.node(&stub.id) {
                    subjects.push(subject);
                }
            }
        }
        subjects
    }

    /// Post-order subtree listing below `roots`; see [`graph::node_tree`]
    pub fn node_tree<'a>(
        &'a self,
        roots: impl IntoIterator<Item = &'a DerefNode>,
        field: &str,
    ) -> Result<Vec<&'a DerefNode>> {
        graph::node_tree(&self.node_table, roots, field)
    }

    /// Node `id` with every relation target inlined recursively
    pub fn embedded(&self, id: &str) -> Result<Value> {
        let node = self
            .id_table
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        let mut path = HashSet::new();
        self.embed(node, &mut path)
    }

    fn embed<'a>(&'a self, node: &'a Node, path: &mut HashSet<&'a str>) -> Result<Value> {
        path.insert(node.id.as_str());

        let mut object = Map::new();
        object.insert(ID_KEY.to_string(), Value::String(node.id.clone()));
        if !node.types.is_empty() {
            let labels = node.types.iter().cloned().map(Value::String).collect();
            object.insert(TYPE_KEY.to_string(), Value::Array(labels));
        }
        for (name, value) in &node.fields {
            object.insert(name.clone(), value.clone());
        }
        for (name, targets) in &node.relations {
            let mut inlined = Vec::with_capacity(targets.len());
            for target in targets {
                if path.contains(target.as_str()) {
                    return Err(GraphError::cycle(target.as_str(), name.as_str()));
                }
                match self.id_table.get(target) {
                    Some(child) => inlined.push(self.embed(child, path)?),
                    None => inlined.push(Value::Null),
                }
            }
            object.insert(name.clone(), Value::Array(inlined));
        }

        path.remove(node.id.as_str());
        Ok(Value::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> AtlasGraph {
        let doc = json!([
            {"@id": "#__header__", "root": ["brain"]},
            {
                "@id": "brain",
                "@type": "Group",
                "annotation": {"name": "Brain"},
                "member": [
                    {
                        "@id": "cb",
                        "@type": "Structure",
                        "annotation": {"name": "Cerebellum"},
                        "sourceSelector": {"dataKey": 12}
                    },
                    {
                        "@id": "stem",
                        "@type": "Group",
                        "annotation": {"name": "Brainstem"},
                        "member": [
                            {"@id": "pons", "@type": "Structure", "annotation": {"name": "Pons"}}
                        ]
                    }
                ]
            }
        ]);
        AtlasGraph::from_document(&doc, FieldCatalog::atlas()).unwrap()
    }

    fn ids(nodes: &[&DerefNode]) -> Vec<String> {
        nodes.iter().map(|n| n.id.clone()).collect()
    }

    #[test]
    fn header_roots_resolve_to_nodes() {
        let graph = sample();
        assert_eq!(ids(&graph.header_roots()), vec!["brain"]);
    }

    #[test]
    fn tree_from_header_is_post_order() {
        let graph = sample();
        let tree = graph.node_tree(graph.header_roots(), "member").unwrap();
        assert_eq!(ids(&tree), vec!["cb", "pons", "stem", "brain"]);
    }

    #[test]
    fn parent_and_ancestors_follow_member() {
        let graph = sample();

        assert_eq!(graph.parent("pons", "member").unwrap().id, "stem");
        assert_eq!(ids(&graph.ancestors("pons", "member")), vec!["stem", "brain"]);
        assert!(graph.parent("brain", "member").is_none());
        assert_eq!(graph.parents("brain", "root")[0].id, HEADER_ID);
    }

    #[test]
    fn parent_is_first_referrer_in_document_order() {
        let graph = AtlasGraph::from_document(
            &json!([
                {"@id": "#__header__", "root": ["zeta"]},
                {"@id": "zeta", "@type": "Group", "member": ["leaf"]},
                {"@id": "alpha", "@type": "Group", "member": ["leaf"]},
                {"@id": "leaf", "@type": "Structure"}
            ]),
            FieldCatalog::atlas(),
        )
        .unwrap();

        assert_eq!(graph.parent("leaf", "member").unwrap().id, "zeta");
        assert_eq!(ids(&graph.ancestors("leaf", "member")), vec!["zeta"]);
        assert_eq!(ids(&graph.nodes_of_type("Group")), vec!["zeta", "alpha"]);
    }

    #[test]
    fn type_index_lists_embedded_annotations() {
        let graph = sample();
        assert_eq!(graph.nodes_of_type("Annotation").len(), 4);
        assert_eq!(graph.nodes_of_type("Selector").len(), 1);
        assert!(graph.nodes_of_type("Missing").is_empty());
    }

    #[test]
    fn nodes_with_annotation_filters_subjects() {
        let graph = sample();
        let query = AnnotationQuery {
            node_types: vec!["Structure".to_string()],
            ..Default::default()
        };

        let named_pons = graph.nodes_with_annotation(&query, |a| {
            a.field("name") == Some(&json!("Pons"))
        });
        assert_eq!(ids(&named_pons), vec!["pons"]);

        let structures = graph.nodes_with_annotation(&query, |_| true);
        let mut found = ids(&structures);
        found.sort();
        assert_eq!(found, vec!["cb", "pons"]);
    }

    #[test]
    fn parsing_twice_accumulates() {
        let mut graph = sample();
        graph
            .parse(&json!({"@id": "stem", "member": [{"@id": "medulla", "@type": "Structure"}]}))
            .unwrap();

        let stem = graph.flat_table().get("stem").unwrap();
        assert_eq!(
            stem.relation("member").unwrap(),
            ["pons".to_string(), "medulla".to_string()]
        );
        assert_eq!(graph.parent("medulla", "member").unwrap().id, "stem");
        // types from the first document survive a second, untyped record
        assert_eq!(stem.types, vec!["Group".to_string()]);
    }

    #[test]
    fn insert_node_registers_types() {
        let mut graph = sample();
        let id = graph.insert_node(["Style"], None);

        assert!(id.starts_with("_:b"));
        assert_eq!(ids(&graph.nodes_of_type("Style")), vec![id.clone()]);
        assert!(graph.reverse_entry(&id).is_some());

        let named = graph.insert_node(["Group"], Some("extra".to_string()));
        assert_eq!(named, "extra");
        assert!(graph.node("extra").is_some());
    }

    #[test]
    fn nodes_by_id_keeps_positions() {
        let graph = sample();
        let found = graph.nodes_by_id(["cb", "nope", "pons"]);
        assert_eq!(found.len(), 3);
        assert!(found[1].is_none());
        assert_eq!(found[2].map(|n| n.id.as_str()), Some("pons"));
    }

    #[test]
    fn embedded_inlines_recursively() {
        let graph = sample();
        let stem = graph.embedded("stem").unwrap();

        assert_eq!(stem["member"][0]["@id"], json!("pons"));
        assert_eq!(stem["member"][0]["annotation"][0]["name"], json!("Pons"));
        assert_eq!(stem["member"][0]["annotation"][0]["@type"], json!(["Annotation"]));
    }

    #[test]
    fn embedded_reports_cycles_and_missing_nodes() {
        let graph = AtlasGraph::from_document(
            &json!([
                {"@id": "a", "member": ["b", "ghost"]},
                {"@id": "b", "member": ["a"]}
            ]),
            FieldCatalog::atlas(),
        )
        .unwrap();

        assert!(matches!(graph.embedded("a"), Err(GraphError::Cycle { .. })));
        assert!(matches!(graph.embedded("zzz"), Err(GraphError::NodeNotFound(_))));
    }
}
