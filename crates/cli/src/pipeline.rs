use anyhow::{Context, Result};
use atlas_graph::{
    compose_field_values, composed_string, AtlasGraph, ComposeOptions, FieldCatalog,
    ANNOTATION_FIELD, SOURCE_SELECTOR_FIELD,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Substitution value that leaves a name unmatched
pub const SKIP_MARKER: &str = "-";

/// Parse `paths` in order into one accumulated graph
pub fn load_graph(paths: &[PathBuf], catalog: FieldCatalog) -> Result<AtlasGraph> {
    let mut graph = AtlasGraph::new(catalog);
    for path in paths {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let doc: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        graph
            .parse(&doc)
            .with_context(|| format!("Failed to normalize {}", path.display()))?;
        log::debug!("Loaded {}", path.display());
    }
    Ok(graph)
}

/// One node of the header-rooted hierarchy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeRecord {
    pub id: String,
    pub types: Vec<String>,
    pub name: Option<String>,
    pub label: Option<Value>,
    pub parent: Option<String>,
}

/// Walk the hierarchy below the header roots along `field`, leaves first
pub fn tree_records(graph: &AtlasGraph, field: &str) -> Result<Vec<TreeRecord>> {
    let nodes = graph.node_tree(graph.header_roots(), field)?;
    let records = nodes
        .into_iter()
        .map(|node| TreeRecord {
            id: node.id.clone(),
            types: node.types.clone(),
            name: composed_string(node, ANNOTATION_FIELD, "name"),
            label: compose_field_values(node, SOURCE_SELECTOR_FIELD, &ComposeOptions::default())
                .get("dataKey")
                .cloned(),
            parent: graph
                .parent(&node.id, field)
                .and_then(|parent| composed_string(parent, ANNOTATION_FIELD, "name")),
        })
        .collect();
    Ok(records)
}

/// Best terminology entry for a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermMatch {
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub hierarchy: Option<String>,
}

/// Terminology service queried by normalized structure name
pub trait TermLookup {
    fn lookup(&self, name: &str) -> Option<TermMatch>;
}

/// Terminology entries loaded from a JSON array, matched by exact name
/// ignoring case and surrounding whitespace
#[derive(Debug, Clone, Default)]
pub struct TermTable {
    by_name: HashMap<String, TermMatch>,
}

impl TermTable {
    pub fn from_terms(terms: impl IntoIterator<Item = TermMatch>) -> Self {
        let by_name = terms
            .into_iter()
            .map(|term| (normalize(&term.name), term))
            .collect();
        Self { by_name }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let terms: Vec<TermMatch> = serde_json::from_str(raw)?;
        Ok(Self::from_terms(terms))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read terms {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("Invalid terms file {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl TermLookup for TermTable {
    fn lookup(&self, name: &str) -> Option<TermMatch> {
        self.by_name.get(&normalize(name)).cloned()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Drop the first `left `/`right ` qualifier, ignoring case
pub fn strip_laterality(name: &str) -> String {
    let once = strip_word(name, "left ");
    strip_word(&once, "right ")
}

fn strip_word(name: &str, word: &str) -> String {
    let lowered = name.to_ascii_lowercase();
    match lowered.find(word) {
        Some(start) => format!("{}{}", &name[..start], &name[start + word.len()..]),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub label: Option<Value>,
    pub parent: Option<String>,
    pub atlas_name: Option<String>,
    pub substitute: Option<String>,
    pub term_name: Option<String>,
    pub hierarchy: Option<String>,
    pub term_id: Option<String>,
}

/// Match each record's name against the terminology, sorted by label
pub fn match_records(
    records: &[TreeRecord],
    substitutions: &BTreeMap<String, String>,
    terms: &dyn TermLookup,
) -> Vec<MatchRecord> {
    let mut matches: Vec<MatchRecord> = records
        .iter()
        .map(|record| {
            let mut out = MatchRecord {
                label: record.label.clone(),
                parent: record.parent.clone(),
                atlas_name: record.name.clone(),
                substitute: None,
                term_name: None,
                hierarchy: None,
                term_id: None,
            };
            let Some(atlas_name) = record.name.as_deref() else {
                return out;
            };

            let mapped = substitutions
                .get(atlas_name)
                .map(String::as_str)
                .unwrap_or(atlas_name);
            if mapped != atlas_name {
                out.substitute = Some(mapped.to_string());
            }
            if mapped == SKIP_MARKER {
                return out;
            }

            match terms.lookup(&strip_laterality(mapped)) {
                Some(term) => {
                    out.term_name = Some(term.name);
                    out.hierarchy = term.hierarchy;
                    out.term_id = Some(term.id);
                }
                None => log::debug!("No terminology match for '{}'", mapped),
            }
            out
        })
        .collect();

    matches.sort_by(|a, b| compare_labels(a.label.as_ref(), b.label.as_ref()));
    matches
}

/// Numbers first in numeric order, then strings, then anything else
fn compare_labels(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(label: Option<&Value>) -> u8 {
        match label {
            Some(Value::Number(_)) => 0,
            Some(Value::String(_)) => 1,
            Some(_) => 2,
            None => 3,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: Option<&str>, label: Option<Value>) -> TreeRecord {
        TreeRecord {
            id: name.unwrap_or("anon").to_string(),
            types: vec!["Structure".to_string()],
            name: name.map(str::to_string),
            label,
            parent: Some("Brain".to_string()),
        }
    }

    fn terms() -> TermTable {
        TermTable::from_terms([
            TermMatch {
                name: "Hippocampus".to_string(),
                id: "A14.1.09.321".to_string(),
                hierarchy: Some("Brain > Telencephalon".to_string()),
            },
            TermMatch {
                name: "Mesencephalon".to_string(),
                id: "A14.1.03.005".to_string(),
                hierarchy: None,
            },
        ])
    }

    #[test]
    fn strips_first_laterality_qualifier() {
        assert_eq!(strip_laterality("left hippocampus"), "hippocampus");
        assert_eq!(strip_laterality("right lobe"), "lobe");
        assert_eq!(strip_laterality("pons"), "pons");
        assert_eq!(strip_laterality("Left pons"), "pons");
        assert_eq!(strip_laterality("RIGHT Lobe"), "Lobe");
        assert_eq!(strip_laterality("Upper left lobe"), "Upper lobe");
    }

    #[test]
    fn capitalised_laterality_still_matches_term() {
        let records = vec![record(Some("Left hippocampus"), Some(json!(1)))];
        let matches = match_records(&records, &BTreeMap::new(), &terms());
        assert_eq!(matches[0].term_id.as_deref(), Some("A14.1.09.321"));
        assert_eq!(matches[0].atlas_name.as_deref(), Some("Left hippocampus"));
    }

    #[test]
    fn term_table_ignores_case() {
        let table = terms();
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("  hippocampus ").unwrap().id, "A14.1.09.321");
        assert!(table.lookup("cortex").is_none());
    }

    #[test]
    fn matches_use_substitutions_and_sort_by_label() {
        let records = vec![
            record(Some("midbrain"), Some(json!(20))),
            record(Some("left hippocampus"), Some(json!(3))),
            record(Some("mystery"), None),
            record(Some("septum"), Some(json!(7))),
            record(None, Some(json!("x"))),
        ];
        let substitutions = BTreeMap::from([
            ("midbrain".to_string(), "mesencephalon".to_string()),
            ("septum".to_string(), SKIP_MARKER.to_string()),
        ]);

        let matches = match_records(&records, &substitutions, &terms());
        let labels: Vec<Option<Value>> = matches.iter().map(|m| m.label.clone()).collect();
        assert_eq!(
            labels,
            vec![Some(json!(3)), Some(json!(7)), Some(json!(20)), Some(json!("x")), None]
        );

        let hippocampus = &matches[0];
        assert_eq!(hippocampus.term_name.as_deref(), Some("Hippocampus"));
        assert_eq!(hippocampus.substitute, None);
        assert_eq!(hippocampus.hierarchy.as_deref(), Some("Brain > Telencephalon"));

        let septum = &matches[1];
        assert_eq!(septum.substitute.as_deref(), Some(SKIP_MARKER));
        assert_eq!(septum.term_id, None);

        let midbrain = &matches[2];
        assert_eq!(midbrain.substitute.as_deref(), Some("mesencephalon"));
        assert_eq!(midbrain.term_id.as_deref(), Some("A14.1.03.005"));

        let unnamed = &matches[3];
        assert_eq!(unnamed.atlas_name, None);
        assert_eq!(unnamed.term_name, None);

        let mystery = &matches[4];
        assert_eq!(mystery.atlas_name.as_deref(), Some("mystery"));
        assert_eq!(mystery.term_name, None);
    }

    #[test]
    fn tree_records_compose_name_label_and_parent() {
        let doc = json!([
            {"@id": "#__header__", "root": ["brain"]},
            {
                "@id": "brain",
                "@type": "Group",
                "annotation": {"name": "Brain"},
                "member": [{
                    "@id": "cb",
                    "@type": "Structure",
                    "annotation": {"name": "Cerebellum"},
                    "sourceSelector": {"dataKey": 12}
                }]
            }
        ]);
        let graph = AtlasGraph::from_document(&doc, FieldCatalog::atlas()).unwrap();

        let records = tree_records(&graph, "member").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            TreeRecord {
                id: "cb".to_string(),
                types: vec!["Structure".to_string()],
                name: Some("Cerebellum".to_string()),
                label: Some(json!(12)),
                parent: Some("Brain".to_string()),
            }
        );
        assert_eq!(records[1].id, "brain");
        assert_eq!(records[1].parent, None);
    }
}
