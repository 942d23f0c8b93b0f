//! On-disk form of the knowledge graph (`graph.json`).

use crate::error::{GraphError, Result};
use crate::types::{NodeKind, RelationshipType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const GRAPH_DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from: String,
    pub to: String,
    pub relationship: RelationshipType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub version: u32,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

impl Default for GraphDocument {
    fn default() -> Self {
        Self {
            version: GRAPH_DOCUMENT_VERSION,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl GraphDocument {
    /// Parse and validate a graph document. An empty graph is valid.
    pub fn from_json(raw: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(raw)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Node ids are unique and every edge endpoint names an existing node.
    pub fn validate(&self) -> Result<()> {
        if self.version != GRAPH_DOCUMENT_VERSION {
            return Err(GraphError::UnsupportedVersion(self.version));
        }
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }
        for edge in &self.edges {
            if !ids.contains(edge.from.as_str()) || !ids.contains(edge.to.as_str()) {
                return Err(GraphError::DanglingEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn count_by_kind(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn node(id: &str) -> NodeRecord {
        NodeRecord {
            id: id.to_string(),
            kind: NodeKind::Decision,
            label: id.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn empty_graph_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let doc = GraphDocument::default();
        std::fs::write(&path, doc.to_json_pretty().unwrap()).unwrap();

        let loaded = GraphDocument::load(&path).unwrap();
        assert_eq!(loaded, doc);
        assert!(loaded.nodes.is_empty());
        assert!(loaded.edges.is_empty());
    }

    #[test]
    fn dangling_edges_are_rejected() {
        let doc = GraphDocument {
            nodes: vec![node("decision:a")],
            edges: vec![EdgeRecord {
                from: "decision:a".to_string(),
                to: "decision:b".to_string(),
                relationship: RelationshipType::Supersedes,
            }],
            ..GraphDocument::default()
        };
        assert!(matches!(
            doc.validate(),
            Err(GraphError::DanglingEdge { ref to, .. }) if to == "decision:b"
        ));
    }

    #[test]
    fn duplicate_ids_and_bad_versions_are_rejected() {
        let doc = GraphDocument {
            nodes: vec![node("decision:a"), node("decision:a")],
            ..GraphDocument::default()
        };
        assert!(matches!(doc.validate(), Err(GraphError::DuplicateNode(_))));

        let raw = r#"{"version": 9, "nodes": [], "edges": []}"#;
        assert!(matches!(
            GraphDocument::from_json(raw),
            Err(GraphError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            GraphDocument::from_json("{\"nodes\": ["),
            Err(GraphError::Parse(_))
        ));
    }

    #[test]
    fn relationships_serialise_in_snake_case() {
        let edge = EdgeRecord {
            from: "threat:x".to_string(),
            to: "decision:y".to_string(),
            relationship: RelationshipType::DerivedFrom,
        };
        let json = serde_json::to_string(&edge).unwrap();
        assert!(json.contains("\"derived_from\""));
    }
}
