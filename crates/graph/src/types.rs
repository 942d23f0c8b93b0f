use crate::error::{GraphError, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Kind of entity a node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Decision,
    Component,
    Threat,
    Debt,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Component => "component",
            Self::Threat => "threat",
            Self::Debt => "debt",
        }
    }
}

/// Type of relationship between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// A touches B (decision evidence in a component, data flow, finding on a component)
    RelatesTo,

    /// Decision A documents the mitigation of threat B
    Mitigates,

    /// Decision A replaces decision B
    Supersedes,

    /// Threat A was raised against the technology chosen by decision B
    DerivedFrom,
}

impl RelationshipType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RelatesTo => "relates_to",
            Self::Mitigates => "mitigates",
            Self::Supersedes => "supersedes",
            Self::DerivedFrom => "derived_from",
        }
    }
}

/// Node in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Graph-wide unique id, e.g. `decision:ADR-0001` or `component:src/api`
    pub id: String,

    pub kind: NodeKind,

    /// Human-readable label
    pub label: String,

    /// Flat attributes copied from the underlying entity
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// Edge in the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub relationship: RelationshipType,
}

/// Knowledge graph of decisions, components, threats and debt items
#[derive(Debug)]
pub struct KnowledgeGraph {
    /// Directed graph
    pub(crate) graph: DiGraph<GraphNode, GraphEdge>,

    /// Node id -> index, for O(1) lookup
    pub(crate) node_index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    /// Add node to graph. Node ids are unique; a second node with the same id is an error
    /// so that no entity is silently replaced.
    pub fn add_node(&mut self, node: GraphNode) -> Result<NodeIndex> {
        if self.node_index.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        Ok(idx)
    }

    /// Add edge between two node ids. Returns `false` and adds nothing when either
    /// endpoint is missing or the same edge already exists.
    pub fn add_edge(&mut self, from: &str, to: &str, relationship: RelationshipType) -> bool {
        let (Some(&a), Some(&b)) = (self.node_index.get(from), self.node_index.get(to)) else {
            log::debug!(
                "Skipping {} edge {from} -> {to}: endpoint not in graph",
                relationship.as_str()
            );
            return false;
        };
        if a == b {
            return false;
        }
        let exists = self
            .graph
            .edges_connecting(a, b)
            .any(|e| e.weight().relationship == relationship);
        if exists {
            return false;
        }
        self.graph.add_edge(a, b, GraphEdge { relationship });
        true
    }

    #[must_use]
    pub fn find_node(&self, id: &str) -> Option<NodeIndex> {
        self.node_index.get(id).copied()
    }

    #[must_use]
    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.find_node(id).map(|idx| &self.graph[idx])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}
