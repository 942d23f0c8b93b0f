//! # Lore Graph
//!
//! Knowledge graph over decisions, components, threats and tech-debt items.
//!
//! ## Architecture
//!
//! ```text
//! DecisionRecord[] / Component[] / ThreatFinding[] / TechDebtItem[]
//!     │
//!     ├──> GraphGenerator
//!     │      ├─ One node per entity
//!     │      ├─ relates_to / mitigates / supersedes / derived_from edges
//!     │      └─ Edges with a missing endpoint are skipped (orphan nodes stay)
//!     │
//!     ├──> KnowledgeGraph (petgraph)
//!     │
//!     └──> GraphDocument (graph.json)
//!            ├─ Sorted nodes and edges
//!            └─ load() / validate()
//! ```

mod builder;
mod document;
mod error;
mod graph;
mod types;

pub use builder::{GraphGenerator, GraphInputs};
pub use document::{EdgeRecord, GraphDocument, NodeRecord, GRAPH_DOCUMENT_VERSION};
pub use error::{GraphError, Result};
pub use types::{GraphEdge, GraphNode, KnowledgeGraph, NodeKind, RelationshipType};
