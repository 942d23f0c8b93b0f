use crate::decision::EvidencePointer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    Service,
    Cli,
    DatastoreAccess,
    Frontend,
    Infrastructure,
    Module,
    /// External datastore (database, cache) named by an inferred decision.
    Datastore,
    /// External broker or queue named by an inferred decision.
    Messaging,
}

impl ComponentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Cli => "cli",
            Self::DatastoreAccess => "datastore-access",
            Self::Frontend => "frontend",
            Self::Infrastructure => "infrastructure",
            Self::Module => "module",
            Self::Datastore => "datastore",
            Self::Messaging => "messaging",
        }
    }

    #[must_use]
    pub const fn is_external(self) -> bool {
        matches!(self, Self::Datastore | Self::Messaging)
    }
}

/// A detected architectural component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Graph-ready id, e.g. `component:crates/api`.
    pub id: String,
    pub name: String,
    pub kind: ComponentKind,
    /// Repo-relative directory for code components; empty for external components.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub file_count: usize,
    /// Topic of the inferred decision that introduced an external component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// Evidence that a code component talks to another component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFlow {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub evidence: Vec<EvidencePointer>,
}
