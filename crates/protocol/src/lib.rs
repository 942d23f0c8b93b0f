//! Shared data model for the Lore import pipeline.
//!
//! Every stage of the pipeline (scanner, decisions, analysis, graph, pipeline) speaks
//! these types, so they are the only thing persisted artifacts have in common.

use anyhow::Result;
use serde::Serialize;

pub mod component;
pub mod debt;
pub mod decision;
pub mod flags;
pub mod path_filters;
pub mod threat;

pub use component::{Component, ComponentKind, DataFlow};
pub use debt::{DebtCategory, Priority, TechDebtItem};
pub use decision::{
    Consequences, Decision, DecisionRecord, DecisionSource, EvidencePointer, Supplement,
};
pub use flags::RunFlag;
pub use threat::{
    CategoryCoverage, CoverageOutcome, DreadScore, MitigationStatus, Severity, ThreatCategory,
    ThreatFinding, ThreatModel,
};

/// Version stamped into every machine-readable artifact.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}
