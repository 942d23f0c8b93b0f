//! Architecture analysis over a project snapshot.
//!
//! ```text
//! SourceSet ──► ComponentDetector ──► ComponentMap ──┬──► ThreatModeler ──► ThreatModel
//!                                                    └──► TechDebtDetector ──► DebtReport
//! ```

mod components;
mod debt;
mod error;
mod threat;

pub use components::{ComponentDetector, ComponentMap, DEFAULT_DEPTH as DEFAULT_COMPONENT_DEPTH};
pub use debt::{DebtConfig, DebtMarker, DebtReport, TechDebtDetector};
pub use error::{AnalysisError, Result};
pub use threat::{ThreatConfig, ThreatModeler};
