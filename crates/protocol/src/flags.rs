use serde::{Deserialize, Serialize};

/// Anomaly recorded in run metadata instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFlag {
    ParseFailure { path: String, reason: String },
    SuspiciousEmptyDecisions { files_scanned: usize },
    SuspiciousEmptyDebt { files_scanned: usize },
    EmptyReconciliationBucket { bucket: String },
    ThreatModelSkipped { reason: String },
    OrphanNodes { count: usize },
    EnhancementDegraded { reason: String },
    IssueCreationFailed { decision_id: String, reason: String },
}

impl RunFlag {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ParseFailure { .. } => "parse_failure",
            Self::SuspiciousEmptyDecisions { .. } => "suspicious_empty_decisions",
            Self::SuspiciousEmptyDebt { .. } => "suspicious_empty_debt",
            Self::EmptyReconciliationBucket { .. } => "empty_reconciliation_bucket",
            Self::ThreatModelSkipped { .. } => "threat_model_skipped",
            Self::OrphanNodes { .. } => "orphan_nodes",
            Self::EnhancementDegraded { .. } => "enhancement_degraded",
            Self::IssueCreationFailed { .. } => "issue_creation_failed",
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ParseFailure { path, reason } => {
                format!("decision document `{path}` rejected: {reason}")
            }
            Self::SuspiciousEmptyDecisions { files_scanned } => format!(
                "suspicious empty result: no decisions found across {files_scanned} files"
            ),
            Self::SuspiciousEmptyDebt { files_scanned } => format!(
                "suspicious empty result: no tech-debt items found across {files_scanned} code files"
            ),
            Self::EmptyReconciliationBucket { bucket } => {
                format!("reconciliation bucket `{bucket}` is empty although both inputs were present")
            }
            Self::ThreatModelSkipped { reason } => format!("threat modeling skipped: {reason}"),
            Self::OrphanNodes { count } => format!("{count} graph node(s) have no relationships"),
            Self::EnhancementDegraded { reason } => {
                format!("LLM synthesis degraded to pattern-based result: {reason}")
            }
            Self::IssueCreationFailed {
                decision_id,
                reason,
            } => format!("could not file low-confidence issue for {decision_id}: {reason}"),
        }
    }
}
