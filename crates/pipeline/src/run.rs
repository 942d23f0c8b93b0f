//! The `ImportRun` aggregate. Each stage takes the run by value and returns an
//! augmented copy; once validated it is wrapped in a read-only [`FinalizedRun`].

use crate::config::LoreConfig;
use crate::enhance::EnhancementOutcome;
use crate::validator::{ArtifactCheck, RunStatus, ValidationReport, Violation};
use chrono::{DateTime, Utc};
use lore_analysis::{ComponentMap, DebtReport};
use lore_decisions::{ExtractionOutput, ReconciliationResult, ReconciliationSummary};
use lore_graph::GraphDocument;
use lore_protocol::{RunFlag, ThreatModel, ARTIFACT_SCHEMA_VERSION};
use lore_scanner::LanguageReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Feature switches for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub threat_model: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_skip_reason: Option<String>,
    pub llm: bool,
    pub create_issues: bool,
}

impl RunOptions {
    pub fn from_config(config: &LoreConfig) -> Self {
        Self {
            threat_model: config.threats.enabled,
            threat_skip_reason: None,
            llm: config.llm.enabled,
            create_issues: config.issues.enabled,
        }
    }

    /// Reason recorded when threat modeling is off.
    pub fn skip_reason(&self) -> Option<String> {
        if self.threat_model {
            return None;
        }
        Some(
            self.threat_skip_reason
                .clone()
                .unwrap_or_else(|| "threat modeling disabled".to_string()),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThreatOutcome {
    Modeled(ThreatModel),
    Skipped { reason: String },
}

impl ThreatOutcome {
    pub fn model(&self) -> Option<&ThreatModel> {
        match self {
            Self::Modeled(model) => Some(model),
            Self::Skipped { .. } => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&str> {
        match self {
            Self::Modeled(_) => None,
            Self::Skipped { reason } => Some(reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportRun {
    pub project_root: PathBuf,
    pub output_root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub options: RunOptions,
    pub languages: Vec<LanguageReport>,
    pub files_scanned: usize,
    pub extraction: ExtractionOutput,
    pub reconciliation: ReconciliationResult,
    pub components: ComponentMap,
    pub threats: ThreatOutcome,
    pub debt: DebtReport,
    pub graph: GraphDocument,
    pub flags: Vec<RunFlag>,
}

impl ImportRun {
    pub fn start(project_root: PathBuf, output_root: PathBuf, options: RunOptions) -> Self {
        let threats = match options.skip_reason() {
            Some(reason) => ThreatOutcome::Skipped { reason },
            None => ThreatOutcome::Modeled(ThreatModel::default()),
        };
        Self {
            project_root,
            output_root,
            started_at: Utc::now(),
            options,
            languages: Vec::new(),
            files_scanned: 0,
            extraction: ExtractionOutput::default(),
            reconciliation: ReconciliationResult::default(),
            components: ComponentMap::default(),
            threats,
            debt: DebtReport::default(),
            graph: GraphDocument::default(),
            flags: Vec::new(),
        }
    }

    /// Same run with `flags` appended.
    #[must_use]
    pub fn flagged(mut self, flags: impl IntoIterator<Item = RunFlag>) -> Self {
        self.flags.extend(flags);
        self
    }

    /// Mean confidence of the persisted decision records; 0 when there are none.
    pub fn overall_confidence(&self) -> f64 {
        let records = &self.reconciliation.records;
        if records.is_empty() {
            return 0.0;
        }
        let sum: f64 = records.iter().map(|r| r.decision.confidence).sum();
        (sum / records.len() as f64 * 1000.0).round() / 1000.0
    }

    pub fn finalize(
        self,
        validation: ValidationReport,
        enhancement: Option<EnhancementOutcome>,
    ) -> FinalizedRun {
        FinalizedRun {
            finished_at: Utc::now(),
            run: self,
            validation,
            enhancement,
        }
    }
}

/// A validated run. Read-only.
#[derive(Debug, Clone)]
pub struct FinalizedRun {
    run: ImportRun,
    validation: ValidationReport,
    enhancement: Option<EnhancementOutcome>,
    finished_at: DateTime<Utc>,
}

impl FinalizedRun {
    pub fn run(&self) -> &ImportRun {
        &self.run
    }

    pub fn validation(&self) -> &ValidationReport {
        &self.validation
    }

    pub fn enhancement(&self) -> Option<&EnhancementOutcome> {
        self.enhancement.as_ref()
    }

    pub fn status(&self) -> RunStatus {
        self.validation.status
    }

    pub fn metadata(&self) -> RunMetadata {
        let run = &self.run;
        RunMetadata {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            project_root: run.project_root.display().to_string(),
            output_root: run.output_root.display().to_string(),
            started_at: run.started_at,
            finished_at: self.finished_at,
            status: self.validation.status,
            options: run.options.clone(),
            languages: run.languages.clone(),
            files_scanned: run.files_scanned,
            decisions: DecisionCounts {
                existing: run.extraction.existing.len(),
                inferred: run.extraction.inferred.len(),
                records: run.reconciliation.records.len(),
                parse_failures: run.extraction.parse_failures.len(),
            },
            overall_confidence: run.overall_confidence(),
            reconciliation: run.reconciliation.summary(),
            threats: run.threats.model().map(|model| ThreatCounts {
                components: model.components.len(),
                findings: model.findings.len(),
                unresolved_critical: model.unresolved_critical().len(),
            }),
            threat_model_skipped: run.threats.skip_reason().map(str::to_string),
            debt_items: run.debt.items.len(),
            graph: GraphCounts {
                nodes: run.graph.nodes.len(),
                edges: run.graph.edges.len(),
            },
            flags: run.flags.clone(),
            checklist: self.validation.checklist.clone(),
            violations: self.validation.violations.clone(),
            enhancement: self.enhancement.as_ref().map(EnhancementOutcome::describe),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    pub existing: usize,
    pub inferred: usize,
    pub records: usize,
    pub parse_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatCounts {
    pub components: usize,
    pub findings: usize,
    pub unresolved_critical: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    pub nodes: usize,
    pub edges: usize,
}

/// `import-run.json`; also the CLI's `--json` summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub schema_version: u32,
    pub project_root: String,
    pub output_root: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub options: RunOptions,
    pub languages: Vec<LanguageReport>,
    pub files_scanned: usize,
    pub decisions: DecisionCounts,
    pub overall_confidence: f64,
    pub reconciliation: ReconciliationSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threats: Option<ThreatCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_model_skipped: Option<String>,
    pub debt_items: usize,
    pub graph: GraphCounts,
    pub flags: Vec<RunFlag>,
    pub checklist: Vec<ArtifactCheck>,
    pub violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancement: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_protocol::{Decision, DecisionRecord, DecisionSource};

    fn run_with_confidences(values: &[f64]) -> ImportRun {
        let mut run = ImportRun::start(
            PathBuf::from("/p"),
            PathBuf::from("/p/.project"),
            RunOptions::from_config(&LoreConfig::default()),
        );
        run.reconciliation.records = values
            .iter()
            .enumerate()
            .map(|(idx, confidence)| {
                let mut decision =
                    Decision::new(format!("INF-{idx}"), "t", DecisionSource::Inferred);
                decision.confidence = *confidence;
                DecisionRecord {
                    decision,
                    supplement: None,
                }
            })
            .collect();
        run
    }

    #[test]
    fn overall_confidence_is_the_mean() {
        assert_eq!(run_with_confidences(&[]).overall_confidence(), 0.0);
        assert_eq!(run_with_confidences(&[0.9, 0.6]).overall_confidence(), 0.75);
    }

    #[test]
    fn disabled_threat_modeling_records_a_reason() {
        let options = RunOptions {
            threat_model: false,
            threat_skip_reason: None,
            llm: false,
            create_issues: false,
        };
        let run = ImportRun::start(PathBuf::from("/p"), PathBuf::from("/o"), options);
        assert_eq!(run.threats.skip_reason(), Some("threat modeling disabled"));
        assert!(run.threats.model().is_none());
    }

    #[test]
    fn flagged_appends_without_touching_other_stages() {
        let run = run_with_confidences(&[0.5]);
        let flagged = run.flagged([RunFlag::SuspiciousEmptyDebt { files_scanned: 12 }]);
        assert_eq!(flagged.flags.len(), 1);
        assert_eq!(flagged.reconciliation.records.len(), 1);
    }
}
