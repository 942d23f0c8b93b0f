//! Terminal gate: reads the output directory back and decides whether the run is complete.

use crate::artifacts::{
    OutputLayout, ADR_INDEX_PATH, DECISIONS_DIR, GRAPH_PATH, RUN_METADATA_PATH, THREAT_MODEL_PATH,
};
use crate::config::ValidatorConfig;
use lore_graph::GraphDocument;
use lore_protocol::ThreatFinding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    Incomplete,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Incomplete => "INCOMPLETE",
        }
    }
}

/// A specific failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Violation {
    MissingArtifact {
        path: String,
    },
    UnreadableArtifact {
        path: String,
        reason: String,
    },
    IndexCountMismatch {
        declared: usize,
        on_disk: usize,
    },
    ConfidenceCoverage {
        covered: usize,
        total: usize,
        coverage: f64,
        threshold: f64,
    },
    UnresolvedCriticalFindings {
        ids: Vec<String>,
    },
}

impl Violation {
    pub fn describe(&self) -> String {
        match self {
            Self::MissingArtifact { path } => format!("missing mandatory artifact `{path}`"),
            Self::UnreadableArtifact { path, reason } => {
                format!("artifact `{path}` could not be loaded: {reason}")
            }
            Self::IndexCountMismatch { declared, on_disk } => format!(
                "decision index declares {declared} records but {on_disk} exist on disk"
            ),
            Self::ConfidenceCoverage {
                covered,
                total,
                coverage,
                threshold,
            } => format!(
                "confidence coverage {:.1}% ({covered}/{total}) is below the required {:.1}%",
                coverage * 100.0,
                threshold * 100.0
            ),
            Self::UnresolvedCriticalFindings { ids } => format!(
                "{} unresolved critical threat finding(s): {}",
                ids.len(),
                ids.join(", ")
            ),
        }
    }

    /// Hard failures stop the remaining checks.
    pub const fn is_hard(&self) -> bool {
        matches!(
            self,
            Self::MissingArtifact { .. }
                | Self::UnreadableArtifact { .. }
                | Self::IndexCountMismatch { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCheck {
    pub path: String,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: RunStatus,
    /// Mandatory-artifact checklist.
    pub checklist: Vec<ArtifactCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_disk_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_coverage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved_critical: Option<usize>,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    fn new(checklist: Vec<ArtifactCheck>) -> Self {
        Self {
            status: RunStatus::Complete,
            checklist,
            declared_count: None,
            on_disk_count: None,
            confidence_coverage: None,
            unresolved_critical: None,
            violations: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Complete
    }

    fn fail(&mut self, violation: Violation) {
        log::warn!("Validation failed: {}", violation.describe());
        self.status = RunStatus::Incomplete;
        self.violations.push(violation);
    }
}

#[derive(Deserialize)]
struct IndexHeader {
    count: usize,
}

#[derive(Deserialize)]
struct ThreatFindings {
    #[serde(default)]
    findings: Vec<ThreatFinding>,
}

#[derive(Deserialize)]
struct RunMetadataHeader {
    #[serde(default)]
    threat_model_skipped: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ArtifactValidator {
    config: ValidatorConfig,
}

impl ArtifactValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Re-run the gate against an existing output directory. Whether threat modeling was
    /// skipped is taken from `import-run.json`; without it the threat model is mandatory.
    pub fn validate_existing(&self, layout: &OutputLayout) -> ValidationReport {
        let skipped = std::fs::read_to_string(layout.path(RUN_METADATA_PATH))
            .ok()
            .and_then(|raw| serde_json::from_str::<RunMetadataHeader>(&raw).ok())
            .and_then(|meta| meta.threat_model_skipped)
            .is_some();
        self.validate(layout, skipped)
    }

    /// Checks, in order: mandatory artifacts exist; the index count matches the records on
    /// disk and the graph loads; confidence coverage; no unresolved critical findings.
    pub fn validate(&self, layout: &OutputLayout, threat_model_skipped: bool) -> ValidationReport {
        let mandatory = layout.mandatory(threat_model_skipped);
        let checklist: Vec<ArtifactCheck> = mandatory
            .iter()
            .map(|(rel, path)| ArtifactCheck {
                path: (*rel).to_string(),
                present: path.is_file(),
            })
            .collect();
        let mut report = ValidationReport::new(checklist);

        // 1. Mandatory artifacts
        let missing: Vec<String> = report
            .checklist
            .iter()
            .filter(|check| !check.present)
            .map(|check| check.path.clone())
            .collect();
        if !missing.is_empty() {
            for path in missing {
                report.fail(Violation::MissingArtifact { path });
            }
            return report;
        }

        // 2. Index/on-disk consistency
        let declared = match read_yaml::<IndexHeader>(&layout.path(ADR_INDEX_PATH)) {
            Ok(header) => header.count,
            Err(reason) => {
                report.fail(Violation::UnreadableArtifact {
                    path: ADR_INDEX_PATH.to_string(),
                    reason,
                });
                return report;
            }
        };
        let records = match decision_files(&layout.decisions_dir()) {
            Ok(files) => files,
            Err(reason) => {
                report.fail(Violation::UnreadableArtifact {
                    path: DECISIONS_DIR.to_string(),
                    reason,
                });
                return report;
            }
        };
        report.declared_count = Some(declared);
        report.on_disk_count = Some(records.len());
        if declared != records.len() {
            report.fail(Violation::IndexCountMismatch {
                declared,
                on_disk: records.len(),
            });
            return report;
        }
        if let Err(err) = GraphDocument::load(&layout.path(GRAPH_PATH)) {
            report.fail(Violation::UnreadableArtifact {
                path: GRAPH_PATH.to_string(),
                reason: err.to_string(),
            });
            return report;
        }

        // 3. Confidence coverage
        let total = records.len();
        let covered = records
            .iter()
            .filter(|path| self.has_usable_confidence(path))
            .count();
        let coverage = if total == 0 {
            1.0
        } else {
            covered as f64 / total as f64
        };
        report.confidence_coverage = Some(coverage);
        if coverage < self.config.min_confidence_coverage {
            report.fail(Violation::ConfidenceCoverage {
                covered,
                total,
                coverage,
                threshold: self.config.min_confidence_coverage,
            });
        }

        // 4. Unresolved critical findings
        if !threat_model_skipped {
            match read_yaml::<ThreatFindings>(&layout.path(THREAT_MODEL_PATH)) {
                Ok(model) => {
                    let ids: Vec<String> = model
                        .findings
                        .iter()
                        .filter(|f| f.is_unresolved_critical())
                        .map(|f| f.id.clone())
                        .collect();
                    report.unresolved_critical = Some(ids.len());
                    if !ids.is_empty() {
                        report.fail(Violation::UnresolvedCriticalFindings { ids });
                    }
                }
                Err(reason) => report.fail(Violation::UnreadableArtifact {
                    path: THREAT_MODEL_PATH.to_string(),
                    reason,
                }),
            }
        }

        log::info!(
            "Validation {}: {} violation(s)",
            report.status.as_str(),
            report.violations.len()
        );
        report
    }

    fn has_usable_confidence(&self, path: &Path) -> bool {
        let Ok(value) = read_yaml::<serde_yaml::Value>(path) else {
            return false;
        };
        value
            .get("confidence")
            .and_then(serde_yaml::Value::as_f64)
            .is_some_and(|c| {
                c.is_finite() && (0.0..=1.0).contains(&c) && c >= self.config.min_decision_confidence
            })
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_yaml::from_str(&raw).map_err(|e| e.to_string())
}

/// Entries matched by `<decisions_dir>/*`.
fn decision_files(dir: &Path) -> Result<Vec<PathBuf>, String> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = format!(
        "{}/*",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let mut files = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| e.to_string())? {
        files.push(entry.map_err(|e| e.to_string())?);
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{IMPORT_REPORT_PATH, TECH_DEBT_REPORT_PATH};
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn valid_output(records: &[(&str, &str)]) -> TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, GRAPH_PATH, r#"{"version": 1, "nodes": [], "edges": []}"#);
        write(root, ADR_INDEX_PATH, &format!("count: {}\n", records.len()));
        write(root, TECH_DEBT_REPORT_PATH, "# Tech debt\n");
        write(root, IMPORT_REPORT_PATH, "# Import\n");
        write(root, THREAT_MODEL_PATH, "findings: []\n");
        std::fs::create_dir_all(root.join(DECISIONS_DIR)).unwrap();
        for (id, confidence) in records {
            write(
                root,
                &format!("{DECISIONS_DIR}/{id}.yml"),
                &format!("id: {id}\nconfidence: {confidence}\n"),
            );
        }
        dir
    }

    fn validator() -> ArtifactValidator {
        ArtifactValidator::new(ValidatorConfig::default())
    }

    #[test]
    fn complete_output_passes() {
        let dir = valid_output(&[("ADR-0001", "0.9"), ("INF-redis", "0.55")]);
        let report = validator().validate(&OutputLayout::new(dir.path()), false);
        assert!(report.is_complete(), "{:?}", report.violations);
        assert_eq!(report.declared_count, Some(2));
        assert_eq!(report.on_disk_count, Some(2));
        assert_eq!(report.confidence_coverage, Some(1.0));
        assert_eq!(report.unresolved_critical, Some(0));
    }

    #[test]
    fn zero_decisions_is_complete() {
        let dir = valid_output(&[]);
        let report = validator().validate(&OutputLayout::new(dir.path()), false);
        assert!(report.is_complete());
        assert_eq!(report.confidence_coverage, Some(1.0));
    }

    #[test]
    fn missing_debt_report_is_listed_and_stops() {
        let dir = valid_output(&[("ADR-0001", "0.9")]);
        std::fs::remove_file(dir.path().join(TECH_DEBT_REPORT_PATH)).unwrap();
        let report = validator().validate(&OutputLayout::new(dir.path()), false);
        assert_eq!(report.status, RunStatus::Incomplete);
        assert_eq!(
            report.violations,
            vec![Violation::MissingArtifact {
                path: TECH_DEBT_REPORT_PATH.to_string()
            }]
        );
        assert_eq!(report.declared_count, None);
    }

    #[test]
    fn skipped_threat_model_is_not_required() {
        let dir = valid_output(&[]);
        std::fs::remove_file(dir.path().join(THREAT_MODEL_PATH)).unwrap();
        let layout = OutputLayout::new(dir.path());
        assert!(!validator().validate(&layout, false).is_complete());
        let report = validator().validate(&layout, true);
        assert!(report.is_complete());
        assert_eq!(report.unresolved_critical, None);
    }

    #[test]
    fn count_mismatch_is_a_hard_failure() {
        let dir = valid_output(&[("ADR-0001", "0.9")]);
        write(dir.path(), &format!("{DECISIONS_DIR}/stray.yml"), "confidence: 0.9\n");
        let report = validator().validate(&OutputLayout::new(dir.path()), false);
        assert_eq!(
            report.violations,
            vec![Violation::IndexCountMismatch {
                declared: 1,
                on_disk: 2
            }]
        );
        assert_eq!(report.confidence_coverage, None);
    }

    #[test]
    fn broken_graph_is_reported() {
        let dir = valid_output(&[]);
        write(dir.path(), GRAPH_PATH, "{\"nodes\": ");
        let report = validator().validate(&OutputLayout::new(dir.path()), false);
        assert!(matches!(
            report.violations.as_slice(),
            [Violation::UnreadableArtifact { path, .. }] if path == GRAPH_PATH
        ));
    }

    #[test]
    fn low_coverage_and_critical_findings_are_both_reported() {
        let dir = valid_output(&[
            ("ADR-0001", "0.9"),
            ("ADR-0002", "nan"),
            ("ADR-0003", "1.7"),
            ("ADR-0004", "'high'"),
        ]);
        write(
            dir.path(),
            THREAT_MODEL_PATH,
            r#"findings:
  - id: THR-src-db-T-1
    category: tampering
    component_id: component:src/db
    title: SQL built by string concatenation
    rule: sql-string-concatenation
    dread: { damage: 9, reproducibility: 8, exploitability: 8, affected: 8, discoverability: 7 }
    score: 8.0
    severity: critical
    mitigation_status: partial
  - id: THR-src-db-I-1
    category: information_disclosure
    component_id: component:src/db
    title: Hardcoded secret
    rule: hardcoded-secret
    dread: { damage: 8, reproducibility: 9, exploitability: 8, affected: 8, discoverability: 7 }
    score: 8.0
    severity: critical
    mitigation_status: mitigated
    mitigated_by: ADR-0001
"#,
        );
        let report = validator().validate(&OutputLayout::new(dir.path()), false);
        assert_eq!(report.confidence_coverage, Some(0.25));
        assert_eq!(report.violations.len(), 2);
        assert!(matches!(
            &report.violations[0],
            Violation::ConfidenceCoverage { covered: 1, total: 4, .. }
        ));
        assert_eq!(
            report.violations[1],
            Violation::UnresolvedCriticalFindings {
                ids: vec!["THR-src-db-T-1".to_string()]
            }
        );
    }

    #[test]
    fn minimum_decision_confidence_narrows_coverage() {
        let dir = valid_output(&[("ADR-0001", "0.9"), ("INF-redis", "0.3")]);
        let strict = ArtifactValidator::new(ValidatorConfig {
            min_confidence_coverage: 0.8,
            min_decision_confidence: 0.5,
        });
        let report = strict.validate(&OutputLayout::new(dir.path()), false);
        assert_eq!(report.confidence_coverage, Some(0.5));
        assert!(!report.is_complete());
    }

    #[test]
    fn validate_existing_reads_skip_from_run_metadata() {
        let dir = valid_output(&[]);
        std::fs::remove_file(dir.path().join(THREAT_MODEL_PATH)).unwrap();
        let layout = OutputLayout::new(dir.path());
        assert!(!validator().validate_existing(&layout).is_complete());

        write(
            dir.path(),
            RUN_METADATA_PATH,
            r#"{"threat_model_skipped": "no network services"}"#,
        );
        assert!(validator().validate_existing(&layout).is_complete());
    }
}
