//! Output directory layout, on-disk document shapes and atomic writers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lore_decisions::{record_file_name, ReconciliationResult};
use lore_graph::GraphDocument;
use lore_protocol::{
    DecisionRecord, DecisionSource, Severity, ThreatFinding, ThreatModel, ARTIFACT_SCHEMA_VERSION,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const GRAPH_PATH: &str = "corpus/graph.json";
pub const ADR_INDEX_PATH: &str = "references/adr_index.yml";
pub const TECH_DEBT_REPORT_PATH: &str = "reports/tech-debt-inferred.md";
pub const IMPORT_REPORT_PATH: &str = "reports/import-report.md";
pub const THREAT_MODEL_PATH: &str = "security/threat-model-inferred.yml";
pub const DECISIONS_DIR: &str = "corpus/nodes/decisions";
pub const RUN_METADATA_PATH: &str = "import-run.json";
pub const LLM_SYNTHESIS_PATH: &str = "references/llm-synthesis.json";
pub const ISSUES_DIR: &str = "issues";

/// Paths of every artifact under one output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn decisions_dir(&self) -> PathBuf {
        self.path(DECISIONS_DIR)
    }

    /// Mandatory artifacts as `(relative path, absolute path)`. The threat model drops
    /// out only when modeling was explicitly skipped.
    pub fn mandatory(&self, threat_model_skipped: bool) -> Vec<(&'static str, PathBuf)> {
        let mut paths = vec![GRAPH_PATH, ADR_INDEX_PATH, TECH_DEBT_REPORT_PATH, IMPORT_REPORT_PATH];
        if !threat_model_skipped {
            paths.push(THREAT_MODEL_PATH);
        }
        paths.into_iter().map(|rel| (rel, self.path(rel))).collect()
    }
}

/// One row of the decision index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub title: String,
    pub source: DecisionSource,
    pub confidence: f64,
    /// Record path relative to the output root.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_by: Option<String>,
}

/// `references/adr_index.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdrIndex {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    /// Number of decision records written to the decisions directory.
    pub count: usize,
    pub reconciliation: ReconciliationResult,
    pub decisions: Vec<IndexEntry>,
}

impl AdrIndex {
    pub fn build(
        generated_at: DateTime<Utc>,
        reconciliation: &ReconciliationResult,
        records: &[DecisionRecord],
    ) -> Self {
        let decisions: Vec<IndexEntry> = records
            .iter()
            .map(|record| IndexEntry {
                id: record.id().to_string(),
                title: record.decision.title.clone(),
                source: record.decision.source,
                confidence: record.decision.confidence,
                path: format!("{DECISIONS_DIR}/{}", record_file_name(record.id())),
                status: record.decision.status.clone(),
                enriched_by: record.supplement.as_ref().map(|s| s.inferred_id.clone()),
            })
            .collect();
        Self {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            generated_at,
            count: decisions.len(),
            reconciliation: reconciliation.clone(),
            decisions,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreatSummary {
    pub findings: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub unresolved_critical: usize,
}

impl ThreatSummary {
    pub fn from_findings(findings: &[ThreatFinding]) -> Self {
        let mut by_severity = BTreeMap::new();
        for finding in findings {
            *by_severity.entry(finding.severity).or_insert(0) += 1;
        }
        Self {
            findings: findings.len(),
            by_severity,
            unresolved_critical: findings.iter().filter(|f| f.is_unresolved_critical()).count(),
        }
    }
}

/// `security/threat-model-inferred.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatModelArtifact {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub weights: [f64; 5],
    pub summary: ThreatSummary,
    #[serde(flatten)]
    pub model: ThreatModel,
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

/// Writes artifacts of a single run into an [`OutputLayout`].
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    layout: OutputLayout,
}

impl ArtifactWriter {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Clear state left by a previous run: decision records and optional artifacts.
    pub fn prepare(&self) -> Result<()> {
        let decisions = self.layout.decisions_dir();
        if decisions.exists() {
            std::fs::remove_dir_all(&decisions)
                .with_context(|| format!("Failed to clear {}", decisions.display()))?;
        }
        std::fs::create_dir_all(&decisions)
            .with_context(|| format!("Failed to create {}", decisions.display()))?;
        for stale in [LLM_SYNTHESIS_PATH, THREAT_MODEL_PATH] {
            let path = self.layout.path(stale);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }

    pub fn write_decision_records(&self, records: &[DecisionRecord]) -> Result<()> {
        let dir = self.layout.decisions_dir();
        for record in records {
            let yaml = serde_yaml::to_string(record)
                .with_context(|| format!("Failed to serialise decision {}", record.id()))?;
            write_atomic(&dir.join(record_file_name(record.id())), yaml.as_bytes())?;
        }
        log::debug!("Wrote {} decision records to {}", records.len(), dir.display());
        Ok(())
    }

    pub fn write_yaml<T: Serialize>(&self, relative: &str, value: &T) -> Result<()> {
        let yaml = serde_yaml::to_string(value)
            .with_context(|| format!("Failed to serialise {relative}"))?;
        write_atomic(&self.layout.path(relative), yaml.as_bytes())
    }

    pub fn write_json<T: Serialize>(&self, relative: &str, value: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(value)
            .with_context(|| format!("Failed to serialise {relative}"))?;
        write_atomic(&self.layout.path(relative), &json)
    }

    pub fn write_graph(&self, graph: &GraphDocument) -> Result<()> {
        let json = graph.to_json_pretty().context("Failed to serialise knowledge graph")?;
        write_atomic(&self.layout.path(GRAPH_PATH), json.as_bytes())
    }

    pub fn write_text(&self, relative: &str, text: &str) -> Result<()> {
        write_atomic(&self.layout.path(relative), text.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_protocol::Decision;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn record(id: &str) -> DecisionRecord {
        DecisionRecord {
            decision: Decision::new(id, "Use Redis", DecisionSource::Inferred),
            supplement: None,
        }
    }

    #[test]
    fn record_names_are_filesystem_safe() {
        assert_eq!(record_file_name("ADR-0007"), "ADR-0007.yml");
        assert_eq!(record_file_name("INF-spring-boot"), "INF-spring-boot.yml");
        assert_eq!(record_file_name("ADR/../x y"), "ADR_.._x_y.yml");
    }

    #[test]
    fn mandatory_list_drops_threat_model_only_when_skipped() {
        let layout = OutputLayout::new("/out");
        let full: Vec<&str> = layout.mandatory(false).into_iter().map(|(rel, _)| rel).collect();
        assert_eq!(
            full,
            vec![
                GRAPH_PATH,
                ADR_INDEX_PATH,
                TECH_DEBT_REPORT_PATH,
                IMPORT_REPORT_PATH,
                THREAT_MODEL_PATH
            ]
        );
        assert_eq!(layout.mandatory(true).len(), 4);
    }

    #[test]
    fn prepare_clears_previous_records() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(OutputLayout::new(dir.path()));
        writer.prepare().unwrap();
        writer
            .write_decision_records(&[record("INF-redis"), record("INF-kafka")])
            .unwrap();
        assert_eq!(std::fs::read_dir(writer.layout().decisions_dir()).unwrap().count(), 2);

        writer.prepare().unwrap();
        writer.write_decision_records(&[record("INF-redis")]).unwrap();
        assert_eq!(std::fs::read_dir(writer.layout().decisions_dir()).unwrap().count(), 1);
    }

    #[test]
    fn atomic_writes_leave_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports/a.md");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        let names: Vec<String> = std::fs::read_dir(dir.path().join("reports"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md".to_string()]);
    }

    #[test]
    fn index_declares_one_entry_per_record() {
        let records = vec![record("INF-kafka"), record("INF-redis")];
        let index = AdrIndex::build(Utc::now(), &ReconciliationResult::default(), &records);
        assert_eq!(index.count, 2);
        assert_eq!(index.decisions[1].path, "corpus/nodes/decisions/INF-redis.yml");

        let yaml = serde_yaml::to_string(&index).unwrap();
        let back: AdrIndex = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.count, 2);
    }
}
