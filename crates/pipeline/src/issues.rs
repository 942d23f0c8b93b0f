//! Issue drafts for decisions whose confidence is too low to trust unreviewed.

use crate::artifacts::write_atomic;
use anyhow::Result;
use lore_protocol::{DecisionRecord, RunFlag};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub decision_id: String,
    pub title: String,
    pub body: String,
}

/// One draft per record below `threshold`, in record order.
pub fn low_confidence_drafts(records: &[DecisionRecord], threshold: f64) -> Vec<IssueDraft> {
    records
        .iter()
        .filter(|record| record.decision.confidence < threshold)
        .map(|record| {
            let decision = &record.decision;
            let mut body = String::new();
            body.push_str(&format!("# Review decision {}\n\n", decision.id));
            body.push_str(&format!("- Title: {}\n", decision.title));
            body.push_str(&format!("- Source: `{}`\n", decision.source.as_str()));
            body.push_str(&format!(
                "- Confidence: `{:.2}` (threshold `{threshold:.2}`)\n\n",
                decision.confidence
            ));
            if decision.evidence.is_empty() {
                body.push_str("No supporting evidence was recorded.\n");
            } else {
                body.push_str("## Evidence\n\n");
                for pointer in &decision.evidence {
                    body.push_str(&format!(
                        "- `{}:{}` ({})\n",
                        pointer.file, pointer.line, pointer.pattern
                    ));
                }
            }
            body.push_str(
                "\nConfirm the decision and fill in context, alternatives and consequences, \
                 or remove it from the knowledge base.\n",
            );
            IssueDraft {
                decision_id: decision.id.clone(),
                title: format!("Low-confidence decision: {}", decision.title),
                body,
            }
        })
        .collect()
}

pub trait IssueSink {
    /// File one issue and return where it went.
    fn file(&self, draft: &IssueDraft) -> Result<String>;
}

/// Writes drafts as `low-confidence-<id>.md` files.
#[derive(Debug, Clone)]
pub struct FileIssueSink {
    dir: PathBuf,
}

impl FileIssueSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl IssueSink for FileIssueSink {
    fn file(&self, draft: &IssueDraft) -> Result<String> {
        let name = lore_decisions::record_file_name(&draft.decision_id);
        let stem = name.trim_end_matches(".yml");
        let path = self.dir.join(format!("low-confidence-{stem}.md"));
        write_atomic(&path, draft.body.as_bytes())?;
        Ok(path.display().to_string())
    }
}

/// File every draft. Failures become run flags; they never abort the run.
pub fn file_issues(sink: &dyn IssueSink, drafts: &[IssueDraft]) -> (Vec<String>, Vec<RunFlag>) {
    let mut filed = Vec::new();
    let mut flags = Vec::new();
    for draft in drafts {
        match sink.file(draft) {
            Ok(location) => filed.push(location),
            Err(err) => {
                log::warn!("Issue for {} not filed: {err:#}", draft.decision_id);
                flags.push(RunFlag::IssueCreationFailed {
                    decision_id: draft.decision_id.clone(),
                    reason: format!("{err:#}"),
                });
            }
        }
    }
    if !filed.is_empty() {
        log::info!("Filed {} low-confidence issue draft(s)", filed.len());
    }
    (filed, flags)
}
