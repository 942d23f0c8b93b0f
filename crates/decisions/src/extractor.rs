use crate::confidence;
use crate::document::{is_decision_document, parse_decision_document};
use crate::infer::infer_decisions;
use lore_protocol::Decision;
use lore_scanner::SourceSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A decision document that could not be turned into a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    /// Parsed decision records, ordered by id.
    pub existing: Vec<Decision>,
    /// One decision per evidenced topic, ordered by id.
    pub inferred: Vec<Decision>,
    pub parse_failures: Vec<ParseFailure>,
    pub files_scanned: usize,
}

impl ExtractionOutput {
    pub fn is_empty(&self) -> bool {
        self.existing.is_empty() && self.inferred.is_empty()
    }

    pub fn decision_count(&self) -> usize {
        self.existing.len() + self.inferred.len()
    }
}

/// Produces existing and inferred decision candidates from a project snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecisionExtractor;

impl DecisionExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, sources: &SourceSet) -> ExtractionOutput {
        let parsed: Vec<_> = sources
            .files()
            .par_iter()
            .filter(|file| is_decision_document(&file.rel_path))
            .map(|file| {
                (
                    file.rel_path.as_str(),
                    parse_decision_document(&file.rel_path, &file.content),
                )
            })
            .collect();

        let inferred = infer_decisions(sources);
        let mut taken: BTreeSet<String> = inferred.iter().map(|d| file_key(&d.id)).collect();
        let mut existing = Vec::new();
        let mut parse_failures = Vec::new();
        for (path, outcome) in parsed {
            match outcome {
                Ok(mut decision) => {
                    decision.id = unique_id(&decision.id, &mut taken);
                    existing.push(confidence::scored(decision));
                }
                Err(err) => {
                    log::warn!("Skipping decision document {path}: {err}");
                    parse_failures.push(ParseFailure {
                        path: path.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        existing.sort_by(|a, b| a.id.cmp(&b.id));

        let output = ExtractionOutput {
            existing,
            inferred,
            parse_failures,
            files_scanned: sources.files().len(),
        };
        if output.is_empty() {
            log::warn!(
                "No decisions found in {} files; result is suspicious",
                output.files_scanned
            );
        } else {
            log::info!(
                "Extracted {} existing and {} inferred decisions ({} parse failures)",
                output.existing.len(),
                output.inferred.len(),
                output.parse_failures.len()
            );
        }
        output
    }
}

/// File name of a decision record; ids are already slug-like, anything else is replaced.
pub fn record_file_name(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}.yml")
}

/// Two ids clash when their records would land on the same file, case-insensitive
/// filesystems included.
fn file_key(id: &str) -> String {
    record_file_name(id).to_ascii_lowercase()
}

fn unique_id(id: &str, taken: &mut BTreeSet<String>) -> String {
    let mut candidate = id.to_string();
    let mut suffix = 1;
    while !taken.insert(file_key(&candidate)) {
        suffix += 1;
        candidate = format!("{id}-{suffix}");
    }
    if candidate != id {
        log::warn!("Decision id {id} is already taken; renamed to {candidate}");
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_scanner::SourceFile;
    use pretty_assertions::assert_eq;

    const RECORD: &str = "# Title\n\n## Context\n\nWhy.\n\n## Decision\n\nWhat.\n";

    #[test]
    fn colliding_ids_get_suffixes_in_path_order() {
        let sources = SourceSet::from_files(
            "/p",
            vec![
                SourceFile::new("docs/adr/0001-a.md", RECORD),
                SourceFile::new("docs/adr/0001-b.md", RECORD),
                SourceFile::new("docs/adr/0001-c.md", RECORD),
            ],
        );
        let output = DecisionExtractor::new().extract(&sources);
        let ids: Vec<(&str, &str)> = output
            .existing
            .iter()
            .map(|d| (d.id.as_str(), d.origin.as_deref().unwrap_or("")))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("ADR-0001", "docs/adr/0001-a.md"),
                ("ADR-0001-2", "docs/adr/0001-b.md"),
                ("ADR-0001-3", "docs/adr/0001-c.md"),
            ]
        );
        assert!(output.existing.iter().all(|d| d.confidence == 0.6));
    }

    #[test]
    fn ids_that_share_a_record_file_are_suffixed() {
        let sources = SourceSet::from_files(
            "/p",
            vec![
                SourceFile::new("docs/adr/a.md", "---\nid: ADR 7\n---\n".to_string() + RECORD),
                SourceFile::new("docs/adr/b.md", "---\nid: ADR/7\n---\n".to_string() + RECORD),
            ],
        );
        let output = DecisionExtractor::new().extract(&sources);
        let ids: Vec<&str> = output.existing.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["ADR 7", "ADR/7-2"]);
        assert_eq!(
            ids.iter().map(|id| record_file_name(id)).collect::<Vec<_>>(),
            vec!["ADR_7.yml", "ADR_7-2.yml"]
        );
    }

    #[test]
    fn existing_id_never_shadows_an_inferred_one() {
        let sources = SourceSet::from_files(
            "/p",
            vec![
                SourceFile::new(
                    "docs/adr/0001-cache.md",
                    "---\nid: INF-redis\n---\n".to_string() + RECORD,
                ),
                SourceFile::new("requirements.txt", "redis==5.0\n"),
            ],
        );
        let output = DecisionExtractor::new().extract(&sources);
        let inferred: Vec<&str> = output.inferred.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(inferred, vec!["INF-redis"]);
        let existing: Vec<&str> = output.existing.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(existing, vec!["INF-redis-2"]);
    }

    #[test]
    fn parse_failures_are_counted_not_dropped() {
        let sources = SourceSet::from_files(
            "/p",
            vec![
                SourceFile::new("docs/adr/0001-ok.md", RECORD),
                SourceFile::new("docs/adr/0002-bad.md", "# Bad\n\n## Decision\n\nX.\n"),
            ],
        );
        let output = DecisionExtractor::new().extract(&sources);
        assert_eq!(output.existing.len(), 1);
        assert_eq!(output.parse_failures.len(), 1);
        assert_eq!(output.parse_failures[0].path, "docs/adr/0002-bad.md");
        assert!(output.parse_failures[0].reason.contains("context"));
    }

    #[test]
    fn empty_project_yields_empty_output() {
        let sources = SourceSet::from_files("/p", vec![SourceFile::new("notes.txt", "hello")]);
        let output = DecisionExtractor::new().extract(&sources);
        assert!(output.is_empty());
        assert_eq!(output.files_scanned, 1);
    }
}
