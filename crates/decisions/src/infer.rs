//! Evidence-based decision inference.
//!
//! Files are scanned in parallel; hits are reduced into a map keyed by topic so the
//! result does not depend on scheduling order.

use crate::catalogue::{Scope, Topic, MANIFEST_NAMES, TOPICS};
use crate::confidence;
use crate::document::is_decision_document;
use lore_protocol::{Consequences, Decision, DecisionSource, EvidencePointer};
use lore_scanner::{FileRole, SourceFile, SourceSet};
use rayon::prelude::*;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

const HASH_HEX_LEN: usize = 16;

type TopicHits = BTreeMap<&'static str, BTreeSet<EvidencePointer>>;

struct CompiledPattern {
    scope: Scope,
    name: &'static str,
    regex: Regex,
}

struct CompiledTopic {
    topic: &'static Topic,
    patterns: Vec<CompiledPattern>,
}

fn compiled_topics() -> &'static [CompiledTopic] {
    static TOPICS_RE: OnceLock<Vec<CompiledTopic>> = OnceLock::new();
    TOPICS_RE.get_or_init(|| {
        TOPICS
            .iter()
            .map(|topic| CompiledTopic {
                topic,
                patterns: topic
                    .patterns
                    .iter()
                    .filter_map(|pattern| match Regex::new(pattern.regex) {
                        Ok(regex) => Some(CompiledPattern {
                            scope: pattern.scope,
                            name: pattern.name,
                            regex,
                        }),
                        Err(err) => {
                            log::warn!("invalid evidence pattern {}: {err}", pattern.name);
                            None
                        }
                    })
                    .collect(),
            })
            .collect()
    })
}

/// First 16 hex characters of the SHA-256 of `content`.
pub(crate) fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hex = String::with_capacity(HASH_HEX_LEN);
    for byte in digest.iter().take(HASH_HEX_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

fn scope_applies(scope: Scope, file: &SourceFile) -> bool {
    match scope {
        Scope::Manifest => MANIFEST_NAMES.contains(&file.file_name()),
        Scope::Code => file.role == FileRole::Code,
        Scope::Infra => file.role == FileRole::Infra,
        Scope::Config => file.role == FileRole::Config,
    }
}

fn line_of(content: &str, offset: usize) -> usize {
    content[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

/// Earliest hit per topic within one file.
fn scan_file(file: &SourceFile) -> Vec<(&'static str, EvidencePointer)> {
    if file.role == FileRole::Doc || is_decision_document(&file.rel_path) {
        return Vec::new();
    }
    let mut hash: Option<String> = None;
    let mut hits = Vec::new();
    for compiled in compiled_topics() {
        let first = compiled
            .patterns
            .iter()
            .filter(|pattern| scope_applies(pattern.scope, file))
            .filter_map(|pattern| {
                pattern
                    .regex
                    .find(&file.content)
                    .map(|m| (m.start(), pattern.name))
            })
            .min_by_key(|(start, _)| *start);
        if let Some((start, name)) = first {
            let hash = hash.get_or_insert_with(|| content_hash(&file.content));
            hits.push((
                compiled.topic.key,
                EvidencePointer {
                    file: file.rel_path.clone(),
                    line: line_of(&file.content, start),
                    pattern: name.to_string(),
                    source_hash: Some(hash.clone()),
                },
            ));
        }
    }
    hits
}

fn merge(mut left: TopicHits, right: TopicHits) -> TopicHits {
    for (key, pointers) in right {
        left.entry(key).or_default().extend(pointers);
    }
    left
}

/// Evidence for every topic with at least one hit, keyed by topic.
fn collect_evidence(sources: &SourceSet) -> BTreeMap<&'static str, Vec<EvidencePointer>> {
    let hits: TopicHits = sources
        .files()
        .par_iter()
        .fold(TopicHits::new, |mut acc, file| {
            for (key, pointer) in scan_file(file) {
                acc.entry(key).or_default().insert(pointer);
            }
            acc
        })
        .reduce(TopicHits::new, merge);
    hits.into_iter()
        .map(|(key, pointers)| (key, pointers.into_iter().collect()))
        .collect()
}

fn synthesize(topic: &Topic, evidence: Vec<EvidencePointer>) -> Decision {
    let mut decision = Decision::new(
        format!("INF-{}", topic.key),
        topic.title,
        DecisionSource::Inferred,
    );
    decision.context = topic.context.to_string();
    decision.decision_text = topic.decision.to_string();
    decision.alternatives = topic.alternatives.iter().map(|s| s.to_string()).collect();
    decision.consequences = Consequences {
        positive: topic.positive.iter().map(|s| s.to_string()).collect(),
        negative: topic.negative.iter().map(|s| s.to_string()).collect(),
    };
    decision.evidence = evidence;
    decision.topic = Some(topic.key.to_string());
    decision.keywords = topic.keywords.iter().map(|s| s.to_string()).collect();
    confidence::scored(decision)
}

/// One inferred decision per topic with evidence, ordered by id.
pub fn infer_decisions(sources: &SourceSet) -> Vec<Decision> {
    let evidence = collect_evidence(sources);
    let mut decisions: Vec<Decision> = TOPICS
        .iter()
        .filter_map(|topic| {
            evidence
                .get(topic.key)
                .map(|pointers| synthesize(topic, pointers.clone()))
        })
        .collect();
    decisions.sort_by(|a, b| a.id.cmp(&b.id));
    log::info!(
        "Inferred {} decisions from {} topics with evidence",
        decisions.len(),
        evidence.len()
    );
    decisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(files: &[(&str, &str)]) -> SourceSet {
        SourceSet::from_files(
            "/project",
            files
                .iter()
                .map(|(path, content)| SourceFile::new(*path, *content))
                .collect(),
        )
    }

    #[test]
    fn aggregates_hits_per_topic() {
        let sources = set(&[
            ("Cargo.toml", "[dependencies]\ntokio-postgres = \"0.7\"\n"),
            ("src/db.rs", "// connect\nconst URL: &str = \"postgres://db/app\";\n"),
            ("src/other.rs", "let a = \"postgres://a\";\nlet b = \"postgres://b\";\n"),
            ("docker-compose.yml", "services:\n  db:\n    image: postgres:16\n"),
        ]);

        let decisions = infer_decisions(&sources);
        let postgres = decisions
            .iter()
            .find(|d| d.id == "INF-postgresql")
            .unwrap();

        assert_eq!(postgres.source, DecisionSource::Inferred);
        assert_eq!(postgres.evidence.len(), 4);
        assert_eq!(postgres.independent_hits(), 4);
        let other = postgres
            .evidence
            .iter()
            .find(|p| p.file == "src/other.rs")
            .unwrap();
        assert_eq!(other.line, 1);
        let db = postgres.evidence.iter().find(|p| p.file == "src/db.rs").unwrap();
        assert_eq!(db.line, 2);
        // 4 structural fields + 4 files
        assert_eq!(postgres.confidence, 0.6);
        assert!(postgres.keywords.contains(&"postgres".to_string()));
        assert!(decisions.iter().any(|d| d.id == "INF-docker"));
    }

    #[test]
    fn ignores_docs_and_decision_records() {
        let sources = set(&[
            ("README.md", "Run with postgres://localhost\n"),
            ("docs/adr/0001-db.md", "postgres://x\n"),
        ]);
        assert!(infer_decisions(&sources).is_empty());
    }

    #[test]
    fn manifest_patterns_only_apply_to_manifests() {
        let sources = set(&[("src/app.py", "import redis\n")]);
        assert!(infer_decisions(&sources).is_empty());

        let sources = set(&[("requirements.txt", "redis==5.0\n")]);
        let decisions = infer_decisions(&sources);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].id, "INF-redis");
    }

    #[test]
    fn content_hash_is_short_and_stable() {
        let hash = content_hash("abc");
        assert_eq!(hash, "ba7816bf8f01cfea");
        assert_eq!(hash.len(), HASH_HEX_LEN);
    }
}
