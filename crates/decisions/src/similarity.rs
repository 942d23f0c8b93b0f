//! Pluggable text similarity between two decisions.

use lore_protocol::Decision;
use std::collections::BTreeSet;

const STOPWORDS: &[&str] = &[
    "a", "all", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is",
    "it", "its", "of", "on", "or", "our", "shall", "should", "that", "the", "this", "to", "use",
    "used", "using", "we", "will", "with",
];

const TITLE_TOPIC_SCORE: f64 = 0.6;
const BODY_TOPIC_SCORE: f64 = 0.4;
const TOPIC_DICE_WEIGHT: f64 = 0.4;

/// Similarity between an existing and an inferred decision, in `[0, 1]`.
pub trait Similarity: Send + Sync {
    fn score(&self, existing: &Decision, inferred: &Decision) -> f64;
}

/// Token-overlap similarity boosted by topic keywords.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlap;

impl Similarity for TokenOverlap {
    fn score(&self, existing: &Decision, inferred: &Decision) -> f64 {
        let a = DecisionTokens::new(existing);
        let b = DecisionTokens::new(inferred);
        let dice = dice(&a.all, &b.all);
        let topic = topic_score(&inferred.keywords, &a).max(topic_score(&existing.keywords, &b));
        let boosted = if topic > 0.0 {
            topic + TOPIC_DICE_WEIGHT * dice
        } else {
            0.0
        };
        dice.max(boosted).clamp(0.0, 1.0)
    }
}

struct DecisionTokens {
    title: BTreeSet<String>,
    all: BTreeSet<String>,
}

impl DecisionTokens {
    fn new(decision: &Decision) -> Self {
        let title = tokenize(&decision.title);
        let mut all = title.clone();
        all.extend(tokenize(&decision.decision_text));
        Self { title, all }
    }
}

/// Lowercased alphanumeric tokens with stopwords removed.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .collect()
}

fn dice(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    (2 * shared) as f64 / total as f64
}

fn topic_score(keywords: &[String], other: &DecisionTokens) -> f64 {
    let mut best = 0.0_f64;
    for keyword in keywords {
        let parts = tokenize(keyword);
        if parts.is_empty() {
            continue;
        }
        if parts.is_subset(&other.title) {
            return TITLE_TOPIC_SCORE;
        }
        if parts.is_subset(&other.all) {
            best = best.max(BODY_TOPIC_SCORE);
        }
    }
    best
}
