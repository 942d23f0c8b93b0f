//! Partition existing and inferred decisions into duplicate / enrich / new.

use crate::error::{DecisionError, Result};
use crate::similarity::{Similarity, TokenOverlap};
use lore_protocol::{Decision, DecisionRecord, Supplement};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileThresholds {
    pub duplicate_threshold: f64,
    pub enrich_threshold: f64,
}

impl Default for ReconcileThresholds {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.8,
            enrich_threshold: 0.5,
        }
    }
}

impl ReconcileThresholds {
    pub fn validate(&self) -> Result<()> {
        let Self {
            duplicate_threshold: duplicate,
            enrich_threshold: enrich,
        } = *self;
        let ordered = enrich.is_finite()
            && duplicate.is_finite()
            && 0.0 <= enrich
            && enrich <= duplicate
            && duplicate <= 1.0;
        if ordered {
            Ok(())
        } else {
            Err(DecisionError::InvalidThresholds { enrich, duplicate })
        }
    }
}

/// An existing decision paired with the inferred decision it absorbed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub existing_id: String,
    pub inferred_id: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub duplicate: Vec<Match>,
    pub enrich: Vec<Match>,
    /// Inferred ids promoted to standalone records.
    pub new: Vec<String>,
    pub unmatched_existing: Vec<String>,
    pub existing_total: usize,
    pub inferred_total: usize,
    /// Existing decisions by id (enriched ones carry a supplement), then new inferred ones.
    #[serde(skip)]
    pub records: Vec<DecisionRecord>,
}

impl ReconciliationResult {
    pub fn summary(&self) -> ReconciliationSummary {
        ReconciliationSummary {
            duplicate: self.duplicate.len(),
            enrich: self.enrich.len(),
            new: self.new.len(),
            unmatched_existing: self.unmatched_existing.len(),
            existing_total: self.existing_total,
            inferred_total: self.inferred_total,
        }
    }

    /// Buckets that came out empty although both sides had input.
    pub fn empty_buckets(&self) -> Vec<&'static str> {
        if self.existing_total == 0 || self.inferred_total == 0 {
            return Vec::new();
        }
        [
            ("duplicate", self.duplicate.is_empty()),
            ("enrich", self.enrich.is_empty()),
            ("new", self.new.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect()
    }

    /// Check that every input id lands in exactly one bucket.
    pub fn verify(&self, existing: &[Decision], inferred: &[Decision]) -> Result<()> {
        let mut existing_seen: BTreeMap<&str, usize> = BTreeMap::new();
        for id in self
            .duplicate
            .iter()
            .chain(&self.enrich)
            .map(|m| m.existing_id.as_str())
            .chain(self.unmatched_existing.iter().map(String::as_str))
        {
            *existing_seen.entry(id).or_default() += 1;
        }
        let mut inferred_seen: BTreeMap<&str, usize> = BTreeMap::new();
        for id in self
            .duplicate
            .iter()
            .chain(&self.enrich)
            .map(|m| m.inferred_id.as_str())
            .chain(self.new.iter().map(String::as_str))
        {
            *inferred_seen.entry(id).or_default() += 1;
        }

        check_partition("existing", existing, &existing_seen)?;
        check_partition("inferred", inferred, &inferred_seen)?;

        let expected_records = existing.len() + self.new.len();
        if self.records.len() != expected_records {
            return Err(DecisionError::InvariantViolation(format!(
                "{} records for {} existing + {} new decisions",
                self.records.len(),
                existing.len(),
                self.new.len()
            )));
        }
        Ok(())
    }
}

fn check_partition(side: &str, inputs: &[Decision], seen: &BTreeMap<&str, usize>) -> Result<()> {
    if seen.len() != inputs.len() {
        return Err(DecisionError::InvariantViolation(format!(
            "{} {side} ids in buckets, {} {side} decisions in input",
            seen.len(),
            inputs.len()
        )));
    }
    for decision in inputs {
        match seen.get(decision.id.as_str()) {
            Some(1) => {}
            Some(n) => {
                return Err(DecisionError::InvariantViolation(format!(
                    "{side} decision {} appears in {n} buckets",
                    decision.id
                )))
            }
            None => {
                return Err(DecisionError::InvariantViolation(format!(
                    "{side} decision {} was dropped",
                    decision.id
                )))
            }
        }
    }
    Ok(())
}

/// Bucket counts persisted in the decision index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub duplicate: usize,
    pub enrich: usize,
    pub new: usize,
    pub unmatched_existing: usize,
    pub existing_total: usize,
    pub inferred_total: usize,
}

pub struct Reconciler<S = TokenOverlap> {
    thresholds: ReconcileThresholds,
    similarity: S,
}

impl Reconciler<TokenOverlap> {
    pub fn new(thresholds: ReconcileThresholds) -> Result<Self> {
        Self::with_similarity(thresholds, TokenOverlap)
    }
}

impl<S: Similarity> Reconciler<S> {
    pub fn with_similarity(thresholds: ReconcileThresholds, similarity: S) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            similarity,
        })
    }

    pub fn thresholds(&self) -> ReconcileThresholds {
        self.thresholds
    }

    pub fn reconcile(
        &self,
        existing: &[Decision],
        inferred: &[Decision],
    ) -> Result<ReconciliationResult> {
        ensure_unique(existing.iter().chain(inferred))?;

        // Thresholds apply to the raw score; only the reported similarity is rounded.
        let mut candidates: Vec<(f64, Match)> = existing
            .par_iter()
            .flat_map_iter(|e| {
                inferred.iter().filter_map(move |i| {
                    let score = self.similarity.score(e, i).clamp(0.0, 1.0);
                    (score >= self.thresholds.enrich_threshold).then(|| {
                        (
                            score,
                            Match {
                                existing_id: e.id.clone(),
                                inferred_id: i.id.clone(),
                                similarity: round4(score),
                            },
                        )
                    })
                })
            })
            .collect();
        candidates.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .total_cmp(score_a)
                .then_with(|| a.existing_id.cmp(&b.existing_id))
                .then_with(|| a.inferred_id.cmp(&b.inferred_id))
        });

        let mut result = ReconciliationResult {
            existing_total: existing.len(),
            inferred_total: inferred.len(),
            ..ReconciliationResult::default()
        };
        let mut claimed_existing = BTreeSet::new();
        let mut claimed_inferred = BTreeSet::new();
        for (score, candidate) in candidates {
            if claimed_existing.contains(&candidate.existing_id)
                || claimed_inferred.contains(&candidate.inferred_id)
            {
                continue;
            }
            claimed_existing.insert(candidate.existing_id.clone());
            claimed_inferred.insert(candidate.inferred_id.clone());
            if score >= self.thresholds.duplicate_threshold {
                result.duplicate.push(candidate);
            } else {
                result.enrich.push(candidate);
            }
        }
        result.duplicate.sort_by(|a, b| a.existing_id.cmp(&b.existing_id));
        result.enrich.sort_by(|a, b| a.existing_id.cmp(&b.existing_id));

        let mut existing_sorted: Vec<&Decision> = existing.iter().collect();
        existing_sorted.sort_by(|a, b| a.id.cmp(&b.id));
        let mut inferred_sorted: Vec<&Decision> = inferred.iter().collect();
        inferred_sorted.sort_by(|a, b| a.id.cmp(&b.id));

        result.unmatched_existing = existing_sorted
            .iter()
            .filter(|d| !claimed_existing.contains(&d.id))
            .map(|d| d.id.clone())
            .collect();
        result.new = inferred_sorted
            .iter()
            .filter(|d| !claimed_inferred.contains(&d.id))
            .map(|d| d.id.clone())
            .collect();

        let by_id: BTreeMap<&str, &Decision> =
            inferred.iter().map(|d| (d.id.as_str(), d)).collect();
        let enrich_for: BTreeMap<&str, &Match> = result
            .enrich
            .iter()
            .map(|m| (m.existing_id.as_str(), m))
            .collect();

        let mut records = Vec::with_capacity(existing.len() + result.new.len());
        for decision in &existing_sorted {
            let supplement = enrich_for.get(decision.id.as_str()).and_then(|m| {
                by_id.get(m.inferred_id.as_str()).map(|source| Supplement {
                    inferred_id: source.id.clone(),
                    similarity: m.similarity,
                    evidence: source.evidence.clone(),
                    alternatives: source.alternatives.clone(),
                    consequences: source.consequences.clone(),
                })
            });
            records.push(DecisionRecord {
                decision: (*decision).clone(),
                supplement,
            });
        }
        for id in &result.new {
            if let Some(decision) = by_id.get(id.as_str()) {
                records.push(DecisionRecord {
                    decision: (*decision).clone(),
                    supplement: None,
                });
            }
        }
        result.records = records;

        result.verify(existing, inferred)?;
        log::info!(
            "Reconciled {} existing / {} inferred: duplicate={} enrich={} new={} unmatched_existing={}",
            existing.len(),
            inferred.len(),
            result.duplicate.len(),
            result.enrich.len(),
            result.new.len(),
            result.unmatched_existing.len()
        );
        Ok(result)
    }
}

/// Ids are unique across both sides; a new inferred decision lands next to the existing ones.
fn ensure_unique<'a>(decisions: impl Iterator<Item = &'a Decision>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for decision in decisions {
        if !seen.insert(decision.id.as_str()) {
            return Err(DecisionError::DuplicateId(decision.id.clone()));
        }
    }
    Ok(())
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_protocol::{DecisionSource, EvidencePointer};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Similarity looked up from a fixed table; missing pairs score zero.
    struct Table(HashMap<(String, String), f64>);

    impl Table {
        fn new(entries: &[(&str, &str, f64)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(e, i, s)| ((e.to_string(), i.to_string()), *s))
                    .collect(),
            )
        }
    }

    impl Similarity for Table {
        fn score(&self, existing: &Decision, inferred: &Decision) -> f64 {
            self.0
                .get(&(existing.id.clone(), inferred.id.clone()))
                .copied()
                .unwrap_or(0.0)
        }
    }

    fn existing(id: &str) -> Decision {
        let mut d = Decision::new(id, id, DecisionSource::Existing);
        d.context = "c".to_string();
        d.decision_text = "d".to_string();
        d
    }

    fn inferred(id: &str) -> Decision {
        let mut d = Decision::new(id, id, DecisionSource::Inferred);
        d.alternatives = vec![format!("alt for {id}")];
        d.evidence = vec![EvidencePointer {
            file: format!("src/{id}.rs"),
            line: 1,
            pattern: "p".to_string(),
            source_hash: None,
        }];
        d
    }

    #[test]
    fn thresholds_validate_ordering() {
        assert!(ReconcileThresholds::default().validate().is_ok());
        let bad = ReconcileThresholds {
            duplicate_threshold: 0.4,
            enrich_threshold: 0.5,
        };
        assert!(matches!(
            bad.validate(),
            Err(DecisionError::InvalidThresholds { .. })
        ));
        let nan = ReconcileThresholds {
            duplicate_threshold: f64::NAN,
            enrich_threshold: 0.5,
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn ten_existing_fifteen_inferred() {
        let existing: Vec<Decision> = (1..=10).map(|n| existing(&format!("ADR-{n:04}"))).collect();
        let inferred: Vec<Decision> = (1..=15).map(|n| inferred(&format!("INF-{n:02}"))).collect();
        let table = Table::new(&[
            ("ADR-0001", "INF-01", 0.95),
            ("ADR-0002", "INF-02", 0.85),
            ("ADR-0003", "INF-03", 0.8),
            ("ADR-0004", "INF-04", 0.7),
            ("ADR-0005", "INF-05", 0.5),
            ("ADR-0006", "INF-06", 0.49),
        ]);
        let reconciler =
            Reconciler::with_similarity(ReconcileThresholds::default(), table).unwrap();

        let result = reconciler.reconcile(&existing, &inferred).unwrap();
        let summary = result.summary();

        assert_eq!(summary.duplicate, 3);
        assert_eq!(summary.enrich, 2);
        assert_eq!(summary.new, 10);
        assert_eq!(summary.unmatched_existing, 5);
        assert_eq!(result.records.len(), 20);
        assert!(result.new.contains(&"INF-06".to_string()));
        assert!(result.empty_buckets().is_empty());

        let enriched = result
            .records
            .iter()
            .find(|r| r.id() == "ADR-0004")
            .unwrap();
        let supplement = enriched.supplement.as_ref().unwrap();
        assert_eq!(supplement.inferred_id, "INF-04");
        assert_eq!(supplement.alternatives, vec!["alt for INF-04"]);
        assert_eq!(enriched.decision, existing[3]);

        let duplicate = result.records.iter().find(|r| r.id() == "ADR-0001").unwrap();
        assert!(duplicate.supplement.is_none());
    }

    #[test]
    fn inferred_candidate_is_claimed_once() {
        let existing = vec![existing("ADR-0001"), existing("ADR-0002")];
        let inferred = vec![inferred("INF-a"), inferred("INF-b")];
        let table = Table::new(&[
            ("ADR-0001", "INF-a", 0.9),
            ("ADR-0002", "INF-a", 0.95),
            ("ADR-0001", "INF-b", 0.6),
        ]);
        let result = Reconciler::with_similarity(ReconcileThresholds::default(), table)
            .unwrap()
            .reconcile(&existing, &inferred)
            .unwrap();

        assert_eq!(
            result.duplicate,
            vec![Match {
                existing_id: "ADR-0002".to_string(),
                inferred_id: "INF-a".to_string(),
                similarity: 0.95,
            }]
        );
        assert_eq!(result.enrich.len(), 1);
        assert_eq!(result.enrich[0].existing_id, "ADR-0001");
        assert_eq!(result.enrich[0].inferred_id, "INF-b");
        assert!(result.new.is_empty());
        assert_eq!(result.empty_buckets(), vec!["new"]);
    }

    #[test]
    fn empty_inputs_produce_empty_result() {
        let result = Reconciler::new(ReconcileThresholds::default())
            .unwrap()
            .reconcile(&[], &[])
            .unwrap();
        assert_eq!(result.summary(), ReconciliationSummary::default());
        assert!(result.records.is_empty());
        assert!(result.empty_buckets().is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let existing = vec![existing("ADR-0001"), existing("ADR-0001")];
        let err = Reconciler::new(ReconcileThresholds::default())
            .unwrap()
            .reconcile(&existing, &[])
            .unwrap_err();
        assert!(matches!(err, DecisionError::DuplicateId(id) if id == "ADR-0001"));
    }

    #[test]
    fn scores_just_below_a_threshold_stay_below_it() {
        let table = Table::new(&[
            ("ADR-0001", "INF-01", 0.79996),
            ("ADR-0002", "INF-02", 0.49996),
        ]);
        let result = Reconciler::with_similarity(ReconcileThresholds::default(), table)
            .unwrap()
            .reconcile(
                &[existing("ADR-0001"), existing("ADR-0002")],
                &[inferred("INF-01"), inferred("INF-02")],
            )
            .unwrap();
        assert!(result.duplicate.is_empty());
        assert_eq!(
            result.enrich,
            vec![Match {
                existing_id: "ADR-0001".to_string(),
                inferred_id: "INF-01".to_string(),
                similarity: 0.8,
            }]
        );
        assert_eq!(result.new, vec!["INF-02"]);
        assert_eq!(result.unmatched_existing, vec!["ADR-0002"]);
    }

    #[test]
    fn id_shared_across_sides_is_rejected() {
        let err = Reconciler::new(ReconcileThresholds::default())
            .unwrap()
            .reconcile(&[existing("INF-redis")], &[inferred("INF-redis")])
            .unwrap_err();
        assert!(matches!(err, DecisionError::DuplicateId(id) if id == "INF-redis"));
    }

    #[test]
    fn verify_detects_dropped_decision() {
        let existing = vec![existing("ADR-0001")];
        let result = ReconciliationResult::default();
        assert!(matches!(
            result.verify(&existing, &[]),
            Err(DecisionError::InvariantViolation(_))
        ));
    }

    #[test]
    fn token_overlap_end_to_end() {
        let mut adr = existing("ADR-0001");
        adr.title = "Use PostgreSQL for persistence".to_string();
        adr.decision_text = "We will store data in PostgreSQL.".to_string();
        let mut inf = inferred("INF-postgresql");
        inf.title = "Use PostgreSQL as the relational datastore".to_string();
        inf.decision_text = "Store relational data in PostgreSQL.".to_string();
        inf.keywords = vec!["postgresql".to_string()];
        let other = inferred("INF-kafka");

        let result = Reconciler::new(ReconcileThresholds::default())
            .unwrap()
            .reconcile(&[adr], &[inf, other])
            .unwrap();
        assert_eq!(result.duplicate.len(), 1);
        assert_eq!(result.new, vec!["INF-kafka".to_string()]);
    }
}
