//! Deterministic confidence scoring.
//!
//! The score is a weighted sum computed in whole units of 0.05 so that identical input
//! always yields bit-identical output:
//!
//! | term | weight | cap |
//! |---|---|---|
//! | existing (human-authored) source | 0.40 | |
//! | each populated structural field (context, decision, alternatives, consequences) | 0.10 | 0.40 |
//! | each independent evidence file (inferred only) | 0.05 | 0.30 |

use lore_protocol::{Decision, DecisionSource};

const UNITS_PER_POINT: u32 = 20;
const EXISTING_UNITS: u32 = 8;
const FIELD_UNITS: u32 = 2;
const MAX_FIELDS: u32 = 4;
const HIT_UNITS: u32 = 1;
const MAX_HITS: u32 = 6;

pub fn score(decision: &Decision) -> f64 {
    let mut units = 0u32;
    if decision.source == DecisionSource::Existing {
        units += EXISTING_UNITS;
    }
    let fields = u32::try_from(decision.structural_fields()).unwrap_or(MAX_FIELDS);
    units += FIELD_UNITS * fields.min(MAX_FIELDS);
    if decision.source == DecisionSource::Inferred {
        let hits = u32::try_from(decision.independent_hits()).unwrap_or(MAX_HITS);
        units += HIT_UNITS * hits.min(MAX_HITS);
    }
    (f64::from(units) / f64::from(UNITS_PER_POINT)).clamp(0.0, 1.0)
}

/// Return `decision` with its confidence filled in.
pub fn scored(mut decision: Decision) -> Decision {
    decision.confidence = score(&decision);
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_protocol::EvidencePointer;

    fn decision(source: DecisionSource) -> Decision {
        Decision::new("X", "X", source)
    }

    fn hits(n: usize) -> Vec<EvidencePointer> {
        (0..n)
            .map(|i| EvidencePointer {
                file: format!("src/f{i}.rs"),
                line: 1,
                pattern: "p".to_string(),
                source_hash: None,
            })
            .collect()
    }

    #[test]
    fn existing_with_context_and_decision() {
        let mut d = decision(DecisionSource::Existing);
        d.context = "c".to_string();
        d.decision_text = "d".to_string();
        assert_eq!(score(&d), 0.6);
    }

    #[test]
    fn fully_populated_existing_caps_at_point_eight() {
        let mut d = decision(DecisionSource::Existing);
        d.context = "c".to_string();
        d.decision_text = "d".to_string();
        d.alternatives = vec!["a".to_string()];
        d.consequences.positive = vec!["p".to_string()];
        d.evidence = hits(10);
        assert_eq!(score(&d), 0.8);
    }

    #[test]
    fn inferred_hits_are_capped() {
        let mut d = decision(DecisionSource::Inferred);
        d.context = "c".to_string();
        d.decision_text = "d".to_string();
        d.alternatives = vec!["a".to_string()];
        d.consequences.negative = vec!["n".to_string()];
        d.evidence = hits(3);
        assert_eq!(score(&d), 0.55);
        d.evidence = hits(40);
        assert_eq!(score(&d), 0.7);
    }

    #[test]
    fn same_file_hits_count_once() {
        let mut d = decision(DecisionSource::Inferred);
        d.evidence = hits(1);
        d.evidence.push(d.evidence[0].clone());
        assert_eq!(score(&d), 0.05);
    }

    #[test]
    fn empty_inferred_is_zero() {
        assert_eq!(score(&decision(DecisionSource::Inferred)), 0.0);
    }
}
