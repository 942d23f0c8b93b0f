use serde::{Deserialize, Serialize};

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Parsed from a human-authored decision document.
    Existing,
    /// Synthesized from code/config evidence.
    Inferred,
}

impl DecisionSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Existing => "existing",
            Self::Inferred => "inferred",
        }
    }
}

/// Evidence pointer: minimal, verifiable reference to the material backing a claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvidencePointer {
    /// Repo-relative path, `/`-separated.
    pub file: String,
    /// 1-indexed line of the first hit (0 for file-level evidence).
    pub line: usize,
    /// Name of the pattern or keyword that matched.
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consequences {
    #[serde(default)]
    pub positive: Vec<String>,
    #[serde(default)]
    pub negative: Vec<String>,
}

impl Consequences {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }
}

/// A candidate architectural decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub title: String,
    pub source: DecisionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub decision_text: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub consequences: Consequences,
    /// Normalized [0,1] support score.
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<EvidencePointer>,
    /// Document the decision was parsed from (existing decisions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Technology topic key (inferred decisions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Terms that identify the decision's subject for similarity matching.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Ids of decisions this one replaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supersedes: Vec<String>,
    /// Ids of decisions that replace this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub superseded_by: Vec<String>,
}

impl Decision {
    /// An empty decision with zero confidence.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: DecisionSource) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source,
            status: None,
            context: String::new(),
            decision_text: String::new(),
            alternatives: Vec::new(),
            consequences: Consequences::default(),
            confidence: 0.0,
            evidence: Vec::new(),
            origin: None,
            topic: None,
            keywords: Vec::new(),
            supersedes: Vec::new(),
            superseded_by: Vec::new(),
        }
    }

    /// Number of populated structural fields among context, decision, alternatives and
    /// consequences.
    #[must_use]
    pub fn structural_fields(&self) -> usize {
        [
            !self.context.trim().is_empty(),
            !self.decision_text.trim().is_empty(),
            !self.alternatives.is_empty(),
            !self.consequences.is_empty(),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count()
    }

    /// Number of distinct files backing this decision.
    #[must_use]
    pub fn independent_hits(&self) -> usize {
        let mut files: Vec<&str> = self.evidence.iter().map(|e| e.file.as_str()).collect();
        files.sort_unstable();
        files.dedup();
        files.len()
    }
}

/// Inferred material attached to an existing decision during reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplement {
    pub inferred_id: String,
    pub similarity: f64,
    #[serde(default)]
    pub evidence: Vec<EvidencePointer>,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub consequences: Consequences,
}

/// A decision as persisted under `corpus/nodes/decisions/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    #[serde(flatten)]
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplement: Option<Supplement>,
}

impl DecisionRecord {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.decision.id
    }

    /// Decision text, then context, then any supplement, joined for keyword searches.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        let mut text = format!(
            "{}\n{}\n{}",
            self.decision.title, self.decision.decision_text, self.decision.context
        );
        for item in self
            .decision
            .consequences
            .positive
            .iter()
            .chain(&self.decision.consequences.negative)
        {
            text.push('\n');
            text.push_str(item);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pointer(file: &str, line: usize) -> EvidencePointer {
        EvidencePointer {
            file: file.to_string(),
            line,
            pattern: "postgres".to_string(),
            source_hash: None,
        }
    }

    fn bare(source: DecisionSource) -> Decision {
        Decision::new("ADR-0001", "Use PostgreSQL", source)
    }

    #[test]
    fn structural_fields_counts_only_populated_sections() {
        let mut decision = bare(DecisionSource::Existing);
        assert_eq!(decision.structural_fields(), 0);

        decision.context = "  \n".to_string();
        assert_eq!(decision.structural_fields(), 0);

        decision.context = "We need durable storage".to_string();
        decision.consequences.negative.push("Ops burden".to_string());
        assert_eq!(decision.structural_fields(), 2);
    }

    #[test]
    fn independent_hits_counts_distinct_files() {
        let mut decision = bare(DecisionSource::Inferred);
        decision.evidence = vec![
            pointer("Cargo.toml", 12),
            pointer("src/db.rs", 3),
            pointer("src/db.rs", 40),
        ];
        assert_eq!(decision.independent_hits(), 2);
    }

    #[test]
    fn record_flattens_decision_fields() {
        let record = DecisionRecord {
            decision: bare(DecisionSource::Existing),
            supplement: None,
        };
        let yaml = serde_yaml::to_string(&record).unwrap();
        assert!(yaml.contains("id: ADR-0001"));
        assert!(yaml.contains("source: existing"));
        assert!(!yaml.contains("supplement"));

        let back: DecisionRecord = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, record);
    }
}
