use crate::component::{Component, DataFlow};
use crate::decision::EvidencePointer;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// STRIDE-style threat taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    Spoofing,
    Tampering,
    Repudiation,
    InformationDisclosure,
    DenialOfService,
    ElevationOfPrivilege,
}

impl ThreatCategory {
    pub const ALL: [Self; 6] = [
        Self::Spoofing,
        Self::Tampering,
        Self::Repudiation,
        Self::InformationDisclosure,
        Self::DenialOfService,
        Self::ElevationOfPrivilege,
    ];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Spoofing => "S",
            Self::Tampering => "T",
            Self::Repudiation => "R",
            Self::InformationDisclosure => "I",
            Self::DenialOfService => "D",
            Self::ElevationOfPrivilege => "E",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spoofing => "spoofing",
            Self::Tampering => "tampering",
            Self::Repudiation => "repudiation",
            Self::InformationDisclosure => "information_disclosure",
            Self::DenialOfService => "denial_of_service",
            Self::ElevationOfPrivilege => "elevation_of_privilege",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Bucket a 1–10 score: `>= 8` critical, `>= 6` high, `>= 4` medium, else low.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            Self::Critical
        } else if score >= 6.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Five severity inputs, each on a 1–10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreadScore {
    pub damage: u8,
    pub reproducibility: u8,
    pub exploitability: u8,
    pub affected: u8,
    pub discoverability: u8,
}

impl DreadScore {
    pub fn new(
        damage: u8,
        reproducibility: u8,
        exploitability: u8,
        affected: u8,
        discoverability: u8,
    ) -> Result<Self> {
        let score = Self {
            damage,
            reproducibility,
            exploitability,
            affected,
            discoverability,
        };
        if let Some(bad) = score.inputs().into_iter().find(|v| !(1..=10).contains(v)) {
            bail!("severity input {bad} is outside 1..=10");
        }
        Ok(score)
    }

    #[must_use]
    pub const fn inputs(&self) -> [u8; 5] {
        [
            self.damage,
            self.reproducibility,
            self.exploitability,
            self.affected,
            self.discoverability,
        ]
    }

    /// Weighted average of the five inputs. Non-positive total weight falls back to equal
    /// weighting.
    #[must_use]
    pub fn weighted_average(&self, weights: &[f64; 5]) -> f64 {
        let total: f64 = weights.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return self.weighted_average(&[1.0; 5]);
        }
        let sum: f64 = self
            .inputs()
            .iter()
            .zip(weights)
            .map(|(value, weight)| f64::from(*value) * weight)
            .sum();
        sum / total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationStatus {
    Unmitigated,
    Partial,
    Mitigated,
}

impl MitigationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unmitigated => "unmitigated",
            Self::Partial => "partial",
            Self::Mitigated => "mitigated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatFinding {
    pub id: String,
    pub category: ThreatCategory,
    pub component_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_decision_id: Option<String>,
    pub title: String,
    pub rule: String,
    pub dread: DreadScore,
    pub score: f64,
    pub severity: Severity,
    pub mitigation_status: MitigationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigated_by: Option<String>,
    #[serde(default)]
    pub evidence: Vec<EvidencePointer>,
}

impl ThreatFinding {
    #[must_use]
    pub fn is_unresolved_critical(&self) -> bool {
        self.severity == Severity::Critical
            && self.mitigation_status != MitigationStatus::Mitigated
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CoverageOutcome {
    Finding { finding_ids: Vec<String> },
    NoFinding,
}

/// Record that a (component, category) pair was analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCoverage {
    pub component_id: String,
    pub category: ThreatCategory,
    #[serde(flatten)]
    pub outcome: CoverageOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreatModel {
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub data_flows: Vec<DataFlow>,
    #[serde(default)]
    pub findings: Vec<ThreatFinding>,
    #[serde(default)]
    pub coverage: Vec<CategoryCoverage>,
}

impl ThreatModel {
    #[must_use]
    pub fn unresolved_critical(&self) -> Vec<&ThreatFinding> {
        self.findings
            .iter()
            .filter(|f| f.is_unresolved_critical())
            .collect()
    }

    /// `(component_id, category)` pairs that have no coverage record.
    #[must_use]
    pub fn coverage_gaps(&self) -> Vec<(String, ThreatCategory)> {
        let mut gaps = Vec::new();
        for component in &self.components {
            for category in ThreatCategory::ALL {
                let covered = self
                    .coverage
                    .iter()
                    .any(|c| c.component_id == component.id && c.category == category);
                if !covered {
                    gaps.push((component.id.clone(), category));
                }
            }
        }
        gaps
    }
}
