//! `lore.toml` configuration. Every field has a default; unknown keys are rejected.

use anyhow::{bail, Context, Result};
use lore_analysis::{DebtConfig, ThreatConfig};
use lore_decisions::ReconcileThresholds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "lore.toml";
pub const DEFAULT_OUTPUT_ROOT: &str = ".project";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoreConfig {
    /// Output directory; relative paths are resolved against the project root.
    pub output_root: PathBuf,
    pub reconcile: ReconcileThresholds,
    pub validator: ValidatorConfig,
    pub threats: ThreatConfig,
    pub debt: DebtConfig,
    pub components: ComponentsConfig,
    pub scan: ScanConfig,
    pub llm: LlmConfig,
    pub issues: IssuesConfig,
}

impl Default for LoreConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            reconcile: ReconcileThresholds::default(),
            validator: ValidatorConfig::default(),
            threats: ThreatConfig::default(),
            debt: DebtConfig::default(),
            components: ComponentsConfig::default(),
            scan: ScanConfig::default(),
            llm: LlmConfig::default(),
            issues: IssuesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Share of decisions that must carry a usable confidence score.
    pub min_confidence_coverage: f64,
    /// Minimum confidence for a decision to count as covered.
    pub min_decision_confidence: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_confidence_coverage: 0.8,
            min_decision_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComponentsConfig {
    pub depth: usize,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            depth: lore_analysis::DEFAULT_COMPONENT_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_decisions: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            timeout_ms: 20_000,
            max_decisions: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IssuesConfig {
    pub enabled: bool,
    /// Decisions below this confidence get an issue draft.
    pub low_confidence_threshold: f64,
}

impl Default for IssuesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            low_confidence_threshold: 0.5,
        }
    }
}

impl LoreConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Invalid lore configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given (it must exist), else `<project_root>/lore.toml` if present,
    /// else defaults.
    pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = project_root.join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    log::debug!("No {CONFIG_FILE_NAME} in {}; using defaults", project_root.display());
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Failed to load config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        self.reconcile.validate()?;
        self.threats.validate()?;
        if self.components.depth == 0 {
            bail!("components.depth must be at least 1");
        }
        let ValidatorConfig {
            min_confidence_coverage,
            min_decision_confidence,
        } = self.validator;
        for (name, value) in [
            ("validator.min_confidence_coverage", min_confidence_coverage),
            ("validator.min_decision_confidence", min_decision_confidence),
            (
                "issues.low_confidence_threshold",
                self.issues.low_confidence_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{name} must be within [0, 1], got {value}");
            }
        }
        if self.llm.enabled && self.llm.endpoint.trim().is_empty() {
            bail!("llm.endpoint must be set when llm.enabled is true");
        }
        Ok(())
    }

    /// Absolute output directory for `project_root`.
    pub fn output_dir(&self, project_root: &Path) -> PathBuf {
        if self.output_root.is_absolute() {
            self.output_root.clone()
        } else {
            project_root.join(&self.output_root)
        }
    }
}
