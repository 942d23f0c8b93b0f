//! # Lore Pipeline
//!
//! Turns a project snapshot into a validated knowledge base.
//!
//! ## Stages
//!
//! ```text
//! project root
//!     │
//!     ├──> SourceSet + LanguageDetector
//!     ├──> DecisionExtractor ──> existing[] / inferred[]
//!     ├──> Reconciler ──> duplicate / enrich / new
//!     ├──> ComponentDetector ──> ThreatModeler (optional)
//!     ├──> TechDebtDetector
//!     ├──> GraphGenerator
//!     │
//!     ├──> ArtifactWriter (temp file + rename)
//!     │      ├─ corpus/graph.json
//!     │      ├─ corpus/nodes/decisions/*.yml
//!     │      ├─ references/adr_index.yml
//!     │      ├─ security/threat-model-inferred.yml
//!     │      └─ reports/{tech-debt-inferred,import-report}.md
//!     │
//!     ├──> ArtifactValidator (reads the output back)
//!     └──> Enhancer (LLM, time-boxed, complete runs only)
//! ```
//!
//! Each stage takes the [`ImportRun`] by value and returns an augmented copy.
//! Anomalies that do not abort the run are recorded as [`lore_protocol::RunFlag`]s.

pub mod artifacts;
pub mod config;
pub mod enhance;
pub mod issues;
mod pipeline;
pub mod report;
mod run;
pub mod validator;

pub use artifacts::OutputLayout;
pub use config::{LoreConfig, CONFIG_FILE_NAME};
pub use enhance::{EnhancementOutcome, Enhancer, OllamaSynthesizer, Synthesizer};
pub use pipeline::ImportPipeline;
pub use run::{FinalizedRun, ImportRun, RunMetadata, RunOptions, ThreatOutcome};
pub use validator::{ArtifactValidator, RunStatus, ValidationReport, Violation};
