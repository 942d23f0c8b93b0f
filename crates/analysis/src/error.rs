use lore_protocol::ThreatCategory;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid debt marker '{name}': {source}")]
    InvalidMarker {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid severity weights: {0}")]
    InvalidWeights(String),

    #[error("Component depth must be at least 1")]
    InvalidDepth,

    #[error("Threat coverage missing for {component_id} / {category:?}")]
    CoverageGap {
        component_id: String,
        category: ThreatCategory,
    },

    #[error("Duplicate threat finding id {0}")]
    DuplicateFinding(String),
}
