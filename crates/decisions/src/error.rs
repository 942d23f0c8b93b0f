use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecisionError>;

#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("Invalid reconciliation thresholds: enrich={enrich}, duplicate={duplicate} (need 0 <= enrich <= duplicate <= 1)")]
    InvalidThresholds { enrich: f64, duplicate: f64 },

    #[error("{path}: missing required section '{section}'")]
    MissingSection { path: String, section: &'static str },

    #[error("Duplicate decision id: {0}")]
    DuplicateId(String),

    #[error("Reconciliation invariant violated: {0}")]
    InvariantViolation(String),
}
