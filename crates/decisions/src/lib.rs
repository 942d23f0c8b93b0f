//! Decision extraction and reconciliation.
//!
//! Two independent sources feed the decision set:
//! - human-authored decision records found by filename/location convention
//! - technology choices inferred from manifests, code idioms and infrastructure files
//!
//! Both are scored with the same deterministic confidence formula, then the
//! [`Reconciler`] partitions them into duplicate / enrich / new buckets.

pub mod catalogue;
pub mod confidence;
mod document;
mod error;
mod extractor;
mod infer;
mod reconcile;
pub mod similarity;

pub use document::{is_decision_document, parse_decision_document};
pub use error::{DecisionError, Result};
pub use extractor::{record_file_name, DecisionExtractor, ExtractionOutput, ParseFailure};
pub use infer::infer_decisions;
pub use reconcile::{
    Match, ReconcileThresholds, ReconciliationResult, ReconciliationSummary, Reconciler,
};
pub use similarity::{Similarity, TokenOverlap};
