//! # Lore Scanner
//!
//! Project snapshot loading and language detection.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware)
//!     │      └─> Candidate paths
//!     │
//!     ├──> Source loader (parallel, read-only)
//!     │      └─> SourceSet (sorted by path)
//!     │
//!     └──> Language Detector
//!            └─> (language, framework?, confidence), best first
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use lore_scanner::{LanguageDetector, ScanOptions, SourceSet};
//!
//! fn main() -> lore_scanner::Result<()> {
//!     let sources = SourceSet::load("/path/to/project", &ScanOptions::default())?;
//!     for report in LanguageDetector::new().detect(&sources) {
//!         println!("{} {:.2}", report.language, report.confidence);
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod languages;
mod scanner;
mod source;
mod stats;

pub use error::{Result, ScanError};
pub use languages::{classify_path, FileRole, LanguageDetector, LanguageReport};
pub use scanner::{FileScanner, ScanOptions};
pub use source::{SourceFile, SourceSet};
pub use stats::ScanStats;
