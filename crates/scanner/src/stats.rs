use crate::languages::FileRole;
use crate::source::SourceFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics about a loaded snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Number of files loaded
    pub files: usize,

    /// Files classified as code
    pub code_files: usize,

    /// Total lines across code files
    pub code_lines: usize,

    pub total_bytes: u64,

    /// Files dropped because they were not valid UTF-8
    pub skipped_binary: usize,

    /// Code files per language
    pub languages: BTreeMap<String, usize>,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, file: &SourceFile) {
        self.files += 1;
        self.total_bytes += file.bytes;
        if file.role == FileRole::Code {
            self.code_files += 1;
            self.code_lines += file.line_count();
            if let Some(language) = file.language {
                *self.languages.entry(language.to_string()).or_insert(0) += 1;
            }
        }
    }
}
