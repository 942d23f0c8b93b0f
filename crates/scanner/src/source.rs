use crate::error::{Result, ScanError};
use crate::languages::{classify_path, FileRole};
use crate::scanner::{FileScanner, ScanOptions};
use crate::stats::ScanStats;
use lore_protocol::path_filters::normalize_relative_path;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// One read-only file of the project snapshot.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Repo-relative, `/`-separated path.
    pub rel_path: String,
    pub language: Option<&'static str>,
    pub role: FileRole,
    pub bytes: u64,
    pub content: String,
}

impl SourceFile {
    pub fn new(rel_path: impl Into<String>, content: impl Into<String>) -> Self {
        let rel_path = rel_path.into();
        let content = content.into();
        let (language, role) = classify_path(&rel_path);
        Self {
            bytes: content.len() as u64,
            rel_path,
            language,
            role,
            content,
        }
    }

    pub fn file_name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }

    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }

    /// Iterate `(1-indexed line number, line)`.
    pub fn numbered_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.content.lines().enumerate().map(|(idx, line)| (idx + 1, line))
    }
}

/// Immutable snapshot of a project tree, sorted by path.
#[derive(Debug, Clone)]
pub struct SourceSet {
    root: PathBuf,
    files: Vec<SourceFile>,
    stats: ScanStats,
}

impl SourceSet {
    /// Scan and read `root`. Per-file reads run in parallel; the result does not depend on
    /// scheduling order. Non-UTF-8 files are skipped, any other read failure is fatal.
    pub fn load(root: impl AsRef<Path>, options: &ScanOptions) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ScanError::InvalidPath(format!(
                "Path does not exist or is not a directory: {}",
                root.display()
            )));
        }
        // Surfaces permission errors on the root itself before the walker swallows them.
        std::fs::read_dir(&root)?;

        let paths = FileScanner::with_options(&root, options.clone()).scan();
        let loaded: Vec<Option<SourceFile>> = paths
            .par_iter()
            .map(|path| read_source(&root, path))
            .collect::<Result<_>>()?;

        let skipped = loaded.iter().filter(|file| file.is_none()).count();
        let files: Vec<SourceFile> = loaded.into_iter().flatten().collect();
        Ok(Self::from_parts(root, files, skipped))
    }

    /// Build a snapshot from in-memory files (used by tests and tooling).
    pub fn from_files(root: impl AsRef<Path>, files: Vec<SourceFile>) -> Self {
        Self::from_parts(root.as_ref().to_path_buf(), files, 0)
    }

    fn from_parts(root: PathBuf, mut files: Vec<SourceFile>, skipped: usize) -> Self {
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        let mut stats = ScanStats::new();
        for file in &files {
            stats.add_file(file);
        }
        stats.skipped_binary = skipped;
        log::info!(
            "Loaded {} files ({} code, {} bytes, {} skipped)",
            stats.files,
            stats.code_files,
            stats.total_bytes,
            stats.skipped_binary
        );
        Self { root, files, stats }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn code_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter().filter(|f| f.role == FileRole::Code)
    }

    pub fn get(&self, rel_path: &str) -> Option<&SourceFile> {
        self.files
            .binary_search_by(|f| f.rel_path.as_str().cmp(rel_path))
            .ok()
            .map(|idx| &self.files[idx])
    }
}

fn read_source(root: &Path, path: &Path) -> Result<Option<SourceFile>> {
    let Some(rel_path) = normalize_relative_path(root, path) else {
        return Ok(None);
    };
    let bytes = std::fs::read(path).map_err(|source| ScanError::ReadFailed {
        path: rel_path.clone(),
        source,
    })?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(Some(SourceFile::new(rel_path, content))),
        Err(_) => {
            log::debug!("Skipping non-UTF-8 file {rel_path}");
            Ok(None)
        }
    }
}
