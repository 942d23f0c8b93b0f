use ignore::WalkBuilder;
use lore_protocol::path_filters::{normalize_relative_path, path_excluded};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Repo-relative prefixes or glob patterns to leave out (the output root goes here).
    pub exclude: Vec<String>,
    pub max_file_bytes: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            max_file_bytes: MAX_FILE_SIZE_BYTES,
        }
    }
}

/// Scanner for finding source, config and decision files in a project
pub struct FileScanner {
    root: PathBuf,
    options: ScanOptions,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_options(root, ScanOptions::default())
    }

    pub fn with_options(root: impl AsRef<Path>, options: ScanOptions) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            options,
        }
    }

    /// Scan directory for candidate files (.gitignore aware), sorted by path
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let exclude = self.options.exclude.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false);
        builder.filter_entry(move |entry| {
            if FileScanner::is_ignored_scope(entry.path(), &root) {
                return false;
            }
            match normalize_relative_path(&root, entry.path()) {
                Some(rel) if !rel.is_empty() => !path_excluded(&rel, &exclude),
                _ => true,
            }
        });

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.options.max_file_bytes {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.options.max_file_bytes
                            );
                            continue;
                        }
                    }

                    if Self::is_noise_file(path) {
                        log::debug!("Skipping noisy artifact {}", path.display());
                        continue;
                    }

                    if !Self::is_candidate_file(path) {
                        continue;
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} candidate files", files.len());
        files
    }

    fn is_candidate_file(path: &Path) -> bool {
        if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
            if file_name.starts_with("Dockerfile")
                || matches!(
                    file_name,
                    "Makefile"
                        | "makefile"
                        | "Justfile"
                        | "Gemfile"
                        | "Jenkinsfile"
                        | "Procfile"
                        | "Pipfile"
                        | "go.mod"
                )
            {
                return true;
            }
        }

        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            let ext = ext.to_lowercase();
            return SUPPORTED_EXTENSIONS
                .iter()
                .any(|candidate| candidate == &ext);
        }

        false
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    let lowered = name.to_string_lossy().to_lowercase();
                    if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn is_noise_file(path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if NOISE_FILE_NAMES
                .iter()
                .any(|candidate| name.eq_ignore_ascii_case(candidate))
            {
                return true;
            }
            if name.ends_with(".min.js") || name.ends_with(".map") {
                return true;
            }
        }

        false
    }
}

const IGNORED_SCOPES: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    ".yarn",
    ".npm",
    // caches / builds
    ".cache",
    "node_modules",
    ".next",
    ".turbo",
    ".parcel-cache",
    ".output",
    "build",
    "dist",
    "coverage",
    "storybook-static",
    ".nuxt",
    ".vite",
    ".svelte-kit",
    "target",
    ".terraform",
    ".venv",
    "venv",
    // vendored code is somebody else's decisions
    "vendor",
    "third_party",
    "third-party",
    "__pycache__",
];

const NOISE_FILE_NAMES: &[&str] = &[
    ".gitignore",
    ".gitmodules",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "cargo.lock",
    "poetry.lock",
    "go.sum",
];
const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

const SUPPORTED_EXTENSIONS: &[&str] = &[
    // General purpose languages
    "rs", "py", "pyw", "js", "mjs", "cjs", "ts", "tsx", "jsx", "java", "kt", "kts", "go", "c",
    "h", "cpp", "cc", "cxx", "hpp", "hh", "hxx", "cs", "rb", "swift", "php", "scala", "dart",
    "zig", "lua", "ex", "exs", "clj", "vue", "svelte",
    // Scripts
    "sh", "bash", "zsh", "ps1",
    // Docs (decision records live here)
    "md", "markdown", "mdx", "rst", "adoc", "txt",
    // Config / data / infra
    "yaml", "yml", "json", "toml", "ini", "cfg", "conf", "properties", "env", "gradle", "xml",
    "sql", "tf", "tfvars", "hcl", "proto", "graphql", "gql",
];
