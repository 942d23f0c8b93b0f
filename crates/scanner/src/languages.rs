use crate::source::SourceSet;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// What a file is for, independent of its language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Code,
    Doc,
    Config,
    Infra,
}

/// Classify a repo-relative path into `(language, role)`.
pub fn classify_path(rel_path: &str) -> (Option<&'static str>, FileRole) {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    if name.starts_with("Dockerfile") || name.starts_with("docker-compose") {
        return (None, FileRole::Infra);
    }
    if matches!(name, "Makefile" | "makefile" | "Justfile" | "Jenkinsfile" | "Procfile")
        || (name.starts_with("requirements") && name.ends_with(".txt"))
    {
        return (None, FileRole::Config);
    }
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let language = match ext.as_str() {
        "rs" => Some("Rust"),
        "py" | "pyw" => Some("Python"),
        "js" | "mjs" | "cjs" | "jsx" => Some("JavaScript"),
        "ts" | "tsx" => Some("TypeScript"),
        "go" => Some("Go"),
        "java" => Some("Java"),
        "kt" | "kts" => Some("Kotlin"),
        "c" | "h" => Some("C"),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some("C++"),
        "cs" => Some("C#"),
        "rb" => Some("Ruby"),
        "swift" => Some("Swift"),
        "php" => Some("PHP"),
        "scala" => Some("Scala"),
        "dart" => Some("Dart"),
        "zig" => Some("Zig"),
        "lua" => Some("Lua"),
        "ex" | "exs" => Some("Elixir"),
        "clj" => Some("Clojure"),
        "vue" => Some("Vue"),
        "svelte" => Some("Svelte"),
        "sh" | "bash" | "zsh" | "ps1" => Some("Shell"),
        "sql" => Some("SQL"),
        "tf" | "tfvars" | "hcl" => Some("HCL"),
        _ => None,
    };
    let role = match ext.as_str() {
        "md" | "markdown" | "mdx" | "rst" | "adoc" | "txt" => FileRole::Doc,
        "tf" | "tfvars" | "hcl" => FileRole::Infra,
        "yaml" | "yml" | "json" | "toml" | "ini" | "cfg" | "conf" | "properties" | "env"
        | "gradle" | "xml" | "proto" | "graphql" | "gql" => FileRole::Config,
        _ if language.is_some() => FileRole::Code,
        _ => FileRole::Config,
    };
    (language, role)
}

/// One detected language, with its most prominent framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageReport {
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub confidence: f64,
    pub files: usize,
    pub bytes: u64,
}

struct FrameworkRule {
    languages: &'static [&'static str],
    framework: &'static str,
    manifests: &'static [&'static str],
    pattern: &'static str,
}

// Earlier rules win when a manifest names several frameworks.
const FRAMEWORK_RULES: &[FrameworkRule] = &[
    FrameworkRule {
        languages: &["Rust"],
        framework: "axum",
        manifests: &["Cargo.toml"],
        pattern: r#"(?m)^\s*axum\s*="#,
    },
    FrameworkRule {
        languages: &["Rust"],
        framework: "actix-web",
        manifests: &["Cargo.toml"],
        pattern: r#"(?m)^\s*actix-web\s*="#,
    },
    FrameworkRule {
        languages: &["Rust"],
        framework: "rocket",
        manifests: &["Cargo.toml"],
        pattern: r#"(?m)^\s*rocket\s*="#,
    },
    FrameworkRule {
        languages: &["Rust"],
        framework: "tauri",
        manifests: &["Cargo.toml"],
        pattern: r#"(?m)^\s*tauri\s*="#,
    },
    FrameworkRule {
        languages: &["TypeScript", "JavaScript"],
        framework: "next",
        manifests: &["package.json"],
        pattern: r#""next"\s*:"#,
    },
    FrameworkRule {
        languages: &["TypeScript", "JavaScript"],
        framework: "nestjs",
        manifests: &["package.json"],
        pattern: r#""@nestjs/core"\s*:"#,
    },
    FrameworkRule {
        languages: &["TypeScript", "JavaScript"],
        framework: "angular",
        manifests: &["package.json"],
        pattern: r#""@angular/core"\s*:"#,
    },
    FrameworkRule {
        languages: &["TypeScript", "JavaScript"],
        framework: "react",
        manifests: &["package.json"],
        pattern: r#""react"\s*:"#,
    },
    FrameworkRule {
        languages: &["TypeScript", "JavaScript"],
        framework: "vue",
        manifests: &["package.json"],
        pattern: r#""vue"\s*:"#,
    },
    FrameworkRule {
        languages: &["TypeScript", "JavaScript"],
        framework: "express",
        manifests: &["package.json"],
        pattern: r#""express"\s*:"#,
    },
    FrameworkRule {
        languages: &["Python"],
        framework: "django",
        manifests: &["requirements.txt", "pyproject.toml", "Pipfile", "setup.py"],
        pattern: r#"(?mi)^\s*"?django\b"#,
    },
    FrameworkRule {
        languages: &["Python"],
        framework: "fastapi",
        manifests: &["requirements.txt", "pyproject.toml", "Pipfile", "setup.py"],
        pattern: r#"(?mi)^\s*"?fastapi\b"#,
    },
    FrameworkRule {
        languages: &["Python"],
        framework: "flask",
        manifests: &["requirements.txt", "pyproject.toml", "Pipfile", "setup.py"],
        pattern: r#"(?mi)^\s*"?flask\b"#,
    },
    FrameworkRule {
        languages: &["Go"],
        framework: "gin",
        manifests: &["go.mod"],
        pattern: r"github\.com/gin-gonic/gin",
    },
    FrameworkRule {
        languages: &["Go"],
        framework: "echo",
        manifests: &["go.mod"],
        pattern: r"github\.com/labstack/echo",
    },
    FrameworkRule {
        languages: &["Java", "Kotlin"],
        framework: "spring-boot",
        manifests: &["pom.xml", "build.gradle", "build.gradle.kts"],
        pattern: r"spring-boot",
    },
    FrameworkRule {
        languages: &["Ruby"],
        framework: "rails",
        manifests: &["Gemfile"],
        pattern: r#"(?m)^\s*gem\s+["']rails["']"#,
    },
    FrameworkRule {
        languages: &["PHP"],
        framework: "laravel",
        manifests: &["composer.json"],
        pattern: r#""laravel/framework"\s*:"#,
    },
];

/// Manifest files that corroborate a language beyond raw byte share.
const LANGUAGE_MANIFESTS: &[(&str, &str)] = &[
    ("Cargo.toml", "Rust"),
    ("package.json", "JavaScript"),
    ("tsconfig.json", "TypeScript"),
    ("requirements.txt", "Python"),
    ("pyproject.toml", "Python"),
    ("setup.py", "Python"),
    ("go.mod", "Go"),
    ("pom.xml", "Java"),
    ("build.gradle", "Java"),
    ("build.gradle.kts", "Kotlin"),
    ("Gemfile", "Ruby"),
    ("composer.json", "PHP"),
    ("Package.swift", "Swift"),
    ("mix.exs", "Elixir"),
];

const BYTE_SHARE_WEIGHT: f64 = 0.7;
const MANIFEST_BONUS: f64 = 0.3;

fn compiled_framework_rules() -> &'static [(usize, Regex)] {
    static RULES: OnceLock<Vec<(usize, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        FRAMEWORK_RULES
            .iter()
            .enumerate()
            .filter_map(|(idx, rule)| match Regex::new(rule.pattern) {
                Ok(re) => Some((idx, re)),
                Err(err) => {
                    log::warn!("invalid framework pattern for {}: {err}", rule.framework);
                    None
                }
            })
            .collect()
    })
}

/// Classifies the languages and frameworks present in a project snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct LanguageDetector;

impl LanguageDetector {
    pub fn new() -> Self {
        Self
    }

    /// Load `root` and detect its languages. Fails only when the path cannot be read.
    pub fn detect_path(
        &self,
        root: impl AsRef<std::path::Path>,
        options: &crate::ScanOptions,
    ) -> crate::Result<Vec<LanguageReport>> {
        let sources = SourceSet::load(root, options)?;
        Ok(self.detect(&sources))
    }

    /// Languages ordered by confidence, then total bytes, then name.
    pub fn detect(&self, sources: &SourceSet) -> Vec<LanguageReport> {
        let per_file: Vec<(&'static str, u64)> = sources
            .files()
            .par_iter()
            .filter(|file| file.role == FileRole::Code)
            .filter_map(|file| file.language.map(|lang| (lang, file.bytes)))
            .collect();

        let mut totals: BTreeMap<&'static str, (usize, u64)> = BTreeMap::new();
        for (language, bytes) in per_file {
            let entry = totals.entry(language).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += bytes;
        }
        let total_bytes: u64 = totals.values().map(|(_, bytes)| *bytes).sum();

        let mut manifests: BTreeSet<&'static str> = BTreeSet::new();
        for file in sources.files() {
            let name = file.file_name();
            for (manifest, language) in LANGUAGE_MANIFESTS {
                if name == *manifest {
                    manifests.insert(*language);
                }
            }
        }

        let frameworks = detect_frameworks(sources);

        let mut reports: Vec<LanguageReport> = totals
            .into_iter()
            .map(|(language, (files, bytes))| {
                #[allow(clippy::cast_precision_loss)]
                let share = if total_bytes == 0 {
                    0.0
                } else {
                    bytes as f64 / total_bytes as f64
                };
                let bonus = if manifests.contains(language) {
                    MANIFEST_BONUS
                } else {
                    0.0
                };
                let confidence = (BYTE_SHARE_WEIGHT * share + bonus).clamp(0.0, 1.0);
                LanguageReport {
                    language: language.to_string(),
                    framework: frameworks.get(language).map(|f| (*f).to_string()),
                    confidence: round3(confidence),
                    files,
                    bytes,
                }
            })
            .collect();

        reports.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.bytes.cmp(&a.bytes))
                .then_with(|| a.language.cmp(&b.language))
        });
        log::info!("Detected {} language(s)", reports.len());
        reports
    }
}

fn detect_frameworks(sources: &SourceSet) -> BTreeMap<&'static str, &'static str> {
    // (language -> (rule index, framework)); lowest rule index wins.
    let mut best: BTreeMap<&'static str, (usize, &'static str)> = BTreeMap::new();
    for file in sources.files() {
        let name = file.file_name();
        for (idx, re) in compiled_framework_rules() {
            let rule = &FRAMEWORK_RULES[*idx];
            if !rule.manifests.iter().any(|m| *m == name) || !re.is_match(&file.content) {
                continue;
            }
            for language in rule.languages.iter().copied() {
                let entry = best.entry(language).or_insert((*idx, rule.framework));
                if *idx < entry.0 {
                    *entry = (*idx, rule.framework);
                }
            }
        }
    }
    best.into_iter().map(|(lang, (_, fw))| (lang, fw)).collect()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScanOptions;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn classifies_roles() {
        assert_eq!(classify_path("src/main.rs"), (Some("Rust"), FileRole::Code));
        assert_eq!(classify_path("docs/adr/0001-x.md"), (None, FileRole::Doc));
        assert_eq!(classify_path("infra/main.tf"), (Some("HCL"), FileRole::Infra));
        assert_eq!(classify_path("deploy/Dockerfile.prod"), (None, FileRole::Infra));
        assert_eq!(classify_path("Cargo.toml"), (None, FileRole::Config));
    }

    #[test]
    fn ranks_by_confidence_and_detects_framework() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(
            root.join("Cargo.toml"),
            "[package]\nname = \"demo\"\n\n[dependencies]\naxum = \"0.7\"\n",
        )
        .unwrap();
        fs::write(root.join("src/main.rs"), "fn main() { println!(\"hi\"); }\n".repeat(20))
            .unwrap();
        fs::write(root.join("build.sh"), "#!/bin/sh\necho hi\n").unwrap();

        let reports = LanguageDetector::new()
            .detect_path(root, &ScanOptions::default())
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].language, "Rust");
        assert_eq!(reports[0].framework.as_deref(), Some("axum"));
        assert!(reports[0].confidence > reports[1].confidence);
        assert_eq!(reports[1].language, "Shell");
        assert!(reports.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));
    }

    #[test]
    fn equal_confidence_breaks_on_bytes() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        // Shares of 0.50002 and 0.49998 both round to the same confidence.
        fs::write(root.join("a.rb"), "#".repeat(10_001)).unwrap();
        fs::write(root.join("b.go"), "/".repeat(10_000)).unwrap();

        let reports = LanguageDetector::new()
            .detect_path(root, &ScanOptions::default())
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].confidence, reports[1].confidence);
        assert_eq!(reports[0].language, "Ruby");
        assert_eq!(reports[1].language, "Go");
    }

    #[test]
    fn missing_path_is_fatal() {
        let err = LanguageDetector::new()
            .detect_path("/definitely/not/here", &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, crate::ScanError::InvalidPath(_)));
    }
}
