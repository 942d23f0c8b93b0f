//! Tech-debt markers, anti-patterns and missing-test signals.

use crate::components::{is_test_path, ComponentMap};
use crate::error::{AnalysisError, Result};
use lore_protocol::path_filters::path_within;
use lore_protocol::{ComponentKind, DebtCategory, Priority, TechDebtItem};
use lore_scanner::{FileRole, SourceFile, SourceSet};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MAX_EVIDENCE_CHARS: usize = 160;

/// A user-supplied marker rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebtMarker {
    pub name: String,
    pub pattern: String,
    pub priority: Priority,
    pub category: DebtCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebtConfig {
    /// Code files above which an empty result is flagged as suspicious.
    pub suspicious_min_files: usize,
    /// Code files a component needs before missing tests are reported.
    pub missing_tests_min_files: usize,
    pub extra_markers: Vec<DebtMarker>,
}

impl Default for DebtConfig {
    fn default() -> Self {
        Self {
            suspicious_min_files: 10,
            missing_tests_min_files: 3,
            extra_markers: Vec::new(),
        }
    }
}

const BUILTIN_MARKERS: &[(&str, &str, Priority, DebtCategory)] = &[
    (
        "security-marker",
        r"(?i)\b(todo|fixme|xxx|hack)\b.*\b(security|vulnerab\w*|insecure|injection|xss|csrf|cve-\d+)",
        Priority::P0,
        DebtCategory::Security,
    ),
    ("security-note", r"\bSECURITY\s*:", Priority::P0, DebtCategory::Security),
    ("bug-marker", r"\bBUG\b", Priority::P0, DebtCategory::Correctness),
    ("fixme", r"\bFIXME\b", Priority::P1, DebtCategory::Correctness),
    (
        "unimplemented",
        r"\b(unimplemented|todo)!\s*\(",
        Priority::P1,
        DebtCategory::Correctness,
    ),
    ("bare-except", r"^\s*except\s*:", Priority::P1, DebtCategory::Correctness),
    (
        "empty-catch",
        r"catch\s*(\([^)]*\))?\s*\{\s*\}",
        Priority::P1,
        DebtCategory::Correctness,
    ),
    ("hack", r"\b(HACK|XXX|WORKAROUND)\b", Priority::P1, DebtCategory::Design),
    ("todo", r"\bTODO\b", Priority::P2, DebtCategory::Maintenance),
    (
        "lint-suppression",
        r"(#!?\[allow\(|eslint-disable|#\s*noqa|#\s*type:\s*ignore|@SuppressWarnings|//\s*nolint|#\s*pylint:\s*disable)",
        Priority::P3,
        DebtCategory::Style,
    ),
    ("console-log", r"\bconsole\.log\(", Priority::P3, DebtCategory::Style),
    (
        "deprecated",
        r"(@deprecated|@Deprecated|#\[deprecated|\bDeprecationWarning\b)",
        Priority::P3,
        DebtCategory::Maintenance,
    ),
];

const TEST_SIGNALS: &[&str] = &[
    r"#\[(cfg\(test\)|test|tokio::test)\]",
    r"(?m)^\s*def test_\w+",
    r"\b(describe|it|test)\(\s*['`]",
    r"@Test\b",
    r"\bfunc Test\w+\(",
];

struct Rule {
    name: String,
    regex: Regex,
    priority: Priority,
    category: DebtCategory,
}

/// Debt items found in one run, ordered by `(file, line)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebtReport {
    pub items: Vec<TechDebtItem>,
    pub code_files: usize,
    /// Set when a non-trivial codebase produced no items at all.
    pub suspicious_empty: bool,
}

impl DebtReport {
    pub fn count_by_priority(&self) -> BTreeMap<Priority, usize> {
        let mut counts: BTreeMap<Priority, usize> =
            Priority::ALL.iter().map(|p| (*p, 0)).collect();
        for item in &self.items {
            *counts.entry(item.priority).or_default() += 1;
        }
        counts
    }
}

pub struct TechDebtDetector {
    rules: Vec<Rule>,
    test_signals: Vec<Regex>,
    config: DebtConfig,
}

impl TechDebtDetector {
    pub fn new(config: DebtConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(BUILTIN_MARKERS.len() + config.extra_markers.len());
        for (name, pattern, priority, category) in BUILTIN_MARKERS {
            rules.push(compile(name, pattern, *priority, *category)?);
        }
        for marker in &config.extra_markers {
            rules.push(compile(
                &marker.name,
                &marker.pattern,
                marker.priority,
                marker.category,
            )?);
        }
        // Stable: built-ins keep precedence over extra markers of the same priority.
        rules.sort_by_key(|rule| rule.priority);
        let test_signals = TEST_SIGNALS
            .iter()
            .map(|pattern| compile("test-signal", pattern, Priority::P2, DebtCategory::Testing))
            .map(|rule| rule.map(|r| r.regex))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rules,
            test_signals,
            config,
        })
    }

    pub fn detect(&self, sources: &SourceSet, components: &ComponentMap) -> DebtReport {
        let code: Vec<&SourceFile> = sources.code_files().collect();
        let mut items: Vec<TechDebtItem> = code
            .par_iter()
            .flat_map_iter(|file| self.scan_file(file))
            .collect();
        items.extend(self.missing_tests(sources, components));
        items.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        for (idx, item) in items.iter_mut().enumerate() {
            item.id = format!("DEBT-{:04}", idx + 1);
        }

        let suspicious_empty = items.is_empty() && code.len() >= self.config.suspicious_min_files;
        if suspicious_empty {
            log::warn!(
                "No tech-debt items across {} code files; result is suspicious",
                code.len()
            );
        } else {
            log::info!("Found {} tech-debt items in {} code files", items.len(), code.len());
        }
        DebtReport {
            items,
            code_files: code.len(),
            suspicious_empty,
        }
    }

    /// One item per line, from the highest-priority matching rule.
    fn scan_file(&self, file: &SourceFile) -> Vec<TechDebtItem> {
        file.numbered_lines()
            .filter_map(|(line_no, line)| {
                self.rules
                    .iter()
                    .find(|rule| rule.regex.is_match(line))
                    .map(|rule| TechDebtItem {
                        id: String::new(),
                        file: file.rel_path.clone(),
                        line: line_no,
                        priority: rule.priority,
                        category: rule.category,
                        rule: rule.name.clone(),
                        evidence_text: clip(line.trim()),
                    })
            })
            .collect()
    }

    fn missing_tests(&self, sources: &SourceSet, components: &ComponentMap) -> Vec<TechDebtItem> {
        let mut items = Vec::new();
        for component in &components.components {
            if component.kind.is_external() || component.kind == ComponentKind::Infrastructure {
                continue;
            }
            let code_files = components.code_file_count(&component.id);
            if code_files < self.config.missing_tests_min_files {
                continue;
            }
            if self.has_test_signal(sources, components, &component.id, &component.path) {
                continue;
            }
            items.push(TechDebtItem {
                id: String::new(),
                file: component.path.clone(),
                line: 0,
                priority: Priority::P2,
                category: DebtCategory::Testing,
                rule: "missing-tests".to_string(),
                evidence_text: format!("{code_files} code files without tests"),
            });
        }
        items
    }

    fn has_test_signal(
        &self,
        sources: &SourceSet,
        components: &ComponentMap,
        component_id: &str,
        path: &str,
    ) -> bool {
        // The root component only owns top-level files, and its "." name matches anything.
        let is_root = path.is_empty() || path == ".";
        let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
        let dedicated_tests = sources.code_files().any(|file| {
            if !is_test_path(&file.rel_path) {
                return false;
            }
            if is_root {
                return !file.rel_path.contains('/');
            }
            path_within(&file.rel_path, path) || file.rel_path.to_ascii_lowercase().contains(&name)
        });
        if dedicated_tests {
            return true;
        }
        components
            .files_of(component_id)
            .iter()
            .filter_map(|rel| sources.get(rel))
            .filter(|file| file.role == FileRole::Code)
            .any(|file| self.test_signals.iter().any(|re| re.is_match(&file.content)))
    }
}

fn compile(name: &str, pattern: &str, priority: Priority, category: DebtCategory) -> Result<Rule> {
    let regex = Regex::new(pattern).map_err(|source| AnalysisError::InvalidMarker {
        name: name.to_string(),
        source,
    })?;
    Ok(Rule {
        name: name.to_string(),
        regex,
        priority,
        category,
    })
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_EVIDENCE_CHARS {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(MAX_EVIDENCE_CHARS).collect();
    clipped.push('…');
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentDetector;
    use pretty_assertions::assert_eq;

    fn run(files: &[(&str, &str)], config: DebtConfig) -> DebtReport {
        let sources = SourceSet::from_files(
            "/p",
            files
                .iter()
                .map(|(path, content)| SourceFile::new(*path, *content))
                .collect(),
        );
        let map = ComponentDetector::default().detect(&sources, &[]);
        TechDebtDetector::new(config).unwrap().detect(&sources, &map)
    }

    #[test]
    fn classifies_markers_by_priority() {
        let report = run(
            &[(
                "src/lib.rs",
                "// TODO: tidy\n// FIXME: off by one\n// TODO: security review of token check\nfn f() { unimplemented!() }\n#[allow(dead_code)]\n",
            )],
            DebtConfig::default(),
        );
        let got: Vec<(usize, Priority, &str)> = report
            .items
            .iter()
            .map(|i| (i.line, i.priority, i.rule.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                (1, Priority::P2, "todo"),
                (2, Priority::P1, "fixme"),
                (3, Priority::P0, "security-marker"),
                (4, Priority::P1, "unimplemented"),
                (5, Priority::P3, "lint-suppression"),
            ]
        );
        assert_eq!(report.items[0].id, "DEBT-0001");
        assert_eq!(report.items[4].id, "DEBT-0005");
        assert_eq!(report.count_by_priority()[&Priority::P1], 2);
    }

    #[test]
    fn python_and_js_anti_patterns() {
        let report = run(
            &[
                ("app/main.py", "try:\n    go()\nexcept:\n    pass\n"),
                ("web/app.js", "try { go() } catch (e) {}\nconsole.log('x')\n"),
            ],
            DebtConfig::default(),
        );
        let rules: Vec<&str> = report.items.iter().map(|i| i.rule.as_str()).collect();
        assert_eq!(rules, vec!["bare-except", "empty-catch", "console-log"]);
    }

    #[test]
    fn docs_are_not_scanned() {
        let report = run(&[("README.md", "TODO: write docs\n")], DebtConfig::default());
        assert!(report.items.is_empty());
        assert!(!report.suspicious_empty);
    }

    #[test]
    fn clean_large_codebase_is_suspicious() {
        let files: Vec<(String, &str)> = (0..12)
            .map(|i| (format!("src/m{i}_test.rs"), "fn ok() {}\n"))
            .collect();
        let borrowed: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), *c)).collect();
        let report = run(&borrowed, DebtConfig::default());
        assert!(report.items.is_empty());
        assert_eq!(report.code_files, 12);
        assert!(report.suspicious_empty);
    }

    #[test]
    fn untested_component_gets_missing_tests_item() {
        let report = run(
            &[
                ("src/core/a.rs", "fn a() {}\n"),
                ("src/core/b.rs", "fn b() {}\n"),
                ("src/core/c.rs", "fn c() {}\n"),
                ("src/util/a.rs", "fn a() {}\n"),
                ("src/util/b.rs", "fn b() {}\n"),
                ("src/util/c.rs", "#[cfg(test)]\nmod tests {}\n"),
            ],
            DebtConfig::default(),
        );
        assert_eq!(report.items.len(), 1);
        let item = &report.items[0];
        assert_eq!(item.rule, "missing-tests");
        assert_eq!(item.file, "src/core");
        assert_eq!(item.line, 0);
        assert_eq!(item.priority, Priority::P2);
    }

    #[test]
    fn tests_elsewhere_do_not_cover_the_root_component() {
        let report = run(
            &[
                ("main.py", "def main(): pass\n"),
                ("cli.py", "def cli(): pass\n"),
                ("setup_db.py", "def setup(): pass\n"),
                ("services/api/test_api.py", "def test_ok(): pass\n"),
            ],
            DebtConfig::default(),
        );
        let missing: Vec<&str> = report
            .items
            .iter()
            .filter(|i| i.rule == "missing-tests")
            .map(|i| i.file.as_str())
            .collect();
        assert_eq!(missing, vec!["."]);

        let covered = run(
            &[
                ("main.py", "def main(): pass\n"),
                ("cli.py", "def cli(): pass\n"),
                ("setup_db.py", "def setup(): pass\n"),
                ("test_main.py", "def test_ok(): pass\n"),
            ],
            DebtConfig::default(),
        );
        assert!(covered.items.iter().all(|i| i.rule != "missing-tests"));
    }

    #[test]
    fn extra_markers_extend_the_rule_set() {
        let config = DebtConfig {
            extra_markers: vec![DebtMarker {
                name: "perf".to_string(),
                pattern: r"\bPERF\b".to_string(),
                priority: Priority::P1,
                category: DebtCategory::Design,
            }],
            ..DebtConfig::default()
        };
        let report = run(&[("src/a.rs", "// PERF: quadratic\n")], config);
        assert_eq!(report.items[0].rule, "perf");

        let bad = DebtConfig {
            extra_markers: vec![DebtMarker {
                name: "broken".to_string(),
                pattern: "(".to_string(),
                priority: Priority::P1,
                category: DebtCategory::Design,
            }],
            ..DebtConfig::default()
        };
        assert!(matches!(
            TechDebtDetector::new(bad),
            Err(AnalysisError::InvalidMarker { .. })
        ));
    }
}
