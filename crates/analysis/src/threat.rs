//! STRIDE threat modeling over detected components.
//!
//! Every `(component, category)` pair is evaluated: it either yields findings or an explicit
//! "no finding" coverage record. Severity is the weighted mean of five 1–10 inputs.

use crate::components::ComponentMap;
use crate::error::{AnalysisError, Result};
use lore_protocol::{
    CategoryCoverage, Component, ComponentKind, CoverageOutcome, DecisionRecord, DreadScore,
    EvidencePointer, MitigationStatus, Severity, ThreatCategory, ThreatFinding, ThreatModel,
};
use lore_scanner::SourceSet;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThreatConfig {
    pub enabled: bool,
    /// Weights for damage, reproducibility, exploitability, affected scope, discoverability.
    pub weights: [f64; 5],
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weights: [1.0; 5],
        }
    }
}

impl ThreatConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(bad) = self.weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(AnalysisError::InvalidWeights(format!(
                "weight {bad} must be finite and non-negative"
            )));
        }
        if self.weights.iter().sum::<f64>() <= 0.0 {
            return Err(AnalysisError::InvalidWeights(
                "at least one weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    /// Fires when any pattern matches a component file.
    Present(&'static [&'static str]),
    /// Fires when no pattern matches any file of an applicable component.
    Absent(&'static [&'static str]),
}

struct ThreatRule {
    code: &'static str,
    category: ThreatCategory,
    title: &'static str,
    /// Empty means every component kind.
    kinds: &'static [ComponentKind],
    dread: DreadScore,
    trigger: Trigger,
    partial_mitigations: &'static [&'static str],
}

const fn dread(d: u8, r: u8, e: u8, a: u8, di: u8) -> DreadScore {
    DreadScore {
        damage: d,
        reproducibility: r,
        exploitability: e,
        affected: a,
        discoverability: di,
    }
}

const RULES: &[ThreatRule] = &[
    ThreatRule {
        code: "missing-authentication",
        category: ThreatCategory::Spoofing,
        title: "Service exposes endpoints without visible authentication",
        kinds: &[ComponentKind::Service],
        dread: dread(7, 6, 6, 7, 6),
        trigger: Trigger::Absent(&[
            r"(?i)\b(auth\w*|jwt|bearer|session|login|oauth\w*|api[_-]?key|credentials?)\b",
        ]),
        partial_mitigations: &[],
    },
    ThreatRule {
        code: "sql-string-concatenation",
        category: ThreatCategory::Tampering,
        title: "SQL statement built by string concatenation or interpolation",
        kinds: &[],
        dread: dread(9, 8, 8, 8, 7),
        trigger: Trigger::Present(&[
            r#"(?i)["'](select|insert into|update|delete from)\b[^"'\n]*["']\s*(\+|%\s)"#,
            r#"(?i)\bf["'](select|insert into|update|delete from)\b[^"'\n]*\{"#,
            r#"(?i)format!\(\s*"(select|insert into|update|delete from)\b[^"\n]*\{"#,
            r#"(?i)`(select|insert into|update|delete from)\b[^`]*\$\{"#,
        ]),
        partial_mitigations: &[r"(?i)(\bprepare\w*\(|bind_param|sqlx::query!|\.bind\()"],
    },
    ThreatRule {
        code: "missing-audit-logging",
        category: ThreatCategory::Repudiation,
        title: "Service performs no visible logging or tracing",
        kinds: &[ComponentKind::Service],
        dread: dread(5, 5, 4, 6, 4),
        trigger: Trigger::Absent(&[
            r"(?i)\b(log|logger|logging|tracing|slog|winston|pino|logrus|zap|log4j|slf4j|console)\s*(::|\.)",
            r"(?i)\b(info|warn|error|debug)!\(",
        ]),
        partial_mitigations: &[],
    },
    ThreatRule {
        code: "hardcoded-secret",
        category: ThreatCategory::InformationDisclosure,
        title: "Credential or private key committed to source",
        kinds: &[],
        dread: dread(8, 9, 8, 8, 7),
        trigger: Trigger::Present(&[
            r#"(?i)\b(password|passwd|secret|api[_-]?key|access[_-]?key|auth[_-]?token|client[_-]?secret)\b["']?\s*[:=]\s*["'][^"'\s]{6,}["']"#,
            r"-----BEGIN (RSA |EC |OPENSSH |DSA )?PRIVATE KEY-----",
            r"\bAKIA[0-9A-Z]{16}\b",
        ]),
        partial_mitigations: &[r"(?i)(env::var|os\.environ|process\.env|getenv|secretsmanager|vault)"],
    },
    ThreatRule {
        code: "plaintext-datastore-connection",
        category: ThreatCategory::InformationDisclosure,
        title: "Datastore connection without TLS or with inline credentials",
        kinds: &[],
        dread: dread(6, 7, 6, 6, 6),
        trigger: Trigger::Present(&[
            r"(?i)sslmode=disable",
            r#"(?i)\b(postgres(ql)?|mysql|mongodb|redis|amqp)://[^\s"'@/:]+:[^\s"'@/]+@"#,
        ]),
        partial_mitigations: &[r"(?i)(sslmode=(require|verify)|rediss://|amqps://|tls\s*[:=]\s*true)"],
    },
    ThreatRule {
        code: "missing-rate-limit",
        category: ThreatCategory::DenialOfService,
        title: "Service has no visible rate limiting or request timeouts",
        kinds: &[ComponentKind::Service],
        dread: dread(5, 6, 6, 6, 5),
        trigger: Trigger::Absent(&[
            r"(?i)(rate[_-]?limit|ratelimit|throttl|governor|slowapi|timeout|deadline)",
        ]),
        partial_mitigations: &[],
    },
    ThreatRule {
        code: "dynamic-code-execution",
        category: ThreatCategory::ElevationOfPrivilege,
        title: "Dynamic code or shell execution",
        kinds: &[],
        dread: dread(8, 6, 7, 7, 6),
        trigger: Trigger::Present(&[
            r"(?:^|[^.\w])eval\s*\(",
            r"(?:^|[^.\w])exec\s*\(",
            r"shell\s*=\s*True",
            r"\bos\.system\(",
            r#"\bchild_process\b"#,
            r#"Command::new\("(sh|bash|cmd)"\)"#,
        ]),
        partial_mitigations: &[r"(?i)(shlex\.quote|shell_escape|sanitiz\w*|allowlist)"],
    },
    ThreatRule {
        code: "privileged-container",
        category: ThreatCategory::ElevationOfPrivilege,
        title: "Container or host runs with elevated privileges",
        kinds: &[],
        dread: dread(7, 7, 6, 7, 6),
        trigger: Trigger::Present(&[
            r"privileged:\s*true",
            r"allowPrivilegeEscalation:\s*true",
            r"(?m)^\s*USER\s+root\b",
            r"chmod\s+(-R\s+)?777",
        ]),
        partial_mitigations: &[r"(?i)(runAsNonRoot:\s*true|readOnlyRootFilesystem:\s*true)"],
    },
];

/// Decision phrases that count as a documented mitigation for a category.
fn mitigation_cues(category: ThreatCategory) -> &'static [&'static str] {
    match category {
        ThreatCategory::Spoofing => &[
            "authenticat",
            "jwt",
            "oauth",
            "openid",
            "oidc",
            "mtls",
            "mutual tls",
            "single sign-on",
        ],
        ThreatCategory::Tampering => &[
            "parameterized",
            "parametrized",
            "prepared statement",
            "query builder",
            "input validation",
            "signature",
        ],
        ThreatCategory::Repudiation => &[
            "audit log",
            "audit trail",
            "structured logging",
            "opentelemetry",
            "tracing",
        ],
        ThreatCategory::InformationDisclosure => &[
            "secrets manager",
            "secret manager",
            "vault",
            "kms",
            "encrypt",
            "tls",
        ],
        ThreatCategory::DenialOfService => &[
            "rate limit",
            "rate-limit",
            "throttl",
            "timeout",
            "circuit breaker",
            "backpressure",
        ],
        ThreatCategory::ElevationOfPrivilege => &[
            "least privilege",
            "non-root",
            "rbac",
            "sandbox",
            "seccomp",
        ],
    }
}

struct CompiledRule {
    rule: &'static ThreatRule,
    triggers: Vec<Regex>,
    partial: Vec<Regex>,
}

fn compile_all(patterns: &[&str], code: &str) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(err) => {
                log::warn!("invalid threat pattern in {code}: {err}");
                None
            }
        })
        .collect()
}

fn compiled_rules() -> &'static [CompiledRule] {
    static COMPILED: OnceLock<Vec<CompiledRule>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|rule| {
                let patterns = match rule.trigger {
                    Trigger::Present(p) | Trigger::Absent(p) => p,
                };
                CompiledRule {
                    rule,
                    triggers: compile_all(patterns, rule.code),
                    partial: compile_all(rule.partial_mitigations, rule.code),
                }
            })
            .collect()
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Id fragment for a component. Path separators read as `-`; every other byte that is not
/// ASCII alphanumeric is escaped as `_xx`, so distinct components never share a fragment.
fn slug(component: &Component) -> String {
    let raw = component
        .id
        .strip_prefix("component:")
        .unwrap_or(&component.id);
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b if b.is_ascii_alphanumeric() => out.push(char::from(b)),
            b'/' => out.push('-'),
            b => out.push_str(&format!("_{b:02x}")),
        }
    }
    out
}

/// Applies the threat rules to every component.
#[derive(Debug, Clone)]
pub struct ThreatModeler {
    config: ThreatConfig,
}

impl ThreatModeler {
    pub fn new(config: ThreatConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn model(
        &self,
        sources: &SourceSet,
        components: &ComponentMap,
        records: &[DecisionRecord],
    ) -> Result<ThreatModel> {
        let per_component: Vec<(Vec<ThreatFinding>, Vec<CategoryCoverage>)> = components
            .components
            .par_iter()
            .map(|component| self.model_component(sources, components, component, records))
            .collect();

        let mut model = ThreatModel {
            components: components.components.clone(),
            data_flows: components.data_flows.clone(),
            ..ThreatModel::default()
        };
        let mut seen = HashSet::new();
        for (findings, coverage) in per_component {
            for finding in findings {
                if !seen.insert(finding.id.clone()) {
                    return Err(AnalysisError::DuplicateFinding(finding.id));
                }
                model.findings.push(finding);
            }
            model.coverage.extend(coverage);
        }

        if let Some((component_id, category)) = model.coverage_gaps().into_iter().next() {
            return Err(AnalysisError::CoverageGap {
                component_id,
                category,
            });
        }
        log::info!(
            "Threat model: {} components, {} findings, {} unresolved critical",
            model.components.len(),
            model.findings.len(),
            model.unresolved_critical().len()
        );
        Ok(model)
    }

    fn model_component(
        &self,
        sources: &SourceSet,
        components: &ComponentMap,
        component: &Component,
        records: &[DecisionRecord],
    ) -> (Vec<ThreatFinding>, Vec<CategoryCoverage>) {
        let files: Vec<(&str, &str)> = components
            .files_of(&component.id)
            .iter()
            .filter_map(|path| sources.get(path))
            .map(|file| (file.rel_path.as_str(), file.content.as_str()))
            .collect();
        let related = related_decision(component, components, records);

        let mut findings = Vec::new();
        let mut coverage = Vec::new();
        for category in ThreatCategory::ALL {
            let mut ids = Vec::new();
            for compiled in compiled_rules()
                .iter()
                .filter(|c| c.rule.category == category)
            {
                let rule = compiled.rule;
                if !rule.kinds.is_empty() && !rule.kinds.contains(&component.kind) {
                    continue;
                }
                let evidence = match rule.trigger {
                    Trigger::Present(_) => present_hits(&compiled.triggers, &files, rule.code),
                    Trigger::Absent(_) => {
                        if component.kind.is_external() || files.is_empty() {
                            continue;
                        }
                        if files
                            .iter()
                            .any(|(_, content)| compiled.triggers.iter().any(|re| re.is_match(content)))
                        {
                            continue;
                        }
                        vec![EvidencePointer {
                            file: component.path.clone(),
                            line: 0,
                            pattern: rule.code.to_string(),
                            source_hash: None,
                        }]
                    }
                };
                if evidence.is_empty() {
                    continue;
                }

                let score = round2(rule.dread.weighted_average(&self.config.weights));
                let (mitigation_status, mitigated_by) = match documented_mitigation(category, records) {
                    Some(id) => (MitigationStatus::Mitigated, Some(id)),
                    None if files.iter().any(|(_, content)| {
                        compiled.partial.iter().any(|re| re.is_match(content))
                    }) =>
                    {
                        (MitigationStatus::Partial, None)
                    }
                    None => (MitigationStatus::Unmitigated, None),
                };
                let id = format!(
                    "THR-{}-{}-{}",
                    slug(component),
                    category.code(),
                    ids.len() + 1
                );
                ids.push(id.clone());
                findings.push(ThreatFinding {
                    id,
                    category,
                    component_id: component.id.clone(),
                    related_decision_id: mitigated_by.clone().or_else(|| related.clone()),
                    title: rule.title.to_string(),
                    rule: rule.code.to_string(),
                    dread: rule.dread,
                    score,
                    severity: Severity::from_score(score),
                    mitigation_status,
                    mitigated_by,
                    evidence,
                });
            }
            coverage.push(CategoryCoverage {
                component_id: component.id.clone(),
                category,
                outcome: if ids.is_empty() {
                    CoverageOutcome::NoFinding
                } else {
                    CoverageOutcome::Finding { finding_ids: ids }
                },
            });
        }
        (findings, coverage)
    }
}

/// First matching line per file.
fn present_hits(triggers: &[Regex], files: &[(&str, &str)], code: &str) -> Vec<EvidencePointer> {
    let mut hits = Vec::new();
    for (path, content) in files {
        let first = triggers
            .iter()
            .filter_map(|re| re.find(content).map(|m| m.start()))
            .min();
        if let Some(start) = first {
            hits.push(EvidencePointer {
                file: (*path).to_string(),
                line: content[..start].bytes().filter(|b| *b == b'\n').count() + 1,
                pattern: code.to_string(),
                source_hash: None,
            });
        }
    }
    hits
}

fn documented_mitigation(category: ThreatCategory, records: &[DecisionRecord]) -> Option<String> {
    let cues = mitigation_cues(category);
    records.iter().find_map(|record| {
        let text = record.searchable_text().to_lowercase();
        cues.iter()
            .any(|cue| text.contains(cue))
            .then(|| record.id().to_string())
    })
}

/// Decision most closely tied to a component: by topic for external components, otherwise
/// the first decision with evidence inside the component.
fn related_decision(
    component: &Component,
    components: &ComponentMap,
    records: &[DecisionRecord],
) -> Option<String> {
    if let Some(topic) = &component.topic {
        let inferred_id = format!("INF-{topic}");
        return records
            .iter()
            .find(|r| {
                r.decision.topic.as_deref() == Some(topic.as_str())
                    || r.supplement
                        .as_ref()
                        .is_some_and(|s| s.inferred_id == inferred_id)
            })
            .map(|r| r.id().to_string());
    }
    records
        .iter()
        .find(|record| {
            record
                .decision
                .evidence
                .iter()
                .chain(record.supplement.iter().flat_map(|s| s.evidence.iter()))
                .any(|e| {
                    components
                        .component_for(&e.file)
                        .is_some_and(|c| c.id == component.id)
                })
        })
        .map(|r| r.id().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentDetector;
    use lore_protocol::{Decision, DecisionSource};
    use lore_scanner::SourceFile;
    use pretty_assertions::assert_eq;

    fn project(files: &[(&str, &str)]) -> (SourceSet, ComponentMap) {
        let sources = SourceSet::from_files(
            "/p",
            files
                .iter()
                .map(|(path, content)| SourceFile::new(*path, *content))
                .collect(),
        );
        let map = ComponentDetector::default().detect(&sources, &[]);
        (sources, map)
    }

    fn record(id: &str, text: &str) -> DecisionRecord {
        let mut decision = Decision::new(id, id, DecisionSource::Existing);
        decision.decision_text = text.to_string();
        DecisionRecord {
            decision,
            supplement: None,
        }
    }

    fn modeler() -> ThreatModeler {
        ThreatModeler::new(ThreatConfig::default()).unwrap()
    }

    #[test]
    fn every_component_has_all_six_categories() {
        let (sources, map) = project(&[
            ("src/api/routes.py", "import logging\nlog = logging.getLogger()\n"),
            ("src/lib/util.py", "def add(a, b):\n    return a + b\n"),
        ]);
        let model = modeler().model(&sources, &map, &[]).unwrap();
        assert_eq!(model.coverage.len(), 2 * 6);
        assert!(model.coverage_gaps().is_empty());
        let lib_findings = model
            .findings
            .iter()
            .filter(|f| f.component_id == "component:src/lib")
            .count();
        assert_eq!(lib_findings, 0);
    }

    #[test]
    fn sql_concatenation_is_critical_and_unresolved() {
        let (sources, map) = project(&[(
            "src/db/users.py",
            "def find(uid):\n    q = \"SELECT * FROM users WHERE id = \" + uid\n    return run(q)\n",
        )]);
        let model = modeler().model(&sources, &map, &[]).unwrap();
        let finding = model
            .findings
            .iter()
            .find(|f| f.rule == "sql-string-concatenation")
            .unwrap();
        assert_eq!(finding.id, "THR-src-db-T-1");
        assert_eq!(finding.score, 8.0);
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.mitigation_status, MitigationStatus::Unmitigated);
        assert_eq!(finding.evidence[0].line, 2);
        assert_eq!(model.unresolved_critical().len(), 1);
    }

    #[test]
    fn sibling_components_with_similar_names_get_distinct_ids() {
        let query = "q = \"SELECT * FROM users WHERE id = \" + uid\n";
        let (sources, map) = project(&[
            ("services/a-b/users.py", query),
            ("services/a_b/users.py", query),
        ]);
        let model = modeler().model(&sources, &map, &[]).unwrap();
        let mut ids: Vec<&str> = model
            .findings
            .iter()
            .filter(|f| f.rule == "sql-string-concatenation")
            .map(|f| f.id.as_str())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["THR-services-a_2db-T-1", "THR-services-a_5fb-T-1"]);

        let unique: HashSet<&str> = model.findings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(unique.len(), model.findings.len());
    }

    #[test]
    fn documented_mitigation_resolves_finding() {
        let (sources, map) = project(&[(
            "src/db/users.py",
            "q = \"SELECT * FROM users WHERE id = \" + uid\n",
        )]);
        let records = vec![record(
            "ADR-0004",
            "All queries go through parameterized statements.",
        )];
        let model = modeler().model(&sources, &map, &records).unwrap();
        let finding = &model.findings[0];
        assert_eq!(finding.mitigation_status, MitigationStatus::Mitigated);
        assert_eq!(finding.mitigated_by.as_deref(), Some("ADR-0004"));
        assert!(model.unresolved_critical().is_empty());
    }

    #[test]
    fn code_level_mitigation_is_partial() {
        let (sources, map) = project(&[(
            "src/app/run.py",
            "import shlex, os\nos.system(\"ls \" + shlex.quote(path))\n",
        )]);
        let model = modeler().model(&sources, &map, &[]).unwrap();
        let finding = model
            .findings
            .iter()
            .find(|f| f.rule == "dynamic-code-execution")
            .unwrap();
        assert_eq!(finding.mitigation_status, MitigationStatus::Partial);
        assert_eq!(finding.severity, Severity::High);
    }

    #[test]
    fn bare_service_gets_absence_findings() {
        let (sources, map) = project(&[("src/api/handlers.go", "package api\n")]);
        let model = modeler().model(&sources, &map, &[]).unwrap();
        let rules: Vec<&str> = model.findings.iter().map(|f| f.rule.as_str()).collect();
        assert_eq!(
            rules,
            vec![
                "missing-authentication",
                "missing-audit-logging",
                "missing-rate-limit"
            ]
        );
        assert!(model.findings.iter().all(|f| f.evidence[0].line == 0));
    }

    #[test]
    fn weights_change_the_score() {
        let (sources, map) = project(&[("Dockerfile", "FROM alpine\nUSER root\n")]);
        let config = ThreatConfig {
            enabled: true,
            weights: [1.0, 0.0, 0.0, 0.0, 0.0],
        };
        let model = ThreatModeler::new(config)
            .unwrap()
            .model(&sources, &map, &[])
            .unwrap();
        let finding = model
            .findings
            .iter()
            .find(|f| f.rule == "privileged-container")
            .unwrap();
        assert_eq!(finding.component_id, "component:root");
        assert_eq!(finding.score, 7.0);
        assert_eq!(finding.severity, Severity::High);
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let negative = ThreatConfig {
            enabled: true,
            weights: [1.0, -1.0, 1.0, 1.0, 1.0],
        };
        assert!(ThreatModeler::new(negative).is_err());
        let zero = ThreatConfig {
            enabled: true,
            weights: [0.0; 5],
        };
        assert!(ThreatModeler::new(zero).is_err());
    }
}
