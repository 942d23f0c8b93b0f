use crate::enhance::EnhancementOutcome;
use crate::run::ImportRun;
use crate::validator::ValidationReport;
use lore_analysis::DebtReport;
use lore_protocol::{DecisionSource, Priority};

/// `reports/import-report.md`. Rendered once before validation (so the file exists) and
/// again afterwards with the verdict.
pub fn render_import_report(
    run: &ImportRun,
    validation: Option<&ValidationReport>,
    enhancement: Option<&EnhancementOutcome>,
) -> String {
    let mut md = String::new();
    md.push_str("# Import report\n\n");
    md.push_str(&format!("- Project: `{}`\n", run.project_root.display()));
    md.push_str(&format!("- Started: `{}`\n", run.started_at.to_rfc3339()));
    md.push_str(&format!(
        "- Status: **{}**\n",
        validation.map_or("pending validation", |v| v.status.as_str())
    ));
    md.push_str(&format!("- Files scanned: `{}`\n", run.files_scanned));
    md.push_str(&format!(
        "- Overall confidence: `{:.2}`\n\n",
        run.overall_confidence()
    ));

    if let Some(validation) = validation {
        if !validation.violations.is_empty() {
            md.push_str("## Failed checks\n\n");
            for violation in &validation.violations {
                md.push_str(&format!("- {}\n", violation.describe()));
            }
            md.push('\n');
        }
        md.push_str("## Mandatory artifacts\n\n");
        md.push_str("| artifact | present |\n|---|---|\n");
        for check in &validation.checklist {
            md.push_str(&format!(
                "| `{}` | {} |\n",
                check.path,
                if check.present { "yes" } else { "**no**" }
            ));
        }
        md.push('\n');
    }

    md.push_str("## Languages\n\n");
    if run.languages.is_empty() {
        md.push_str("No recognised source languages.\n\n");
    } else {
        md.push_str("| language | framework | confidence | files |\n|---|---|---:|---:|\n");
        for lang in &run.languages {
            md.push_str(&format!(
                "| {} | {} | `{:.2}` | `{}` |\n",
                lang.language,
                lang.framework.as_deref().unwrap_or("-"),
                lang.confidence,
                lang.files
            ));
        }
        md.push('\n');
    }

    let summary = run.reconciliation.summary();
    md.push_str("## Decisions\n\n");
    md.push_str(&format!(
        "- Existing records parsed: `{}` (rejected: `{}`)\n",
        run.extraction.existing.len(),
        run.extraction.parse_failures.len()
    ));
    md.push_str(&format!("- Inferred candidates: `{}`\n", run.extraction.inferred.len()));
    md.push_str(&format!(
        "- Reconciliation: duplicate `{}`, enrich `{}`, new `{}`, unmatched existing `{}`\n",
        summary.duplicate, summary.enrich, summary.new, summary.unmatched_existing
    ));
    md.push_str(&format!(
        "- Records written: `{}`\n\n",
        run.reconciliation.records.len()
    ));
    if !run.reconciliation.records.is_empty() {
        md.push_str("| id | title | source | confidence |\n|---|---|---|---:|\n");
        for record in &run.reconciliation.records {
            let source = match (record.decision.source, &record.supplement) {
                (DecisionSource::Existing, Some(_)) => "existing (enriched)",
                (source, _) => source.as_str(),
            };
            md.push_str(&format!(
                "| `{}` | {} | {} | `{:.2}` |\n",
                record.id(),
                escape_cell(&truncate_one_line(&record.decision.title, 80)),
                source,
                record.decision.confidence
            ));
        }
        md.push('\n');
    }

    md.push_str("## Threat model\n\n");
    match (run.threats.model(), run.threats.skip_reason()) {
        (Some(model), _) => {
            md.push_str(&format!(
                "- Components analysed: `{}` (coverage records: `{}`)\n",
                model.components.len(),
                model.coverage.len()
            ));
            md.push_str(&format!("- Findings: `{}`\n", model.findings.len()));
            md.push_str(&format!(
                "- Unresolved critical: `{}`\n\n",
                model.unresolved_critical().len()
            ));
            if !model.findings.is_empty() {
                md.push_str("| id | severity | score | status | title |\n|---|---|---:|---|---|\n");
                for finding in &model.findings {
                    md.push_str(&format!(
                        "| `{}` | {} | `{:.2}` | {} | {} |\n",
                        finding.id,
                        finding.severity.as_str(),
                        finding.score,
                        finding.mitigation_status.as_str(),
                        escape_cell(&finding.title)
                    ));
                }
                md.push('\n');
            }
        }
        (None, reason) => {
            md.push_str(&format!(
                "Skipped: {}\n\n",
                reason.unwrap_or("threat modeling disabled")
            ));
        }
    }

    md.push_str("## Tech debt\n\n");
    let counts = run.debt.count_by_priority();
    md.push_str(&format!("- Items: `{}`", run.debt.items.len()));
    for priority in Priority::ALL {
        md.push_str(&format!(
            ", {} `{}`",
            priority.as_str(),
            counts.get(&priority).copied().unwrap_or(0)
        ));
    }
    md.push_str("\n\n");

    md.push_str("## Knowledge graph\n\n");
    md.push_str(&format!(
        "- Nodes: `{}`, edges: `{}`\n\n",
        run.graph.nodes.len(),
        run.graph.edges.len()
    ));

    md.push_str("## Run flags\n\n");
    if run.flags.is_empty() {
        md.push_str("None.\n");
    } else {
        for flag in &run.flags {
            md.push_str(&format!("- `{}`: {}\n", flag.code(), flag.describe()));
        }
    }

    if let Some(outcome) = enhancement {
        md.push_str("\n## LLM synthesis\n\n");
        md.push_str(&format!("{}\n", outcome.describe()));
    }
    md
}

/// `reports/tech-debt-inferred.md`. Always explains an empty result.
pub fn render_debt_report(debt: &DebtReport) -> String {
    let mut md = String::new();
    md.push_str("# Inferred tech debt\n\n");
    md.push_str(&format!("- Code files scanned: `{}`\n", debt.code_files));
    md.push_str(&format!("- Items: `{}`\n\n", debt.items.len()));

    if debt.items.is_empty() {
        if debt.suspicious_empty {
            md.push_str(&format!(
                "**Suspicious empty result:** no markers, anti-patterns or missing-test signals \
                 were found across {} code files. Check that the scan covered the real sources.\n",
                debt.code_files
            ));
        } else if debt.code_files == 0 {
            md.push_str("No items: the project has no code files to scan.\n");
        } else {
            md.push_str(
                "No items: none of the debt markers, anti-pattern rules or missing-test checks \
                 matched this small codebase.\n",
            );
        }
        return md;
    }

    for priority in Priority::ALL {
        let items: Vec<_> = debt.items.iter().filter(|i| i.priority == priority).collect();
        if items.is_empty() {
            continue;
        }
        md.push_str(&format!("## {} ({})\n\n", priority.as_str(), items.len()));
        md.push_str("| id | location | category | rule | evidence |\n|---|---|---|---|---|\n");
        for item in items {
            let location = if item.line == 0 {
                item.file.clone()
            } else {
                format!("{}:{}", item.file, item.line)
            };
            md.push_str(&format!(
                "| `{}` | `{}` | {} | `{}` | {} |\n",
                item.id,
                location,
                item.category.as_str(),
                item.rule,
                escape_cell(&truncate_one_line(&item.evidence_text, 120))
            ));
        }
        md.push('\n');
    }
    md
}

fn truncate_one_line(text: &str, max_chars: usize) -> String {
    let mut s = text.replace(['\n', '\r', '\t'], " ");
    s = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if s.chars().count() <= max_chars {
        return s;
    }
    let truncated: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{truncated}…")
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoreConfig;
    use crate::run::RunOptions;
    use lore_protocol::{DebtCategory, RunFlag, TechDebtItem};
    use std::path::PathBuf;

    fn item(file: &str, line: usize, priority: Priority) -> TechDebtItem {
        TechDebtItem {
            id: format!("DEBT-{line:04}"),
            file: file.to_string(),
            line,
            priority,
            category: DebtCategory::Maintenance,
            rule: "todo".to_string(),
            evidence_text: "// TODO: split | merge".to_string(),
        }
    }

    #[test]
    fn debt_report_groups_by_priority() {
        let report = DebtReport {
            items: vec![item("src/a.rs", 3, Priority::P2), item("src/b.rs", 0, Priority::P0)],
            code_files: 4,
            suspicious_empty: false,
        };
        let md = render_debt_report(&report);
        let p0 = md.find("## P0 (1)").unwrap();
        let p2 = md.find("## P2 (1)").unwrap();
        assert!(p0 < p2);
        assert!(md.contains("`src/a.rs:3`"));
        assert!(md.contains("| `src/b.rs` |"));
        assert!(md.contains("split \\| merge"));
    }

    #[test]
    fn empty_debt_report_explains_itself() {
        let suspicious = DebtReport {
            items: Vec::new(),
            code_files: 40,
            suspicious_empty: true,
        };
        assert!(render_debt_report(&suspicious).contains("Suspicious empty result"));

        let small = DebtReport {
            items: Vec::new(),
            code_files: 2,
            suspicious_empty: false,
        };
        assert!(render_debt_report(&small).contains("No items"));
    }

    #[test]
    fn import_report_lists_skip_reason_and_flags() {
        let options = RunOptions {
            threat_model: false,
            threat_skip_reason: Some("library without network surface".to_string()),
            ..RunOptions::from_config(&LoreConfig::default())
        };
        let run = ImportRun::start(PathBuf::from("/p"), PathBuf::from("/p/.project"), options)
            .flagged([RunFlag::SuspiciousEmptyDecisions { files_scanned: 3 }]);
        let md = render_import_report(&run, None, None);
        assert!(md.starts_with("# Import report"));
        assert!(md.contains("Status: **pending validation**"));
        assert!(md.contains("Skipped: library without network surface"));
        assert!(md.contains("`suspicious_empty_decisions`"));
    }

    #[test]
    fn truncation_keeps_one_line() {
        assert_eq!(truncate_one_line("a\nb   c", 10), "a b c");
        assert_eq!(truncate_one_line("abcdef", 4), "abc…");
    }
}
