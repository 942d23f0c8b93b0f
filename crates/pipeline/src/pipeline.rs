//! Stage orchestration: scan → extract → reconcile → analyse → debt → graph → write →
//! validate → (enhance).

use crate::artifacts::{
    AdrIndex, ArtifactWriter, OutputLayout, ThreatModelArtifact, ThreatSummary, ADR_INDEX_PATH,
    IMPORT_REPORT_PATH, ISSUES_DIR, LLM_SYNTHESIS_PATH, RUN_METADATA_PATH, TECH_DEBT_REPORT_PATH,
    THREAT_MODEL_PATH,
};
use crate::config::LoreConfig;
use crate::enhance::{
    EnhancementOutcome, Enhancer, OllamaSynthesizer, SynthesisArtifact, Synthesizer,
};
use crate::issues::{file_issues, low_confidence_drafts, FileIssueSink};
use crate::report::{render_debt_report, render_import_report};
use crate::run::{FinalizedRun, ImportRun, RunOptions, ThreatOutcome};
use crate::validator::ArtifactValidator;
use anyhow::{Context, Result};
use chrono::Utc;
use lore_analysis::{ComponentDetector, TechDebtDetector, ThreatModeler};
use lore_decisions::{DecisionExtractor, Reconciler};
use lore_graph::{GraphGenerator, GraphInputs};
use lore_protocol::path_filters::normalize_relative_path;
use lore_protocol::{RunFlag, ARTIFACT_SCHEMA_VERSION};
use lore_scanner::{LanguageDetector, ScanOptions, SourceSet};
use std::path::Path;
use std::time::Duration;

pub struct ImportPipeline {
    config: LoreConfig,
    options: RunOptions,
    synthesizer: Option<Box<dyn Synthesizer>>,
}

impl ImportPipeline {
    pub fn new(config: LoreConfig, options: RunOptions) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            options,
            synthesizer: None,
        })
    }

    /// Use `synthesizer` instead of the configured Ollama endpoint.
    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: Box<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn config(&self) -> &LoreConfig {
        &self.config
    }

    /// Run every stage against `project_root`. `Err` means a fatal failure; an
    /// INCOMPLETE run is a successful return whose status says so.
    pub async fn run(&self, project_root: &Path) -> Result<FinalizedRun> {
        let project_root = project_root
            .canonicalize()
            .with_context(|| format!("Project path {} is not readable", project_root.display()))?;
        let output_root = self.config.output_dir(&project_root);
        log::info!(
            "Importing {} into {}",
            project_root.display(),
            output_root.display()
        );

        let run = ImportRun::start(project_root.clone(), output_root, self.options.clone());
        let sources = self.load_sources(&project_root, &run.output_root)?;
        let run = ImportRun {
            languages: LanguageDetector::new().detect(&sources),
            files_scanned: sources.files().len(),
            ..run
        };

        let run = self.extract(run, &sources);
        let run = self.reconcile(run)?;
        let run = self.analyse(run, &sources)?;
        let run = self.build_graph(run)?;

        let writer = ArtifactWriter::new(OutputLayout::new(&run.output_root));
        self.write_artifacts(&writer, &run)?;
        let run = self.file_issues(&writer, run);
        writer.write_text(IMPORT_REPORT_PATH, &render_import_report(&run, None, None))?;

        let validation = ArtifactValidator::new(self.config.validator)
            .validate(writer.layout(), run.threats.skip_reason().is_some());

        let (run, enhancement) = if run.options.llm {
            if validation.is_complete() {
                self.enhance(&writer, run).await
            } else {
                log::info!("Skipping LLM synthesis: run is INCOMPLETE");
                let reason = "run is INCOMPLETE".to_string();
                (
                    run.flagged([RunFlag::EnhancementDegraded {
                        reason: reason.clone(),
                    }]),
                    Some(EnhancementOutcome::Degraded { reason }),
                )
            }
        } else {
            (run, None)
        };

        let finalized = run.finalize(validation, enhancement);
        writer.write_text(
            IMPORT_REPORT_PATH,
            &render_import_report(
                finalized.run(),
                Some(finalized.validation()),
                finalized.enhancement(),
            ),
        )?;
        writer.write_json(RUN_METADATA_PATH, &finalized.metadata())?;
        log::info!("Import finished: {}", finalized.status().as_str());
        Ok(finalized)
    }

    fn load_sources(&self, project_root: &Path, output_root: &Path) -> Result<SourceSet> {
        let mut exclude = self.config.scan.exclude.clone();
        if let Some(rel) = normalize_relative_path(project_root, output_root) {
            if !rel.is_empty() {
                exclude.push(rel);
            }
        }
        let options = ScanOptions {
            exclude,
            ..ScanOptions::default()
        };
        SourceSet::load(project_root, &options)
            .with_context(|| format!("Failed to read project {}", project_root.display()))
    }

    fn extract(&self, run: ImportRun, sources: &SourceSet) -> ImportRun {
        let extraction = DecisionExtractor::new().extract(sources);
        let mut flags: Vec<RunFlag> = extraction
            .parse_failures
            .iter()
            .map(|failure| RunFlag::ParseFailure {
                path: failure.path.clone(),
                reason: failure.reason.clone(),
            })
            .collect();
        if extraction.is_empty() {
            flags.push(RunFlag::SuspiciousEmptyDecisions {
                files_scanned: extraction.files_scanned,
            });
        }
        ImportRun { extraction, ..run }.flagged(flags)
    }

    fn reconcile(&self, run: ImportRun) -> Result<ImportRun> {
        let reconciliation = Reconciler::new(self.config.reconcile)?
            .reconcile(&run.extraction.existing, &run.extraction.inferred)
            .context("Decision reconciliation failed")?;
        let flags: Vec<RunFlag> = reconciliation
            .empty_buckets()
            .into_iter()
            .map(|bucket| RunFlag::EmptyReconciliationBucket {
                bucket: bucket.to_string(),
            })
            .collect();
        Ok(ImportRun {
            reconciliation,
            ..run
        }
        .flagged(flags))
    }

    fn analyse(&self, run: ImportRun, sources: &SourceSet) -> Result<ImportRun> {
        let components = ComponentDetector::new(self.config.components.depth)?
            .detect(sources, &run.extraction.inferred);

        let mut flags = Vec::new();
        let threats = match &run.threats {
            ThreatOutcome::Skipped { reason } => {
                log::info!("Threat modeling skipped: {reason}");
                flags.push(RunFlag::ThreatModelSkipped {
                    reason: reason.clone(),
                });
                run.threats.clone()
            }
            ThreatOutcome::Modeled(_) => ThreatOutcome::Modeled(
                ThreatModeler::new(self.config.threats.clone())?
                    .model(sources, &components, &run.reconciliation.records)
                    .context("Threat modeling failed")?,
            ),
        };

        let debt = TechDebtDetector::new(self.config.debt.clone())?.detect(sources, &components);
        if debt.suspicious_empty {
            flags.push(RunFlag::SuspiciousEmptyDebt {
                files_scanned: debt.code_files,
            });
        }

        Ok(ImportRun {
            components,
            threats,
            debt,
            ..run
        }
        .flagged(flags))
    }

    fn build_graph(&self, run: ImportRun) -> Result<ImportRun> {
        let findings = run
            .threats
            .model()
            .map(|model| model.findings.as_slice())
            .unwrap_or_default();
        let graph = GraphGenerator::new().generate(GraphInputs {
            records: &run.reconciliation.records,
            components: &run.components.components,
            data_flows: &run.components.data_flows,
            findings,
            debt: &run.debt.items,
        })
        .context("Knowledge graph construction failed")?;
        let orphans = graph.orphans().len();
        let document = graph.to_document();
        document
            .validate()
            .context("Knowledge graph failed its own consistency check")?;

        let flags = (orphans > 0).then_some(RunFlag::OrphanNodes { count: orphans });
        Ok(ImportRun {
            graph: document,
            ..run
        }
        .flagged(flags))
    }

    fn write_artifacts(&self, writer: &ArtifactWriter, run: &ImportRun) -> Result<()> {
        writer.prepare()?;
        let records = &run.reconciliation.records;
        writer.write_decision_records(records)?;
        writer.write_yaml(
            ADR_INDEX_PATH,
            &AdrIndex::build(Utc::now(), &run.reconciliation, records),
        )?;
        writer.write_graph(&run.graph)?;
        if let Some(model) = run.threats.model() {
            writer.write_yaml(
                THREAT_MODEL_PATH,
                &ThreatModelArtifact {
                    schema_version: ARTIFACT_SCHEMA_VERSION,
                    generated_at: Utc::now(),
                    weights: self.config.threats.weights,
                    summary: ThreatSummary::from_findings(&model.findings),
                    model: model.clone(),
                },
            )?;
        }
        writer.write_text(TECH_DEBT_REPORT_PATH, &render_debt_report(&run.debt))?;
        log::info!(
            "Wrote {} decision records, graph ({} nodes, {} edges) and reports",
            records.len(),
            run.graph.nodes.len(),
            run.graph.edges.len()
        );
        Ok(())
    }

    fn file_issues(&self, writer: &ArtifactWriter, run: ImportRun) -> ImportRun {
        if !run.options.create_issues {
            return run;
        }
        let drafts = low_confidence_drafts(
            &run.reconciliation.records,
            self.config.issues.low_confidence_threshold,
        );
        let sink = FileIssueSink::new(writer.layout().path(ISSUES_DIR));
        let (_, flags) = file_issues(&sink, &drafts);
        run.flagged(flags)
    }

    async fn enhance(
        &self,
        writer: &ArtifactWriter,
        run: ImportRun,
    ) -> (ImportRun, Option<EnhancementOutcome>) {
        let timeout = Duration::from_millis(self.config.llm.timeout_ms);
        let max = self.config.llm.max_decisions;
        let outcome = match &self.synthesizer {
            Some(synthesizer) => {
                Enhancer::new(synthesizer.as_ref(), timeout, max)
                    .enhance(&run.reconciliation.records)
                    .await
            }
            None => {
                let ollama =
                    OllamaSynthesizer::new(&self.config.llm.endpoint, &self.config.llm.model);
                Enhancer::new(ollama, timeout, max)
                    .enhance(&run.reconciliation.records)
                    .await
            }
        };

        let outcome = match outcome {
            EnhancementOutcome::Synthesized(syntheses) => {
                let model = self
                    .synthesizer
                    .as_ref()
                    .map_or(self.config.llm.model.as_str(), |s| s.model())
                    .to_string();
                let artifact = SynthesisArtifact {
                    generated_at: Utc::now(),
                    model,
                    syntheses,
                };
                match writer.write_json(LLM_SYNTHESIS_PATH, &artifact) {
                    Ok(()) => EnhancementOutcome::Synthesized(artifact.syntheses),
                    Err(err) => EnhancementOutcome::Degraded {
                        reason: format!("{err:#}"),
                    },
                }
            }
            degraded => degraded,
        };

        let run = match &outcome {
            EnhancementOutcome::Degraded { reason } => run.flagged([RunFlag::EnhancementDegraded {
                reason: reason.clone(),
            }]),
            EnhancementOutcome::Synthesized(_) => run,
        };
        (run, Some(outcome))
    }
}
