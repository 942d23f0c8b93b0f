use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use lore_pipeline::{
    ArtifactValidator, FinalizedRun, ImportPipeline, LoreConfig, OutputLayout, RunOptions,
    RunStatus, ValidationReport,
};
use lore_protocol::serialize_json_pretty;
use lore_scanner::{LanguageDetector, ScanOptions, SourceSet};
use std::env;
use std::io;
use std::path::{Path, PathBuf};

/// Exit code of a run that finished but failed validation.
pub const EXIT_INCOMPLETE: i32 = 2;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "lore")]
#[command(about = "Reconstruct an architectural knowledge base from a codebase", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a project: extract and reconcile decisions, model threats, detect debt,
    /// build the knowledge graph and validate the result
    Import(ImportArgs),

    /// Re-run artifact validation against an existing output directory
    Validate(ValidateArgs),

    /// Detect the languages and frameworks of a project
    Languages(LanguagesArgs),
}

#[derive(Args)]
struct TargetArgs {
    /// Project directory
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Output directory (default: <path>/.project, or `output_root` from lore.toml)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (default: <path>/lore.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON to stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ImportArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Skip threat modeling; the reason is recorded in the run metadata
    #[arg(long)]
    no_threat_model: bool,

    /// Reason recorded when threat modeling is skipped
    #[arg(long, requires = "no_threat_model")]
    skip_reason: Option<String>,

    /// Run optional LLM synthesis after a complete import
    #[arg(long)]
    llm: bool,

    /// Write issue drafts for low-confidence decisions
    #[arg(long)]
    create_issues: bool,
}

#[derive(Args)]
struct ValidateArgs {
    #[command(flatten)]
    target: TargetArgs,
}

#[derive(Args)]
struct LanguagesArgs {
    /// Project directory
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Configuration file (default: <path>/lore.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON to stdout
    #[arg(long)]
    json: bool,
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // Auto-enable quiet mode when --json is used (to keep stdout clean for JSON parsing)
    let json_output = match &cli.command {
        Commands::Import(args) => args.target.json,
        Commands::Validate(args) => args.target.json,
        Commands::Languages(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let code = match cli.command {
        Commands::Import(args) => run_import(args).await?,
        Commands::Validate(args) => run_validate(args)?,
        Commands::Languages(args) => {
            run_languages(args)?;
            0
        }
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn project_root(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("Invalid project path {}", path.display()))
}

/// Load configuration and apply `--output`, which resolves against the working directory.
fn load_config(root: &Path, target: &TargetArgs) -> Result<LoreConfig> {
    let mut config = LoreConfig::load(root, target.config.as_deref())?;
    if let Some(output) = &target.output {
        config.output_root = if output.is_absolute() {
            output.clone()
        } else {
            env::current_dir()
                .context("Failed to resolve the working directory")?
                .join(output)
        };
    }
    Ok(config)
}

fn report_violations(report: &ValidationReport) {
    for violation in &report.violations {
        eprintln!("  - {}", violation.describe());
    }
}

async fn run_import(args: ImportArgs) -> Result<i32> {
    let root = project_root(&args.target.path)?;
    let config = load_config(&root, &args.target)?;

    let mut options = RunOptions::from_config(&config);
    if args.no_threat_model {
        options.threat_model = false;
        options.threat_skip_reason = args.skip_reason.clone();
    }
    options.llm |= args.llm;
    options.create_issues |= args.create_issues;

    let finalized = ImportPipeline::new(config, options)?.run(&root).await?;
    if args.target.json {
        print_stdout(&serialize_json_pretty(&finalized.metadata())?)?;
    } else {
        print_stdout(&import_summary(&finalized))?;
    }

    if finalized.status() == RunStatus::Complete {
        Ok(0)
    } else {
        eprintln!("Import is INCOMPLETE:");
        report_violations(finalized.validation());
        Ok(EXIT_INCOMPLETE)
    }
}

fn import_summary(finalized: &FinalizedRun) -> String {
    let run = finalized.run();
    let summary = run.reconciliation.summary();
    let mut out = format!(
        "Imported {} into {}\n",
        run.project_root.display(),
        run.output_root.display()
    );
    out.push_str(&format!(
        "decisions={} (existing={} inferred={}) duplicate={} enrich={} new={} unmatched={}\n",
        run.reconciliation.records.len(),
        summary.existing_total,
        summary.inferred_total,
        summary.duplicate,
        summary.enrich,
        summary.new,
        summary.unmatched_existing
    ));
    match run.threats.model() {
        Some(model) => out.push_str(&format!(
            "threats: findings={} unresolved_critical={}\n",
            model.findings.len(),
            model.unresolved_critical().len()
        )),
        None => out.push_str(&format!(
            "threats: skipped ({})\n",
            run.threats.skip_reason().unwrap_or_default()
        )),
    }
    out.push_str(&format!(
        "debt_items={} graph nodes={} edges={} confidence={:.3}\n",
        run.debt.items.len(),
        run.graph.nodes.len(),
        run.graph.edges.len(),
        run.overall_confidence()
    ));
    for flag in &run.flags {
        out.push_str(&format!("flag [{}]: {}\n", flag.code(), flag.describe()));
    }
    out.push_str(&format!("status: {}", finalized.status().as_str()));
    out
}

fn run_validate(args: ValidateArgs) -> Result<i32> {
    let root = project_root(&args.target.path)?;
    let config = load_config(&root, &args.target)?;
    let layout = OutputLayout::new(config.output_dir(&root));
    let report = ArtifactValidator::new(config.validator).validate_existing(&layout);

    if args.target.json {
        print_stdout(&serialize_json_pretty(&report)?)?;
    } else {
        let mut out = String::new();
        for check in &report.checklist {
            let mark = if check.present { "x" } else { " " };
            out.push_str(&format!("[{mark}] {}\n", check.path));
        }
        if let Some(coverage) = report.confidence_coverage {
            out.push_str(&format!("confidence coverage: {:.1}%\n", coverage * 100.0));
        }
        out.push_str(&format!("status: {}", report.status.as_str()));
        print_stdout(&out)?;
    }

    if report.is_complete() {
        Ok(0)
    } else {
        if !args.target.json {
            eprintln!("Validation failed:");
        }
        report_violations(&report);
        Ok(EXIT_INCOMPLETE)
    }
}

fn run_languages(args: LanguagesArgs) -> Result<()> {
    let root = project_root(&args.path)?;
    let config = LoreConfig::load(&root, args.config.as_deref())?;
    let options = ScanOptions {
        exclude: config.scan.exclude.clone(),
        ..ScanOptions::default()
    };
    let sources = SourceSet::load(&root, &options)
        .with_context(|| format!("Failed to read project {}", root.display()))?;
    let reports = LanguageDetector::new().detect(&sources);

    if args.json {
        print_stdout(&serialize_json_pretty(&reports)?)?;
    } else if reports.is_empty() {
        eprintln!("No languages detected in {}", root.display());
    } else {
        for report in &reports {
            let framework = report
                .framework
                .as_deref()
                .map(|f| format!(" ({f})"))
                .unwrap_or_default();
            print_stdout(&format!(
                "{}{} confidence={:.2} files={}",
                report.language, framework, report.confidence, report.files
            ))?;
        }
    }
    Ok(())
}
