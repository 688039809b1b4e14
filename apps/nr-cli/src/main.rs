use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nr_app::{
    AppError, AppResult, Collaborators, CycleProgressEvent, EngineConfig, FileModel, SyncRequest,
    load_config, load_references, open_store,
};
use nr_core::EntityId;
use nr_rules::{Finding, FindingKind};
use nr_store::AuditOutcome;
use nr_sync::{
    AcceptAll, AcceptIds, RejectAll, Resolution, SyncMode, SyncReport, WritebackReviewer,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "netrecon")]
#[command(about = "netrecon - network validation and model/store reconciliation", long_about = None)]
struct Cli {
    /// Engine config YAML (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rule checks against a model file (read-only)
    Validate {
        /// Path to the model JSON file
        model_path: PathBuf,
        /// Surveyed reference points JSON
        #[arg(long)]
        refs: Option<PathBuf>,
    },
    /// Reconcile the model with its store
    Sync {
        /// Path to the model JSON file
        model_path: PathBuf,
        /// Surveyed reference points JSON
        #[arg(long)]
        refs: Option<PathBuf>,
        /// Report what would change without writing anything
        #[arg(long, conflicts_with = "apply")]
        dry_run: bool,
        /// Apply pushes and accepted writebacks
        #[arg(long)]
        apply: bool,
        /// Entity ids whose store corrections may be written to the model
        #[arg(long, value_delimiter = ',')]
        accept: Vec<String>,
        /// Accept every proposed model writeback
        #[arg(long, conflicts_with = "accept")]
        accept_all: bool,
    },
    /// List stored findings
    Findings {
        /// Path to the model JSON file
        model_path: PathBuf,
        /// Include resolved findings
        #[arg(long)]
        all: bool,
    },
    /// Acknowledge an open finding
    Acknowledge {
        /// Path to the model JSON file
        model_path: PathBuf,
        /// Finding id as printed by `findings`
        finding_id: String,
    },
    /// Resolve a conflicted entity by keeping one side
    Resolve {
        /// Path to the model JSON file
        model_path: PathBuf,
        /// Entity id
        entity_id: String,
        /// Side whose values win
        #[arg(long, value_enum)]
        keep: KeepSide,
    },
    /// Print the audit log
    Audit {
        /// Path to the model JSON file
        model_path: PathBuf,
        /// Only show the last N records
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KeepSide {
    Model,
    Store,
}

fn main() -> AppResult<()> {
    let filter = EnvFilter::try_from_env("NETRECON_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Validate { model_path, refs } => {
            cmd_validate(&model_path, refs.as_deref(), &config)
        }
        Commands::Sync {
            model_path,
            refs,
            dry_run,
            apply,
            accept,
            accept_all,
        } => {
            let mode = match (dry_run, apply) {
                (_, true) => SyncMode::Apply,
                (true, false) => SyncMode::DryRun,
                (false, false) => {
                    return Err(AppError::InvalidInput(
                        "choose --dry-run or --apply".to_string(),
                    ));
                }
            };
            cmd_sync(&model_path, refs.as_deref(), &config, mode, accept, accept_all)
        }
        Commands::Findings { model_path, all } => cmd_findings(&model_path, all),
        Commands::Acknowledge {
            model_path,
            finding_id,
        } => cmd_acknowledge(&model_path, &finding_id, &config),
        Commands::Resolve {
            model_path,
            entity_id,
            keep,
        } => cmd_resolve(&model_path, &entity_id, keep, &config),
        Commands::Audit { model_path, limit } => cmd_audit(&model_path, limit),
    }
}

fn cmd_validate(model_path: &Path, refs: Option<&Path>, config: &EngineConfig) -> AppResult<()> {
    println!("Validating model: {}", model_path.display());
    let model = Arc::new(FileModel::open(model_path)?);
    let references = load_references(refs)?;
    let report = nr_app::validate(model, config, &references)?;

    let s = &report.summary;
    println!(
        "  {} structures, {} pipes, {} network(s)",
        s.structures, s.pipes, s.networks
    );
    if s.unmatched_references > 0 {
        println!("  {} reference point(s) matched nothing", s.unmatched_references);
    }
    if report.findings.is_empty() {
        println!("✓ No findings");
        return Ok(());
    }
    print_counts(&s.findings_by_kind);
    for f in &report.findings {
        print_finding(f);
    }
    Ok(())
}

fn cmd_sync(
    model_path: &Path,
    refs: Option<&Path>,
    config: &EngineConfig,
    mode: SyncMode,
    accept: Vec<String>,
    accept_all: bool,
) -> AppResult<()> {
    let collaborators = Collaborators::open(model_path)?;
    let references = load_references(refs)?;

    let accept_ids: AcceptIds = accept.into_iter().map(EntityId::from).collect();
    let reviewer: &dyn WritebackReviewer = if accept_all {
        &AcceptAll
    } else if accept_ids.0.is_empty() {
        &RejectAll
    } else {
        &accept_ids
    };

    let request = SyncRequest {
        mode,
        reviewer,
        references: &references,
        config,
        cancel: None,
    };
    let mut on_progress = |event: CycleProgressEvent| render_cli_progress(&event);
    let report = nr_app::sync_with_progress(&collaborators, &request, Some(&mut on_progress))?;
    clear_progress_line();
    print_sync_report(&report);
    Ok(())
}

fn cmd_findings(model_path: &Path, all: bool) -> AppResult<()> {
    let (store, _audit) = open_store(model_path)?;
    let findings = nr_app::list_findings(&store, all)?;
    if findings.is_empty() {
        println!("No findings stored");
        return Ok(());
    }
    for f in &findings {
        print_finding(f);
    }
    Ok(())
}

fn cmd_acknowledge(model_path: &Path, finding_id: &str, config: &EngineConfig) -> AppResult<()> {
    let collaborators = Collaborators::open(model_path)?;
    let finding = nr_app::acknowledge_finding(&collaborators, config, finding_id)?;
    println!("✓ Acknowledged {} ({})", finding.id, finding.key);
    Ok(())
}

fn cmd_resolve(
    model_path: &Path,
    entity_id: &str,
    keep: KeepSide,
    config: &EngineConfig,
) -> AppResult<()> {
    let collaborators = Collaborators::open(model_path)?;
    let resolution = match keep {
        KeepSide::Model => Resolution::KeepModel,
        KeepSide::Store => Resolution::KeepStore,
    };
    nr_app::resolve_conflict(&collaborators, config, &EntityId::from(entity_id), resolution)?;
    println!("✓ Resolved {}", entity_id);
    Ok(())
}

fn cmd_audit(model_path: &Path, limit: Option<usize>) -> AppResult<()> {
    let (_store, audit) = open_store(model_path)?;
    let records = nr_app::read_audit(&audit)?;
    let skip = limit.map_or(0, |n| records.len().saturating_sub(n));
    for r in records.iter().skip(skip) {
        let outcome = match &r.outcome {
            AuditOutcome::Started => "started".to_string(),
            AuditOutcome::Succeeded => "ok".to_string(),
            AuditOutcome::Failed { error } => format!("failed: {}", error),
            AuditOutcome::Skipped { reason } => format!("skipped: {}", reason),
        };
        let entities: Vec<&str> = r.entity_ids.iter().map(EntityId::as_str).collect();
        println!(
            "{}  {:<20} [{}] {}",
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            serde_json::to_value(r.operation)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            entities.join(","),
            outcome
        );
    }
    Ok(())
}

fn print_counts(counts: &std::collections::BTreeMap<FindingKind, usize>) {
    for (kind, n) in counts {
        println!("  {:<22} {}", kind.label(), n);
    }
}

fn print_finding(f: &Finding) {
    println!(
        "  {}  {:<8} {:<13} {}",
        f.id,
        format!("{:?}", f.severity),
        format!("{:?}", f.status),
        f.message
    );
}

fn print_sync_report(report: &SyncReport) {
    let verb = if report.dry_run { "Dry run" } else { "Sync" };
    println!("✓ {} complete (cycle {})", verb, report.cycle_id);
    print_counts(&report.findings_by_kind);
    println!("  In sync:            {}", report.in_sync.len());
    if report.dry_run {
        println!("  Would push:         {}", report.pending_push.len());
    } else {
        println!("  Pushed to store:    {}", report.pushed.len());
        println!("  Written to model:   {}", report.written_back.len());
    }
    println!("  Awaiting review:    {}", report.pending_writeback.len());
    println!("  Conflicts:          {}", report.conflicted_count());
    println!("  Orphaned:           {}", report.orphaned.len());
    println!("  Failed:             {}", report.failed_count());

    for id in &report.pending_writeback {
        println!("    review  {}", id);
    }
    for c in &report.conflicts {
        println!(
            "    conflict {} (model {}, store {})",
            c.id, c.model_revision, c.store_revision
        );
    }
    for f in &report.failures {
        println!("    failed  {}: {}", f.id, f.error);
    }
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(80));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &CycleProgressEvent) {
    let message = event.message.as_deref().unwrap_or("");
    print!(
        "\r{:<20} {:>6.2}s  {}",
        format!("{:?}", event.stage),
        event.elapsed_wall_s,
        message
    );
    let _ = io::stdout().flush();
}
