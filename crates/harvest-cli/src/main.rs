//! Harvest CLI - run and inspect the extractor fleet.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use harvest_core::{ExecutionStats, TaskState};
use harvest_engine::{
    days, script_catalog, Aggregator, Executor, Loader, Registry, RegistryOverrides, RunContext,
    Scheduler, DEFAULT_MAX_CONCURRENT,
};

/// Harvest - orchestrates the site extractor fleet
#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Run, retry, and aggregate the site extractor fleet", long_about = None)]
struct Cli {
    /// Fleet root directory holding extractor scripts and artifacts
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Optional JSON file with per-task policy overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interpreter used to run extractor scripts
    #[arg(long, default_value = "python3")]
    interpreter: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered tasks and their policies
    List,

    /// Run one named task
    Run {
        /// Task name
        name: String,
    },

    /// Run all enabled tasks and write the combined report
    #[command(name = "run-all")]
    RunAll {
        /// Maximum number of tasks running at once
        #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT)]
        max_concurrent: usize,

        /// Exit non-zero if any task fails
        #[arg(long)]
        strict: bool,
    },

    /// Combine currently-present artifacts into the report
    Combine,

    /// Show the summary from the last written report
    Stats,

    /// Check that every registered task resolves to a unit
    Validate,

    /// Delete task artifacts older than N days
    Purge {
        /// Age cutoff in days
        #[arg(long)]
        days: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let overrides = match &cli.config {
        Some(path) => RegistryOverrides::from_file(path)?,
        None => RegistryOverrides::none(),
    };
    let registry = Registry::with_overrides(&overrides);

    let catalog = script_catalog(registry.list_all(), &cli.root, &cli.interpreter);
    let loader = Loader::new(Arc::new(catalog));
    let aggregator = Aggregator::new(&cli.root);

    match cli.command {
        Commands::List => list_tasks(&registry),
        Commands::Run { name } => run_one(&registry, loader, &name).await?,
        Commands::RunAll {
            max_concurrent,
            strict,
        } => run_all(&registry, loader, &aggregator, max_concurrent, strict).await?,
        Commands::Combine => combine(&registry, &aggregator),
        Commands::Stats => show_stats(&aggregator)?,
        Commands::Validate => validate(&registry, &loader)?,
        Commands::Purge { days: age } => purge(&registry, &aggregator, age),
    }

    Ok(())
}

fn list_tasks(registry: &Registry) {
    println!(
        "{:<14}  {:<8}  {:<8}  {:<10}  {:<10}  {}",
        "NAME", "ENABLED", "RETRIES", "DELAY", "TIMEOUT", "PRIORITY"
    );
    println!("{}", "-".repeat(70));

    for spec in registry.list_all() {
        println!(
            "{:<14}  {:<8}  {:<8}  {:<10}  {:<10}  {}",
            spec.name,
            if spec.enabled { "yes" } else { "no" },
            spec.max_retries,
            format!("{:?}", spec.retry_delay),
            format!("{:?}", spec.timeout),
            spec.priority,
        );
    }
    println!("\n{} task(s) registered", registry.len());
}

async fn run_one(
    registry: &Registry,
    loader: Loader,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = registry.require(name)?.clone();
    let executor = Executor::new(loader);
    let ctx = RunContext::new();

    let stats = executor.execute(&spec, &ctx).await;
    print_stats_table(std::slice::from_ref(&stats));

    if !stats.success {
        return Err(format!(
            "task '{}' settled as {:?}: {}",
            name,
            stats.state,
            stats.last_error.as_deref().unwrap_or("no error message")
        )
        .into());
    }
    Ok(())
}

async fn run_all(
    registry: &Registry,
    loader: Loader,
    aggregator: &Aggregator,
    max_concurrent: usize,
    strict: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let specs = registry.list_enabled();
    if specs.is_empty() {
        warn!("No enabled tasks to run");
        return Ok(());
    }

    let ctx = RunContext::new();
    let cancel_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling run");
            cancel_ctx.cancel();
        }
    });

    let scheduler = Scheduler::new(Executor::new(loader));
    let outcomes = scheduler
        .run_many(specs.clone(), max_concurrent, &ctx)
        .await;

    let report = aggregator.combine(&specs, outcomes.into_values().collect());

    print_stats_table(&report.tasks.values().cloned().collect::<Vec<_>>());
    println!(
        "\n{} succeeded, {} failed, {} cancelled; {} artifact(s), {} bytes",
        report.succeeded,
        report.failed,
        report.cancelled,
        report.artifacts_collected,
        report.total_artifact_bytes,
    );

    if strict && report.failed > 0 {
        return Err(format!("{} task(s) failed", report.failed).into());
    }
    Ok(())
}

fn combine(registry: &Registry, aggregator: &Aggregator) {
    let specs = registry.list_enabled();
    let report = aggregator.combine(&specs, Vec::new());
    println!(
        "Combined {} artifact(s) across {} task(s) ({} bytes)",
        report.artifacts_collected,
        report.total_tasks(),
        report.total_artifact_bytes,
    );
}

fn show_stats(aggregator: &Aggregator) -> Result<(), Box<dyn std::error::Error>> {
    let document = aggregator.read_report()?;
    let report = document.metadata;

    println!("Run {} at {}", report.run_id, report.generated_at.to_rfc3339());
    println!(
        "{} succeeded, {} failed, {} cancelled over {} task(s)",
        report.succeeded,
        report.failed,
        report.cancelled,
        report.total_tasks(),
    );
    println!(
        "{} artifact(s) collected, {} bytes, {} ms total task time\n",
        report.artifacts_collected, report.total_artifact_bytes, report.total_duration_ms,
    );
    print_stats_table(&report.tasks.values().cloned().collect::<Vec<_>>());
    Ok(())
}

fn validate(registry: &Registry, loader: &Loader) -> Result<(), Box<dyn std::error::Error>> {
    let mut failures = 0;
    for spec in registry.list_all() {
        match loader.load(spec) {
            Ok(_) => println!("{:<14}  ok", spec.name),
            Err(err) => {
                failures += 1;
                println!("{:<14}  FAILED: {}", spec.name, err);
            }
        }
    }

    if failures > 0 {
        error!(failures, "Validation found unresolvable tasks");
        return Err(format!("{failures} task(s) failed to resolve").into());
    }
    println!("\nAll {} task(s) resolve", registry.len());
    Ok(())
}

fn purge(registry: &Registry, aggregator: &Aggregator, age_days: u64) {
    let removed = aggregator.purge(registry.list_all(), days(age_days));
    println!("Purged {removed} artifact(s) older than {age_days} day(s)");
}

fn print_stats_table(stats: &[ExecutionStats]) {
    println!(
        "{:<14}  {:<10}  {:<8}  {:<10}  {}",
        "NAME", "STATE", "ATTEMPTS", "DURATION", "LAST ERROR"
    );
    println!("{}", "-".repeat(78));

    for entry in stats {
        println!(
            "{:<14}  {:<10}  {:<8}  {:<10}  {}",
            entry.name,
            state_name(entry.state),
            entry.attempts,
            entry
                .duration_ms
                .map(|ms| format!("{ms} ms"))
                .unwrap_or_else(|| "-".to_string()),
            entry.last_error.as_deref().unwrap_or("-"),
        );
    }
}

fn state_name(state: TaskState) -> &'static str {
    match state {
        TaskState::Pending => "pending",
        TaskState::Running => "running",
        TaskState::Retrying => "retrying",
        TaskState::Succeeded => "succeeded",
        TaskState::Failed => "failed",
        TaskState::Cancelled => "cancelled",
    }
}
