mod collector;
mod errors;
mod estimate;
mod normalizer;
mod reconciler;
mod report;
mod types;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};

use collector::{DemoSource, InventorySource, JsonFileSource};
use normalizer::InventoryNormalizer;
use reconciler::OrphanReconciler;
use report::{JsonFileSink, NullSink, ReportSink, StdoutSink};

#[derive(Parser, Debug)]
#[command(
    name = "vsphere-reporter",
    about = "Finds orphaned virtual disk files in a vSphere inventory snapshot"
)]
struct Cli {
    /// Inventory snapshot JSON exported by an external collector
    #[arg(long, conflicts_with = "demo")]
    input: Option<PathBuf>,

    /// Use the built-in demo inventory instead of a snapshot file
    #[arg(long)]
    demo: bool,

    /// Write the JSON report to this file instead of stdout
    #[arg(long, conflicts_with = "no_export")]
    output: Option<PathBuf>,

    /// Skip report export, only log the summary
    #[arg(long)]
    no_export: bool,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let source: Box<dyn InventorySource> = if cli.demo {
        Box::new(DemoSource)
    } else if let Some(path) = &cli.input {
        Box::new(JsonFileSource::new(path))
    } else {
        bail!("either --input <snapshot.json> or --demo is required");
    };

    let snapshot = source
        .collect()
        .await
        .context("inventory collection failed")?;

    let inventory = InventoryNormalizer::normalize(&snapshot);

    let candidates = OrphanReconciler::reconcile(
        inventory.disk_files.as_ref(),
        inventory.registered.as_ref(),
        snapshot.collected_at,
    )
    .context("orphan reconciliation failed")?;

    let orphan_report = report::assemble(&snapshot, candidates, inventory.quality);

    info!(
        "Run {}: {} orphan candidates ({} unregistered, {} stale snapshots, {} unresolved), {} reclaimable, {} with estimated data",
        orphan_report.run_id,
        orphan_report.candidates.len(),
        orphan_report.unregistered_count,
        orphan_report.stale_snapshot_count,
        orphan_report.unresolved_count,
        report::format_size(orphan_report.total_reclaimable_bytes),
        orphan_report.estimated_count
    );
    if orphan_report.quality.has_warnings() {
        warn!(
            "Collection had data-quality issues: {} file entries skipped, {} device entries skipped, {} duplicate paths",
            orphan_report.quality.skipped_files,
            orphan_report.quality.skipped_refs,
            orphan_report.quality.duplicate_paths
        );
    }

    let sink: Box<dyn ReportSink> = if cli.no_export {
        Box::new(NullSink)
    } else if let Some(path) = cli.output {
        Box::new(JsonFileSink::new(path))
    } else {
        Box::new(StdoutSink)
    };

    sink.write(&orphan_report)
        .await
        .context("report export failed")?;

    Ok(())
}

#[tokio::main]
async fn main() {
    // Single process-wide logging handle, initialized once before any work.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    info!("Starting vSphere orphan reporter");

    if let Err(e) = run(cli).await {
        error!("Report run failed: {:#}", e);
        std::process::exit(1);
    }
}
