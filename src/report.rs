use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::Result;
use crate::types::*;

/// Assemble the final report from one run's reconciled candidates.
/// `generated_at` is the snapshot's collection time, so a fixed snapshot
/// always assembles into the same report.
pub fn assemble(
    snapshot: &InventorySnapshot,
    candidates: Vec<OrphanCandidate>,
    quality: DataQuality,
) -> OrphanReport {
    let unregistered_count = candidates
        .iter()
        .filter(|c| c.reason == OrphanReason::Unregistered)
        .count();
    let stale_snapshot_count = candidates
        .iter()
        .filter(|c| c.reason == OrphanReason::StaleSnapshot)
        .count();
    let unresolved_count = candidates.len() - unregistered_count - stale_snapshot_count;
    let estimated_count = candidates.iter().filter(|c| c.is_estimated).count();

    // Estimated sizes stay out of the reclaimable total; the per-candidate
    // flag tells the renderer which rows carry substituted numbers.
    let total_reclaimable_bytes = candidates
        .iter()
        .filter(|c| !c.is_estimated)
        .map(|c| c.size_bytes)
        .sum();

    OrphanReport {
        run_id: snapshot.run_id,
        generated_at: snapshot.collected_at,
        candidates,
        unregistered_count,
        stale_snapshot_count,
        unresolved_count,
        estimated_count,
        total_reclaimable_bytes,
        quality,
    }
}

/// Human-readable size, the way the report renderers display it.
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const TIB: f64 = 1024.0 * 1024.0 * 1024.0 * 1024.0;

    let b = bytes as f64;
    if b >= TIB {
        format!("{:.2} TB", b / TIB)
    } else if b >= GIB {
        format!("{:.2} GB", b / GIB)
    } else if b >= MIB {
        format!("{:.2} MB", b / MIB)
    } else if b >= KIB {
        format!("{:.2} KB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}

/// Export capability. The concrete sink is chosen once at startup from
/// configuration, never by probing the filesystem at runtime.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn write(&self, report: &OrphanReport) -> Result<()>;
}

/// Writes the report as pretty JSON to a file.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReportSink for JsonFileSink {
    async fn write(&self, report: &OrphanReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&self.path, json).await?;
        info!(
            "Wrote report for run {} to {}",
            report.run_id,
            self.path.display()
        );
        Ok(())
    }
}

/// Prints the report as pretty JSON on stdout for piping into a renderer.
pub struct StdoutSink;

#[async_trait]
impl ReportSink for StdoutSink {
    async fn write(&self, report: &OrphanReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        println!("{}", json);
        Ok(())
    }
}

/// No-op sink for runs where only the log summary is wanted.
pub struct NullSink;

#[async_trait]
impl ReportSink for NullSink {
    async fn write(&self, report: &OrphanReport) -> Result<()> {
        debug!("Report export disabled, discarding report for run {}", report.run_id);
        Ok(())
    }
}
