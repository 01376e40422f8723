use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::errors::Result;
use crate::types::*;

/// Supplier of one fully-materialized inventory snapshot per run. Live
/// collectors page through a management API concurrently, but must hand
/// over a finished snapshot; the reconciler never sees partial input.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn collect(&self) -> Result<InventorySnapshot>;
}

/// Reads a snapshot exported to JSON by an external collector.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InventorySource for JsonFileSource {
    async fn collect(&self) -> Result<InventorySnapshot> {
        info!("Loading inventory snapshot from {}", self.path.display());
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let snapshot: InventorySnapshot = serde_json::from_str(&raw)?;
        info!(
            "Loaded snapshot {} collected at {}",
            snapshot.run_id, snapshot.collected_at
        );
        Ok(snapshot)
    }
}

/// Built-in sample inventory. Fully deterministic so demo reports and
/// tests reproduce byte-for-byte across runs.
pub struct DemoSource;

const DEMO_RUN_ID: u128 = 0x6f2f_3cbe_9d6a_4a35_b6d5_88f1_f654_079e;
const GIB: i64 = 1024 * 1024 * 1024;

fn demo_anchor() -> DateTime<Utc> {
    // 2025-06-01T00:00:00Z
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_240)
}

fn demo_file(folder: &str, name: &str, size_gib: Option<i64>, days_old: Option<i64>) -> RawDatastoreFile {
    RawDatastoreFile {
        folder_path: Some(folder.to_string()),
        file_name: Some(name.to_string()),
        size_bytes: size_gib.map(|g| g * GIB),
        modified_at: days_old.map(|d| demo_anchor() - Duration::days(d)),
    }
}

fn demo_disk(vm: &str, path: &str, key: i32, is_template: bool) -> RawVmDiskDevice {
    RawVmDiskDevice {
        vm_name: Some(vm.to_string()),
        backing_path: Some(path.to_string()),
        device_key: Some(key),
        is_template,
    }
}

#[async_trait]
impl InventorySource for DemoSource {
    async fn collect(&self) -> Result<InventorySnapshot> {
        info!("Using built-in demo inventory");

        let vm_disks = vec![
            demo_disk("web-01", "[datastore1] web-01/web-01.vmdk", 2000, false),
            demo_disk("web-01", "[datastore1] web-01/web-01_1.vmdk", 2001, false),
            demo_disk("db-01", "[SAN01] db-01/db-01.vmdk", 2000, false),
            demo_disk("tmpl-rhel9", "[datastore2] templates/tmpl-rhel9.vmdk", 2000, true),
        ];

        let datastore_files = vec![
            // Registered, healthy
            demo_file("[datastore1] web-01/", "web-01.vmdk", Some(40), Some(3)),
            demo_file("[datastore1] web-01/", "web-01_1.vmdk", Some(20), Some(3)),
            demo_file("[SAN01] db-01/", "db-01.vmdk", Some(120), Some(1)),
            demo_file("[datastore2] templates/", "tmpl-rhel9.vmdk", Some(16), Some(200)),
            // Extent companion of a registered descriptor, filtered out
            demo_file("[datastore1] web-01/", "web-01-flat.vmdk", Some(40), Some(3)),
            // Snapshot delta left behind after consolidation
            demo_file("[SAN01] db-01/", "db-01-000001.vmdk", Some(8), Some(150)),
            // Disk from a VM deleted long ago
            demo_file("[datastore1] old_web/", "web-server12.vmdk", Some(48), Some(400)),
            // Browse returned no details for this one; estimator kicks in
            demo_file("[NAS01] _old_vms/", "mail-01.vmdk", None, None),
            // Renamed before deletion, surfaced for manual review
            demo_file("[NAS01] _old_vms/", "mail-02.vmdk.old", Some(30), Some(500)),
        ];

        Ok(InventorySnapshot {
            run_id: Uuid::from_u128(DEMO_RUN_ID),
            collected_at: demo_anchor(),
            datastore_files: Some(datastore_files),
            vm_disks: Some(vm_disks),
        })
    }
}
