use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Datastore-browser entry in the shape the collecting collaborator returns it.
/// Field presence is not guaranteed; the normalizer absorbs the variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDatastoreFile {
    pub folder_path: Option<String>,  // e.g. "[datastore1] web-01/"
    pub file_name: Option<String>,    // e.g. "web-01.vmdk"
    pub size_bytes: Option<i64>,      // None when the browse returned partial details
    pub modified_at: Option<DateTime<Utc>>,
}

/// Disk attachment declared by a VM configuration, collector-shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVmDiskDevice {
    pub vm_name: Option<String>,
    pub backing_path: Option<String>, // "[datastore1] web-01/web-01.vmdk"
    pub device_key: Option<i32>,
    #[serde(default)]
    pub is_template: bool,
}

/// One collection run's fully-materialized raw inventory.
///
/// A `None` section means the collector never produced it (an upstream
/// failure); an empty `Vec` means "zero found" and is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub run_id: Uuid,
    pub collected_at: DateTime<Utc>,
    #[serde(default)]
    pub datastore_files: Option<Vec<RawDatastoreFile>>,
    #[serde(default)]
    pub vm_disks: Option<Vec<RawVmDiskDevice>>,
}

/// Canonical record of one physical disk file on a datastore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskFileRecord {
    pub path: String,
    pub size_bytes: Option<u64>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Canonical record of one disk attachment from a VM configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredDiskReference {
    pub owning_vm_name: String,
    pub path: String,
    pub device_key: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanReason {
    Unregistered,
    StaleSnapshot,
    Unresolved,
}

impl OrphanReason {
    /// Sort rank; lower sorts first in the report.
    pub fn priority(&self) -> u8 {
        match self {
            OrphanReason::Unregistered => 0,
            OrphanReason::StaleSnapshot => 1,
            OrphanReason::Unresolved => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanCandidate {
    pub path: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub reason: OrphanReason,
    pub confidence: f64,       // display/sorting signal only
    pub is_estimated: bool,    // size/mtime substituted by the deterministic estimator
}

/// Counters for records the normalizer dropped or repaired.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub skipped_files: usize,
    pub skipped_refs: usize,
    pub sidecar_files: usize,
    pub duplicate_paths: usize,
}

impl DataQuality {
    pub fn has_warnings(&self) -> bool {
        self.skipped_files > 0 || self.skipped_refs > 0 || self.duplicate_paths > 0
    }
}

/// Normalizer output: both canonical maps plus the data-quality counters.
#[derive(Debug)]
pub struct NormalizedInventory {
    pub disk_files: Option<std::collections::HashMap<String, DiskFileRecord>>,
    pub registered: Option<std::collections::HashMap<String, Vec<RegisteredDiskReference>>>,
    pub quality: DataQuality,
}

/// Final report handed to the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub candidates: Vec<OrphanCandidate>,
    pub unregistered_count: usize,
    pub stale_snapshot_count: usize,
    pub unresolved_count: usize,
    pub estimated_count: usize,
    pub total_reclaimable_bytes: u64,
    pub quality: DataQuality,
}
