use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::types::*;

static BRACKET_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[([^\]]+)\]\s*(.*)$").unwrap());

// Extent and changed-block companions of a descriptor disk. They are never
// independently orphaned, so they are filtered before reconciliation.
const SIDECAR_SUFFIXES: [&str; 5] = [
    "-flat.vmdk",
    "-delta.vmdk",
    "-ctk.vmdk",
    "-rdm.vmdk",
    "-sesparse.vmdk",
];

pub struct InventoryNormalizer;

impl InventoryNormalizer {
    /// Convert one raw snapshot into the canonical maps the reconciler
    /// consumes. Malformed entries are skipped and counted, never fatal.
    pub fn normalize(snapshot: &InventorySnapshot) -> NormalizedInventory {
        let mut quality = DataQuality::default();

        let disk_files = snapshot.datastore_files.as_ref().map(|entries| {
            let map = Self::normalize_datastore_files(entries, &mut quality);
            info!(
                "Normalized {} disk files from {} datastore entries ({} sidecar, {} skipped, {} duplicate)",
                map.len(),
                entries.len(),
                quality.sidecar_files,
                quality.skipped_files,
                quality.duplicate_paths
            );
            map
        });

        let registered = snapshot.vm_disks.as_ref().map(|entries| {
            let map = Self::normalize_vm_disks(entries, &mut quality);
            info!(
                "Normalized {} registered disk paths from {} VM devices ({} skipped)",
                map.len(),
                entries.len(),
                quality.skipped_refs
            );
            map
        });

        if quality.has_warnings() {
            warn!(
                "Inventory data-quality warnings: {} file entries skipped, {} VM device entries skipped, {} duplicate paths",
                quality.skipped_files, quality.skipped_refs, quality.duplicate_paths
            );
        }

        NormalizedInventory {
            disk_files,
            registered,
            quality,
        }
    }

    fn normalize_datastore_files(
        entries: &[RawDatastoreFile],
        quality: &mut DataQuality,
    ) -> HashMap<String, DiskFileRecord> {
        let mut map: HashMap<String, DiskFileRecord> = HashMap::new();

        for entry in entries {
            let file_name = match entry.file_name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name,
                _ => {
                    debug!("Skipping datastore entry without a file name: {:?}", entry);
                    quality.skipped_files += 1;
                    continue;
                }
            };

            if Self::is_sidecar_file(file_name) {
                debug!("Filtering sidecar file {}", file_name);
                quality.sidecar_files += 1;
                continue;
            }

            let path = Self::join_datastore_path(entry.folder_path.as_deref(), file_name);
            if path.is_empty() {
                quality.skipped_files += 1;
                continue;
            }

            let size_bytes = match entry.size_bytes {
                Some(size) if size < 0 => {
                    debug!("Skipping entry {} with negative size {}", path, size);
                    quality.skipped_files += 1;
                    continue;
                }
                Some(size) => Some(size as u64),
                None => None, // partial browse result; estimator fills in later
            };

            let record = DiskFileRecord {
                path: path.clone(),
                size_bytes,
                modified_at: entry.modified_at,
            };

            if map.insert(path.clone(), record).is_some() {
                warn!("Duplicate datastore path {} in browse results, keeping the later entry", path);
                quality.duplicate_paths += 1;
            }
        }

        map
    }

    fn normalize_vm_disks(
        entries: &[RawVmDiskDevice],
        quality: &mut DataQuality,
    ) -> HashMap<String, Vec<RegisteredDiskReference>> {
        let mut map: HashMap<String, Vec<RegisteredDiskReference>> = HashMap::new();
        let mut template_refs = 0usize;

        for entry in entries {
            let path = match entry.backing_path.as_deref().map(Self::normalize_path) {
                Some(path) if !path.is_empty() => path,
                _ => {
                    debug!("Skipping VM disk device without a backing path: {:?}", entry);
                    quality.skipped_refs += 1;
                    continue;
                }
            };

            if entry.is_template {
                template_refs += 1;
            }

            let reference = RegisteredDiskReference {
                owning_vm_name: entry
                    .vm_name
                    .clone()
                    .unwrap_or_else(|| "<unknown>".to_string()),
                path: path.clone(),
                device_key: entry.device_key.unwrap_or(0),
            };

            // Snapshot chains legitimately share a base disk; multiplicity
            // is preserved, not deduplicated.
            map.entry(path).or_default().push(reference);
        }

        if template_refs > 0 {
            debug!("{} registered disk references belong to templates", template_refs);
        }

        map
    }

    /// Canonical path format: trimmed, single separators, the
    /// `[datastore] relative/path` bracket notation kept verbatim. The
    /// bracket form is the unique key in this domain; it is never resolved
    /// to an absolute filesystem path since datastore names may alias.
    pub fn normalize_path(raw: &str) -> String {
        let trimmed = raw.trim();
        match BRACKET_PATH.captures(trimmed) {
            Some(caps) => {
                let relative = Self::collapse_separators(caps[2].trim())
                    .trim_start_matches('/')
                    .to_string();
                if relative.is_empty() {
                    format!("[{}]", &caps[1])
                } else {
                    format!("[{}] {}", &caps[1], relative)
                }
            }
            None => Self::collapse_separators(trimmed),
        }
    }

    /// Rebuild the full datastore path the way the browse API reports it:
    /// folder path plus file name, separated by exactly one slash.
    fn join_datastore_path(folder_path: Option<&str>, file_name: &str) -> String {
        let folder = folder_path.map(str::trim).unwrap_or("");
        if folder.is_empty() {
            return Self::normalize_path(file_name);
        }
        let mut joined = folder.to_string();
        if !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(file_name);
        Self::normalize_path(&joined)
    }

    fn is_sidecar_file(file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        SIDECAR_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
    }

    fn collapse_separators(path: &str) -> String {
        let mut out = String::with_capacity(path.len());
        let mut prev_slash = false;
        for c in path.chars() {
            if c == '/' {
                if !prev_slash {
                    out.push(c);
                }
                prev_slash = true;
            } else {
                prev_slash = false;
                out.push(c);
            }
        }
        out
    }
}
