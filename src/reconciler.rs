use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::errors::{ReporterError, Result};
use crate::estimate;
use crate::types::*;

// Snapshot delta descriptors follow the "-NNNNNN.vmdk" convention. The
// six-digit suffix is a documented naming convention of this disk format,
// not a general rule across formats.
static DELTA_DISK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(.*)-\d{6}\.vmdk$").unwrap());

const DISK_EXTENSIONS: [&str; 1] = ["vmdk"];

const AGE_SATURATION_DAYS: f64 = 365.0;
const SIZE_SATURATION_BYTES: f64 = 100.0 * 1024.0 * 1024.0 * 1024.0;

pub struct OrphanReconciler;

impl OrphanReconciler {
    /// Compute disk files with no registered reference, classify and rank
    /// them. Pure: fixed inputs always produce the same ordered output.
    ///
    /// A `None` input collection signals an upstream collection failure and
    /// aborts this call only; empty collections reconcile to an empty report.
    pub fn reconcile(
        disk_files: Option<&HashMap<String, DiskFileRecord>>,
        registered: Option<&HashMap<String, Vec<RegisteredDiskReference>>>,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<OrphanCandidate>> {
        let disk_files =
            disk_files.ok_or(ReporterError::MissingInventory("datastore file listing"))?;
        let registered =
            registered.ok_or(ReporterError::MissingInventory("VM disk device listing"))?;

        let mut candidates = Vec::new();
        for (path, record) in disk_files {
            if registered.contains_key(path) {
                continue;
            }
            let reason = Self::classify(path, registered);
            debug!("Orphan candidate {} classified as {:?}", path, reason);
            candidates.push(Self::build_candidate(record, reason, as_of));
        }

        candidates.sort_by(|a, b| {
            a.reason
                .priority()
                .cmp(&b.reason.priority())
                .then(b.size_bytes.cmp(&a.size_bytes))
                .then(a.path.cmp(&b.path))
        });

        info!(
            "Reconciliation found {} orphan candidates among {} disk files ({} registered paths)",
            candidates.len(),
            disk_files.len(),
            registered.len()
        );

        Ok(candidates)
    }

    // Ordered rules, first match wins.
    fn classify(
        path: &str,
        registered: &HashMap<String, Vec<RegisteredDiskReference>>,
    ) -> OrphanReason {
        // A delta descriptor whose sibling base disk is still registered is
        // an orphaned snapshot left behind, not a fully orphaned disk.
        if let Some(caps) = DELTA_DISK.captures(path) {
            let base_path = format!("{}.vmdk", &caps[1]);
            if registered.contains_key(&base_path) {
                return OrphanReason::StaleSnapshot;
            }
        }

        if Self::has_disk_extension(path) {
            OrphanReason::Unregistered
        } else {
            OrphanReason::Unresolved
        }
    }

    fn has_disk_extension(path: &str) -> bool {
        let lower = path.to_lowercase();
        DISK_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext)))
    }

    fn build_candidate(
        record: &DiskFileRecord,
        reason: OrphanReason,
        as_of: DateTime<Utc>,
    ) -> OrphanCandidate {
        let name = Self::file_name(&record.path);
        let mut is_estimated = false;

        let size_bytes = match record.size_bytes {
            Some(size) => size,
            None => {
                is_estimated = true;
                estimate::size_bytes(&record.path, name)
            }
        };
        let modified_at = match record.modified_at {
            Some(ts) => ts,
            None => {
                is_estimated = true;
                estimate::modified_at(&record.path, name, as_of)
            }
        };

        OrphanCandidate {
            path: record.path.clone(),
            size_bytes,
            modified_at,
            reason,
            confidence: Self::confidence(size_bytes, modified_at, as_of),
            is_estimated,
        }
    }

    // Display-only ranking signal in 0..=1, weighted toward age: an old
    // unreferenced disk is a stronger reclamation candidate than a large
    // recent one.
    fn confidence(size_bytes: u64, modified_at: DateTime<Utc>, as_of: DateTime<Utc>) -> f64 {
        let age_days = (as_of - modified_at).num_days().max(0) as f64;
        let age_score = (age_days / AGE_SATURATION_DAYS).min(1.0);
        let size_score = (size_bytes as f64 / SIZE_SATURATION_BYTES).min(1.0);
        0.7 * age_score + 0.3 * size_score
    }

    fn file_name(path: &str) -> &str {
        path.rsplit('/').next().unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(path: &str, size_gib: u64, days_old: i64) -> DiskFileRecord {
        DiskFileRecord {
            path: path.to_string(),
            size_bytes: Some(size_gib * GIB),
            modified_at: Some(as_of() - chrono::Duration::days(days_old)),
        }
    }

    fn files(records: Vec<DiskFileRecord>) -> HashMap<String, DiskFileRecord> {
        records.into_iter().map(|r| (r.path.clone(), r)).collect()
    }

    fn refs(paths: &[&str]) -> HashMap<String, Vec<RegisteredDiskReference>> {
        paths
            .iter()
            .map(|p| {
                (
                    p.to_string(),
                    vec![RegisteredDiskReference {
                        owning_vm_name: "vm".to_string(),
                        path: p.to_string(),
                        device_key: 2000,
                    }],
                )
            })
            .collect()
    }

    #[test]
    fn test_basic_set_difference() {
        let d = files(vec![
            record("[ds1] a/a.vmdk", 10, 30),
            record("[ds1] b/b.vmdk", 5, 30),
        ]);
        let r = refs(&["[ds1] a/a.vmdk"]);
        let out = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, "[ds1] b/b.vmdk");
        assert_eq!(out[0].reason, OrphanReason::Unregistered);
        assert_eq!(out[0].size_bytes, 5 * GIB);
    }

    #[test]
    fn test_delta_with_registered_base_is_stale_snapshot() {
        let d = files(vec![record("[ds1] vm1/vm1-000001.vmdk", 2, 90)]);
        let r = refs(&["[ds1] vm1/vm1.vmdk"]);
        let out = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reason, OrphanReason::StaleSnapshot);
    }

    #[test]
    fn test_delta_without_registered_base_is_unregistered() {
        let d = files(vec![record("[ds1] vm1/vm1-000001.vmdk", 2, 90)]);
        let r = refs(&["[ds1] other/other.vmdk"]);
        let out = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        assert_eq!(out[0].reason, OrphanReason::Unregistered);
    }

    #[test]
    fn test_unrecognized_extension_is_unresolved() {
        let d = files(vec![record("[ds1] junk/mail-01.vmdk.old", 1, 10)]);
        let r = refs(&[]);
        let out = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        assert_eq!(out[0].reason, OrphanReason::Unresolved);
    }

    #[test]
    fn test_empty_inputs_reconcile_to_empty_output() {
        let d = files(vec![]);
        let r = refs(&[]);
        let out = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let r = refs(&[]);
        let err = OrphanReconciler::reconcile(None, Some(&r), as_of()).unwrap_err();
        assert!(matches!(
            err,
            ReporterError::MissingInventory("datastore file listing")
        ));

        let d = files(vec![]);
        let err = OrphanReconciler::reconcile(Some(&d), None, as_of()).unwrap_err();
        assert!(matches!(
            err,
            ReporterError::MissingInventory("VM disk device listing")
        ));
    }

    #[test]
    fn test_partial_data_gets_deterministic_estimate() {
        let d = files(vec![DiskFileRecord {
            path: "[NAS01] _old_vms/mail-01.vmdk".to_string(),
            size_bytes: None,
            modified_at: None,
        }]);
        let r = refs(&[]);
        let first = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        let second = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        assert!(first[0].is_estimated);
        assert!(first[0].size_bytes > 0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_real_data_is_not_flagged_estimated() {
        let d = files(vec![record("[ds1] a/a.vmdk", 10, 30)]);
        let r = refs(&[]);
        let out = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        assert!(!out[0].is_estimated);
    }

    #[test]
    fn test_idempotence() {
        let d = files(vec![
            record("[ds1] a/a.vmdk", 10, 400),
            record("[ds1] b/b.vmdk", 5, 20),
            record("[ds1] vm1/vm1-000001.vmdk", 2, 90),
            record("[ds2] junk/notes.txt", 1, 10),
        ]);
        let r = refs(&["[ds1] vm1/vm1.vmdk"]);
        let first = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        let second = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_completeness_and_soundness() {
        let d = files(vec![
            record("[ds1] a/a.vmdk", 10, 30),
            record("[ds1] b/b.vmdk", 5, 30),
            record("[ds1] c/c.vmdk", 1, 30),
        ]);
        let r = refs(&["[ds1] b/b.vmdk"]);
        let out = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();

        // Every unreferenced path appears exactly once.
        let mut paths: Vec<&str> = out.iter().map(|c| c.path.as_str()).collect();
        paths.sort();
        assert_eq!(paths, vec!["[ds1] a/a.vmdk", "[ds1] c/c.vmdk"]);

        // No registered path ever appears.
        assert!(out.iter().all(|c| c.path != "[ds1] b/b.vmdk"));
    }

    #[test]
    fn test_ranking_reason_then_size_then_path() {
        let d = files(vec![
            record("[ds1] small/small.vmdk", 1, 30),
            record("[ds1] big/big.vmdk", 50, 30),
            record("[ds1] vm1/vm1-000001.vmdk", 100, 30),
            record("[ds2] junk/leftover.dat", 200, 30),
        ]);
        let r = refs(&["[ds1] vm1/vm1.vmdk"]);
        let out = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        let order: Vec<&str> = out.iter().map(|c| c.path.as_str()).collect();
        // Unregistered first (size descending), then stale snapshot, then
        // unresolved, regardless of raw size.
        assert_eq!(
            order,
            vec![
                "[ds1] big/big.vmdk",
                "[ds1] small/small.vmdk",
                "[ds1] vm1/vm1-000001.vmdk",
                "[ds2] junk/leftover.dat",
            ]
        );
    }

    #[test]
    fn test_equal_reason_and_size_tie_breaks_on_path() {
        let d = files(vec![
            record("[ds1] b/b.vmdk", 5, 30),
            record("[ds1] a/a.vmdk", 5, 30),
        ]);
        let r = refs(&[]);
        let out = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        assert_eq!(out[0].path, "[ds1] a/a.vmdk");
        assert_eq!(out[1].path, "[ds1] b/b.vmdk");
    }

    #[test]
    fn test_confidence_grows_with_age() {
        let d = files(vec![
            record("[ds1] old/old.vmdk", 5, 400),
            record("[ds1] new/new.vmdk", 5, 2),
        ]);
        let r = refs(&[]);
        let out = OrphanReconciler::reconcile(Some(&d), Some(&r), as_of()).unwrap();
        let old = out.iter().find(|c| c.path.contains("old")).unwrap();
        let new = out.iter().find(|c| c.path.contains("new")).unwrap();
        assert!(old.confidence > new.confidence);
    }
}
