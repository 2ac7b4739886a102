//! Disk budget calculation and the deletion safety net.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use tracing::{debug, warn};

/// Safety margin subtracted from every raw budget so the enforcer does not
/// thrash between downloading and deleting at the edge.
pub const HYSTERESIS_BYTES: u64 = 50 * 1024 * 1024;

/// Outcome of one budget calculation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskBudgetResult {
    /// Additional payload bytes the daemon may acquire.
    pub budget_bytes: u64,
    /// Bytes over the hard cap, to be recovered by deletion.
    pub deficit_bytes: u64,
    /// Whether acquisitions must stop. Implies `budget_bytes == 0`.
    pub over_budget: bool,
}

/// The configured limits a budget is computed against.
#[derive(Debug, Clone, Copy)]
pub struct BudgetPolicy {
    min_free_bytes: u64,
    min_free_percentage: f64,
    max_storage_bytes: u64,
}

impl BudgetPolicy {
    /// A policy from the three configured limits. `max_storage_bytes == 0`
    /// means unlimited.
    #[must_use]
    pub const fn new(
        min_free_bytes: u64,
        min_free_percentage: f64,
        max_storage_bytes: u64,
    ) -> Self {
        Self {
            min_free_bytes,
            min_free_percentage,
            max_storage_bytes,
        }
    }

    /// Pure budget calculation from filesystem stats and current usage.
    ///
    /// The hysteresis clamp runs last, so `over_budget` always implies a zero
    /// budget.
    #[must_use]
    pub fn calculate(&self, fs_total: u64, fs_free: u64, current_usage: u64) -> DiskBudgetResult {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        let pct_bytes = (fs_total as f64 * self.min_free_percentage) as u64;
        let min_required = self.min_free_bytes.max(pct_bytes);
        let available_space = fs_free.saturating_sub(min_required);

        let mut result = if self.max_storage_bytes > 0 {
            let available_for_us = self.max_storage_bytes.saturating_sub(current_usage);
            let budget = available_space.min(available_for_us);
            DiskBudgetResult {
                budget_bytes: budget,
                deficit_bytes: current_usage.saturating_sub(self.max_storage_bytes),
                over_budget: current_usage > self.max_storage_bytes || budget == 0,
            }
        } else {
            DiskBudgetResult {
                budget_bytes: available_space,
                deficit_bytes: min_required.saturating_sub(fs_free),
                over_budget: available_space == 0,
            }
        };

        if result.budget_bytes > HYSTERESIS_BYTES {
            result.budget_bytes -= HYSTERESIS_BYTES;
        } else {
            result.budget_bytes = 0;
            result.over_budget = true;
        }
        result
    }
}

/// Delete regular files under `dir`, in random order, until at least
/// `target_bytes` have been freed. Returns the bytes actually freed, which
/// may fall short when the directory holds less than the target.
///
/// Random order is deliberate: with no recency signal it avoids always
/// sacrificing the newest or largest payload and spreads churn evenly.
#[must_use]
pub fn delete_to_free(dir: &Path, target_bytes: u64) -> u64 {
    if target_bytes == 0 {
        return 0;
    }

    let mut files = Vec::new();
    collect_files(dir, &mut files);
    if files.is_empty() {
        return 0;
    }
    files.shuffle(&mut rand::rng());

    let mut freed = 0_u64;
    for path in files {
        if freed >= target_bytes {
            break;
        }
        let Ok(metadata) = std::fs::metadata(&path) else {
            continue;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), bytes = metadata.len(), "deleted payload file");
                freed += metadata.len();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to delete payload file");
            }
        }
    }
    freed
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            collect_files(&entry.path(), files);
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const GB: u64 = 1 << 30;
    const MB: u64 = 1 << 20;

    #[test]
    fn comfortable_room_leaves_a_positive_budget() {
        let policy = BudgetPolicy::new(GB, 0.05, 100 * GB);
        let result = policy.calculate(500 * GB, 400 * GB, 10 * GB);
        assert!(!result.over_budget);
        assert!(result.budget_bytes > 0);
        assert_eq!(result.deficit_bytes, 0);
    }

    #[test]
    fn usage_over_the_cap_reports_the_deficit() {
        let policy = BudgetPolicy::new(GB, 0.05, 100 * GB);
        let result = policy.calculate(500 * GB, 400 * GB, 120 * GB);
        assert!(result.over_budget);
        assert_eq!(result.budget_bytes, 0);
        assert_eq!(result.deficit_bytes, 20 * GB);
    }

    #[test]
    fn budgets_inside_the_hysteresis_margin_clamp_to_zero() {
        let policy = BudgetPolicy::new(GB, 0.0, 100 * GB);
        let result = policy.calculate(500 * GB, 400 * GB, 100 * GB - 30 * MB);
        assert!(result.over_budget);
        assert_eq!(result.budget_bytes, 0);
        assert_eq!(result.deficit_bytes, 0);
    }

    #[test]
    fn full_budget_path_subtracts_the_margin() {
        let policy = BudgetPolicy::new(GB, 0.0, 100 * GB);
        let result = policy.calculate(500 * GB, 400 * GB, 80 * GB);
        assert!(!result.over_budget);
        assert_eq!(result.budget_bytes, 20 * GB - 50 * MB);
    }

    #[test]
    fn percentage_floor_dominates_when_larger() {
        // 5% of 500 GB = 25 GB, far above the 1 GB absolute floor.
        let policy = BudgetPolicy::new(GB, 0.05, 0);
        let result = policy.calculate(500 * GB, 26 * GB, 0);
        assert!(!result.over_budget);
        assert_eq!(result.budget_bytes, GB - 50 * MB);
    }

    #[test]
    fn unlimited_storage_reports_free_space_deficit() {
        let policy = BudgetPolicy::new(10 * GB, 0.0, 0);
        let result = policy.calculate(100 * GB, 4 * GB, 50 * GB);
        assert!(result.over_budget);
        assert_eq!(result.budget_bytes, 0);
        assert_eq!(result.deficit_bytes, 6 * GB);
    }

    #[test]
    fn over_budget_always_implies_zero_budget() {
        let policy = BudgetPolicy::new(GB, 0.05, 100 * GB);
        let samples = [
            (0, 0, 0),
            (500 * GB, 400 * GB, 10 * GB),
            (500 * GB, 400 * GB, 120 * GB),
            (500 * GB, GB, 0),
            (500 * GB, 0, 99 * GB),
            (GB, GB, GB),
            (500 * GB, 400 * GB, 100 * GB - 1),
        ];
        for (fs_total, fs_free, usage) in samples {
            let result = policy.calculate(fs_total, fs_free, usage);
            if result.over_budget {
                assert_eq!(result.budget_bytes, 0, "({fs_total},{fs_free},{usage})");
            }
            // Determinism.
            assert_eq!(result, policy.calculate(fs_total, fs_free, usage));
        }
    }

    fn payload_dir(sizes: &[(&str, usize)]) -> TempDir {
        let dir = TempDir::new().expect("payload dir");
        for (name, size) in sizes {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, vec![0_u8; *size]).unwrap();
        }
        dir
    }

    fn remaining_files(dir: &Path) -> usize {
        let mut files = Vec::new();
        collect_files(dir, &mut files);
        files.len()
    }

    #[test]
    fn deletion_stops_at_the_first_file_crossing_the_target() {
        let dir = payload_dir(&[("a.bin", 4096), ("b.bin", 4096), ("sub/c.bin", 4096)]);
        let freed = delete_to_free(dir.path(), 5000);
        assert!(freed >= 5000);
        assert_eq!(freed, 8192);
        assert_eq!(remaining_files(dir.path()), 1);
    }

    #[test]
    fn deletion_of_more_than_the_directory_holds_frees_everything() {
        let dir = payload_dir(&[("a.bin", 1000), ("b.bin", 2000)]);
        let freed = delete_to_free(dir.path(), 1 << 40);
        assert_eq!(freed, 3000);
        assert_eq!(remaining_files(dir.path()), 0);
    }

    #[test]
    fn zero_target_deletes_nothing() {
        let dir = payload_dir(&[("a.bin", 1000)]);
        assert_eq!(delete_to_free(dir.path(), 0), 0);
        assert_eq!(remaining_files(dir.path()), 1);
    }

    #[test]
    fn empty_directory_frees_nothing() {
        let dir = TempDir::new().unwrap();
        assert_eq!(delete_to_free(dir.path(), 4096), 0);
    }
}
