//! Filesystem statistics and payload usage accounting.

use std::ffi::CString;
use std::mem::MaybeUninit;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use tracing::debug;

/// Capacity of the filesystem backing a path, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageInfo {
    /// Total size of the filesystem.
    pub fs_total: u64,
    /// Bytes available to unprivileged writers.
    pub fs_free: u64,
}

/// Result of a recursive usage scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    /// Bytes of actual block usage (sparse files count what they occupy).
    pub bytes: u64,
    /// Number of regular files with at least one byte of content.
    pub file_count: u64,
}

/// Query the filesystem containing `path` via `statvfs`.
///
/// Returns zeroed stats when the path cannot be queried; the caller treats
/// `fs_total == 0` as "no information yet".
#[must_use]
pub fn storage_info(path: &Path) -> StorageInfo {
    let Ok(c_path) = CString::new(path.as_os_str().as_encoded_bytes()) else {
        return StorageInfo::default();
    };

    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    // SAFETY: c_path is a valid NUL-terminated string and stat points at
    // writable memory of the correct size.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if rc != 0 {
        debug!(path = %path.display(), "statvfs failed");
        return StorageInfo::default();
    }
    // SAFETY: statvfs returned 0, so the buffer is initialised.
    let stat = unsafe { stat.assume_init() };

    #[allow(clippy::unnecessary_cast)]
    let block_size = if stat.f_frsize > 0 {
        stat.f_frsize as u64
    } else {
        stat.f_bsize as u64
    };
    #[allow(clippy::unnecessary_cast)]
    StorageInfo {
        fs_total: stat.f_blocks as u64 * block_size,
        fs_free: stat.f_bavail as u64 * block_size,
    }
}

/// Recursively measure the payload under `dir`.
///
/// Uses `st_blocks` (512-byte units) rather than apparent size so sparse
/// files are counted honestly. Entries that vanish mid-scan are skipped.
#[must_use]
pub fn disk_usage(dir: &Path) -> DiskUsage {
    let mut usage = DiskUsage::default();
    accumulate(dir, &mut usage);
    usage
}

fn accumulate(dir: &Path, usage: &mut DiskUsage) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            accumulate(&entry.path(), usage);
        } else if file_type.is_file() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            usage.bytes += metadata.blocks() * 512;
            if metadata.len() > 0 {
                usage.file_count += 1;
            }
        }
        // Symlinks, devices, and the rest are intentionally skipped.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn statvfs_reports_a_real_filesystem() {
        let info = storage_info(&std::env::temp_dir());
        assert!(info.fs_total > 0);
        assert!(info.fs_free <= info.fs_total);
    }

    #[test]
    fn unknown_paths_degrade_to_zero() {
        let info = storage_info(Path::new("/levin/does/not/exist"));
        assert_eq!(info, StorageInfo::default());
    }

    #[test]
    fn usage_counts_blocks_and_non_empty_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.bin"), vec![1_u8; 8192]).unwrap();
        fs::write(dir.path().join("sub/b.bin"), vec![2_u8; 4096]).unwrap();
        fs::write(dir.path().join("empty.bin"), b"").unwrap();

        let usage = disk_usage(dir.path());
        assert!(usage.bytes >= 8192 + 4096);
        assert_eq!(usage.file_count, 2);
    }

    #[test]
    fn missing_directory_scans_as_empty() {
        let usage = disk_usage(Path::new("/levin/missing/payload"));
        assert_eq!(usage, DiskUsage::default());
    }
}
