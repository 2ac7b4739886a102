//! Persistent transfer statistics.
//!
//! File format: `"LVST"` magic (4 bytes), version `u32` little-endian
//! (4 bytes), `total_downloaded` and `total_uploaded` as `u64` little-endian
//! (8 bytes each), 24 bytes total. Little-endian is part of the format, so
//! big-endian hosts normalise on read and write.

use std::io;
use std::path::Path;

use tracing::debug;

const MAGIC: [u8; 4] = *b"LVST";
const VERSION: u32 = 1;
const FILE_LEN: usize = 24;

/// Cumulative and per-session transfer counters. Only the totals persist;
/// the session counters are runtime bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Bytes downloaded across all runs.
    pub total_downloaded: u64,
    /// Bytes uploaded across all runs.
    pub total_uploaded: u64,
    /// Bytes downloaded this run.
    pub session_downloaded: u64,
    /// Bytes uploaded this run.
    pub session_uploaded: u64,
}

impl Statistics {
    /// Load totals from `path`.
    ///
    /// Returns `false`, leaving the record untouched, when the file is
    /// absent, truncated, or carries the wrong magic or version. The caller
    /// then proceeds with fresh counters.
    pub fn load(&mut self, path: &Path) -> bool {
        let Ok(raw) = std::fs::read(path) else {
            return false;
        };
        if raw.len() < FILE_LEN {
            debug!(path = %path.display(), len = raw.len(), "statistics file truncated");
            return false;
        }
        if raw[0..4] != MAGIC {
            debug!(path = %path.display(), "statistics magic mismatch");
            return false;
        }
        let version = u32::from_le_bytes(raw[4..8].try_into().expect("4-byte slice"));
        if version != VERSION {
            debug!(path = %path.display(), version, "statistics version mismatch");
            return false;
        }

        self.total_downloaded = u64::from_le_bytes(raw[8..16].try_into().expect("8-byte slice"));
        self.total_uploaded = u64::from_le_bytes(raw[16..24].try_into().expect("8-byte slice"));
        true
    }

    /// Write the totals to `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when the file cannot be written.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut buf = Vec::with_capacity(FILE_LEN);
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&self.total_downloaded.to_le_bytes());
        buf.extend_from_slice(&self.total_uploaded.to_le_bytes());
        std::fs::write(path, buf)
    }

    /// Refresh the record from a persisted base plus this run's counters.
    ///
    /// Keeping the base separate avoids double-counting when saving mid-run.
    pub fn update(
        &mut self,
        base_downloaded: u64,
        base_uploaded: u64,
        session_downloaded: u64,
        session_uploaded: u64,
    ) {
        self.session_downloaded = session_downloaded;
        self.session_uploaded = session_uploaded;
        self.total_downloaded = base_downloaded + session_downloaded;
        self.total_uploaded = base_uploaded + session_uploaded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_is_the_identity_on_totals() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.dat");

        let mut stats = Statistics::default();
        stats.update(0, 0, 1_234_567, 89_012);
        stats.save(&path).unwrap();

        let mut restored = Statistics::default();
        assert!(restored.load(&path));
        assert_eq!(restored.total_downloaded, 1_234_567);
        assert_eq!(restored.total_uploaded, 89_012);
        // Session counters never persist.
        assert_eq!(restored.session_downloaded, 0);
        assert_eq!(restored.session_uploaded, 0);
    }

    #[test]
    fn missing_file_leaves_the_record_untouched() {
        let mut stats = Statistics {
            total_downloaded: 7,
            ..Statistics::default()
        };
        assert!(!stats.load(Path::new("/levin/no-stats.dat")));
        assert_eq!(stats.total_downloaded, 7);
    }

    #[test]
    fn truncated_magic_and_version_mismatches_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.dat");
        let mut stats = Statistics::default();

        std::fs::write(&path, b"LVST\x01\x00").unwrap();
        assert!(!stats.load(&path));

        std::fs::write(&path, [b'X'; 24]).unwrap();
        assert!(!stats.load(&path));

        let mut wrong_version = Vec::new();
        wrong_version.extend_from_slice(b"LVST");
        wrong_version.extend_from_slice(&2_u32.to_le_bytes());
        wrong_version.extend_from_slice(&[0; 16]);
        std::fs::write(&path, wrong_version).unwrap();
        assert!(!stats.load(&path));

        assert_eq!(stats, Statistics::default());
    }

    #[test]
    fn file_layout_is_the_documented_24_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.dat");

        let mut stats = Statistics::default();
        stats.update(0, 0, 0x0102_0304, 0x0A0B);
        stats.save(&path).unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw.len(), 24);
        assert_eq!(&raw[0..4], b"LVST");
        assert_eq!(raw[4..8], 1_u32.to_le_bytes());
        assert_eq!(raw[8..16], 0x0102_0304_u64.to_le_bytes());
        assert_eq!(raw[16..24], 0x0A0B_u64.to_le_bytes());
    }

    #[test]
    fn totals_stay_monotonic_across_simulated_restarts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.dat");

        let deltas = [(10_u64, 1_u64), (0, 0), (25, 40), (5, 5)];
        let mut expected_dl = 0_u64;
        let mut expected_ul = 0_u64;
        let mut previous = (0_u64, 0_u64);

        for (delta_dl, delta_ul) in deltas {
            let mut stats = Statistics::default();
            stats.load(&path);
            let (base_dl, base_ul) = (stats.total_downloaded, stats.total_uploaded);

            stats.update(base_dl, base_ul, delta_dl, delta_ul);
            stats.save(&path).unwrap();

            expected_dl += delta_dl;
            expected_ul += delta_ul;
            assert_eq!(stats.total_downloaded, expected_dl);
            assert_eq!(stats.total_uploaded, expected_ul);
            assert!(stats.total_downloaded >= previous.0);
            assert!(stats.total_uploaded >= previous.1);
            previous = (stats.total_downloaded, stats.total_uploaded);
        }
    }
}
