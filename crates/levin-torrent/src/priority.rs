//! Budget-constrained per-file priority planning.
//!
//! The order in which a torrent's files are considered is shuffled with an
//! RNG seeded from the info-hash, so the set of in-flight files stays stable
//! for a torrent across enforcement ticks while different torrents favour
//! different files.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::FilePriority;

/// Deterministic consideration order for a torrent's files.
#[must_use]
pub fn file_download_order(info_hash: &str, file_count: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..file_count).collect();
    let mut rng = StdRng::seed_from_u64(fnv1a(info_hash.as_bytes()));
    indices.shuffle(&mut rng);
    indices
}

/// Plan priorities for one torrent's files against the remaining budget.
///
/// `files` holds `(size, downloaded)` pairs indexed by file index. Complete
/// files keep the default priority so they continue to seed; incomplete files
/// are scheduled in the deterministic order while their missing bytes fit
/// into `remaining`, which is decremented accordingly.
#[must_use]
pub fn plan_file_priorities(
    info_hash: &str,
    files: &[(u64, u64)],
    remaining: &mut u64,
) -> Vec<FilePriority> {
    let mut priorities = vec![FilePriority::default(); files.len()];
    for index in file_download_order(info_hash, files.len()) {
        let (size, downloaded) = files[index];
        let bytes_left = size.saturating_sub(downloaded);
        if bytes_left == 0 {
            continue;
        }
        if bytes_left <= *remaining {
            priorities[index] = FilePriority::Normal;
            *remaining -= bytes_left;
        } else {
            priorities[index] = FilePriority::Skip;
        }
    }
    priorities
}

/// FNV-1a over the info-hash text. Stable across runs and platforms, which
/// is what keeps priorities from flip-flopping tick to tick.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
