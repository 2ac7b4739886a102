#![forbid(unsafe_code)]

//! Watch-directory events for `.torrent` metadata files.
//!
//! The OS watcher delivers events on its own thread; they are buffered in a
//! mutex-protected vector and drained synchronously by [`TorrentWatcher::poll`]
//! on the tick task, so all daemon state mutation stays single-threaded. The
//! lock is held only for the swap-and-drain.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use notify::event::{AccessKind, AccessMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure to set up the OS watcher.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// The notify backend refused the watch.
    #[error("failed to watch {path}")]
    Watch {
        /// Directory that could not be watched.
        path: PathBuf,
        /// Source notify error.
        #[source]
        source: notify::Error,
    },
}

/// A change to the set of metadata files in the watch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A `.torrent` file appeared (created, moved in, or written-to-close).
    Added(PathBuf),
    /// A `.torrent` file disappeared (deleted or moved out).
    Removed(PathBuf),
}

/// Buffer-and-drain watcher over a single directory.
pub struct TorrentWatcher {
    directory: PathBuf,
    pending: Arc<Mutex<Vec<WatchEvent>>>,
    watcher: Option<RecommendedWatcher>,
}

impl TorrentWatcher {
    /// A watcher for `directory`, not yet started.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            pending: Arc::new(Mutex::new(Vec::new())),
            watcher: None,
        }
    }

    /// Begin receiving OS events for the directory.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError`] if the backend cannot watch the directory.
    pub fn start(&mut self) -> Result<(), WatcherError> {
        let pending = Arc::clone(&self.pending);
        let mut watcher = notify::recommended_watcher(
            move |result: Result<notify::Event, notify::Error>| match result {
                Ok(event) => enqueue(&pending, &event),
                Err(err) => warn!(error = %err, "watcher backend error"),
            },
        )
        .map_err(|source| WatcherError::Watch {
            path: self.directory.clone(),
            source,
        })?;

        watcher
            .watch(&self.directory, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::Watch {
                path: self.directory.clone(),
                source,
            })?;
        self.watcher = Some(watcher);
        Ok(())
    }

    /// Stop receiving events. Already-buffered events stay pollable.
    pub fn stop(&mut self) {
        self.watcher = None;
    }

    /// Drain buffered events. Non-blocking; returns zero or more events.
    #[must_use]
    pub fn poll(&self) -> Vec<WatchEvent> {
        let mut pending = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }

    /// Enumerate existing metadata files, sorted lexicographically for
    /// deterministic ordering, and buffer an added event for each.
    ///
    /// Returns the number of files found.
    pub fn scan_existing(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.directory) else {
            debug!(directory = %self.directory.display(), "watch directory unreadable");
            return 0;
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .map(|entry| entry.path())
            .filter(|path| is_torrent_file(path))
            .collect();
        paths.sort();

        let count = paths.len();
        let mut pending = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        pending.extend(paths.into_iter().map(WatchEvent::Added));
        count
    }
}

/// Translate one notify event into zero or more watch events.
fn enqueue(pending: &Mutex<Vec<WatchEvent>>, event: &notify::Event) {
    for path in &event.paths {
        if !is_torrent_file(path) {
            continue;
        }
        let Some(translated) = classify(&event.kind, path.is_file()) else {
            continue;
        };
        let watch_event = match translated {
            Change::Added => WatchEvent::Added(path.clone()),
            Change::Removed => WatchEvent::Removed(path.clone()),
        };
        let mut buffer = pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        buffer.push(watch_event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Added,
    Removed,
}

/// Map a notify event kind onto add/remove, using current existence to
/// disambiguate renames (the source half of a move reports a path that no
/// longer exists).
fn classify(kind: &EventKind, exists: bool) -> Option<Change> {
    match kind {
        EventKind::Remove(_) => Some(Change::Removed),
        EventKind::Create(_) | EventKind::Modify(_) => {
            if exists {
                Some(Change::Added)
            } else {
                Some(Change::Removed)
            }
        }
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(Change::Added),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

fn is_torrent_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "torrent")
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn wait_for<F: Fn(&WatchEvent) -> bool>(
        watcher: &TorrentWatcher,
        predicate: F,
    ) -> Option<WatchEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            for event in watcher.poll() {
                if predicate(&event) {
                    return Some(event);
                }
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        None
    }

    #[test]
    fn extension_filter_only_accepts_torrents() {
        assert!(is_torrent_file(Path::new("/w/a.torrent")));
        assert!(!is_torrent_file(Path::new("/w/a.torrent.part")));
        assert!(!is_torrent_file(Path::new("/w/notes.txt")));
        assert!(!is_torrent_file(Path::new("/w/torrent")));
    }

    #[test]
    fn classify_maps_kinds_to_changes() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File), true),
            Some(Change::Added)
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File), false),
            Some(Change::Removed)
        );
        // Rename-from: the path no longer exists.
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From)), false),
            Some(Change::Removed)
        );
        // Rename-to: the path exists now.
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::To)), true),
            Some(Change::Added)
        );
        assert_eq!(
            classify(
                &EventKind::Access(AccessKind::Close(AccessMode::Write)),
                true
            ),
            Some(Change::Added)
        );
        assert_eq!(classify(&EventKind::Any, true), None);
    }

    #[test]
    fn scan_emits_sorted_added_events() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.torrent"), b"b").unwrap();
        fs::write(dir.path().join("a.torrent"), b"a").unwrap();
        fs::write(dir.path().join("ignored.txt"), b"x").unwrap();

        let watcher = TorrentWatcher::new(dir.path());
        assert_eq!(watcher.scan_existing(), 2);

        let events = watcher.poll();
        assert_eq!(
            events,
            vec![
                WatchEvent::Added(dir.path().join("a.torrent")),
                WatchEvent::Added(dir.path().join("b.torrent")),
            ]
        );
        // Drained: a second poll is empty.
        assert!(watcher.poll().is_empty());
    }

    #[test]
    fn scan_of_missing_directory_is_empty() {
        let watcher = TorrentWatcher::new("/levin/no-watch-dir");
        assert_eq!(watcher.scan_existing(), 0);
        assert!(watcher.poll().is_empty());
    }

    #[test]
    fn live_create_and_remove_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut watcher = TorrentWatcher::new(dir.path());
        watcher.start().expect("start watcher");

        let path = dir.path().join("incoming.torrent");
        fs::write(&path, b"metadata").unwrap();
        let added = wait_for(&watcher, |event| {
            matches!(event, WatchEvent::Added(p) if *p == path)
        });
        assert!(added.is_some(), "no added event observed");

        fs::remove_file(&path).unwrap();
        let removed = wait_for(&watcher, |event| {
            matches!(event, WatchEvent::Removed(p) if *p == path)
        });
        assert!(removed.is_some(), "no removed event observed");

        watcher.stop();
    }
}
