#![forbid(unsafe_code)]

//! Engine-agnostic torrent session interface shared across the workspace.
//!
//! The daemon consumes a torrent library through the [`TorrentSession`]
//! capability surface. Two implementations exist: the in-memory
//! [`StubSession`] shipped here (used by tests and by builds without a native
//! torrent backend), and the real libtorrent-backed session, which lives
//! behind the same trait in the native adapter.

mod priority;
mod stub;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

pub use priority::{file_download_order, plan_file_priorities};
pub use stub::{StubFile, StubSession, StubTorrent};

/// WebSocket trackers injected at tier 0 on every added torrent so that
/// browser-originated peers can discover us.
pub const WSS_TRACKERS: [&str; 3] = [
    "wss://tracker.openwebtorrent.com",
    "wss://tracker.webtorrent.dev",
    "wss://tracker.btorrent.xyz",
];

/// Rate limit applied by [`TorrentSession::pause_downloads`]: 1 B/s keeps the
/// download machinery alive while effectively halting transfers, leaving
/// seeding untouched.
pub const PAUSED_DOWNLOAD_RATE: u32 = 1;

/// Per-file priority understood by the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilePriority {
    /// Do not download this file.
    Skip,
    /// Below-normal piece scheduling.
    Low,
    /// Default priority; downloads and seeds.
    #[default]
    Normal,
    /// Above-normal piece scheduling.
    High,
}

/// Read model for a torrent, exposed to status consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentDescriptor {
    /// 40-hex-character torrent identifier.
    pub info_hash: String,
    /// Display name from the metadata.
    pub name: String,
    /// Total payload bytes wanted.
    pub size: u64,
    /// Payload bytes completed so far.
    pub downloaded: u64,
    /// Bytes uploaded to peers.
    pub uploaded: u64,
    /// Current download rate in bytes per second.
    pub download_rate: u64,
    /// Current upload rate in bytes per second.
    pub upload_rate: u64,
    /// Connected peer count.
    pub num_peers: u32,
    /// Completion fraction in `[0, 1]`.
    pub progress: f64,
    /// Whether every wanted byte is present.
    pub is_seed: bool,
}

/// Capability surface the daemon consumes from a torrent library.
///
/// All methods are invoked from the single tick task; implementations do not
/// need internal synchronisation beyond what their backend demands.
#[async_trait]
pub trait TorrentSession: Send {
    /// Record the listen port and STUN server to use when the session starts.
    fn configure(&mut self, port: u16, stun_server: &str);

    /// Start the session, writing payload data under `data_directory`.
    ///
    /// Any state handed to [`TorrentSession::load_state`] beforehand is
    /// merged into the session at construction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be brought up.
    async fn start(&mut self, data_directory: &Path) -> Result<()>;

    /// Tear the session down, dropping all torrent handles.
    async fn stop(&mut self);

    /// Whether the session has been started and not stopped.
    fn is_running(&self) -> bool;

    /// Add a torrent from a metadata file, returning its info-hash.
    ///
    /// Invalid metadata fails silently with `None`; the WSS trackers in
    /// [`WSS_TRACKERS`] are injected at tier 0 alongside whatever trackers
    /// the metadata carries.
    async fn add_torrent(&mut self, metadata_path: &Path) -> Option<String>;

    /// Remove a torrent by info-hash. Unknown hashes are a no-op.
    async fn remove_torrent(&mut self, info_hash: &str);

    /// Number of torrents currently in the session.
    fn torrent_count(&self) -> usize;

    /// Snapshot of every torrent in the session.
    fn torrents(&self) -> Vec<TorrentDescriptor>;

    /// Stop all activity, uploads included.
    async fn pause_session(&mut self);

    /// Undo [`TorrentSession::pause_session`].
    async fn resume_session(&mut self);

    /// Whether the session-wide gate is closed.
    fn is_paused(&self) -> bool;

    /// Halt downloads while seeding continues (rate limit 1 B/s).
    async fn pause_downloads(&mut self);

    /// Lift the downloads-only gate (rate limit back to unlimited).
    async fn resume_downloads(&mut self);

    /// Set the session download cap in bytes per second; 0 is unlimited.
    async fn set_download_rate_limit(&mut self, bytes_per_sec: u32);

    /// Set the session upload cap in bytes per second; 0 is unlimited.
    async fn set_upload_rate_limit(&mut self, bytes_per_sec: u32);

    /// Currently applied download cap, for tests and status.
    fn download_rate_limit(&self) -> u32;

    /// Peers connected across all torrents.
    fn peer_count(&self) -> u32;

    /// Aggregate download rate in bytes per second.
    fn download_rate(&self) -> u64;

    /// Aggregate upload rate in bytes per second.
    fn upload_rate(&self) -> u64;

    /// Bytes downloaded over the lifetime of this session.
    fn total_downloaded(&self) -> u64;

    /// Bytes uploaded over the lifetime of this session.
    fn total_uploaded(&self) -> u64;

    /// Assign per-file priorities so that no more than `budget_bytes` of
    /// missing payload is scheduled for download. See
    /// [`plan_file_priorities`] for the ordering contract.
    async fn apply_budget_priorities(&mut self, budget_bytes: u64);

    /// Write the session's opaque state blob (DHT routing table and friends).
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be produced or written.
    async fn save_state(&mut self, path: &Path) -> Result<()>;

    /// Remember a state blob to merge into the session at the next
    /// [`TorrentSession::start`]. May be called before the session runs.
    fn load_state(&mut self, path: &Path);

    /// Tracker URLs currently attached to a torrent.
    fn trackers(&self, info_hash: &str) -> Vec<String>;
}
