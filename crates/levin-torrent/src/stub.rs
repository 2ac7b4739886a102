//! In-memory session double.
//!
//! Behaves like the real session at the capability level (lifecycle gates,
//! rate-limit semantics, tracker injection, budget priorities) without any
//! networking, so the engine and its tests can run against it directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info};

use crate::priority::plan_file_priorities;
use crate::{FilePriority, TorrentDescriptor, TorrentSession, PAUSED_DOWNLOAD_RATE, WSS_TRACKERS};

/// Pretend payload size for torrents added from metadata the stub cannot
/// parse.
const DEFAULT_PAYLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// One file inside a stub torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubFile {
    /// Total file size in bytes.
    pub size: u64,
    /// Bytes already downloaded.
    pub downloaded: u64,
    /// Priority last assigned by the session.
    pub priority: FilePriority,
}

impl StubFile {
    /// A file with the given size and completion.
    #[must_use]
    pub fn new(size: u64, downloaded: u64) -> Self {
        Self {
            size,
            downloaded,
            priority: FilePriority::default(),
        }
    }
}

/// One torrent tracked by the stub session.
#[derive(Debug, Clone, PartialEq)]
pub struct StubTorrent {
    /// 40-hex identifier.
    pub info_hash: String,
    /// Display name.
    pub name: String,
    /// Per-file state.
    pub files: Vec<StubFile>,
    /// Bytes uploaded to peers.
    pub uploaded: u64,
    /// Connected peers.
    pub num_peers: u32,
    /// Download rate in bytes per second.
    pub download_rate: u64,
    /// Upload rate in bytes per second.
    pub upload_rate: u64,
    /// Attached tracker URLs.
    pub trackers: Vec<String>,
}

impl StubTorrent {
    /// A torrent with no files and the WSS trackers attached.
    #[must_use]
    pub fn new(info_hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            info_hash: info_hash.into(),
            name: name.into(),
            files: Vec::new(),
            uploaded: 0,
            num_peers: 0,
            download_rate: 0,
            upload_rate: 0,
            trackers: WSS_TRACKERS.iter().map(ToString::to_string).collect(),
        }
    }

    fn size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }

    fn downloaded(&self) -> u64 {
        self.files.iter().map(|file| file.downloaded).sum()
    }

    fn descriptor(&self) -> TorrentDescriptor {
        let size = self.size();
        let downloaded = self.downloaded();
        let progress = if size == 0 {
            0.0
        } else {
            downloaded_fraction(downloaded, size)
        };
        TorrentDescriptor {
            info_hash: self.info_hash.clone(),
            name: self.name.clone(),
            size,
            downloaded,
            uploaded: self.uploaded,
            download_rate: self.download_rate,
            upload_rate: self.upload_rate,
            num_peers: self.num_peers,
            progress,
            is_seed: downloaded >= size,
        }
    }
}

/// In-memory [`TorrentSession`] implementation.
#[derive(Debug, Default)]
pub struct StubSession {
    running: bool,
    paused: bool,
    port: u16,
    stun_server: String,
    data_directory: Option<PathBuf>,
    pending_state: Option<PathBuf>,
    download_rate_limit: u32,
    upload_rate_limit: u32,
    total_downloaded: u64,
    total_uploaded: u64,
    torrents: BTreeMap<String, StubTorrent>,
}

impl StubSession {
    /// A stopped session with nothing in it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fabricated torrent, keyed by its info-hash.
    pub fn push_torrent(&mut self, torrent: StubTorrent) {
        self.torrents.insert(torrent.info_hash.clone(), torrent);
    }

    /// Look up a torrent for assertions.
    #[must_use]
    pub fn torrent(&self, info_hash: &str) -> Option<&StubTorrent> {
        self.torrents.get(info_hash)
    }

    /// Override the session-lifetime transfer counters.
    pub fn set_transfer_totals(&mut self, downloaded: u64, uploaded: u64) {
        self.total_downloaded = downloaded;
        self.total_uploaded = uploaded;
    }

    /// The upload cap last applied, for assertions.
    #[must_use]
    pub fn upload_rate_limit(&self) -> u32 {
        self.upload_rate_limit
    }

    /// The data directory handed to [`TorrentSession::start`].
    #[must_use]
    pub fn data_directory(&self) -> Option<&Path> {
        self.data_directory.as_deref()
    }
}

#[async_trait]
impl TorrentSession for StubSession {
    fn configure(&mut self, port: u16, stun_server: &str) {
        self.port = port;
        self.stun_server = stun_server.to_string();
    }

    async fn start(&mut self, data_directory: &Path) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.data_directory = Some(data_directory.to_path_buf());
        if let Some(state_path) = self.pending_state.take() {
            match std::fs::read(&state_path) {
                Ok(blob) => {
                    debug!(bytes = blob.len(), "merged saved session state");
                }
                Err(err) => {
                    debug!(error = %err, "no saved session state to merge");
                }
            }
        }
        self.running = true;
        self.paused = false;
        info!(port = self.port, stun = %self.stun_server, "stub session started");
        Ok(())
    }

    async fn stop(&mut self) {
        self.running = false;
        self.paused = false;
        self.torrents.clear();
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn add_torrent(&mut self, metadata_path: &Path) -> Option<String> {
        if !self.running {
            return None;
        }
        let metadata = std::fs::metadata(metadata_path).ok()?;
        if !metadata.is_file() {
            return None;
        }

        let info_hash = synthetic_info_hash(metadata_path);
        let name = metadata_path
            .file_stem()
            .map_or_else(|| info_hash.clone(), |stem| stem.to_string_lossy().into_owned());

        let mut torrent = StubTorrent::new(info_hash.clone(), name);
        torrent.files.push(StubFile::new(DEFAULT_PAYLOAD_BYTES, 0));
        self.torrents.insert(info_hash.clone(), torrent);
        Some(info_hash)
    }

    async fn remove_torrent(&mut self, info_hash: &str) {
        self.torrents.remove(info_hash);
    }

    fn torrent_count(&self) -> usize {
        self.torrents.len()
    }

    fn torrents(&self) -> Vec<TorrentDescriptor> {
        self.torrents
            .values()
            .map(StubTorrent::descriptor)
            .collect()
    }

    async fn pause_session(&mut self) {
        self.paused = true;
    }

    async fn resume_session(&mut self) {
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    async fn pause_downloads(&mut self) {
        self.download_rate_limit = PAUSED_DOWNLOAD_RATE;
    }

    async fn resume_downloads(&mut self) {
        self.download_rate_limit = 0;
    }

    async fn set_download_rate_limit(&mut self, bytes_per_sec: u32) {
        self.download_rate_limit = bytes_per_sec;
    }

    async fn set_upload_rate_limit(&mut self, bytes_per_sec: u32) {
        self.upload_rate_limit = bytes_per_sec;
    }

    fn download_rate_limit(&self) -> u32 {
        self.download_rate_limit
    }

    fn peer_count(&self) -> u32 {
        self.torrents.values().map(|torrent| torrent.num_peers).sum()
    }

    fn download_rate(&self) -> u64 {
        self.torrents
            .values()
            .map(|torrent| torrent.download_rate)
            .sum()
    }

    fn upload_rate(&self) -> u64 {
        self.torrents
            .values()
            .map(|torrent| torrent.upload_rate)
            .sum()
    }

    fn total_downloaded(&self) -> u64 {
        self.total_downloaded
    }

    fn total_uploaded(&self) -> u64 {
        self.total_uploaded
    }

    async fn apply_budget_priorities(&mut self, budget_bytes: u64) {
        let mut remaining = budget_bytes;
        for torrent in self.torrents.values_mut() {
            let files: Vec<(u64, u64)> = torrent
                .files
                .iter()
                .map(|file| (file.size, file.downloaded))
                .collect();
            let priorities = plan_file_priorities(&torrent.info_hash, &files, &mut remaining);
            for (file, priority) in torrent.files.iter_mut().zip(priorities) {
                file.priority = priority;
            }
        }
    }

    async fn save_state(&mut self, path: &Path) -> Result<()> {
        let mut blob = b"levin-stub-state\n".to_vec();
        blob.extend_from_slice(&(self.torrents.len() as u64).to_le_bytes());
        std::fs::write(path, blob)
            .with_context(|| format!("failed to write session state to {}", path.display()))
    }

    fn load_state(&mut self, path: &Path) {
        self.pending_state = Some(path.to_path_buf());
    }

    fn trackers(&self, info_hash: &str) -> Vec<String> {
        self.torrents
            .get(info_hash)
            .map(|torrent| torrent.trackers.clone())
            .unwrap_or_default()
    }
}

/// Fabricate a stable 40-hex info-hash from the metadata path.
fn synthetic_info_hash(path: &Path) -> String {
    let seed = path
        .as_os_str()
        .as_encoded_bytes()
        .iter()
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, &byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
        });
    let mut rng = StdRng::seed_from_u64(seed);
    let mut raw = [0_u8; 20];
    rng.fill_bytes(&mut raw);
    raw.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[allow(clippy::cast_precision_loss)]
fn downloaded_fraction(downloaded: u64, size: u64) -> f64 {
    (downloaded as f64 / size as f64).clamp(0.0, 1.0)
}
