//! The orchestrator: ties the state machine, budget enforcement, statistics,
//! watcher, and torrent session together, one tick at a time.
//!
//! All methods run on the single tick task. External signals (power, network,
//! filesystem stats, enable/disable) arrive as `update_*`/`set_*` calls;
//! watcher events are drained at the top of each tick.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use levin_config::Config;
use levin_platform::disk_usage;
use levin_torrent::TorrentSession;
use levin_watcher::{TorrentWatcher, WatchEvent};

use crate::budget::{delete_to_free, BudgetPolicy};
use crate::state_machine::{State, StateMachine, Transition};
use crate::stats::Statistics;

/// Ticks between statistics flushes (5 minutes at 1 Hz).
pub const STATS_SAVE_INTERVAL_TICKS: u64 = 300;

/// Listen port handed to the session.
const SESSION_PORT: u16 = 6881;

const STATS_FILE: &str = "stats.dat";
const SESSION_STATE_FILE: &str = "session.state";

/// Snapshot of the daemon for status consumers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStatus {
    /// Current activity state.
    pub state: State,
    /// Torrents in the session.
    pub torrent_count: usize,
    /// Connected peers across all torrents.
    pub peer_count: u32,
    /// Aggregate download rate, bytes per second.
    pub download_rate: u64,
    /// Aggregate upload rate, bytes per second.
    pub upload_rate: u64,
    /// Bytes downloaded across all runs, persisted base included.
    pub total_downloaded: u64,
    /// Bytes uploaded across all runs, persisted base included.
    pub total_uploaded: u64,
    /// Payload bytes found by the last enforcement scan.
    pub disk_usage: u64,
    /// Budget from the last enforcement, after hysteresis.
    pub disk_budget: u64,
    /// Whether the last enforcement found us over budget.
    pub over_budget: bool,
    /// Non-empty payload files found by the last enforcement scan.
    pub file_count: u64,
}

/// The daemon core.
pub struct Engine {
    config: Config,
    machine: StateMachine,
    policy: BudgetPolicy,
    session: Box<dyn TorrentSession>,
    watcher: TorrentWatcher,
    stats: Statistics,
    base_downloaded: u64,
    base_uploaded: u64,
    torrents_by_path: HashMap<PathBuf, String>,

    started: bool,
    on_ac_power: bool,
    has_wifi: bool,
    has_cellular: bool,
    fs_total: u64,
    fs_free: u64,

    disk_usage: u64,
    disk_budget: u64,
    over_budget: bool,
    file_count: u64,

    tick_count: u64,
}

impl Engine {
    /// Build an engine around a session implementation.
    #[must_use]
    pub fn new(config: Config, session: Box<dyn TorrentSession>) -> Self {
        let policy = BudgetPolicy::new(
            config.min_free_bytes,
            config.min_free_percentage,
            config.max_storage_bytes,
        );
        let watcher = TorrentWatcher::new(&config.watch_directory);
        Self {
            config,
            machine: StateMachine::new(),
            policy,
            session,
            watcher,
            stats: Statistics::default(),
            base_downloaded: 0,
            base_uploaded: 0,
            torrents_by_path: HashMap::new(),
            started: false,
            on_ac_power: false,
            has_wifi: false,
            has_cellular: false,
            fs_total: 0,
            fs_free: 0,
            disk_usage: 0,
            disk_budget: 0,
            over_budget: false,
            file_count: 0,
            tick_count: 0,
        }
    }

    /// Create directories, restore persistent state, and bring up the
    /// session and the watcher.
    ///
    /// # Errors
    ///
    /// Startup failures (directories, session, watcher) are fatal.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        for dir in [
            &self.config.watch_directory,
            &self.config.data_directory,
            &self.config.state_directory,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        if self.stats.load(&self.stats_path()) {
            info!(
                downloaded = self.stats.total_downloaded,
                uploaded = self.stats.total_uploaded,
                "restored transfer statistics"
            );
        }
        self.base_downloaded = self.stats.total_downloaded;
        self.base_uploaded = self.stats.total_uploaded;

        let session_state = self.session_state_path();
        self.session.load_state(&session_state);
        self.session
            .configure(SESSION_PORT, &self.config.stun_server);
        self.session
            .start(&self.config.data_directory)
            .await
            .context("failed to start torrent session")?;
        if self.config.max_upload_kbps > 0 {
            self.session
                .set_upload_rate_limit(self.config.max_upload_kbps * 1024)
                .await;
        }

        self.watcher.start().context("failed to watch directory")?;
        let existing = self.watcher.scan_existing();
        debug!(existing, "scanned watch directory");

        self.started = true;
        Ok(())
    }

    /// Flush persistent state and tear everything down.
    pub async fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.save_statistics();
        let session_state = self.session_state_path();
        if let Err(err) = self.session.save_state(&session_state).await {
            warn!(error = %err, "failed to save session state");
        }
        self.session.stop().await;
        self.watcher.stop();
        self.started = false;
    }

    /// One iteration of the 1 Hz loop: drain watcher events, refresh the
    /// torrent condition, run enforcement on its interval, flush statistics
    /// on its interval.
    pub async fn tick(&mut self) {
        if !self.started {
            return;
        }
        self.tick_count += 1;

        for event in self.watcher.poll() {
            match event {
                WatchEvent::Added(path) => {
                    self.add_torrent(&path).await;
                }
                WatchEvent::Removed(path) => {
                    self.remove_torrent_at(&path).await;
                }
            }
        }

        let has = self.session.torrent_count() > 0;
        let transition = self.machine.update_has_torrents(has);
        self.apply_transition(transition).await;

        let interval = u64::from(self.config.disk_check_interval_secs.max(1));
        let enforcement_due = self.tick_count == 1 || self.tick_count % interval == 0;
        if enforcement_due && self.fs_total > 0 {
            self.enforce_budget().await;
        }

        if self.tick_count % STATS_SAVE_INTERVAL_TICKS == 0 {
            self.save_statistics();
        }
    }

    /// Enable or disable all activity.
    pub async fn set_enabled(&mut self, enabled: bool) {
        let transition = self.machine.update_enabled(enabled);
        self.apply_transition(transition).await;
    }

    /// Feed the power condition.
    pub async fn update_battery(&mut self, on_ac_power: bool) {
        self.on_ac_power = on_ac_power;
        self.refresh_battery_condition().await;
    }

    /// Feed the network condition.
    pub async fn update_network(&mut self, has_wifi: bool, has_cellular: bool) {
        self.has_wifi = has_wifi;
        self.has_cellular = has_cellular;
        self.refresh_network_condition().await;
    }

    /// Feed fresh filesystem stats; triggers an immediate enforcement pass.
    pub async fn update_storage(&mut self, fs_total: u64, fs_free: u64) {
        self.fs_total = fs_total;
        self.fs_free = fs_free;
        if self.started {
            self.enforce_budget().await;
        }
    }

    /// Change the download cap at runtime (reload path).
    pub async fn set_download_limit(&mut self, kbps: u32) {
        self.config.max_download_kbps = kbps;
        if self.session.is_running() {
            self.session.set_download_rate_limit(kbps * 1024).await;
        }
    }

    /// Change the upload cap at runtime (reload path).
    pub async fn set_upload_limit(&mut self, kbps: u32) {
        self.config.max_upload_kbps = kbps;
        if self.session.is_running() {
            self.session.set_upload_rate_limit(kbps * 1024).await;
        }
    }

    /// Change the battery policy at runtime (reload path).
    pub async fn set_run_on_battery(&mut self, run_on_battery: bool) {
        self.config.run_on_battery = run_on_battery;
        self.refresh_battery_condition().await;
    }

    /// Change the cellular policy at runtime (reload path).
    pub async fn set_run_on_cellular(&mut self, run_on_cellular: bool) {
        self.config.run_on_cellular = run_on_cellular;
        self.refresh_network_condition().await;
    }

    /// Add a torrent from a metadata file. Returns whether the session
    /// accepted it.
    pub async fn add_torrent(&mut self, path: &Path) -> bool {
        if !self.started {
            return false;
        }
        match self.session.add_torrent(path).await {
            Some(info_hash) => {
                info!(path = %path.display(), info_hash = %info_hash, "added torrent");
                self.torrents_by_path.insert(path.to_path_buf(), info_hash);
                let has = self.session.torrent_count() > 0;
                let transition = self.machine.update_has_torrents(has);
                self.apply_transition(transition).await;
                true
            }
            None => {
                warn!(path = %path.display(), "session added no torrent");
                false
            }
        }
    }

    /// Remove a torrent by the metadata path it was added from.
    async fn remove_torrent_at(&mut self, path: &Path) {
        let Some(info_hash) = self.torrents_by_path.remove(path) else {
            debug!(path = %path.display(), "removal for unknown metadata path");
            return;
        };
        info!(path = %path.display(), info_hash = %info_hash, "removing torrent");
        self.session.remove_torrent(&info_hash).await;
        let has = self.session.torrent_count() > 0;
        let transition = self.machine.update_has_torrents(has);
        self.apply_transition(transition).await;
    }

    /// Status snapshot for the control channel.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.machine.state(),
            torrent_count: self.session.torrent_count(),
            peer_count: self.session.peer_count(),
            download_rate: self.session.download_rate(),
            upload_rate: self.session.upload_rate(),
            total_downloaded: self.base_downloaded + self.session.total_downloaded(),
            total_uploaded: self.base_uploaded + self.session.total_uploaded(),
            disk_usage: self.disk_usage,
            disk_budget: self.disk_budget,
            over_budget: self.over_budget,
            file_count: self.file_count,
        }
    }

    /// Torrent list snapshot for the control channel.
    #[must_use]
    pub fn torrents(&self) -> Vec<levin_torrent::TorrentDescriptor> {
        self.session.torrents()
    }

    /// Current activity state.
    #[must_use]
    pub fn state(&self) -> State {
        self.machine.state()
    }

    /// Access the session, for the shell and for tests.
    #[must_use]
    pub fn session(&self) -> &dyn TorrentSession {
        self.session.as_ref()
    }

    async fn refresh_battery_condition(&mut self) {
        let ok = self.on_ac_power || self.config.run_on_battery;
        let transition = self.machine.update_battery(ok);
        self.apply_transition(transition).await;
    }

    async fn refresh_network_condition(&mut self) {
        let ok = self.has_wifi || (self.has_cellular && self.config.run_on_cellular);
        let transition = self.machine.update_network(ok);
        self.apply_transition(transition).await;
    }

    /// Budget enforcement: scan usage, recompute the budget, push the
    /// storage condition, apply per-file priorities, and as a safety net
    /// delete payload when a deficit remains.
    async fn enforce_budget(&mut self) {
        self.scan_and_apply().await;
        if self.over_budget {
            let result =
                self.policy
                    .calculate(self.fs_total, self.fs_free, self.disk_usage);
            if result.deficit_bytes > 0 {
                let freed = delete_to_free(&self.config.data_directory, result.deficit_bytes);
                info!(
                    freed,
                    deficit = result.deficit_bytes,
                    "deleted payload to recover the budget"
                );
                self.scan_and_apply().await;
            }
        }
    }

    async fn scan_and_apply(&mut self) {
        let usage = disk_usage(&self.config.data_directory);
        self.disk_usage = usage.bytes;
        self.file_count = usage.file_count;

        let result = self
            .policy
            .calculate(self.fs_total, self.fs_free, usage.bytes);
        self.disk_budget = result.budget_bytes;
        self.over_budget = result.over_budget;
        debug!(
            usage = usage.bytes,
            budget = result.budget_bytes,
            over = result.over_budget,
            "disk check"
        );

        let transition = self.machine.update_storage(!result.over_budget);
        self.apply_transition(transition).await;

        self.session
            .apply_budget_priorities(result.budget_bytes)
            .await;
    }

    /// Session actions derived from a state change.
    async fn apply_transition(&mut self, transition: Option<Transition>) {
        let Some(transition) = transition else {
            return;
        };
        info!(
            from = transition.from.name(),
            to = transition.to.name(),
            "state changed"
        );
        if !self.session.is_running() {
            return;
        }
        match transition.to {
            State::Off | State::Paused => {
                self.session.pause_session().await;
            }
            State::Idle => {
                self.session.resume_session().await;
            }
            State::Seeding => {
                self.session.resume_session().await;
                self.session.pause_downloads().await;
            }
            State::Downloading => {
                self.session.resume_session().await;
                if self.config.max_download_kbps > 0 {
                    self.session
                        .set_download_rate_limit(self.config.max_download_kbps * 1024)
                        .await;
                } else {
                    self.session.resume_downloads().await;
                }
            }
        }
    }

    fn save_statistics(&mut self) {
        self.stats.update(
            self.base_downloaded,
            self.base_uploaded,
            self.session.total_downloaded(),
            self.session.total_uploaded(),
        );
        if let Err(err) = self.stats.save(&self.stats_path()) {
            warn!(error = %err, "failed to save statistics");
        }
    }

    fn stats_path(&self) -> PathBuf {
        self.config.state_directory.join(STATS_FILE)
    }

    fn session_state_path(&self) -> PathBuf {
        self.config.state_directory.join(SESSION_STATE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levin_torrent::{StubFile, StubSession, StubTorrent, TorrentSession};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const GB: u64 = 1 << 30;

    fn test_config(root: &Path) -> Config {
        Config {
            watch_directory: root.join("watch"),
            data_directory: root.join("data"),
            state_directory: root.join("state"),
            min_free_bytes: 0,
            min_free_percentage: 0.0,
            max_storage_bytes: 100 * GB,
            ..Config::default()
        }
    }

    async fn started_engine(config: Config) -> Engine {
        let mut engine = Engine::new(config, Box::new(StubSession::new()));
        engine.start().await.expect("engine start");
        engine
    }

    /// Bring an engine to the fully-permitted baseline: enabled, on AC,
    /// wifi, plenty of disk.
    async fn enable_all(engine: &mut Engine) {
        engine.set_enabled(true).await;
        engine.update_battery(true).await;
        engine.update_network(true, false).await;
        engine.update_storage(500 * GB, 400 * GB).await;
    }

    #[tokio::test]
    async fn battery_drop_pauses_when_policy_forbids() {
        let root = TempDir::new().unwrap();
        let mut engine = started_engine(test_config(root.path())).await;
        enable_all(&mut engine).await;
        assert_eq!(engine.state(), State::Idle);

        engine.update_battery(false).await;
        assert_eq!(engine.state(), State::Paused);
        assert!(engine.session().is_paused());

        // With run_on_battery the same signal keeps us going.
        engine.set_run_on_battery(true).await;
        assert_eq!(engine.state(), State::Idle);
        assert!(!engine.session().is_paused());
    }

    #[tokio::test]
    async fn cellular_only_network_respects_policy() {
        let root = TempDir::new().unwrap();
        let mut engine = started_engine(test_config(root.path())).await;
        enable_all(&mut engine).await;

        engine.update_network(false, true).await;
        assert_eq!(engine.state(), State::Paused);

        engine.set_run_on_cellular(true).await;
        assert_eq!(engine.state(), State::Idle);
    }

    #[tokio::test]
    async fn watched_metadata_drives_add_and_precise_remove() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path());
        let mut engine = started_engine(config.clone()).await;
        enable_all(&mut engine).await;

        let path = config.watch_directory.join("corpus.torrent");
        std::fs::write(&path, b"metadata").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.status().torrent_count == 0 && Instant::now() < deadline {
            engine.tick().await;
            std::thread::sleep(Duration::from_millis(50));
        }
        assert_eq!(engine.status().torrent_count, 1);
        assert_eq!(engine.state(), State::Downloading);

        std::fs::remove_file(&path).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.status().torrent_count > 0 && Instant::now() < deadline {
            engine.tick().await;
            std::thread::sleep(Duration::from_millis(50));
        }
        assert_eq!(engine.status().torrent_count, 0);
        assert_eq!(engine.state(), State::Idle);
    }

    #[tokio::test]
    async fn initial_scan_picks_up_preexisting_metadata() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path());
        std::fs::create_dir_all(&config.watch_directory).unwrap();
        std::fs::write(config.watch_directory.join("a.torrent"), b"a").unwrap();
        std::fs::write(config.watch_directory.join("b.torrent"), b"b").unwrap();

        let mut engine = started_engine(config).await;
        enable_all(&mut engine).await;
        engine.tick().await;
        assert_eq!(engine.status().torrent_count, 2);
    }

    #[tokio::test]
    async fn over_cap_usage_deletes_payload_and_seeds() {
        let root = TempDir::new().unwrap();
        let mut config = test_config(root.path());
        // A cap small enough that any budget dies inside the hysteresis
        // margin: once over, deletion runs and we stay seeding.
        config.max_storage_bytes = 4096;
        std::fs::create_dir_all(&config.data_directory).unwrap();
        std::fs::write(config.data_directory.join("payload.bin"), vec![0_u8; 16384]).unwrap();

        let mut engine = Engine::new(config.clone(), Box::new(StubSession::new()));
        engine.start().await.unwrap();
        engine.set_enabled(true).await;
        engine.update_battery(true).await;
        engine.update_network(true, false).await;

        // Fabricate a torrent so the machine can distinguish seeding from idle.
        let path = config.watch_directory.join("t.torrent");
        std::fs::write(&path, b"metadata").unwrap();
        engine.add_torrent(&path).await;

        engine.update_storage(500 * GB, 400 * GB).await;

        let status = engine.status();
        assert!(status.over_budget);
        assert_eq!(status.disk_budget, 0);
        assert_eq!(engine.state(), State::Seeding);
        // The safety net removed the oversized payload.
        assert!(!config.data_directory.join("payload.bin").exists());
        assert_eq!(engine.session().download_rate_limit(), 1);
    }

    #[tokio::test]
    async fn healthy_budget_downloads_and_budget_loss_gates_downloads() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path());
        let mut engine = started_engine(config.clone()).await;
        enable_all(&mut engine).await;

        let path = config.watch_directory.join("t.torrent");
        std::fs::write(&path, b"metadata").unwrap();
        engine.add_torrent(&path).await;
        assert_eq!(engine.state(), State::Downloading);
        assert_eq!(engine.session().download_rate_limit(), 0);

        // Free space collapses: budget gone, downloads halt, seeding stays.
        engine.update_storage(500 * GB, 0).await;
        assert_eq!(engine.state(), State::Seeding);
        assert_eq!(engine.session().download_rate_limit(), 1);
        assert!(!engine.session().is_paused());

        // Space returns: downloads resume.
        engine.update_storage(500 * GB, 400 * GB).await;
        assert_eq!(engine.state(), State::Downloading);
        assert_eq!(engine.session().download_rate_limit(), 0);
    }

    #[tokio::test]
    async fn configured_download_cap_is_restored_on_downloading() {
        let root = TempDir::new().unwrap();
        let mut config = test_config(root.path());
        config.max_download_kbps = 256;
        let mut engine = started_engine(config.clone()).await;
        enable_all(&mut engine).await;

        let path = config.watch_directory.join("t.torrent");
        std::fs::write(&path, b"metadata").unwrap();
        engine.add_torrent(&path).await;

        assert_eq!(engine.state(), State::Downloading);
        assert_eq!(engine.session().download_rate_limit(), 256 * 1024);
    }

    #[tokio::test]
    async fn statistics_accumulate_across_restarts() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path());

        let mut session = StubSession::new();
        session.set_transfer_totals(100, 200);
        let mut engine = Engine::new(config.clone(), Box::new(session));
        engine.start().await.unwrap();
        engine.stop().await;

        let mut session = StubSession::new();
        session.set_transfer_totals(50, 60);
        let mut engine = Engine::new(config.clone(), Box::new(session));
        engine.start().await.unwrap();
        let status = engine.status();
        assert_eq!(status.total_downloaded, 150);
        assert_eq!(status.total_uploaded, 260);
        engine.stop().await;

        let mut stats = Statistics::default();
        assert!(stats.load(&config.state_directory.join("stats.dat")));
        assert_eq!(stats.total_downloaded, 150);
        assert_eq!(stats.total_uploaded, 260);
    }

    #[tokio::test]
    async fn enforcement_reports_non_empty_file_count() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path());
        std::fs::create_dir_all(&config.data_directory).unwrap();
        std::fs::write(config.data_directory.join("book-1"), vec![1_u8; 512]).unwrap();
        std::fs::write(config.data_directory.join("book-2"), vec![2_u8; 512]).unwrap();
        std::fs::write(config.data_directory.join("placeholder"), b"").unwrap();

        let mut engine = started_engine(config).await;
        enable_all(&mut engine).await;
        assert_eq!(engine.status().file_count, 2);
        assert!(engine.status().disk_usage >= 1024);
    }

    /// Session double that records every budget handed to it.
    struct RecordingSession {
        inner: StubSession,
        budgets: Arc<Mutex<Vec<u64>>>,
    }

    #[async_trait::async_trait]
    impl TorrentSession for RecordingSession {
        fn configure(&mut self, port: u16, stun_server: &str) {
            self.inner.configure(port, stun_server);
        }
        async fn start(&mut self, data_directory: &Path) -> anyhow::Result<()> {
            self.inner.start(data_directory).await
        }
        async fn stop(&mut self) {
            self.inner.stop().await;
        }
        fn is_running(&self) -> bool {
            self.inner.is_running()
        }
        async fn add_torrent(&mut self, metadata_path: &Path) -> Option<String> {
            self.inner.add_torrent(metadata_path).await
        }
        async fn remove_torrent(&mut self, info_hash: &str) {
            self.inner.remove_torrent(info_hash).await;
        }
        fn torrent_count(&self) -> usize {
            self.inner.torrent_count()
        }
        fn torrents(&self) -> Vec<levin_torrent::TorrentDescriptor> {
            self.inner.torrents()
        }
        async fn pause_session(&mut self) {
            self.inner.pause_session().await;
        }
        async fn resume_session(&mut self) {
            self.inner.resume_session().await;
        }
        fn is_paused(&self) -> bool {
            self.inner.is_paused()
        }
        async fn pause_downloads(&mut self) {
            self.inner.pause_downloads().await;
        }
        async fn resume_downloads(&mut self) {
            self.inner.resume_downloads().await;
        }
        async fn set_download_rate_limit(&mut self, bytes_per_sec: u32) {
            self.inner.set_download_rate_limit(bytes_per_sec).await;
        }
        async fn set_upload_rate_limit(&mut self, bytes_per_sec: u32) {
            self.inner.set_upload_rate_limit(bytes_per_sec).await;
        }
        fn download_rate_limit(&self) -> u32 {
            self.inner.download_rate_limit()
        }
        fn peer_count(&self) -> u32 {
            self.inner.peer_count()
        }
        fn download_rate(&self) -> u64 {
            self.inner.download_rate()
        }
        fn upload_rate(&self) -> u64 {
            self.inner.upload_rate()
        }
        fn total_downloaded(&self) -> u64 {
            self.inner.total_downloaded()
        }
        fn total_uploaded(&self) -> u64 {
            self.inner.total_uploaded()
        }
        async fn apply_budget_priorities(&mut self, budget_bytes: u64) {
            self.budgets.lock().unwrap().push(budget_bytes);
            self.inner.apply_budget_priorities(budget_bytes).await;
        }
        async fn save_state(&mut self, path: &Path) -> anyhow::Result<()> {
            self.inner.save_state(path).await
        }
        fn load_state(&mut self, path: &Path) {
            self.inner.load_state(path);
        }
        fn trackers(&self, info_hash: &str) -> Vec<String> {
            self.inner.trackers(info_hash)
        }
    }

    #[tokio::test]
    async fn enforcement_hands_the_hysteresis_adjusted_budget_to_the_session() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path());
        let budgets = Arc::new(Mutex::new(Vec::new()));

        let mut inner = StubSession::new();
        let mut torrent = StubTorrent::new("d".repeat(40), "bulk");
        torrent.files = vec![StubFile::new(200 * GB, 0)];
        inner.push_torrent(torrent);

        let session = RecordingSession {
            inner,
            budgets: Arc::clone(&budgets),
        };
        let mut engine = Engine::new(config, Box::new(session));
        engine.start().await.unwrap();
        enable_all(&mut engine).await;

        let recorded = budgets.lock().unwrap().clone();
        assert_eq!(recorded.len(), 1);
        // Empty data dir against a 100 GB cap: full cap minus hysteresis.
        assert_eq!(recorded[0], 100 * GB - 50 * (1 << 20));
    }

    #[tokio::test]
    async fn disabling_mid_run_pauses_the_session() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path());
        let mut engine = started_engine(config).await;
        enable_all(&mut engine).await;
        assert!(!engine.session().is_paused());

        engine.set_enabled(false).await;
        assert_eq!(engine.state(), State::Off);
        assert!(engine.session().is_paused());
    }
}
