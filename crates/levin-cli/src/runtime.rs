//! The daemon: startup, the 1 Hz loop, signals, and control-channel
//! dispatch.
//!
//! Everything after startup runs on one current-thread runtime task, so all
//! engine state is mutated from a single place: the tick fires, watcher
//! events drain, enforcement runs, and control requests are answered between
//! ticks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use levin_config::Config;
use levin_engine::Engine;
use levin_ipc::{IpcServer, Message};
use levin_platform::{is_on_ac_power, storage_info};
use levin_torrent::StubSession;

use crate::{daemon, paths};

/// `levin start`: refuse to double-start, optionally daemonise, then run the
/// loop until a shutdown signal.
pub fn start(config_path: Option<&Path>, foreground: bool) -> Result<()> {
    let runtime_dir = paths::runtime_dir();
    std::fs::create_dir_all(&runtime_dir)
        .with_context(|| format!("failed to create {}", runtime_dir.display()))?;

    let pid_path = paths::pid_path();
    if let Some(existing) = daemon::read_pid_file(&pid_path) {
        if daemon::is_process_running(existing) {
            bail!("daemon already running (pid {existing})");
        }
    }

    if !foreground {
        daemon::daemonize()?;
    }
    daemon::write_pid_file(&pid_path)?;

    let result = run(config_path.map(Path::to_path_buf));

    daemon::remove_pid_file(&pid_path);
    result
}

fn run(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    init_logging(&config.log_level);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the runtime")?;
    runtime.block_on(run_loop(config, config_path))
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = match config_path {
        Some(path) => levin_config::load_from_path(path)?,
        None => levin_config::load()?,
    };
    Ok(config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

async fn run_loop(mut config: Config, config_path: Option<PathBuf>) -> Result<()> {
    let server = IpcServer::bind(&paths::socket_path())?;

    let mut engine = Engine::new(config.clone(), Box::new(StubSession::new()));
    engine.start().await?;

    let mut sigterm = signal(SignalKind::terminate()).context("failed to install TERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install INT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("failed to install HUP handler")?;
    // SIGPIPE is already ignored by the Rust startup code.

    // This shell serves desktops: treat the uplink as wifi, never cellular.
    engine.update_network(true, false).await;
    engine.update_battery(is_on_ac_power()).await;
    let storage = storage_info(&config.data_directory);
    engine.update_storage(storage.fs_total, storage.fs_free).await;
    engine.set_enabled(true).await;
    info!(state = engine.state().name(), "daemon up");

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let refresh_every = u64::from(config.disk_check_interval_secs.max(1));
    let mut ticks_since_refresh = 0_u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                engine.tick().await;

                ticks_since_refresh += 1;
                if ticks_since_refresh >= refresh_every {
                    ticks_since_refresh = 0;
                    let storage = storage_info(&config.data_directory);
                    engine.update_storage(storage.fs_total, storage.fs_free).await;
                    engine.update_battery(is_on_ac_power()).await;
                }
            }
            accepted = server.accept() => {
                match accepted {
                    Ok(mut connection) => {
                        match connection.read_request().await {
                            Ok(Some(request)) => {
                                let reply = dispatch(&mut engine, request).await;
                                if let Err(err) = connection.write_reply(&reply).await {
                                    warn!(error = %err, "failed to answer control request");
                                }
                            }
                            Ok(None) => {}
                            Err(err) => {
                                let reply = error_reply(&format!("malformed request: {err}"));
                                let _ = connection.write_reply(&reply).await;
                            }
                        }
                    }
                    Err(err) => warn!(error = %err, "control accept failed"),
                }
            }
            _ = sigterm.recv() => {
                info!("received TERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received INT, shutting down");
                break;
            }
            _ = sighup.recv() => {
                match load_config(config_path.as_deref()) {
                    Ok(reloaded) => {
                        engine.set_download_limit(reloaded.max_download_kbps).await;
                        engine.set_upload_limit(reloaded.max_upload_kbps).await;
                        engine.set_run_on_battery(reloaded.run_on_battery).await;
                        engine.set_run_on_cellular(reloaded.run_on_cellular).await;
                        config = reloaded;
                        info!("configuration reloaded");
                    }
                    Err(err) => warn!(error = %err, "config reload failed"),
                }
            }
        }
    }

    engine.stop().await;
    Ok(())
}

/// Answer one control request.
async fn dispatch(engine: &mut Engine, request: Message) -> Message {
    match request.get("command").map(String::as_str) {
        Some("status") => status_reply(engine),
        Some("list") => list_reply(engine),
        Some("pause") => {
            engine.set_enabled(false).await;
            ok_reply()
        }
        Some("resume") => {
            engine.set_enabled(true).await;
            ok_reply()
        }
        Some(other) => error_reply(&format!("unknown command: {other}")),
        None => error_reply("missing command"),
    }
}

fn status_reply(engine: &Engine) -> Message {
    let status = engine.status();
    let mut reply = Message::new();
    reply.insert("state".to_string(), status.state.name().to_string());
    reply.insert(
        "torrent_count".to_string(),
        status.torrent_count.to_string(),
    );
    reply.insert("peer_count".to_string(), status.peer_count.to_string());
    reply.insert(
        "download_rate".to_string(),
        status.download_rate.to_string(),
    );
    reply.insert("upload_rate".to_string(), status.upload_rate.to_string());
    reply.insert(
        "total_downloaded".to_string(),
        status.total_downloaded.to_string(),
    );
    reply.insert(
        "total_uploaded".to_string(),
        status.total_uploaded.to_string(),
    );
    reply.insert("disk_usage".to_string(), status.disk_usage.to_string());
    reply.insert("disk_budget".to_string(), status.disk_budget.to_string());
    reply.insert(
        "over_budget".to_string(),
        flag(status.over_budget).to_string(),
    );
    reply.insert("file_count".to_string(), status.file_count.to_string());
    reply
}

fn list_reply(engine: &Engine) -> Message {
    let torrents = engine.torrents();
    let mut reply = Message::new();
    reply.insert("count".to_string(), torrents.len().to_string());
    for (index, torrent) in torrents.iter().enumerate() {
        let key = |suffix: &str| format!("t{index}_{suffix}");
        reply.insert(key("hash"), torrent.info_hash.clone());
        reply.insert(key("name"), torrent.name.clone());
        reply.insert(key("size"), torrent.size.to_string());
        reply.insert(key("downloaded"), torrent.downloaded.to_string());
        reply.insert(key("uploaded"), torrent.uploaded.to_string());
        reply.insert(key("down_rate"), torrent.download_rate.to_string());
        reply.insert(key("up_rate"), torrent.upload_rate.to_string());
        reply.insert(key("peers"), torrent.num_peers.to_string());
        reply.insert(key("progress"), format!("{:.6}", torrent.progress));
        reply.insert(key("seed"), flag(torrent.is_seed).to_string());
    }
    reply
}

fn ok_reply() -> Message {
    let mut reply = Message::new();
    reply.insert("ok".to_string(), "1".to_string());
    reply
}

fn error_reply(message: &str) -> Message {
    let mut reply = Message::new();
    reply.insert("error".to_string(), message.to_string());
    reply
}

const fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
