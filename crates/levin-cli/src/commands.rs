//! Client-side commands that talk to the running daemon.

use anyhow::{anyhow, bail, Result};

use levin_ipc::Message;

use crate::daemon;
use crate::output::{field, format_bytes, format_count, format_rate, numeric_field};
use crate::paths;

/// Send one command to the daemon.
fn send(command: &str) -> Result<Message> {
    let mut request = Message::new();
    request.insert("command".to_string(), command.to_string());
    levin_ipc::request(&paths::socket_path(), &request)
        .map_err(|_| anyhow!("daemon is not running or not responding"))
}

/// `levin stop`: signal the daemon via its PID file.
pub fn stop() -> Result<()> {
    let pid_path = paths::pid_path();
    let Some(pid) = daemon::read_pid_file(&pid_path) else {
        bail!("daemon is not running");
    };
    if !daemon::is_process_running(pid) {
        bail!("daemon is not running");
    }
    if !daemon::terminate(pid) {
        bail!("failed to signal pid {pid}");
    }
    println!("levin: sent shutdown signal to pid {pid}");
    Ok(())
}

/// `levin status`.
pub fn status() -> Result<()> {
    let reply = send("status")?;
    if let Some(error) = reply.get("error") {
        bail!("{error}");
    }

    println!("State:       {}", field(&reply, "state"));
    println!("Torrents:    {}", field(&reply, "torrent_count"));
    println!("Files:       {}", format_count(field(&reply, "file_count")));
    println!("Peers:       {}", field(&reply, "peer_count"));
    println!(
        "Download:    {}",
        format_rate(numeric_field(&reply, "download_rate"))
    );
    println!(
        "Upload:      {}",
        format_rate(numeric_field(&reply, "upload_rate"))
    );
    println!(
        "Downloaded:  {}",
        format_bytes(numeric_field(&reply, "total_downloaded"))
    );
    println!(
        "Uploaded:    {}",
        format_bytes(numeric_field(&reply, "total_uploaded"))
    );
    println!(
        "Disk usage:  {}",
        format_bytes(numeric_field(&reply, "disk_usage"))
    );
    println!(
        "Disk budget: {}",
        format_bytes(numeric_field(&reply, "disk_budget"))
    );
    println!(
        "Over budget: {}",
        if field(&reply, "over_budget") == "1" {
            "yes"
        } else {
            "no"
        }
    );
    Ok(())
}

/// `levin list`.
pub fn list() -> Result<()> {
    let reply = send("list")?;
    if let Some(error) = reply.get("error") {
        bail!("{error}");
    }

    let count = numeric_field(&reply, "count");
    if count == 0 {
        println!("No torrents.");
        return Ok(());
    }

    for index in 0..count {
        let prefix = format!("t{index}_");
        let key = |suffix: &str| format!("{prefix}{suffix}");

        let mut name = field(&reply, &key("name")).to_string();
        if name.is_empty() {
            name = field(&reply, &key("hash")).to_string();
        }
        let progress: f64 = field(&reply, &key("progress")).parse().unwrap_or(0.0);
        let peers = numeric_field(&reply, &key("peers"));
        let seed = field(&reply, &key("seed")) == "1";

        println!(
            "{:<40}  {:>5.1}%  {}  {} peer{}  D:{}  U:{}",
            name,
            progress * 100.0,
            if seed { "seed" } else { "    " },
            peers,
            if peers == 1 { "" } else { "s" },
            format_rate(numeric_field(&reply, &key("down_rate"))),
            format_rate(numeric_field(&reply, &key("up_rate"))),
        );
    }
    Ok(())
}

/// `levin pause`.
pub fn pause() -> Result<()> {
    let reply = send("pause")?;
    if let Some(error) = reply.get("error") {
        bail!("{error}");
    }
    println!("levin: paused");
    Ok(())
}

/// `levin resume`.
pub fn resume() -> Result<()> {
    let reply = send("resume")?;
    if let Some(error) = reply.get("error") {
        bail!("{error}");
    }
    println!("levin: resumed");
    Ok(())
}
