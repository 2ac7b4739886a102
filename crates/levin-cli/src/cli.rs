//! Argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A well-behaved BitTorrent mirroring agent.
#[derive(Debug, Parser)]
#[command(name = "levin", version, about)]
pub struct Cli {
    /// Path to the config file (default: `$XDG_CONFIG_HOME/levin/levin.toml`).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the daemon.
    Start {
        /// Stay in the foreground instead of daemonising.
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the running daemon.
    Stop,
    /// Show daemon status.
    Status,
    /// List active torrents.
    List,
    /// Pause all seeding and downloading.
    Pause,
    /// Resume seeding and downloading.
    Resume,
    /// Fetch the torrent index into the watch directory (foreground).
    Populate,
}
