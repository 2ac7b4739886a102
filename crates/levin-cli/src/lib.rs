//! The `levin` binary: a daemon that mirrors a torrent corpus within a disk
//! budget, and the thin CLI that controls it over a local socket.

mod cli;
mod commands;
mod daemon;
mod output;
mod paths;
mod populate;
mod runtime;

use clap::Parser;

use crate::cli::{Cli, Command};

/// Parse arguments, execute the requested command, and return the process
/// exit code: 0 on success, 1 on "not running / not responding / invalid".
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Start { foreground } => runtime::start(cli.config.as_deref(), foreground),
        Command::Stop => commands::stop(),
        Command::Status => commands::status(),
        Command::List => commands::list(),
        Command::Pause => commands::pause(),
        Command::Resume => commands::resume(),
        Command::Populate => populate::populate(cli.config.as_deref()),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("levin: {err:#}");
            1
        }
    }
}
