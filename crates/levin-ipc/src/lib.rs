#![forbid(unsafe_code)]

//! Control channel between the daemon and its CLI.
//!
//! One request/reply per connection. The wire format is a single UTF-8 line
//! holding a flat JSON object of string-to-string pairs, terminated by `\n`.
//! The server side is async and runs on the daemon's tick task; the client
//! side is synchronous, which is all a one-shot CLI needs.

mod client;
mod protocol;
mod server;

pub use client::request;
pub use protocol::{decode, encode, Message};
pub use server::{IpcConnection, IpcServer};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors crossing the control channel.
#[derive(Debug, Error)]
pub enum IpcError {
    /// The server socket could not be bound.
    #[error("failed to bind control socket {path}")]
    Bind {
        /// Socket path.
        path: PathBuf,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
    /// The client could not reach the daemon.
    #[error("failed to connect to control socket {path}")]
    Connect {
        /// Socket path.
        path: PathBuf,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
    /// A read or write on an established connection failed.
    #[error("control channel IO failed")]
    Io(#[from] io::Error),
    /// The peer sent something that is not a flat JSON string map.
    #[error("malformed control message")]
    Malformed(#[from] serde_json::Error),
}
