//! Synchronous client side of the control channel.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use crate::protocol::{decode, encode, Message};
use crate::IpcError;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Send one request and wait for the reply.
///
/// # Errors
///
/// Returns [`IpcError::Connect`] when the daemon is not listening, and IO or
/// decode errors for a connection that fails mid-exchange.
pub fn request(socket_path: &Path, request: &Message) -> Result<Message, IpcError> {
    let stream = UnixStream::connect(socket_path).map_err(|source| IpcError::Connect {
        path: socket_path.to_path_buf(),
        source,
    })?;
    stream.set_read_timeout(Some(TIMEOUT))?;
    stream.set_write_timeout(Some(TIMEOUT))?;

    (&stream).write_all(encode(request).as_bytes())?;

    let mut line = String::new();
    BufReader::new(&stream).read_line(&mut line)?;
    decode(line.trim_end())
}
