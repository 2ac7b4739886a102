//! Async server side of the control channel.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::timeout;

use crate::protocol::{decode, encode, Message};
use crate::IpcError;

/// How long a connected client gets to deliver its request line.
const READ_TIMEOUT: Duration = Duration::from_secs(2);
/// Enough to flush a few KiB of reply to a local peer.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Listening endpoint for the control channel. Owns the socket file and
/// removes it on drop.
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    /// Bind the control socket, replacing any stale socket file.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Bind`] when the socket cannot be created; this is
    /// a fatal startup condition for the daemon.
    pub fn bind(path: &Path) -> Result<Self, IpcError> {
        let _ = std::fs::remove_file(path);
        let listener = UnixListener::bind(path).map_err(|source| IpcError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Wait for the next client connection.
    ///
    /// # Errors
    ///
    /// Propagates accept failures; the caller logs and carries on.
    pub async fn accept(&self) -> std::io::Result<IpcConnection> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(IpcConnection {
            inner: BufReader::new(stream),
        })
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// One accepted client connection, good for a single request/reply.
pub struct IpcConnection {
    inner: BufReader<UnixStream>,
}

impl IpcConnection {
    /// Read the request line.
    ///
    /// Returns `Ok(None)` when the client hangs up or stays silent past the
    /// read timeout; those connections are closed without a reply.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Malformed`] for a line that is not a flat JSON
    /// string map, so the caller can answer with an error reply, and IO
    /// errors for a connection that breaks mid-read.
    pub async fn read_request(&mut self) -> Result<Option<Message>, IpcError> {
        let mut line = String::new();
        let Ok(read_result) = timeout(READ_TIMEOUT, self.inner.read_line(&mut line)).await else {
            return Ok(None);
        };
        if read_result? == 0 {
            return Ok(None);
        }
        decode(line.trim_end()).map(Some)
    }

    /// Write the reply line. A peer too slow to take a few KiB is dropped.
    ///
    /// # Errors
    ///
    /// Returns IO errors for a connection that breaks mid-write.
    pub async fn write_reply(&mut self, reply: &Message) -> Result<(), IpcError> {
        let payload = encode(reply);
        let stream = self.inner.get_mut();
        let Ok(write_result) = timeout(WRITE_TIMEOUT, async {
            stream.write_all(payload.as_bytes()).await?;
            stream.flush().await
        })
        .await
        else {
            return Ok(());
        };
        write_result?;
        Ok(())
    }
}
