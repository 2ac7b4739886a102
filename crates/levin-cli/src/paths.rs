//! Runtime paths for the control socket and PID file.

use std::path::PathBuf;

/// Per-user runtime directory: `$XDG_RUNTIME_DIR/levin`, or a uid-scoped
/// fallback under `/tmp` when the environment does not provide one.
#[must_use]
pub fn runtime_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("levin");
        }
    }
    // SAFETY: getuid has no failure modes or side effects.
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/levin-{uid}"))
}

/// Control socket path.
#[must_use]
pub fn socket_path() -> PathBuf {
    runtime_dir().join("levin.sock")
}

/// PID file path.
#[must_use]
pub fn pid_path() -> PathBuf {
    runtime_dir().join("levin.pid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_and_pid_live_in_the_runtime_dir() {
        let dir = runtime_dir();
        assert_eq!(socket_path(), dir.join("levin.sock"));
        assert_eq!(pid_path(), dir.join("levin.pid"));
    }
}
