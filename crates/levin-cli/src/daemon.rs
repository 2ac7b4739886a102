//! Daemonisation and PID-file management.

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Detach from the terminal with the classic double fork, redirect stdio to
/// `/dev/null`, and continue as the grandchild. Parents exit immediately.
///
/// Must run before any async runtime is created.
///
/// # Errors
///
/// Returns an error when a fork or setsid fails.
pub fn daemonize() -> Result<()> {
    fork_and_exit_parent().context("first fork failed")?;

    // SAFETY: plain syscall; the child is single-threaded at this point.
    if unsafe { libc::setsid() } < 0 {
        bail!("setsid failed: {}", io::Error::last_os_error());
    }

    fork_and_exit_parent().context("second fork failed")?;

    // SAFETY: umask and chdir are simple syscalls.
    unsafe {
        libc::umask(0o027);
        let root = c"/";
        libc::chdir(root.as_ptr());
    }

    redirect_stdio_to_devnull();
    Ok(())
}

fn fork_and_exit_parent() -> Result<()> {
    // SAFETY: fork in a single-threaded process, before the runtime exists.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        bail!("fork failed: {}", io::Error::last_os_error());
    }
    if pid > 0 {
        // SAFETY: the parent exits without running destructors, as a
        // daemonising parent must.
        unsafe { libc::_exit(0) };
    }
    Ok(())
}

fn redirect_stdio_to_devnull() {
    // SAFETY: open/dup2/close on file descriptors we own.
    unsafe {
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_RDWR);
        if devnull >= 0 {
            libc::dup2(devnull, libc::STDIN_FILENO);
            libc::dup2(devnull, libc::STDOUT_FILENO);
            libc::dup2(devnull, libc::STDERR_FILENO);
            if devnull > libc::STDERR_FILENO {
                libc::close(devnull);
            }
        }
    }
}

/// Write this process's PID, newline-terminated.
///
/// # Errors
///
/// Propagates the underlying IO error.
pub fn write_pid_file(path: &Path) -> Result<()> {
    std::fs::write(path, format!("{}\n", std::process::id()))
        .with_context(|| format!("failed to write PID file {}", path.display()))
}

/// Read a PID file. `None` when absent or unparseable.
#[must_use]
pub fn read_pid_file(path: &Path) -> Option<i32> {
    let contents = std::fs::read_to_string(path).ok()?;
    contents.trim().parse().ok()
}

/// Remove the PID file, tolerating its absence.
pub fn remove_pid_file(path: &Path) {
    let _ = std::fs::remove_file(path);
}

/// Whether a process with this PID exists.
#[must_use]
pub fn is_process_running(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 probes for existence without delivering anything.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Ask a process to shut down with SIGTERM.
#[must_use]
pub fn terminate(pid: i32) -> bool {
    // SAFETY: sending SIGTERM to a PID we read from our own PID file.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}
