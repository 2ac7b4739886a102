//! OS-facing providers consumed by the daemon shell.
//!
//! Everything here is best-effort: a failed probe degrades to a safe default
//! rather than an error, matching the policy that transient platform hiccups
//! never abort the run.

mod power;
mod storage;

pub use power::is_on_ac_power;
pub use storage::{disk_usage, storage_info, DiskUsage, StorageInfo};
