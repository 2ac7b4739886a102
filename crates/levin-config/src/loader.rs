//! TOML loading, path expansion, and default-path resolution.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{ByteSize, Config};

/// Raw file shape. Every key is optional; unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    watch_directory: Option<String>,
    data_directory: Option<String>,
    state_directory: Option<String>,
    min_free_bytes: Option<ByteSize>,
    min_free_percentage: Option<f64>,
    max_storage_bytes: Option<ByteSize>,
    run_on_battery: Option<bool>,
    run_on_cellular: Option<bool>,
    disk_check_interval_secs: Option<u32>,
    max_download_kbps: Option<u32>,
    max_upload_kbps: Option<u32>,
    stun_server: Option<String>,
    log_level: Option<String>,
}

/// Resolve the default config file path from the XDG environment.
#[must_use]
pub fn default_config_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("levin/levin.toml");
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config/levin/levin.toml");
    }
    PathBuf::from("/etc/levin/levin.toml")
}

/// Load the configuration from the default location.
///
/// A missing file yields the built-in defaults; a malformed file is an error.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed,
/// or if a field value is outside its accepted grammar.
pub fn load() -> ConfigResult<Config> {
    load_from_path(&default_config_path())
}

/// Load the configuration from an explicit path.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed,
/// or if a field value is outside its accepted grammar.
pub fn load_from_path(path: &Path) -> ConfigResult<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(Config::default());
    }

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = Config::default();
    if let Some(dir) = raw.watch_directory {
        config.watch_directory = PathBuf::from(expand_path(&dir));
    }
    if let Some(dir) = raw.data_directory {
        config.data_directory = PathBuf::from(expand_path(&dir));
    }
    if let Some(dir) = raw.state_directory {
        config.state_directory = PathBuf::from(expand_path(&dir));
    }
    if let Some(size) = raw.min_free_bytes {
        config.min_free_bytes = size.bytes();
    }
    if let Some(pct) = raw.min_free_percentage {
        if !(0.0..=1.0).contains(&pct) {
            return Err(ConfigError::InvalidValue {
                field: "min_free_percentage",
                reason: format!("{pct} is not within 0.0..=1.0"),
            });
        }
        config.min_free_percentage = pct;
    }
    if let Some(size) = raw.max_storage_bytes {
        config.max_storage_bytes = size.bytes();
    }
    if let Some(flag) = raw.run_on_battery {
        config.run_on_battery = flag;
    }
    if let Some(flag) = raw.run_on_cellular {
        config.run_on_cellular = flag;
    }
    if let Some(interval) = raw.disk_check_interval_secs {
        config.disk_check_interval_secs = interval.max(1);
    }
    if let Some(kbps) = raw.max_download_kbps {
        config.max_download_kbps = kbps;
    }
    if let Some(kbps) = raw.max_upload_kbps {
        config.max_upload_kbps = kbps;
    }
    if let Some(server) = raw.stun_server {
        config.stun_server = server;
    }
    if let Some(level) = raw.log_level {
        config.log_level = level.to_ascii_lowercase();
    }

    Ok(config)
}

/// Expand a leading `~` and any `$VAR` / `${VAR}` references in a path.
///
/// Unset variables expand to the empty string, matching shell behaviour.
fn expand_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();

    while let Some((index, ch)) = chars.next() {
        match ch {
            '~' if index == 0
                && raw[1..]
                    .chars()
                    .next()
                    .is_none_or(|next| next == '/') =>
            {
                match std::env::var("HOME") {
                    Ok(home) => out.push_str(&home),
                    Err(_) => out.push('~'),
                }
            }
            '$' => {
                let braced = chars.peek().is_some_and(|&(_, c)| c == '{');
                if braced {
                    chars.next();
                }
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if braced && c == '}' {
                        chars.next();
                        break;
                    }
                    if !braced && !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if let Ok(value) = std::env::var(&name) {
                    out.push_str(&value);
                }
            }
            other => out.push(other),
        }
    }
    out
}
