//! Typed configuration model and the byte-size value grammar.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// STUN server handed to the session for NAT traversal when none is
/// configured.
pub const DEFAULT_STUN_SERVER: &str = "stun.l.google.com:19302";

const GIB: u64 = 1024 * 1024 * 1024;

/// Immutable per-run configuration for the daemon.
///
/// Loaded once at startup and again on a reload signal. Unknown keys in the
/// file are ignored so older daemons tolerate newer configs.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory scanned for `.torrent` metadata files.
    pub watch_directory: PathBuf,
    /// Directory payload files are written to.
    pub data_directory: PathBuf,
    /// Directory holding persistent statistics and session state.
    pub state_directory: PathBuf,
    /// Hard floor on free space to preserve, in bytes.
    pub min_free_bytes: u64,
    /// Floor on free space as a fraction of the filesystem size (0.05 = 5%).
    pub min_free_percentage: f64,
    /// Maximum bytes the daemon may occupy; 0 means unlimited.
    pub max_storage_bytes: u64,
    /// Whether to keep running while the host is on battery power.
    pub run_on_battery: bool,
    /// Whether a cellular uplink counts as an acceptable network.
    pub run_on_cellular: bool,
    /// Tick multiple at which budget enforcement runs.
    pub disk_check_interval_secs: u32,
    /// Session download cap in KiB/s; 0 means unlimited.
    pub max_download_kbps: u32,
    /// Session upload cap in KiB/s; 0 means unlimited.
    pub max_upload_kbps: u32,
    /// STUN server forwarded to the session when configuring NAT traversal.
    pub stun_server: String,
    /// Log filter applied when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        let home = PathBuf::from(home);
        Self {
            watch_directory: home.join(".config/levin/torrents"),
            data_directory: home.join(".cache/levin/data"),
            state_directory: home.join(".local/state/levin"),
            min_free_bytes: GIB,
            min_free_percentage: 0.05,
            max_storage_bytes: 50 * GIB,
            run_on_battery: false,
            run_on_cellular: false,
            disk_check_interval_secs: 60,
            max_download_kbps: 0,
            max_upload_kbps: 0,
            stun_server: DEFAULT_STUN_SERVER.to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Byte quantity accepted either as a bare integer or as a string with a
/// binary suffix (`"1gb"`, `"500mb"`, `"10tb"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSize(pub u64);

impl ByteSize {
    /// The raw byte count.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = ConfigError;

    fn from_str(raw: &str) -> ConfigResult<Self> {
        parse_byte_size(raw).map(ByteSize)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ByteSizeVisitor;

        impl<'de> Visitor<'de> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a byte count or a size string like \"50gb\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(ByteSize(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                u64::try_from(value)
                    .map(ByteSize)
                    .map_err(|_| E::custom("byte sizes cannot be negative"))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                parse_byte_size(value).map(ByteSize).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

/// Parse a human-readable byte size: `"1gb"`, `"500mb"`, `"1024"`, `"1.5g"`.
///
/// Suffixes are case-insensitive powers of 1024.
fn parse_byte_size(raw: &str) -> ConfigResult<u64> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(invalid("byte size is empty"));
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);
    if number.is_empty() {
        return Err(invalid(format!("'{s}' has no numeric part")));
    }
    let value: f64 = number
        .parse()
        .map_err(|_| invalid(format!("'{number}' is not a number")))?;

    let multiplier: u64 = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => GIB,
        "t" | "tb" => 1024 * GIB,
        "p" | "pb" => 1024 * 1024 * GIB,
        other => return Err(invalid(format!("unknown size suffix '{other}'"))),
    };

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    Ok((value * multiplier as f64) as u64)
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: "byte size",
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integers_and_suffixes() {
        assert_eq!(parse_byte_size("1024").unwrap(), 1024);
        assert_eq!(parse_byte_size("1kb").unwrap(), 1024);
        assert_eq!(parse_byte_size("500mb").unwrap(), 500 * 1024 * 1024);
        assert_eq!(parse_byte_size("1gb").unwrap(), GIB);
        assert_eq!(parse_byte_size("10TB").unwrap(), 10 * 1024 * GIB);
        assert_eq!(parse_byte_size(" 2 g ").unwrap(), 2 * GIB);
    }

    #[test]
    fn parses_fractional_sizes() {
        assert_eq!(parse_byte_size("1.5kb").unwrap(), 1536);
        assert_eq!(parse_byte_size("0.5gb").unwrap(), GIB / 2);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("gb").is_err());
        assert!(parse_byte_size("12xb").is_err());
        assert!(parse_byte_size("..").is_err());
    }

    #[test]
    fn defaults_match_the_documented_policy() {
        let config = Config::default();
        assert_eq!(config.min_free_bytes, GIB);
        assert!((config.min_free_percentage - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.max_storage_bytes, 50 * GIB);
        assert_eq!(config.disk_check_interval_secs, 60);
        assert!(!config.run_on_battery);
        assert!(!config.run_on_cellular);
        assert_eq!(config.stun_server, DEFAULT_STUN_SERVER);
    }
}
