#![forbid(unsafe_code)]

//! Configuration for the levin daemon.
//!
//! Pure data carriers stay apart from IO: `model.rs` holds the typed
//! [`Config`] and the byte-size grammar, `loader.rs` reads and expands the
//! TOML file, and `error.rs` carries the typed failure cases.

mod error;
mod loader;
mod model;

pub use error::{ConfigError, ConfigResult};
pub use loader::{default_config_path, load, load_from_path};
pub use model::{ByteSize, Config, DEFAULT_STUN_SERVER};
