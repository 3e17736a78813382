//! Configuration for the bootstrapper.
//!
//! Two layers are involved:
//!
//! - [`ConfigFile`] - the persisted `config.ini` (via `rust-ini`), edited by
//!   users and by the `chainboot config` command.
//! - [`BootstrapConfig`] - the resolved runtime configuration handed to the
//!   orchestrator, built from the file plus command-line overrides.
//!
//! # File Location
//!
//! `~/.config/chainboot/config.ini` on Linux (see [`config_file_path`]).
//! A missing file is not an error; every setting has a default.

mod bootstrap;
mod file;
mod keys;

pub use bootstrap::{locale_from_lang, BootstrapConfig};
pub use file::{
    config_file_path, BootstrapSection, ConfigFile, DownloadSection, InstallSection,
    LoggingSection, PresenceSection, TrustSection,
};
pub use keys::ConfigKey;

use std::io;
use std::path::PathBuf;

/// Errors raised while reading, writing or editing configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file exists but could not be parsed.
    Parse { path: PathBuf, reason: String },

    /// The configuration file could not be written.
    Write { path: PathBuf, source: io::Error },

    /// A key name did not match any known setting.
    UnknownKey(String),

    /// A value could not be converted to the setting's type.
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { path, reason } => {
                write!(f, "failed to parse {}: {}", path.display(), reason)
            }
            Self::Write { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::UnknownKey(key) => write!(f, "unknown configuration key '{}'", key),
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value '{}' for {}: {}", value, key, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}
