//! CLI command implementations.

pub mod config;
pub mod manifest;
pub mod run;
pub mod trust;

use std::path::Path;

use chainboot::config::ConfigFile;

use crate::error::CliError;

/// Load the configuration file at `path`, falling back to defaults if absent.
pub fn load_config(path: &Path) -> Result<ConfigFile, CliError> {
    Ok(ConfigFile::load_from(path)?)
}
