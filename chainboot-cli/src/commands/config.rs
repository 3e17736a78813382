//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path` for
//! viewing and modifying settings from the command line.

use std::path::Path;

use chainboot::config::{ConfigFile, ConfigKey};
use clap::Subcommand;

use super::load_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., bootstrap.servers)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., bootstrap.servers)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against the file at `path`.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            let config = load_config(path)?;
            println!("{}", display_value(&get_value(&config, &key)?));
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let mut config = load_config(path)?;
            let config_key = set_value(&mut config, &key, &value)?;
            config.save_to(path)?;
            println!("Set {} = {}", config_key.name(), value);
            Ok(())
        }
        ConfigCommands::List => {
            let config = load_config(path)?;
            print!("{}", render_list(&config));
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'chainboot config list' to see available keys.",
            key
        ))
    })
}

fn get_value(config: &ConfigFile, key: &str) -> Result<String, CliError> {
    Ok(parse_key(key)?.get(config))
}

fn set_value(config: &mut ConfigFile, key: &str, value: &str) -> Result<ConfigKey, CliError> {
    let config_key = parse_key(key)?;
    config_key
        .set(config, value)
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(config_key)
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

/// All settings grouped by section.
fn render_list(config: &ConfigFile) -> String {
    let mut out = String::from("Configuration Settings\n======================\n\n");
    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            if !current_section.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section));
            current_section = section;
        }
        out.push_str(&format!(
            "  {} = {}\n",
            key.key(),
            display_value(&key.get(config))
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_key_is_config_error() {
        let config = ConfigFile::default();
        let err = get_value(&config, "bootstrap.nope").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("chainboot config list"));
    }

    #[test]
    fn test_set_then_get() {
        let mut config = ConfigFile::default();
        set_value(&mut config, "download.timeout", "90").unwrap();
        assert_eq!(get_value(&config, "download.timeout").unwrap(), "90");
    }

    #[test]
    fn test_set_rejects_invalid_value() {
        let mut config = ConfigFile::default();
        let err = set_value(&mut config, "bootstrap.allow_online", "maybe").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_set_persists_to_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        run(
            ConfigCommands::Set {
                key: "install.engine_name".to_string(),
                value: "engine-bin".to_string(),
            },
            &path,
        )
        .unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded.install.engine_name, "engine-bin");
    }

    #[test]
    fn test_render_list_groups_sections() {
        let listing = render_list(&ConfigFile::default());
        assert!(listing.contains("[bootstrap]\n"));
        assert!(listing.contains("[logging]\n"));
        assert!(listing.contains("  locale = (not set)\n"));
    }
}
