//! Typed access to individual configuration settings.
//!
//! Keys are addressed as `section.key` (e.g. `bootstrap.servers`) both in the
//! ini file and on the command line.

use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ConfigFile};

/// A single configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BootstrapServers,
    BootstrapCanonicalServer,
    BootstrapAllowOnline,
    BootstrapLocale,
    BootstrapManifestName,
    BootstrapMaxEntries,
    BootstrapStrictCapacity,
    BootstrapStagingDir,
    InstallRoot,
    InstallEngineName,
    InstallActivateArgs,
    InstallPackageManager,
    InstallPackageArgs,
    InstallDefaultPackageParams,
    InstallDefaultExeParams,
    InstallChainComponent,
    InstallChainArgs,
    PresenceRegistryFile,
    PresenceForceReinstallKey,
    TrustKeys,
    DownloadTimeout,
    LoggingDirectory,
    LoggingLevel,
}

const ALL_KEYS: &[ConfigKey] = &[
    ConfigKey::BootstrapServers,
    ConfigKey::BootstrapCanonicalServer,
    ConfigKey::BootstrapAllowOnline,
    ConfigKey::BootstrapLocale,
    ConfigKey::BootstrapManifestName,
    ConfigKey::BootstrapMaxEntries,
    ConfigKey::BootstrapStrictCapacity,
    ConfigKey::BootstrapStagingDir,
    ConfigKey::InstallRoot,
    ConfigKey::InstallEngineName,
    ConfigKey::InstallActivateArgs,
    ConfigKey::InstallPackageManager,
    ConfigKey::InstallPackageArgs,
    ConfigKey::InstallDefaultPackageParams,
    ConfigKey::InstallDefaultExeParams,
    ConfigKey::InstallChainComponent,
    ConfigKey::InstallChainArgs,
    ConfigKey::PresenceRegistryFile,
    ConfigKey::PresenceForceReinstallKey,
    ConfigKey::TrustKeys,
    ConfigKey::DownloadTimeout,
    ConfigKey::LoggingDirectory,
    ConfigKey::LoggingLevel,
];

impl ConfigKey {
    /// All known keys, in file order.
    pub fn all() -> &'static [ConfigKey] {
        ALL_KEYS
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BootstrapServers => "bootstrap.servers",
            Self::BootstrapCanonicalServer => "bootstrap.canonical_server",
            Self::BootstrapAllowOnline => "bootstrap.allow_online",
            Self::BootstrapLocale => "bootstrap.locale",
            Self::BootstrapManifestName => "bootstrap.manifest_name",
            Self::BootstrapMaxEntries => "bootstrap.max_entries",
            Self::BootstrapStrictCapacity => "bootstrap.strict_capacity",
            Self::BootstrapStagingDir => "bootstrap.staging_dir",
            Self::InstallRoot => "install.root",
            Self::InstallEngineName => "install.engine_name",
            Self::InstallActivateArgs => "install.activate_args",
            Self::InstallPackageManager => "install.package_manager",
            Self::InstallPackageArgs => "install.package_args",
            Self::InstallDefaultPackageParams => "install.default_package_params",
            Self::InstallDefaultExeParams => "install.default_exe_params",
            Self::InstallChainComponent => "install.chain_component",
            Self::InstallChainArgs => "install.chain_args",
            Self::PresenceRegistryFile => "presence.registry_file",
            Self::PresenceForceReinstallKey => "presence.force_reinstall_key",
            Self::TrustKeys => "trust.keys",
            Self::DownloadTimeout => "download.timeout",
            Self::LoggingDirectory => "logging.directory",
            Self::LoggingLevel => "logging.level",
        }
    }

    /// Section part of the name.
    pub fn section(&self) -> &'static str {
        self.name().split_once('.').map(|(s, _)| s).unwrap_or("")
    }

    /// Key part of the name.
    pub fn key(&self) -> &'static str {
        self.name().split_once('.').map(|(_, k)| k).unwrap_or("")
    }

    /// Get the current value as a string (empty when unset).
    pub fn get(&self, config: &ConfigFile) -> String {
        let b = &config.bootstrap;
        let i = &config.install;
        match self {
            Self::BootstrapServers => b.servers.join(", "),
            Self::BootstrapCanonicalServer => b.canonical_server.clone().unwrap_or_default(),
            Self::BootstrapAllowOnline => b.allow_online.to_string(),
            Self::BootstrapLocale => b.locale.clone().unwrap_or_default(),
            Self::BootstrapManifestName => b.manifest_name.clone(),
            Self::BootstrapMaxEntries => b.max_entries.to_string(),
            Self::BootstrapStrictCapacity => b.strict_capacity.to_string(),
            Self::BootstrapStagingDir => path_string(&b.staging_dir),
            Self::InstallRoot => i.root.to_string_lossy().to_string(),
            Self::InstallEngineName => i.engine_name.clone(),
            Self::InstallActivateArgs => i.activate_args.clone(),
            Self::InstallPackageManager => i.package_manager.clone(),
            Self::InstallPackageArgs => i.package_args.clone(),
            Self::InstallDefaultPackageParams => i.default_package_params.clone(),
            Self::InstallDefaultExeParams => i.default_exe_params.clone(),
            Self::InstallChainComponent => i.chain_component.clone().unwrap_or_default(),
            Self::InstallChainArgs => i.chain_args.clone(),
            Self::PresenceRegistryFile => path_string(&config.presence.registry_file),
            Self::PresenceForceReinstallKey => config
                .presence
                .force_reinstall_key
                .clone()
                .unwrap_or_default(),
            Self::TrustKeys => config.trust.keys.join(", "),
            Self::DownloadTimeout => config.download.timeout.to_string(),
            Self::LoggingDirectory => path_string(&config.logging.directory),
            Self::LoggingLevel => config.logging.level.clone(),
        }
    }

    /// Set the value from a string.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let b = &mut config.bootstrap;
        match self {
            Self::BootstrapServers => b.servers = parse_list(value),
            Self::BootstrapCanonicalServer => b.canonical_server = optional(value),
            Self::BootstrapAllowOnline => b.allow_online = self.parse_bool(value)?,
            Self::BootstrapLocale => b.locale = optional(value),
            Self::BootstrapManifestName => b.manifest_name = self.required(value)?,
            Self::BootstrapMaxEntries => b.max_entries = self.parse_number(value)?,
            Self::BootstrapStrictCapacity => b.strict_capacity = self.parse_bool(value)?,
            Self::BootstrapStagingDir => b.staging_dir = optional(value).map(PathBuf::from),
            Self::InstallRoot => config.install.root = PathBuf::from(self.required(value)?),
            Self::InstallEngineName => config.install.engine_name = self.required(value)?,
            Self::InstallActivateArgs => config.install.activate_args = value.to_string(),
            Self::InstallPackageManager => {
                config.install.package_manager = self.required(value)?
            }
            Self::InstallPackageArgs => config.install.package_args = value.to_string(),
            Self::InstallDefaultPackageParams => {
                config.install.default_package_params = value.to_string()
            }
            Self::InstallDefaultExeParams => config.install.default_exe_params = value.to_string(),
            Self::InstallChainComponent => config.install.chain_component = optional(value),
            Self::InstallChainArgs => config.install.chain_args = value.to_string(),
            Self::PresenceRegistryFile => {
                config.presence.registry_file = optional(value).map(PathBuf::from)
            }
            Self::PresenceForceReinstallKey => config.presence.force_reinstall_key = optional(value),
            Self::TrustKeys => config.trust.keys = parse_list(value),
            Self::DownloadTimeout => config.download.timeout = self.parse_number(value)?,
            Self::LoggingDirectory => {
                config.logging.directory = optional(value).map(PathBuf::from)
            }
            Self::LoggingLevel => config.logging.level = self.required(value)?,
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn required(&self, value: &str) -> Result<String, ConfigError> {
        if value.is_empty() {
            return Err(self.invalid(value, "value must not be empty"));
        }
        Ok(value.to_string())
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }

    fn parse_number<T: FromStr>(&self, value: &str) -> Result<T, ConfigError> {
        value
            .parse()
            .map_err(|_| self.invalid(value, "expected a non-negative integer"))
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn path_string(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_round_trips_its_name() {
        for key in ConfigKey::all() {
            let parsed: ConfigKey = key.name().parse().unwrap();
            assert_eq!(parsed, *key);
            assert!(!key.section().is_empty());
            assert!(!key.key().is_empty());
        }
    }

    #[test]
    fn test_unknown_key() {
        let result = "bootstrap.nonsense".parse::<ConfigKey>();
        assert!(matches!(result, Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn test_set_and_get_list() {
        let mut config = ConfigFile::default();
        ConfigKey::BootstrapServers
            .set(&mut config, "http://a.test/ , ,http://b.test/")
            .unwrap();
        assert_eq!(config.bootstrap.servers.len(), 2);
        assert_eq!(
            ConfigKey::BootstrapServers.get(&config),
            "http://a.test/, http://b.test/"
        );
    }

    #[test]
    fn test_empty_optional_clears_value() {
        let mut config = ConfigFile::default();
        assert!(config.bootstrap.canonical_server.is_some());
        ConfigKey::BootstrapCanonicalServer
            .set(&mut config, "")
            .unwrap();
        assert!(config.bootstrap.canonical_server.is_none());
    }

    #[test]
    fn test_required_value_rejects_empty() {
        let mut config = ConfigFile::default();
        let result = ConfigKey::InstallEngineName.set(&mut config, "  ");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_bool_parsing() {
        let mut config = ConfigFile::default();
        ConfigKey::BootstrapAllowOnline
            .set(&mut config, "off")
            .unwrap();
        assert!(!config.bootstrap.allow_online);
        assert!(ConfigKey::BootstrapAllowOnline
            .set(&mut config, "maybe")
            .is_err());
    }
}
