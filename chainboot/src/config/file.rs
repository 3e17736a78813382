//! Persisted `config.ini` handling.

use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;

use super::ConfigError;

/// Default canonical server consulted after every configured mirror.
pub const DEFAULT_CANONICAL_SERVER: &str = "https://downloads.chainboot.dev/bootstrap/";

/// Default manifest document name looked up on every server path.
pub const DEFAULT_MANIFEST_NAME: &str = "bootstrapmanifest.txt";

/// Default capacity bound for manifest entries.
pub const DEFAULT_MAX_ENTRIES: usize = 128;

/// Get the path of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chainboot")
        .join("config.ini")
}

fn default_install_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chainboot")
}

/// `[bootstrap]` section: where manifests and components come from.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSection {
    /// Mirror server paths (local directories or URLs), tried in order.
    pub servers: Vec<String>,
    /// Last-resort server tried after every mirror.
    pub canonical_server: Option<String>,
    /// Whether remote servers may be contacted at all.
    pub allow_online: bool,
    /// Locale id used for localized component variants (e.g. `en-US`).
    pub locale: Option<String>,
    /// Manifest document name.
    pub manifest_name: String,
    /// Maximum number of manifest entries.
    pub max_entries: usize,
    /// Reject oversized manifests instead of truncating them.
    pub strict_capacity: bool,
    /// Directory for fetched and extracted candidates.
    pub staging_dir: Option<PathBuf>,
}

impl Default for BootstrapSection {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            canonical_server: Some(DEFAULT_CANONICAL_SERVER.to_string()),
            allow_online: true,
            locale: None,
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
            strict_capacity: false,
            staging_dir: None,
        }
    }
}

/// `[install]` section: how components are installed and the engine launched.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallSection {
    /// Installation root scanned for the engine after installing.
    pub root: PathBuf,
    /// File name of the engine executable.
    pub engine_name: String,
    /// Arguments passed to the engine to make it the active version.
    pub activate_args: String,
    /// Package manager program used for `.msi` components.
    pub package_manager: String,
    /// Package manager argument template (`{package}`, `{params}`).
    pub package_args: String,
    /// Parameters used for `.msi` components without manifest parameters.
    pub default_package_params: String,
    /// Parameters used for `.exe` components without manifest parameters.
    pub default_exe_params: String,
    /// File name of the component installed through the chain channel.
    pub chain_component: Option<String>,
    /// Extra arguments handed to the chained installer (`{channel}`).
    pub chain_args: String,
}

impl Default for InstallSection {
    fn default() -> Self {
        Self {
            root: default_install_root(),
            engine_name: "chainboot-engine".to_string(),
            activate_args: "--activate".to_string(),
            package_manager: "msiexec".to_string(),
            package_args: "/i {package} {params}".to_string(),
            default_package_params: "TARGETDIR={install_root} /quiet /norestart".to_string(),
            default_exe_params: "/quiet /norestart".to_string(),
            chain_component: None,
            chain_args: "--chain-channel {channel}".to_string(),
        }
    }
}

/// `[presence]` section: persisted key store used for presence checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceSection {
    /// Location of the key store file.
    pub registry_file: Option<PathBuf>,
    /// Key whose presence forces every component to be reinstalled.
    pub force_reinstall_key: Option<String>,
}

/// `[trust]` section: publisher keys accepted by the trust gate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrustSection {
    /// Base64-encoded ed25519 public keys.
    pub keys: Vec<String>,
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSection {
    /// Per-request timeout in seconds.
    pub timeout: u64,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self { timeout: 30 }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSection {
    /// Directory for the log file; stderr only when unset.
    pub directory: Option<PathBuf>,
    /// Default log filter when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            directory: None,
            level: "info".to_string(),
        }
    }
}

/// The persisted configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub bootstrap: BootstrapSection,
    pub install: InstallSection,
    pub presence: PresenceSection,
    pub trust: TrustSection,
    pub download: DownloadSection,
    pub logging: LoggingSection,
}

impl ConfigFile {
    /// Load the configuration from the default location.
    ///
    /// Returns defaults if the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load the configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_ini(&ini)
    }

    /// Parse configuration from ini text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;

        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (section, properties) in ini.iter() {
            let Some(section) = section else {
                continue;
            };
            for (key, value) in properties.iter() {
                let name = format!("{}.{}", section, key);
                match name.parse::<super::ConfigKey>() {
                    Ok(config_key) => config_key.set(&mut config, value)?,
                    Err(_) => tracing::warn!(key = %name, "Ignoring unknown configuration key"),
                }
            }
        }

        Ok(config)
    }

    /// Save the configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save the configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut ini = Ini::new();
        for key in super::ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key(), key.get(self));
        }

        ini.write_to_file(path).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
        assert!(config.bootstrap.allow_online);
        assert_eq!(config.bootstrap.manifest_name, "bootstrapmanifest.txt");
    }

    #[test]
    fn test_parse_sections() {
        let config = ConfigFile::parse(
            "[bootstrap]\n\
             servers = http://a.test/, /srv/mirror\n\
             allow_online = no\n\
             max_entries = 8\n\
             [install]\n\
             engine_name = engine-bin\n\
             chain_component = runtime.exe\n\
             [trust]\n\
             keys = AAAA, BBBB\n",
        )
        .unwrap();

        assert_eq!(
            config.bootstrap.servers,
            vec!["http://a.test/".to_string(), "/srv/mirror".to_string()]
        );
        assert!(!config.bootstrap.allow_online);
        assert_eq!(config.bootstrap.max_entries, 8);
        assert_eq!(config.install.engine_name, "engine-bin");
        assert_eq!(
            config.install.chain_component.as_deref(),
            Some("runtime.exe")
        );
        assert_eq!(config.trust.keys.len(), 2);
    }

    #[test]
    fn test_parse_rejects_bad_number() {
        let result = ConfigFile::parse("[download]\ntimeout = soon\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.bootstrap.servers = vec!["http://mirror.test/".to_string()];
        config.download.timeout = 90;
        config.presence.force_reinstall_key = Some("HKLM\\Software\\Force".to_string());
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
