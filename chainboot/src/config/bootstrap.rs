//! Resolved runtime configuration for one bootstrap run.

use std::path::PathBuf;
use std::time::Duration;

use super::ConfigFile;
use crate::manifest::CapacityPolicy;

/// Configuration handed to the orchestrator.
///
/// Built from a [`ConfigFile`] with [`BootstrapConfig::from_file`] and then
/// adjusted with the `with_*` methods for command-line overrides.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Directory containing the bootstrap executable.
    pub bootstrap_dir: PathBuf,

    /// Parent package the prerequisites are installed for.
    pub parent_package: Option<PathBuf>,

    /// Mirror server paths (local directories or URLs), tried in order.
    pub servers: Vec<String>,

    /// Server tried after every mirror.
    pub canonical_server: Option<String>,

    /// Whether remote candidates may be fetched.
    pub allow_online: bool,

    /// Locale id for localized component variants.
    pub locale: Option<String>,

    /// Manifest document name.
    pub manifest_name: String,

    /// Maximum number of manifest entries.
    pub max_entries: usize,

    /// What happens when a manifest exceeds `max_entries`.
    pub capacity_policy: CapacityPolicy,

    /// Private directory for fetched and extracted candidates.
    pub staging_dir: PathBuf,

    /// Installation root scanned for the engine.
    pub install_root: PathBuf,

    /// File name of the engine executable.
    pub engine_name: String,

    /// Arguments used to activate the newest engine.
    pub activate_args: String,

    /// Default parameters for `.exe` components.
    pub default_exe_params: String,

    /// Default parameters for `.msi` components.
    pub default_package_params: String,

    /// Package manager program.
    pub package_manager: String,

    /// Package manager argument template.
    pub package_args: String,

    /// Component supervised through the chain channel.
    pub chain_component: Option<String>,

    /// Argument template for the chained component.
    pub chain_args: String,

    /// Key that disables presence-check skipping when present.
    pub force_reinstall_key: Option<String>,

    /// Persisted key store consulted by presence checks.
    pub registry_file: Option<PathBuf>,

    /// Base64 publisher keys accepted by the trust gate.
    pub trusted_keys: Vec<String>,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// Arguments forwarded to the launched engine.
    pub forwarded_args: Vec<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self::from_file(&ConfigFile::default())
    }
}

impl BootstrapConfig {
    /// Build a runtime configuration from the persisted file.
    pub fn from_file(file: &ConfigFile) -> Self {
        let b = &file.bootstrap;
        let i = &file.install;

        let capacity_policy = if b.strict_capacity {
            CapacityPolicy::Reject
        } else {
            CapacityPolicy::Truncate
        };

        let bootstrap_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            bootstrap_dir,
            parent_package: None,
            servers: b.servers.clone(),
            canonical_server: b.canonical_server.clone(),
            allow_online: b.allow_online,
            locale: b.locale.clone().or_else(locale_from_env),
            manifest_name: b.manifest_name.clone(),
            max_entries: b.max_entries,
            capacity_policy,
            staging_dir: b.staging_dir.clone().unwrap_or_else(default_staging_dir),
            install_root: i.root.clone(),
            engine_name: i.engine_name.clone(),
            activate_args: i.activate_args.clone(),
            default_exe_params: i.default_exe_params.clone(),
            default_package_params: i.default_package_params.clone(),
            package_manager: i.package_manager.clone(),
            package_args: i.package_args.clone(),
            chain_component: i.chain_component.clone(),
            chain_args: i.chain_args.clone(),
            force_reinstall_key: file.presence.force_reinstall_key.clone(),
            registry_file: file.presence.registry_file.clone(),
            trusted_keys: file.trust.keys.clone(),
            timeout: Duration::from_secs(file.download.timeout),
            forwarded_args: Vec::new(),
        }
    }

    /// Set the directory treated as the bootstrap executable's location.
    pub fn with_bootstrap_dir(mut self, dir: PathBuf) -> Self {
        self.bootstrap_dir = dir;
        self
    }

    /// Set the parent package.
    pub fn with_parent_package(mut self, path: PathBuf) -> Self {
        self.parent_package = Some(path);
        self
    }

    /// Add a mirror server, tried after those already configured.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.servers.push(server.into());
        self
    }

    /// Set or clear the canonical fallback server.
    pub fn with_canonical_server(mut self, server: Option<String>) -> Self {
        self.canonical_server = server;
        self
    }

    /// Enable or disable online candidates.
    pub fn with_allow_online(mut self, allow: bool) -> Self {
        self.allow_online = allow;
        self
    }

    /// Set the locale id.
    pub fn with_locale(mut self, locale: Option<String>) -> Self {
        self.locale = locale;
        self
    }

    /// Set the manifest capacity and overflow policy.
    pub fn with_capacity(mut self, max_entries: usize, policy: CapacityPolicy) -> Self {
        self.max_entries = max_entries;
        self.capacity_policy = policy;
        self
    }

    /// Set the staging directory.
    pub fn with_staging_dir(mut self, path: PathBuf) -> Self {
        self.staging_dir = path;
        self
    }

    /// Set the installation root.
    pub fn with_install_root(mut self, path: PathBuf) -> Self {
        self.install_root = path;
        self
    }

    /// Set the engine executable name.
    pub fn with_engine_name(mut self, name: impl Into<String>) -> Self {
        self.engine_name = name.into();
        self
    }

    /// Set the chained component.
    pub fn with_chain_component(mut self, filename: Option<String>) -> Self {
        self.chain_component = filename;
        self
    }

    /// Set the forced-reinstall key.
    pub fn with_force_reinstall_key(mut self, key: Option<String>) -> Self {
        self.force_reinstall_key = key;
        self
    }

    /// Add a trusted publisher key.
    pub fn with_trusted_key(mut self, key: impl Into<String>) -> Self {
        self.trusted_keys.push(key.into());
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the arguments forwarded to the engine.
    pub fn with_forwarded_args(mut self, args: Vec<String>) -> Self {
        self.forwarded_args = args;
        self
    }

    /// Directory containing the parent package, if one is configured.
    pub fn parent_dir(&self) -> Option<PathBuf> {
        self.parent_package
            .as_ref()
            .and_then(|p| p.parent())
            .map(PathBuf::from)
    }
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join(format!("chainboot-staging-{}", std::process::id()))
}

fn locale_from_env() -> Option<String> {
    std::env::var("LANG").ok().and_then(|lang| locale_from_lang(&lang))
}

/// Convert a POSIX locale (`en_US.UTF-8`) into a locale id (`en-US`).
///
/// Returns `None` for the `C` and `POSIX` locales.
pub fn locale_from_lang(lang: &str) -> Option<String> {
    let base = lang.split(['.', '@']).next().unwrap_or("").trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}
