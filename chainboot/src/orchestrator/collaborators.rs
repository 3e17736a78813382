//! The external services an orchestrator run depends on.

use std::sync::Arc;

use crate::config::{BootstrapConfig, ConfigError};
use crate::error::{BootstrapError, BootstrapResult};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::installer::{CommandPackageManager, PackageManager, ProcessRunner, SystemProcessRunner};
use crate::package::{open_package, ParentPackage};
use crate::presence::{PresenceCheck, RegistryFile};
use crate::progress::{ProgressSink, TracingProgress};
use crate::trust::{SignatureTrustGate, TrustGate};

/// Services used by the orchestrator.
///
/// Everything is shared behind `Arc` so a run can move to a worker thread
/// while the caller keeps handles (the progress sink in particular).
#[derive(Clone)]
pub struct Collaborators {
    pub progress: Arc<dyn ProgressSink>,
    pub fetcher: Arc<dyn Fetcher>,
    pub trust: Arc<dyn TrustGate>,
    pub presence: Arc<dyn PresenceCheck>,
    pub package_manager: Arc<dyn PackageManager>,
    pub runner: Arc<dyn ProcessRunner>,
    pub parent: Option<Arc<dyn ParentPackage>>,
}

impl Collaborators {
    /// Production collaborators for `config`.
    ///
    /// HTTP transport with the configured timeout, signature verification
    /// against the configured keys, the persisted key store for presence
    /// checks and the configured package manager command.
    pub fn system(config: &BootstrapConfig) -> BootstrapResult<Self> {
        let fetcher = HttpFetcher::with_timeout(config.timeout)
            .map_err(|e| BootstrapError::Internal(format!("HTTP client unavailable: {}", e)))?;

        let trust = SignatureTrustGate::from_base64_keys(&config.trusted_keys).map_err(|e| {
            ConfigError::InvalidValue {
                key: "trust.keys".to_string(),
                value: config.trusted_keys.join(", "),
                reason: e.to_string(),
            }
        })?;
        if trust.key_count() == 0 {
            tracing::warn!("No trusted publisher keys configured; every component will be rejected");
        }

        let presence = match &config.registry_file {
            Some(path) => RegistryFile::load(path)?,
            None => RegistryFile::new(),
        };

        let runner: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner);
        let package_manager =
            CommandPackageManager::new(&config.package_manager, &config.package_args)
                .with_runner(Arc::clone(&runner));

        let parent = config
            .parent_package
            .as_deref()
            .map(|path| Arc::from(open_package(path)));

        Ok(Self {
            progress: Arc::new(TracingProgress),
            fetcher: Arc::new(fetcher),
            trust: Arc::new(trust),
            presence: Arc::new(presence),
            package_manager: Arc::new(package_manager),
            runner,
            parent,
        })
    }

    /// Replace the progress sink.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the parent package.
    pub fn with_parent(mut self, parent: Option<Arc<dyn ParentPackage>>) -> Self {
        self.parent = parent;
        self
    }
}
