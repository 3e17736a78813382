//! Error types for the bootstrap run.
//!
//! Every fatal condition maps to a distinct process exit code so that the
//! parent package (or a support engineer reading a log) can tell the failure
//! kinds apart without parsing messages.

use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;

/// Process exit codes for each fatal condition.
pub mod exit_code {
    /// Successful handoff to the launched engine, or a user cancel.
    pub const SUCCESS: i32 = 0;
    /// A required component could not be found at any source.
    pub const DOWNLOAD_FAILED: i32 = 1;
    /// A required component was found but failed signature verification.
    pub const SIGNATURE_INVALID: i32 = 2;
    /// No bootstrap manifest could be located or parsed.
    pub const MANIFEST_FAILURE: i32 = 3;
    /// A precondition inside the bootstrapper was violated.
    pub const INTERNAL_ERROR: i32 = 4;
    /// The private staging directory could not be created.
    pub const STAGING_UNAVAILABLE: i32 = 9;
    /// A manifest entry has an extension that cannot be installed.
    pub const UNKNOWN_COMPONENT_TYPE: i32 = 10;
    /// Installation finished but the engine still cannot be located.
    pub const ENGINE_NOT_FUNCTIONING: i32 = 12;
    /// A component installer reported failure.
    pub const INSTALL_FAILED: i32 = 13;
    /// The configuration file is invalid.
    pub const CONFIG_ERROR: i32 = 14;
}

/// Result type for bootstrap operations.
pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Errors that terminate a bootstrap run.
#[derive(Debug)]
pub enum BootstrapError {
    /// No manifest was found at any candidate location.
    ManifestNotFound { searched: Vec<String> },

    /// The manifest holds more entries than the configured capacity.
    ManifestTooLarge { source: String, capacity: usize },

    /// A manifest entry names a path instead of a plain file name.
    UnsafeFilename { source: String, filename: String },

    /// No candidate source produced the component.
    DownloadFailed { filename: String, location: String },

    /// Candidates existed but none passed signature verification.
    SignatureInvalid {
        filename: String,
        location: String,
        rejected: usize,
    },

    /// The component's file extension has no installer.
    UnknownComponentType { filename: String },

    /// The component installer returned a failure status.
    InstallFailed { filename: String, status: i32 },

    /// The chained installer crashed or reported failure.
    ChainFailed { filename: String, result: i32 },

    /// The engine is still missing after a successful install pass.
    EngineNotFunctioning { engine: String, root: PathBuf },

    /// The staging directory could not be prepared.
    StagingUnavailable { path: PathBuf, source: io::Error },

    /// Failed to launch a component installer.
    LaunchFailed { program: PathBuf, source: io::Error },

    /// The engine was found after installation but could not be started.
    EngineLaunchFailed { program: PathBuf, source: io::Error },

    /// Invalid configuration.
    Config(ConfigError),

    /// A bootstrapper invariant was violated.
    Internal(String),
}

impl BootstrapError {
    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ManifestNotFound { .. }
            | Self::ManifestTooLarge { .. }
            | Self::UnsafeFilename { .. } => exit_code::MANIFEST_FAILURE,
            Self::DownloadFailed { .. } => exit_code::DOWNLOAD_FAILED,
            Self::SignatureInvalid { .. } => exit_code::SIGNATURE_INVALID,
            Self::UnknownComponentType { .. } => exit_code::UNKNOWN_COMPONENT_TYPE,
            Self::InstallFailed { .. } | Self::ChainFailed { .. } | Self::LaunchFailed { .. } => {
                exit_code::INSTALL_FAILED
            }
            Self::EngineNotFunctioning { .. } | Self::EngineLaunchFailed { .. } => {
                exit_code::ENGINE_NOT_FUNCTIONING
            }
            Self::StagingUnavailable { .. } => exit_code::STAGING_UNAVAILABLE,
            Self::Config(_) => exit_code::CONFIG_ERROR,
            Self::Internal(_) => exit_code::INTERNAL_ERROR,
        }
    }
}

impl std::fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ManifestNotFound { searched } => {
                write!(
                    f,
                    "no bootstrap manifest found (searched: {})",
                    searched.join(", ")
                )
            }
            Self::ManifestTooLarge { source, capacity } => {
                write!(
                    f,
                    "manifest from {} lists more than {} components",
                    source, capacity
                )
            }
            Self::UnsafeFilename { source, filename } => {
                write!(
                    f,
                    "manifest from {} names '{}', which is not a plain file name",
                    source, filename
                )
            }
            Self::DownloadFailed { filename, location } => {
                write!(
                    f,
                    "unable to download required package {} (location: {})",
                    filename, location
                )
            }
            Self::SignatureInvalid {
                filename,
                location,
                rejected,
            } => {
                write!(
                    f,
                    "package {} failed signature validation ({} candidate(s) rejected, location: {})",
                    filename, rejected, location
                )
            }
            Self::UnknownComponentType { filename } => {
                write!(f, "unknown component type for {}", filename)
            }
            Self::InstallFailed { filename, status } => {
                write!(f, "installation of {} failed with status {}", filename, status)
            }
            Self::ChainFailed { filename, result } => {
                write!(
                    f,
                    "chained installer {} failed with result {:#010x}",
                    filename, result
                )
            }
            Self::EngineNotFunctioning { engine, root } => {
                write!(
                    f,
                    "{} was installed but cannot be found under {}",
                    engine,
                    root.display()
                )
            }
            Self::StagingUnavailable { path, source } => {
                write!(
                    f,
                    "unable to prepare staging directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::LaunchFailed { program, source } => {
                write!(f, "failed to launch {}: {}", program.display(), source)
            }
            Self::EngineLaunchFailed { program, source } => {
                write!(f, "engine {} could not be started: {}", program.display(), source)
            }
            Self::Config(e) => write!(f, "invalid configuration: {}", e),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StagingUnavailable { source, .. } => Some(source),
            Self::LaunchFailed { source, .. } | Self::EngineLaunchFailed { source, .. } => {
                Some(source)
            }
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for BootstrapError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            BootstrapError::DownloadFailed {
                filename: "a.msi".to_string(),
                location: "http://a.test/".to_string(),
            },
            BootstrapError::SignatureInvalid {
                filename: "a.msi".to_string(),
                location: "http://a.test/".to_string(),
                rejected: 1,
            },
            BootstrapError::ManifestNotFound { searched: vec![] },
            BootstrapError::Internal("bad".to_string()),
            BootstrapError::UnknownComponentType {
                filename: "a.zip".to_string(),
            },
            BootstrapError::EngineNotFunctioning {
                engine: "engine".to_string(),
                root: PathBuf::from("/opt"),
            },
            BootstrapError::InstallFailed {
                filename: "a.msi".to_string(),
                status: 1603,
            },
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&exit_code::SUCCESS));
    }

    #[test]
    fn test_download_failed_display() {
        let err = BootstrapError::DownloadFailed {
            filename: "runtime.msi".to_string(),
            location: "http://mirror.test/".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("runtime.msi"));
        assert!(msg.contains("http://mirror.test/"));
    }

    #[test]
    fn test_signature_invalid_display() {
        let err = BootstrapError::SignatureInvalid {
            filename: "runtime.exe".to_string(),
            location: "/srv/share".to_string(),
            rejected: 2,
        };
        assert!(err.to_string().contains("signature validation"));
        assert_eq!(err.exit_code(), exit_code::SIGNATURE_INVALID);
    }

    #[test]
    fn test_manifest_too_large_is_manifest_failure() {
        let err = BootstrapError::ManifestTooLarge {
            source: "embedded".to_string(),
            capacity: 4,
        };
        assert_eq!(err.exit_code(), exit_code::MANIFEST_FAILURE);
    }

    #[test]
    fn test_engine_launch_is_not_an_install_failure() {
        let installer = BootstrapError::LaunchFailed {
            program: PathBuf::from("setup.exe"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        let engine = BootstrapError::EngineLaunchFailed {
            program: PathBuf::from("/opt/engine/2.0/chainboot-engine"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };

        assert_eq!(installer.exit_code(), exit_code::INSTALL_FAILED);
        assert_eq!(engine.exit_code(), exit_code::ENGINE_NOT_FUNCTIONING);
        assert!(std::error::Error::source(&engine).is_some());
    }
}
