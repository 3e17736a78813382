//! CLI error type and its mapping to process exit codes.

use std::fmt;
use std::io;
use std::path::PathBuf;

use chainboot::config::ConfigError;
use chainboot::error::exit_code;
use chainboot::BootstrapError;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// A bootstrap run failed.
    Bootstrap(BootstrapError),
    /// Invalid configuration or arguments.
    Config(String),
    /// The configuration file could not be read or written.
    ConfigFile(ConfigError),
    /// Logging could not be set up.
    Logging(io::Error),
    /// One or more files failed signature verification.
    Untrusted { failed: usize },
    /// Signing a file failed.
    Sign { path: PathBuf, reason: String },
    /// Any other I/O failure.
    Io(io::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Bootstrap(e) => e.exit_code(),
            Self::Config(_) | Self::ConfigFile(_) => exit_code::CONFIG_ERROR,
            Self::Untrusted { .. } => exit_code::SIGNATURE_INVALID,
            Self::Logging(_) | Self::Sign { .. } | Self::Io(_) => exit_code::INTERNAL_ERROR,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootstrap(e) => write!(f, "{}", e),
            Self::Config(msg) => write!(f, "{}", msg),
            Self::ConfigFile(e) => write!(f, "{}", e),
            Self::Logging(e) => write!(f, "failed to initialize logging: {}", e),
            Self::Untrusted { failed } => {
                write!(f, "{} file(s) failed signature verification", failed)
            }
            Self::Sign { path, reason } => {
                write!(f, "failed to sign {}: {}", path.display(), reason)
            }
            Self::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bootstrap(e) => Some(e),
            Self::ConfigFile(e) => Some(e),
            Self::Logging(e) | Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BootstrapError> for CliError {
    fn from(e: BootstrapError) -> Self {
        Self::Bootstrap(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::ConfigFile(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let download = CliError::from(BootstrapError::DownloadFailed {
            filename: "a.msi".to_string(),
            location: "http://a.test/".to_string(),
        });
        assert_eq!(download.exit_code(), exit_code::DOWNLOAD_FAILED);
        assert_eq!(
            CliError::Config("bad".to_string()).exit_code(),
            exit_code::CONFIG_ERROR
        );
        assert_eq!(
            CliError::Untrusted { failed: 2 }.exit_code(),
            exit_code::SIGNATURE_INVALID
        );
    }

    #[test]
    fn test_display_wraps_library_error() {
        let err = CliError::from(BootstrapError::Internal("boom".to_string()));
        assert_eq!(err.to_string(), "internal error: boom");
    }
}
