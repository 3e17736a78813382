//! Component installation.
//!
//! Components are dispatched by extension:
//!
//! - `.exe` runs as a child process through a [`ProcessRunner`]
//! - `.msi` is handed to a [`PackageManager`]
//!
//! Any other extension cannot be installed.

mod package_manager;
mod process;

pub use package_manager::{CommandPackageManager, PackageManager};
pub use process::{ChildProcess, ProcessRunner, SystemChild, SystemProcessRunner};

use std::path::Path;

/// Status reported when installation succeeded but needs a reboot.
pub const STATUS_REBOOT_REQUIRED: i32 = 3010;

/// Installer family of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Self-executing installer.
    Executable,
    /// Package consumed by the package manager.
    Package,
}

impl ArtifactKind {
    /// Kind for a file name, by case-insensitive extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename).extension()?.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "exe" => Some(Self::Executable),
            "msi" => Some(Self::Package),
            _ => None,
        }
    }
}

/// Exit status of an installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallStatus(pub i32);

impl InstallStatus {
    pub const SUCCESS: Self = Self(0);

    /// Zero, or the reboot-required status.
    pub fn is_success(&self) -> bool {
        self.0 == 0 || self.0 == STATUS_REBOOT_REQUIRED
    }

    pub fn reboot_required(&self) -> bool {
        self.0 == STATUS_REBOOT_REQUIRED
    }

    pub fn code(&self) -> i32 {
        self.0
    }
}

/// Split an argument template into words, then substitute placeholders.
///
/// Substitution happens after splitting so a substituted path containing
/// spaces stays a single argument.
pub fn expand_args(template: &str, vars: &[(&str, &str)]) -> Result<Vec<String>, String> {
    let words = shell_words::split(template).map_err(|e| e.to_string())?;
    Ok(words
        .into_iter()
        .map(|word| {
            vars.iter().fold(word, |word, (name, value)| {
                word.replace(&format!("{{{}}}", name), value)
            })
        })
        .collect())
}
