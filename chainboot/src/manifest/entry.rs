//! Manifest records.

use std::path::{Component, Path, PathBuf};

/// How an entry ended up satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The presence check found the component already installed.
    PresenceSatisfied,
    /// Installed by running the component executable.
    InstalledViaExe,
    /// Installed by the package manager.
    InstalledViaPackage,
    /// Installed by a chained installer supervised over the chain channel.
    InstalledViaChain,
}

/// One component listed in the bootstrap manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Component file name, never empty.
    pub filename: String,

    /// Presence-check key; if present on the machine the entry is skipped.
    pub registry_key_check: Option<String>,

    /// Base path or URL the component may be fetched from.
    pub location: Option<String>,

    /// Label shown to the operator.
    pub cosmetic_name: Option<String>,

    /// Install-time arguments overriding the defaults.
    pub parameters: Option<String>,

    /// Verified local copy, set once resolution succeeds.
    pub local_path: Option<PathBuf>,

    /// Set once the component is known to be installed.
    pub is_installed: bool,

    /// What satisfied the entry.
    pub outcome: Option<EntryOutcome>,
}

impl ManifestEntry {
    /// Create an entry with only a file name.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            registry_key_check: None,
            location: None,
            cosmetic_name: None,
            parameters: None,
            local_path: None,
            is_installed: false,
            outcome: None,
        }
    }

    /// Label for progress messages: the cosmetic name, else the file name.
    pub fn display_name(&self) -> &str {
        self.cosmetic_name.as_deref().unwrap_or(&self.filename)
    }

    /// Lowercased file extension, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// Record that the entry is satisfied.
    ///
    /// The first outcome sticks; later calls are ignored.
    pub fn mark_installed(&mut self, outcome: EntryOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
        self.is_installed = true;
    }
}

/// Whether `name` is a bare file name that stays inside any directory it is
/// joined to: one normal path component and no separator of either style.
pub fn is_plain_file_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_filename() {
        let mut entry = ManifestEntry::new("runtime.msi");
        assert_eq!(entry.display_name(), "runtime.msi");
        entry.cosmetic_name = Some("Runtime".to_string());
        assert_eq!(entry.display_name(), "Runtime");
    }

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(ManifestEntry::new("Setup.EXE").extension().as_deref(), Some("exe"));
        assert_eq!(ManifestEntry::new("runtime.msi").extension().as_deref(), Some("msi"));
        assert_eq!(ManifestEntry::new("README").extension(), None);
    }

    #[test]
    fn test_single_outcome() {
        let mut entry = ManifestEntry::new("runtime.msi");
        entry.mark_installed(EntryOutcome::PresenceSatisfied);
        entry.mark_installed(EntryOutcome::InstalledViaPackage);
        assert!(entry.is_installed);
        assert_eq!(entry.outcome, Some(EntryOutcome::PresenceSatisfied));
    }

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("runtime.msi"));
        assert!(is_plain_file_name("setup.en-US.exe"));

        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("."));
        assert!(!is_plain_file_name("sub/runtime.msi"));
        assert!(!is_plain_file_name("sub/../../victim.txt"));
        assert!(!is_plain_file_name("..\\victim.txt"));
        assert!(!is_plain_file_name("C:\\Windows\\evil.dll"));
        assert!(!is_plain_file_name("/etc/passwd"));
    }
}
