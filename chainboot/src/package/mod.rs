//! Parent package access.
//!
//! The parent package is the product the prerequisites are installed for.
//! It may carry named binary streams (embedded components) and named
//! properties (such as an embedded `BootstrapManifest`).
//!
//! Two containers are supported:
//!
//! - [`ArchivePackage`] - a `.tar.gz` with `streams/<name>` and
//!   `properties/<name>` members.
//! - [`DirectoryPackage`] - an unpacked directory with the same layout.

mod archive;
mod directory;

pub use archive::ArchivePackage;
pub use directory::DirectoryPackage;

use std::io;
use std::path::{Path, PathBuf};

/// Archive member prefix for embedded binary streams.
pub const STREAMS_DIR: &str = "streams";

/// Archive member prefix for package properties.
pub const PROPERTIES_DIR: &str = "properties";

/// Property holding an embedded bootstrap manifest.
pub const MANIFEST_PROPERTY: &str = "BootstrapManifest";

/// Errors raised while reading a parent package.
#[derive(Debug)]
pub enum PackageError {
    /// The package could not be read.
    ReadFailed { path: PathBuf, source: io::Error },

    /// An extracted stream could not be written.
    WriteFailed { path: PathBuf, source: io::Error },
}

impl std::fmt::Display for PackageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read package {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for PackageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } | Self::WriteFailed { source, .. } => Some(source),
        }
    }
}

/// The package that launched the bootstrapper.
pub trait ParentPackage: Send + Sync {
    /// Location of the package.
    fn path(&self) -> &Path;

    /// Directory the package lives in.
    fn directory(&self) -> Option<PathBuf> {
        self.path().parent().map(Path::to_path_buf)
    }

    /// Copy the embedded stream `name` to `dest`.
    ///
    /// Returns `Ok(false)` if the package has no such stream.
    fn extract_stream(&self, name: &str, dest: &Path) -> Result<bool, PackageError>;

    /// Raw value of the property `name`, if present.
    fn property(&self, name: &str) -> Result<Option<Vec<u8>>, PackageError>;
}

/// Open a parent package, choosing the container by what is on disk.
pub fn open_package(path: &Path) -> Box<dyn ParentPackage> {
    if path.is_dir() {
        Box::new(DirectoryPackage::new(path.to_path_buf()))
    } else {
        Box::new(ArchivePackage::new(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_package_picks_container() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("unpacked");
        std::fs::create_dir_all(&dir).unwrap();

        let package = open_package(&dir);
        assert_eq!(package.path(), dir.as_path());
        assert_eq!(package.directory(), Some(temp.path().to_path_buf()));

        let archive = temp.path().join("app.pkg");
        let package = open_package(&archive);
        assert_eq!(package.path(), archive.as_path());
    }
}
