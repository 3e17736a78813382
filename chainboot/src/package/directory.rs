//! Unpacked parent package.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{PackageError, ParentPackage, PROPERTIES_DIR, STREAMS_DIR};

/// Parent package stored as a plain directory.
#[derive(Debug, Clone)]
pub struct DirectoryPackage {
    root: PathBuf,
}

impl DirectoryPackage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn member(&self, dir: &str, name: &str) -> Option<PathBuf> {
        // Member names are plain file names; reject anything that could escape.
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return None;
        }
        Some(self.root.join(dir).join(name))
    }
}

impl ParentPackage for DirectoryPackage {
    fn path(&self) -> &Path {
        &self.root
    }

    fn extract_stream(&self, name: &str, dest: &Path) -> Result<bool, PackageError> {
        let Some(source) = self.member(STREAMS_DIR, name) else {
            return Ok(false);
        };
        if !source.is_file() {
            return Ok(false);
        }

        fs::copy(&source, dest).map_err(|e| PackageError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;
        Ok(true)
    }

    fn property(&self, name: &str) -> Result<Option<Vec<u8>>, PackageError> {
        let Some(path) = self.member(PROPERTIES_DIR, name) else {
            return Ok(None);
        };

        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PackageError::ReadFailed { path, source: e }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stream_and_property() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("app");
        fs::create_dir_all(root.join(STREAMS_DIR)).unwrap();
        fs::create_dir_all(root.join(PROPERTIES_DIR)).unwrap();
        fs::write(root.join(STREAMS_DIR).join("runtime.msi"), b"embedded").unwrap();
        fs::write(root.join(PROPERTIES_DIR).join("BootstrapManifest"), b"a.msi").unwrap();

        let package = DirectoryPackage::new(root);
        let dest = temp.path().join("out.msi");

        assert!(package.extract_stream("runtime.msi", &dest).unwrap());
        assert_eq!(fs::read(&dest).unwrap(), b"embedded");
        assert!(!package.extract_stream("absent.msi", &dest).unwrap());
        assert!(!package.extract_stream("../escape", &dest).unwrap());

        assert_eq!(
            package.property("BootstrapManifest").unwrap(),
            Some(b"a.msi".to_vec())
        );
        assert_eq!(package.property("Missing").unwrap(), None);
    }
}
