//! Manifest lookup.
//!
//! Sources are tried once each, in order:
//!
//! 1. every configured server (local directory or URL), then the canonical
//!    server when online, for the manifest file
//! 2. the directory containing the parent package
//! 3. the parent package's `BootstrapManifest` property
//!
//! The first source yielding at least one entry wins.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{CapacityPolicy, Manifest};
use crate::config::BootstrapConfig;
use crate::error::{BootstrapError, BootstrapResult};
use crate::fetch::{is_url, join_url, Fetcher};
use crate::package::{ParentPackage, MANIFEST_PROPERTY};

/// A place a manifest may be read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ManifestSource {
    /// A server URL base.
    Remote(String),
    /// A local directory holding the manifest file.
    Directory(PathBuf),
    /// The parent package's embedded property.
    PackageProperty(PathBuf),
}

impl std::fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{}", url),
            Self::Directory(dir) => write!(f, "{}", dir.display()),
            Self::PackageProperty(pkg) => write!(f, "{}!{}", pkg.display(), MANIFEST_PROPERTY),
        }
    }
}

/// Loads the bootstrap manifest.
pub struct ManifestLoader<'a> {
    config: &'a BootstrapConfig,
    fetcher: &'a dyn Fetcher,
    parent: Option<&'a dyn ParentPackage>,
}

impl<'a> ManifestLoader<'a> {
    pub fn new(
        config: &'a BootstrapConfig,
        fetcher: &'a dyn Fetcher,
        parent: Option<&'a dyn ParentPackage>,
    ) -> Self {
        Self {
            config,
            fetcher,
            parent,
        }
    }

    /// Sources in lookup order, each listed once.
    pub fn sources(&self) -> Vec<ManifestSource> {
        let mut sources = Vec::new();

        let servers = self
            .config
            .servers
            .iter()
            .chain(self.config.canonical_server.iter().filter(|_| self.config.allow_online));
        for server in servers {
            let server = server.trim();
            if server.is_empty() {
                continue;
            }
            if is_url(server) {
                if self.config.allow_online {
                    sources.push(ManifestSource::Remote(server.to_string()));
                }
            } else {
                sources.push(ManifestSource::Directory(PathBuf::from(server)));
            }
        }

        let parent_dir = self
            .parent
            .and_then(|p| p.directory())
            .or_else(|| self.config.parent_dir());
        if let Some(dir) = parent_dir {
            sources.push(ManifestSource::Directory(dir));
        }

        if let Some(parent) = self.parent {
            sources.push(ManifestSource::PackageProperty(parent.path().to_path_buf()));
        }

        let mut seen = HashSet::new();
        sources.retain(|s| seen.insert(dedup_key(s)));
        sources
    }

    /// Load the first manifest with entries.
    pub fn load(&self) -> BootstrapResult<Manifest> {
        let sources = self.sources();

        for source in &sources {
            let bytes = match self.read(source) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    tracing::debug!(source = %source, "No manifest at source");
                    continue;
                }
                Err(reason) => {
                    tracing::warn!(source = %source, %reason, "Failed to read manifest");
                    continue;
                }
            };

            let manifest = Manifest::from_bytes(
                &bytes,
                source.to_string(),
                self.config.max_entries,
                self.config.capacity_policy,
            )?;

            if manifest.is_empty() {
                tracing::warn!(source = %source, "Manifest has no entries, trying next source");
                continue;
            }

            tracing::info!(source = %source, entries = manifest.len(), "Loaded manifest");
            return Ok(manifest);
        }

        Err(BootstrapError::ManifestNotFound {
            searched: sources.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn read(&self, source: &ManifestSource) -> Result<Option<Vec<u8>>, String> {
        let name = &self.config.manifest_name;
        match source {
            ManifestSource::Remote(base) => match self.fetcher.fetch(&join_url(base, name)) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e.to_string()),
            },
            ManifestSource::Directory(dir) => read_optional(&dir.join(name)),
            ManifestSource::PackageProperty(_) => match self.parent {
                Some(parent) => parent.property(MANIFEST_PROPERTY).map_err(|e| e.to_string()),
                None => Ok(None),
            },
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, String> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

fn dedup_key(source: &ManifestSource) -> ManifestSource {
    match source {
        ManifestSource::Remote(url) => {
            ManifestSource::Remote(url.trim_end_matches('/').to_string())
        }
        ManifestSource::Directory(dir) => {
            ManifestSource::Directory(dir.components().collect::<PathBuf>())
        }
        other => other.clone(),
    }
}

/// Convenience for callers that only have a file path.
pub fn load_file(path: &Path, capacity: usize, policy: CapacityPolicy) -> BootstrapResult<Manifest> {
    let bytes = fs::read(path).map_err(|_| BootstrapError::ManifestNotFound {
        searched: vec![path.display().to_string()],
    })?;
    Manifest::from_bytes(&bytes, path.display().to_string(), capacity, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::MockFetcher;
    use crate::package::DirectoryPackage;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> BootstrapConfig {
        BootstrapConfig::default()
            .with_bootstrap_dir(temp.path().join("boot"))
            .with_canonical_server(None)
    }

    #[test]
    fn test_first_server_with_manifest_wins() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("mirror");
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join("bootstrapmanifest.txt"), b"local.msi").unwrap();

        let config = config(&temp)
            .with_server("http://a.test/")
            .with_server(local.to_string_lossy().to_string());
        let fetcher = MockFetcher::default();
        let manifest = ManifestLoader::new(&config, &fetcher, None).load().unwrap();

        assert_eq!(manifest.entries[0].filename, "local.msi");
        assert_eq!(fetcher.requested(), vec!["http://a.test/bootstrapmanifest.txt"]);
    }

    #[test]
    fn test_remote_manifest() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp).with_server("http://a.test/boot");
        let fetcher =
            MockFetcher::default().with("http://a.test/boot/bootstrapmanifest.txt", b"a.msi\nb.exe");
        let manifest = ManifestLoader::new(&config, &fetcher, None).load().unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.source, "http://a.test/boot");
    }

    #[test]
    fn test_offline_skips_remote_servers() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp)
            .with_server("http://a.test/")
            .with_canonical_server(Some("https://c.test/".to_string()))
            .with_allow_online(false);
        let fetcher = MockFetcher::default().with("http://a.test/bootstrapmanifest.txt", b"a.msi");
        let loader = ManifestLoader::new(&config, &fetcher, None);

        assert!(loader.sources().is_empty());
        assert!(matches!(
            loader.load(),
            Err(BootstrapError::ManifestNotFound { .. })
        ));
        assert!(fetcher.requested().is_empty());
    }

    #[test]
    fn test_parent_directory_then_property() {
        let temp = TempDir::new().unwrap();
        let package_dir = temp.path().join("media").join("app");
        fs::create_dir_all(package_dir.join("properties")).unwrap();
        fs::write(
            package_dir.join("properties").join("BootstrapManifest"),
            b"embedded.msi",
        )
        .unwrap();
        let package = DirectoryPackage::new(package_dir.clone());

        let config = config(&temp);
        let fetcher = MockFetcher::default();
        let loader = ManifestLoader::new(&config, &fetcher, Some(&package));

        assert_eq!(
            loader.sources(),
            vec![
                ManifestSource::Directory(temp.path().join("media")),
                ManifestSource::PackageProperty(package_dir),
            ]
        );
        let manifest = loader.load().unwrap();
        assert_eq!(manifest.entries[0].filename, "embedded.msi");

        fs::write(temp.path().join("media").join("bootstrapmanifest.txt"), b"beside.msi").unwrap();
        let manifest = loader.load().unwrap();
        assert_eq!(manifest.entries[0].filename, "beside.msi");
    }

    #[test]
    fn test_empty_manifest_falls_through() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(first.join("bootstrapmanifest.txt"), b"# nothing here\n").unwrap();
        fs::write(second.join("bootstrapmanifest.txt"), b"real.msi").unwrap();

        let config = config(&temp)
            .with_server(first.to_string_lossy().to_string())
            .with_server(second.to_string_lossy().to_string());
        let fetcher = MockFetcher::default();
        let manifest = ManifestLoader::new(&config, &fetcher, None).load().unwrap();
        assert_eq!(manifest.entries[0].filename, "real.msi");
    }

    #[test]
    fn test_strict_capacity_fails_load() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("mirror");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("bootstrapmanifest.txt"), b"a.msi\nb.msi\nc.msi").unwrap();

        let config = config(&temp)
            .with_server(dir.to_string_lossy().to_string())
            .with_capacity(2, CapacityPolicy::Reject);
        let fetcher = MockFetcher::default();
        let err = ManifestLoader::new(&config, &fetcher, None).load().unwrap_err();
        assert!(matches!(err, BootstrapError::ManifestTooLarge { capacity: 2, .. }));
    }

    #[test]
    fn test_path_filename_fails_load() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp).with_server("http://a.test/");
        let fetcher = MockFetcher::default().with(
            "http://a.test/bootstrapmanifest.txt",
            b"sub/../../victim.txt,,http://bad.test/,X,\n",
        );

        let err = ManifestLoader::new(&config, &fetcher, None).load().unwrap_err();
        assert!(matches!(err, BootstrapError::UnsafeFilename { .. }));
        assert_eq!(err.exit_code(), crate::error::exit_code::MANIFEST_FAILURE);
    }

    #[test]
    fn test_nothing_found_lists_sources() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp).with_server("http://a.test/");
        let fetcher = MockFetcher::default();
        match ManifestLoader::new(&config, &fetcher, None).load() {
            Err(BootstrapError::ManifestNotFound { searched }) => {
                assert_eq!(searched, vec!["http://a.test/".to_string()]);
            }
            other => panic!("unexpected {:?}", other.map(|m| m.source)),
        }
    }
}
