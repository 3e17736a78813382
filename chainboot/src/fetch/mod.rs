//! Retrieval of remote candidates.
//!
//! The resolver only depends on the [`Fetcher`] trait; [`HttpFetcher`] is the
//! default transport (blocking `reqwest` with rustls, plus `file://` URLs).

mod http;

pub use http::HttpFetcher;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while fetching a resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The location is not a usable URL.
    #[error("bad URL '{0}'")]
    BadUrl(String),

    /// The server could not be reached.
    #[error("no connection to {url}: {reason}")]
    NoConnection { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {code} from {url}")]
    Status { url: String, code: u16 },

    /// The server answered successfully but sent nothing.
    #[error("no data received from {0}")]
    NoData(String),

    /// The request did not finish within the configured timeout.
    #[error("timed out fetching {0}")]
    Timeout(String),

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// The fetched bytes could not be stored.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether the resource simply does not exist at this location.
    ///
    /// Missing resources are expected while walking candidates and are logged
    /// at a lower level than transport failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { code: 404, .. })
    }
}

/// Progress of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferProgress {
    /// Fraction of a known total, 0 to 100.
    Percent(u8),
    /// Total size unknown; bytes received so far.
    Indeterminate { received: u64 },
}

impl TransferProgress {
    /// Progress for `received` bytes of an optional `total`.
    ///
    /// A missing or zero total yields [`TransferProgress::Indeterminate`].
    pub fn from_counts(received: u64, total: Option<u64>) -> Self {
        match total {
            Some(total) if total > 0 => {
                let percent = (received.min(total) * 100) / total;
                Self::Percent(percent as u8)
            }
            _ => Self::Indeterminate { received },
        }
    }
}

/// Transport used to retrieve remote candidates and manifests.
pub trait Fetcher: Send + Sync {
    /// Fetch a resource, reporting transfer progress.
    fn fetch_with_progress(
        &self,
        url: &str,
        progress: &dyn Fn(TransferProgress),
    ) -> Result<Vec<u8>, FetchError>;

    /// Fetch a resource into memory.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_with_progress(url, &|_| {})
    }

    /// Fetch a resource into `dest`, returning the number of bytes written.
    fn fetch_to_file(
        &self,
        url: &str,
        dest: &Path,
        progress: &dyn Fn(TransferProgress),
    ) -> Result<u64, FetchError> {
        let bytes = self.fetch_with_progress(url, progress)?;
        write_file(dest, &bytes)?;
        Ok(bytes.len() as u64)
    }
}

pub(crate) fn write_file(dest: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    let write_err = |source| FetchError::Write {
        path: dest.to_path_buf(),
        source,
    };
    let file = File::create(dest).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes).map_err(write_err)?;
    writer.flush().map_err(write_err)
}

/// Whether a location is URL-shaped rather than a filesystem path.
pub fn is_url(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("file://")
}

/// Combine a URL base with a relative resource name.
pub fn join_url(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory fetcher recording every requested URL.
    #[derive(Default)]
    pub struct MockFetcher {
        pub resources: HashMap<String, Vec<u8>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        pub fn with(mut self, url: &str, bytes: &[u8]) -> Self {
            self.resources.insert(url.to_string(), bytes.to_vec());
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Fetcher for MockFetcher {
        fn fetch_with_progress(
            &self,
            url: &str,
            progress: &dyn Fn(TransferProgress),
        ) -> Result<Vec<u8>, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            match self.resources.get(url) {
                Some(bytes) => {
                    progress(TransferProgress::Percent(100));
                    Ok(bytes.clone())
                }
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    code: 404,
                }),
            }
        }
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("http://a.test/"));
        assert!(is_url("HTTPS://a.test/dir"));
        assert!(is_url("file:///srv/mirror"));
        assert!(!is_url("/srv/mirror"));
        assert!(!is_url("\\\\server\\share"));
        assert!(!is_url("ftp.example.com"));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://a.test/", "x.msi"), "http://a.test/x.msi");
        assert_eq!(join_url("http://a.test/dir", "x.msi"), "http://a.test/dir/x.msi");
    }

    #[test]
    fn test_progress_unknown_total_is_indeterminate() {
        assert_eq!(
            TransferProgress::from_counts(512, None),
            TransferProgress::Indeterminate { received: 512 }
        );
        assert_eq!(
            TransferProgress::from_counts(512, Some(0)),
            TransferProgress::Indeterminate { received: 512 }
        );
        assert_eq!(
            TransferProgress::from_counts(50, Some(200)),
            TransferProgress::Percent(25)
        );
        assert_eq!(
            TransferProgress::from_counts(300, Some(200)),
            TransferProgress::Percent(100)
        );
    }

    #[test]
    fn test_mock_fetch_to_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("x.msi");
        let fetcher = MockFetcher::default().with("http://a.test/x.msi", b"payload");

        let written = fetcher
            .fetch_to_file("http://a.test/x.msi", &dest, &|_| {})
            .unwrap();
        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");

        let missing = fetcher.fetch("http://a.test/y.msi").unwrap_err();
        assert!(missing.is_not_found());
        assert_eq!(fetcher.requested().len(), 2);
    }
}
