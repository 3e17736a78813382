//! Blocking HTTP transport.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;

use super::{FetchError, Fetcher, TransferProgress};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Buffer size for streaming response bodies (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// [`Fetcher`] backed by a single blocking `reqwest` client.
///
/// One client is shared by every request of a session. `file://` URLs are
/// served straight from the local filesystem.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chainboot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn open(&self, url: &str) -> Result<(reqwest::blocking::Response, Option<u64>), FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::BadUrl(url.to_string()))?;

        let response = self.client.get(parsed).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else if e.is_builder() {
                FetchError::BadUrl(url.to_string())
            } else {
                FetchError::NoConnection {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }

        let total = response.content_length();
        Ok((response, total))
    }

    /// Copy the response body into `sink`, reporting progress per chunk.
    fn stream<W: Write>(
        &self,
        url: &str,
        sink: &mut W,
        dest: &Path,
        progress: &dyn Fn(TransferProgress),
    ) -> Result<u64, FetchError> {
        let (mut response, total) = self.open(url)?;

        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut received = 0u64;

        loop {
            let bytes_read = response.read(&mut buffer).map_err(|e| {
                if e.kind() == io::ErrorKind::TimedOut {
                    FetchError::Timeout(url.to_string())
                } else {
                    FetchError::NoConnection {
                        url: url.to_string(),
                        reason: format!("read error: {}", e),
                    }
                }
            })?;

            if bytes_read == 0 {
                break;
            }

            sink.write_all(&buffer[..bytes_read])
                .map_err(|e| FetchError::Write {
                    path: dest.to_path_buf(),
                    source: e,
                })?;

            received += bytes_read as u64;
            progress(TransferProgress::from_counts(received, total));
        }

        if received == 0 {
            return Err(FetchError::NoData(url.to_string()));
        }

        Ok(received)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_with_progress(
        &self,
        url: &str,
        progress: &dyn Fn(TransferProgress),
    ) -> Result<Vec<u8>, FetchError> {
        if let Some(path) = local_path(url) {
            let bytes = read_local(url, &path)?;
            progress(TransferProgress::Percent(100));
            return Ok(bytes);
        }

        let mut body = Vec::new();
        self.stream(url, &mut body, Path::new("<memory>"), progress)?;
        Ok(body)
    }

    fn fetch_to_file(
        &self,
        url: &str,
        dest: &Path,
        progress: &dyn Fn(TransferProgress),
    ) -> Result<u64, FetchError> {
        if let Some(path) = local_path(url) {
            let bytes = read_local(url, &path)?;
            super::write_file(dest, &bytes)?;
            progress(TransferProgress::Percent(100));
            return Ok(bytes.len() as u64);
        }

        let write_err = |source| FetchError::Write {
            path: dest.to_path_buf(),
            source,
        };
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let file = File::create(dest).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        let result = self.stream(url, &mut writer, dest, progress);
        let flushed = writer.flush().map_err(write_err);

        match result.and_then(|n| flushed.map(|_| n)) {
            Ok(n) => Ok(n),
            Err(e) => {
                // Never leave a partial candidate behind.
                fs::remove_file(dest).ok();
                Err(e)
            }
        }
    }
}

fn local_path(url: &str) -> Option<PathBuf> {
    let lower = url.get(..7)?.to_ascii_lowercase();
    if lower != "file://" {
        return None;
    }
    Url::parse(url)
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .or_else(|| Some(PathBuf::from(&url[7..])))
}

fn read_local(url: &str, path: &Path) -> Result<Vec<u8>, FetchError> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Err(FetchError::NoData(url.to_string())),
        Ok(bytes) => Ok(bytes),
        // A missing file behind a file:// mirror is reported like a 404.
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(FetchError::Status {
            url: url.to_string(),
            code: 404,
        }),
        Err(e) => Err(FetchError::NoConnection {
            url: url.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_http_fetcher_with_timeout() {
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(fetcher.timeout().as_secs(), 60);
    }

    #[test]
    fn test_http_fetcher_new() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.timeout().as_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_bad_url() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher.fetch("http://").unwrap_err();
        assert!(matches!(err, FetchError::BadUrl(_)));
    }

    #[test]
    fn test_file_url() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("runtime.msi");
        fs::write(&source, b"package bytes").unwrap();
        let url = Url::from_file_path(&source).unwrap().to_string();

        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.fetch(&url).unwrap(), b"package bytes");

        let dest = temp.path().join("staging").join("runtime.msi");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        let written = fetcher.fetch_to_file(&url, &dest, &|_| {}).unwrap();
        assert_eq!(written, 13);
        assert_eq!(fs::read(&dest).unwrap(), b"package bytes");
    }

    #[test]
    fn test_missing_file_url_is_not_found() {
        let temp = TempDir::new().unwrap();
        let url = Url::from_file_path(temp.path().join("absent.msi"))
            .unwrap()
            .to_string();

        let fetcher = HttpFetcher::new().unwrap();
        assert!(fetcher.fetch(&url).unwrap_err().is_not_found());
    }

    #[test]
    fn test_empty_file_url_is_no_data() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("empty.msi");
        fs::write(&source, b"").unwrap();
        let url = Url::from_file_path(&source).unwrap().to_string();

        let fetcher = HttpFetcher::new().unwrap();
        assert!(matches!(
            fetcher.fetch(&url).unwrap_err(),
            FetchError::NoData(_)
        ));
    }
}
