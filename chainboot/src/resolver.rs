//! Source resolution.
//!
//! A component is looked for in a fixed order of places. Each place is tried
//! with the localized file name first (`name.<locale>.ext`) and then the plain
//! name:
//!
//! 1. next to the bootstrap executable
//! 2. next to the parent package
//! 3. embedded in the parent package, extracted to staging
//! 4. when online: the entry's own location, each configured mirror, then
//!    the canonical server
//!
//! The first candidate that exists and passes the [`TrustGate`] wins. Fetched
//! or extracted candidates that fail the gate are deleted before moving on.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::config::BootstrapConfig;
use crate::fetch::{is_url, join_url, Fetcher, TransferProgress};
use crate::manifest::is_plain_file_name;
use crate::package::ParentPackage;
use crate::trust::TrustGate;

/// Where a candidate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A file in a local directory.
    CoLocated,
    /// A stream embedded in the parent package.
    Embedded,
    /// A file fetched from a URL.
    Remote,
}

/// One place a component may be found.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceCandidate {
    pub kind: SourceKind,
    /// Directory, URL base, or the package path for embedded streams.
    pub location: String,
    /// File or stream name to look up at `location`.
    pub name: String,
}

impl SourceCandidate {
    fn new(kind: SourceKind, location: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            name: name.into(),
        }
    }

    fn dedup_key(&self) -> (SourceKind, String, String) {
        let location = self.location.trim_end_matches(['/', '\\']).to_string();
        (self.kind, location, self.name.clone())
    }
}

impl std::fmt::Display for SourceCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            SourceKind::CoLocated => {
                write!(f, "{}", Path::new(&self.location).join(&self.name).display())
            }
            SourceKind::Embedded => write!(f, "{}!{}", self.location, self.name),
            SourceKind::Remote => write!(f, "{}", join_url(&self.location, &self.name)),
        }
    }
}

/// Outcome of resolving one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A trusted local copy.
    Found(PathBuf),
    /// Nothing usable; `rejected` candidates existed but were untrusted.
    NotFound { rejected: usize },
    /// The shutdown token fired.
    Cancelled,
}

/// `name.<locale>.ext` for `name.ext`.
pub fn localized_name(filename: &str, locale: &str) -> String {
    let path = Path::new(filename);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{}.{}.{}",
            stem.to_string_lossy(),
            locale,
            ext.to_string_lossy()
        ),
        _ => format!("{}.{}", filename, locale),
    }
}

/// Resolves components to trusted local files.
pub struct SourceResolver<'a> {
    config: &'a BootstrapConfig,
    trust: &'a dyn TrustGate,
    fetcher: &'a dyn Fetcher,
    parent: Option<&'a dyn ParentPackage>,
    token: CancellationToken,
}

impl<'a> SourceResolver<'a> {
    pub fn new(
        config: &'a BootstrapConfig,
        trust: &'a dyn TrustGate,
        fetcher: &'a dyn Fetcher,
        parent: Option<&'a dyn ParentPackage>,
        token: CancellationToken,
    ) -> Self {
        Self {
            config,
            trust,
            fetcher,
            parent,
            token,
        }
    }

    /// Ordered, de-duplicated candidate list for `filename`.
    pub fn candidates(&self, filename: &str, location: Option<&str>) -> Vec<SourceCandidate> {
        let names: Vec<String> = match &self.config.locale {
            Some(locale) => vec![localized_name(filename, locale), filename.to_string()],
            None => vec![filename.to_string()],
        };

        let mut places: Vec<(SourceKind, String)> = Vec::new();
        places.push((
            SourceKind::CoLocated,
            self.config.bootstrap_dir.to_string_lossy().to_string(),
        ));

        if let Some(parent) = self.parent {
            if let Some(dir) = parent.directory() {
                places.push((SourceKind::CoLocated, dir.to_string_lossy().to_string()));
            }
            places.push((
                SourceKind::Embedded,
                parent.path().to_string_lossy().to_string(),
            ));
        } else if let Some(dir) = self.config.parent_dir() {
            places.push((SourceKind::CoLocated, dir.to_string_lossy().to_string()));
        }

        if self.config.allow_online {
            let remote = location
                .into_iter()
                .map(str::to_string)
                .chain(self.config.servers.iter().cloned())
                .chain(self.config.canonical_server.iter().cloned());
            for base in remote {
                let base = base.trim().to_string();
                if base.is_empty() {
                    continue;
                }
                let kind = if is_url(&base) {
                    SourceKind::Remote
                } else {
                    SourceKind::CoLocated
                };
                places.push((kind, base));
            }
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for (kind, location) in places {
            for name in &names {
                let candidate = SourceCandidate::new(kind, location.clone(), name.clone());
                if seen.insert(candidate.dedup_key()) {
                    candidates.push(candidate);
                }
            }
        }
        candidates
    }

    /// Find a trusted local copy of `filename`.
    pub fn resolve(
        &self,
        filename: &str,
        location: Option<&str>,
        progress: &dyn Fn(TransferProgress),
    ) -> Resolution {
        if !is_plain_file_name(filename) {
            tracing::warn!(component = filename, "Refusing to resolve a path as a component name");
            return Resolution::NotFound { rejected: 0 };
        }

        let mut rejected = 0usize;

        for candidate in self.candidates(filename, location) {
            if self.token.is_cancelled() {
                return Resolution::Cancelled;
            }

            match self.try_candidate(&candidate, progress) {
                Attempt::Trusted(path) => {
                    tracing::info!(component = filename, source = %candidate, "Resolved");
                    return Resolution::Found(path);
                }
                Attempt::Untrusted => {
                    tracing::warn!(component = filename, source = %candidate, "Candidate failed signature verification");
                    rejected += 1;
                }
                Attempt::Absent => {
                    tracing::trace!(component = filename, source = %candidate, "Candidate not present");
                }
            }
        }

        tracing::warn!(component = filename, rejected, "No trusted source found");
        Resolution::NotFound { rejected }
    }

    fn try_candidate(
        &self,
        candidate: &SourceCandidate,
        progress: &dyn Fn(TransferProgress),
    ) -> Attempt {
        match candidate.kind {
            SourceKind::CoLocated => {
                let path = Path::new(&candidate.location).join(&candidate.name);
                if !path.is_file() {
                    return Attempt::Absent;
                }
                if self.trust.is_trusted(&path) {
                    Attempt::Trusted(path)
                } else {
                    Attempt::Untrusted
                }
            }
            SourceKind::Embedded => {
                let Some(parent) = self.parent else {
                    return Attempt::Absent;
                };
                let Some(dest) = self.staging_path(&candidate.name) else {
                    return Attempt::Absent;
                };
                match parent.extract_stream(&candidate.name, &dest) {
                    Ok(true) => self.gate_staged(dest),
                    Ok(false) => Attempt::Absent,
                    Err(e) => {
                        tracing::warn!(stream = %candidate.name, error = %e, "Failed to extract embedded component");
                        discard(&dest);
                        Attempt::Absent
                    }
                }
            }
            SourceKind::Remote => {
                let Some(dest) = self.staging_path(&candidate.name) else {
                    return Attempt::Absent;
                };
                let url = join_url(&candidate.location, &candidate.name);
                match self.fetcher.fetch_to_file(&url, &dest, progress) {
                    Ok(bytes) => {
                        tracing::debug!(url = %url, bytes, "Fetched candidate");
                        self.gate_staged(dest)
                    }
                    Err(e) if e.is_not_found() => Attempt::Absent,
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "Fetch failed");
                        discard(&dest);
                        Attempt::Absent
                    }
                }
            }
        }
    }

    /// Gate a file we placed in staging, deleting it when untrusted.
    fn gate_staged(&self, path: PathBuf) -> Attempt {
        if self.trust.is_trusted(&path) {
            Attempt::Trusted(path)
        } else {
            discard(&path);
            Attempt::Untrusted
        }
    }

    /// Staging destination for `name`, or `None` if it would leave staging.
    fn staging_path(&self, name: &str) -> Option<PathBuf> {
        is_plain_file_name(name).then(|| self.config.staging_dir.join(name))
    }
}

enum Attempt {
    Trusted(PathBuf),
    Untrusted,
    Absent,
}

fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete rejected candidate");
        }
    }
}
