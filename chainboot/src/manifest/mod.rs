//! Bootstrap manifest.
//!
//! The manifest lists the components to install, in order. See [`parser`]
//! for the text format and [`ManifestLoader`] for where it is looked up.

mod entry;
mod loader;
pub mod parser;

pub use entry::{is_plain_file_name, EntryOutcome, ManifestEntry};
pub use loader::{load_file, ManifestLoader, ManifestSource};
pub use parser::{decode_manifest, parse_line, parse_manifest, CapacityPolicy};

use crate::error::{BootstrapError, BootstrapResult};

/// Errors from parsing a manifest document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// More entries than the capacity under [`CapacityPolicy::Reject`].
    TooManyEntries { capacity: usize },
    /// An entry's file name is a path rather than a bare name.
    UnsafeFilename { filename: String },
}

impl std::fmt::Display for ManifestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooManyEntries { capacity } => {
                write!(f, "manifest lists more than {} entries", capacity)
            }
            Self::UnsafeFilename { filename } => {
                write!(f, "manifest entry '{}' is not a plain file name", filename)
            }
        }
    }
}

impl std::error::Error for ManifestError {}

/// A parsed manifest and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
    /// Description of the source, for logs and errors.
    pub source: String,
}

impl Manifest {
    /// Decode and parse a raw manifest document.
    pub fn from_bytes(
        bytes: &[u8],
        source: impl Into<String>,
        capacity: usize,
        policy: CapacityPolicy,
    ) -> BootstrapResult<Self> {
        let source = source.into();
        let text = decode_manifest(bytes);
        match parse_manifest(&text, capacity, policy) {
            Ok(entries) => Ok(Self { entries, source }),
            Err(ManifestError::TooManyEntries { capacity }) => {
                Err(BootstrapError::ManifestTooLarge { source, capacity })
            }
            Err(ManifestError::UnsafeFilename { filename }) => {
                Err(BootstrapError::UnsafeFilename { source, filename })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
