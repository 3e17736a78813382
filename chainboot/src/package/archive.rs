//! `.tar.gz` parent package.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use super::{PackageError, ParentPackage, PROPERTIES_DIR, STREAMS_DIR};

/// Parent package stored as a gzip-compressed tar archive.
///
/// Every lookup rescans the archive; packages are small and each member is
/// read at most a handful of times per run.
#[derive(Debug, Clone)]
pub struct ArchivePackage {
    path: PathBuf,
}

impl ArchivePackage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Visit the member `dir/name`, returning whether it was found.
    fn with_member<F>(&self, dir: &str, name: &str, mut visit: F) -> Result<bool, PackageError>
    where
        F: FnMut(&mut dyn Read) -> Result<(), PackageError>,
    {
        let read_err = |source| PackageError::ReadFailed {
            path: self.path.clone(),
            source,
        };

        let file = File::open(&self.path).map_err(read_err)?;
        let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

        for entry in archive.entries().map_err(read_err)? {
            let mut entry = entry.map_err(read_err)?;
            let member = entry.path().map_err(read_err)?.into_owned();
            if member_matches(&member, dir, name) {
                visit(&mut entry)?;
                return Ok(true);
            }
        }

        Ok(false)
    }
}

/// Whether an archive path names `dir/name`, ignoring a leading `./`.
fn member_matches(member: &Path, dir: &str, name: &str) -> bool {
    let mut parts = member.components().filter(|c| !matches!(c, Component::CurDir));
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(Component::Normal(d)), Some(Component::Normal(n)), None)
            if d == dir && n == name
    )
}

impl ParentPackage for ArchivePackage {
    fn path(&self) -> &Path {
        &self.path
    }

    fn extract_stream(&self, name: &str, dest: &Path) -> Result<bool, PackageError> {
        self.with_member(STREAMS_DIR, name, |reader| {
            let write_err = |source| PackageError::WriteFailed {
                path: dest.to_path_buf(),
                source,
            };
            let file = File::create(dest).map_err(write_err)?;
            let mut writer = BufWriter::new(file);
            io::copy(reader, &mut writer).map_err(write_err)?;
            writer.flush().map_err(write_err)
        })
    }

    fn property(&self, name: &str) -> Result<Option<Vec<u8>>, PackageError> {
        let mut value = Vec::new();
        let found = self.with_member(PROPERTIES_DIR, name, |reader| {
            reader
                .read_to_end(&mut value)
                .map(|_| ())
                .map_err(|e| PackageError::ReadFailed {
                    path: self.path.clone(),
                    source: e,
                })
        })?;

        Ok(found.then_some(value))
    }
}
