//! Installed engine discovery.
//!
//! Engines are installed side by side in versioned directories, for example
//!
//! ```text
//! <root>/engine/1.4.0.12/chainboot-engine
//! <root>/engine/1.10.0.3/chainboot-engine
//! ```
//!
//! The newest is picked by comparing the dotted directory names as
//! [`PackedVersion`]s.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Four 16-bit version parts packed into a `u64`
/// (`major.minor.build.revision`, major in the high word).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PackedVersion(pub u64);

impl PackedVersion {
    pub fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self(
            (u64::from(major) << 48)
                | (u64::from(minor) << 32)
                | (u64::from(build) << 16)
                | u64::from(revision),
        )
    }

    /// Parse `a.b[.c[.d]]`; missing parts are zero.
    ///
    /// Returns `None` for a single part, more than four parts, or any part
    /// that is not a number below 65536.
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.split('.').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return None;
        }

        let mut values = [0u16; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            *slot = part.parse().ok()?;
        }

        Some(Self::new(values[0], values[1], values[2], values[3]))
    }

    pub fn parts(&self) -> [u16; 4] {
        [
            (self.0 >> 48) as u16,
            (self.0 >> 32) as u16,
            (self.0 >> 16) as u16,
            self.0 as u16,
        ]
    }
}

impl fmt::Display for PackedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.parts();
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

/// An engine executable found under the install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLocation {
    pub path: PathBuf,
    pub version: PackedVersion,
}

/// Whether `file_name` names the engine (`name` or `name.exe`).
fn is_engine_file(file_name: &str, engine_name: &str) -> bool {
    file_name.eq_ignore_ascii_case(engine_name)
        || file_name.eq_ignore_ascii_case(&format!("{}.exe", engine_name))
}

/// Version from the nearest dotted directory between `root` and `path`.
fn version_of(root: &Path, path: &Path) -> PackedVersion {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .parent()
        .into_iter()
        .flat_map(|dir| dir.components().rev())
        .find_map(|c| PackedVersion::parse(&c.as_os_str().to_string_lossy()))
        .unwrap_or_default()
}

/// Find the newest engine under `root`.
///
/// Walks the tree with an explicit stack and does not follow symlinked
/// directories. Ties keep the first match in name order.
pub fn find_latest_engine(root: &Path, engine_name: &str) -> Option<EngineLocation> {
    let mut best: Option<EngineLocation> = None;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };

        let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
        entries.sort_by_key(|e| e.file_name());

        // Reverse so subdirectories are popped in name order.
        for entry in entries.into_iter().rev() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();

            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file()
                && is_engine_file(&entry.file_name().to_string_lossy(), engine_name)
            {
                let version = version_of(root, &path);
                let newer = best.as_ref().map_or(true, |b| version > b.version);
                if newer {
                    best = Some(EngineLocation { path, version });
                }
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"engine").unwrap();
    }

    #[test]
    fn test_parse() {
        assert_eq!(PackedVersion::parse("1.2.3.4"), Some(PackedVersion::new(1, 2, 3, 4)));
        assert_eq!(PackedVersion::parse("1.2"), Some(PackedVersion::new(1, 2, 0, 0)));
        assert_eq!(PackedVersion::parse("1"), None);
        assert_eq!(PackedVersion::parse("1.2.3.4.5"), None);
        assert_eq!(PackedVersion::parse("1.x"), None);
        assert_eq!(PackedVersion::parse("1..2"), None);
        assert_eq!(PackedVersion::parse("1.70000"), None);
        assert_eq!(PackedVersion::parse("+1.2"), None);
    }

    #[test]
    fn test_numeric_ordering() {
        let a = PackedVersion::parse("1.10.0.0").unwrap();
        let b = PackedVersion::parse("1.9.65535.65535").unwrap();
        assert!(a > b);
        assert_eq!(a.to_string(), "1.10.0.0");
        assert_eq!(PackedVersion::new(1, 2, 3, 4).0, 0x0001_0002_0003_0004);
    }

    #[test]
    fn test_find_latest_engine() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("engine/1.4.0.12/chainboot-engine"));
        touch(&root.join("engine/1.10.0.3/bin/chainboot-engine"));
        touch(&root.join("engine/1.9.9.9/chainboot-engine"));
        touch(&root.join("engine/2.0.0.0/other-tool"));

        let found = find_latest_engine(root, "chainboot-engine").unwrap();
        assert_eq!(found.version, PackedVersion::new(1, 10, 0, 3));
        assert_eq!(found.path, root.join("engine/1.10.0.3/bin/chainboot-engine"));
    }

    #[test]
    fn test_exe_suffix_and_unversioned() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("bin/Chainboot-Engine.exe"));

        let found = find_latest_engine(root, "chainboot-engine").unwrap();
        assert_eq!(found.version, PackedVersion::default());
    }

    #[test]
    fn test_missing_root_or_engine() {
        let temp = TempDir::new().unwrap();
        assert!(find_latest_engine(&temp.path().join("absent"), "chainboot-engine").is_none());
        touch(&temp.path().join("1.0/unrelated"));
        assert!(find_latest_engine(temp.path(), "chainboot-engine").is_none());
    }
}
