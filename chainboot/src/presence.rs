//! Presence checks.
//!
//! A presence key names a registry-style path, optionally followed by
//! `#ValueName`:
//!
//! ```text
//! HKLM\Software\Vendor\Runtime            key must exist
//! HKLM\Software\Vendor\Runtime#Version    value must exist under the key
//! ```
//!
//! [`RegistryFile`] keeps such keys in an ini file, one section per key and
//! one property per value. Lookups ignore case.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;

use crate::config::ConfigError;

/// Answers whether a presence key exists on this machine.
pub trait PresenceCheck: Send + Sync {
    fn key_present(&self, key: &str) -> bool;
}

/// Split `path#Value` into its key path and optional value name.
pub fn split_key(key: &str) -> (&str, Option<&str>) {
    match key.split_once('#') {
        Some((path, value)) if !value.is_empty() => (path, Some(value)),
        Some((path, _)) => (path, None),
        None => (key, None),
    }
}

fn normalize(path: &str) -> String {
    path.trim().trim_matches('\\').to_lowercase()
}

/// Ini-backed key store.
#[derive(Debug, Clone, Default)]
pub struct RegistryFile {
    path: Option<PathBuf>,
    keys: HashMap<String, HashSet<String>>,
    /// Original spelling for writing back.
    values: HashMap<String, (String, Vec<(String, String)>)>,
}

impl RegistryFile {
    /// Create an empty, unsaved store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut store = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };

        if !path.exists() {
            return Ok(store);
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        for (section, properties) in ini.iter() {
            let Some(section) = section else {
                continue;
            };
            store.add_key(section);
            for (name, data) in properties.iter() {
                store.set_value(section, name, data);
            }
        }

        Ok(store)
    }

    /// Add a key without values.
    pub fn add_key(&mut self, key_path: &str) {
        let normalized = normalize(key_path);
        self.keys.entry(normalized.clone()).or_default();
        self.values
            .entry(normalized)
            .or_insert_with(|| (key_path.trim().to_string(), Vec::new()));
    }

    /// Set a value under a key, creating the key.
    pub fn set_value(&mut self, key_path: &str, name: &str, data: &str) {
        self.add_key(key_path);
        let normalized = normalize(key_path);
        if let Some(names) = self.keys.get_mut(&normalized) {
            names.insert(name.to_lowercase());
        }
        if let Some((_, values)) = self.values.get_mut(&normalized) {
            values.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
            values.push((name.to_string(), data.to_string()));
        }
    }

    /// Save to the path the store was loaded from.
    pub fn save(&self) -> Result<(), ConfigError> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Save to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut sorted: Vec<_> = self.values.values().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut ini = Ini::new();
        for (key_path, values) in sorted {
            ini.entry(Some(key_path.clone())).or_insert_with(Default::default);
            for (name, data) in values {
                ini.with_section(Some(key_path.as_str())).set(name.as_str(), data.as_str());
            }
        }

        ini.write_to_file(path).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl PresenceCheck for RegistryFile {
    fn key_present(&self, key: &str) -> bool {
        let (path, value) = split_key(key);
        match (self.keys.get(&normalize(path)), value) {
            (Some(_), None) => true,
            (Some(names), Some(value)) => names.contains(&value.to_lowercase()),
            (None, _) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("HKLM\\X#Y"), ("HKLM\\X", Some("Y")));
        assert_eq!(split_key("HKLM\\X"), ("HKLM\\X", None));
        assert_eq!(split_key("HKLM\\X#"), ("HKLM\\X", None));
    }

    #[test]
    fn test_key_and_value_presence() {
        let mut store = RegistryFile::new();
        store.set_value("HKLM\\Software\\Vendor\\Runtime", "Version", "4.0");
        store.add_key("HKLM\\Software\\Other");

        assert!(store.key_present("HKLM\\Software\\Vendor\\Runtime"));
        assert!(store.key_present("hklm\\software\\vendor\\runtime#version"));
        assert!(!store.key_present("HKLM\\Software\\Vendor\\Runtime#Missing"));
        assert!(store.key_present("HKLM\\Software\\Other"));
        assert!(!store.key_present("HKLM\\Software\\Other#Anything"));
        assert!(!store.key_present("HKLM\\Software\\Absent"));
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("registry.ini");

        let mut store = RegistryFile::new();
        store.set_value("HKLM\\Software\\Vendor\\Runtime", "Version", "4.0");
        store.add_key("HKCU\\Software\\Marker");
        store.save_to(&path).unwrap();

        let loaded = RegistryFile::load(&path).unwrap();
        assert!(loaded.key_present("HKLM\\Software\\Vendor\\Runtime#Version"));
        assert!(loaded.key_present("HKCU\\Software\\Marker"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = RegistryFile::load(&temp.path().join("absent.ini")).unwrap();
        assert!(!store.key_present("HKLM\\Anything"));
    }
}
