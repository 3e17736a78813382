//! Manifest text decoding and parsing.
//!
//! A manifest is line oriented. Lines are split on `\r` or `\n`; a line is an
//! entry only if its first character is alphanumeric, so blank lines and
//! comments (`#`, `;`, leading whitespace) are skipped. Fields are
//! comma separated in the order
//!
//! ```text
//! filename, registry key check, location, cosmetic name, parameters
//! ```
//!
//! Trailing fields may be omitted and empty fields are unset. Anything after
//! the fourth comma belongs to the parameters. A filename that is a path
//! (separators, `..`, a drive prefix) fails the whole manifest.

use super::{is_plain_file_name, ManifestEntry, ManifestError};

/// Fields before the free-form parameters.
const POSITIONAL_FIELDS: usize = 4;

/// What to do when a manifest lists more entries than allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapacityPolicy {
    /// Keep the first entries and warn about the rest.
    #[default]
    Truncate,
    /// Fail the whole manifest.
    Reject,
}

/// Decode raw manifest bytes.
///
/// UTF-16 (either byte order) and UTF-8 are recognized by their byte-order
/// mark; anything else is read as a single-byte Latin-1 document.
pub fn decode_manifest(bytes: &[u8]) -> String {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Parse decoded manifest text into at most `capacity` entries.
pub fn parse_manifest(
    text: &str,
    capacity: usize,
    policy: CapacityPolicy,
) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut entries = Vec::new();
    let mut dropped = 0usize;

    for line in text.split(['\r', '\n']) {
        let Some(entry) = parse_line(line) else {
            continue;
        };

        // Entry names are joined onto staging and server paths.
        if !is_plain_file_name(&entry.filename) {
            return Err(ManifestError::UnsafeFilename {
                filename: entry.filename,
            });
        }

        if entries.len() >= capacity {
            if policy == CapacityPolicy::Reject {
                return Err(ManifestError::TooManyEntries { capacity });
            }
            dropped += 1;
            continue;
        }

        entries.push(entry);
    }

    if dropped > 0 {
        tracing::warn!(capacity, dropped, "Manifest exceeds capacity, extra entries ignored");
    }

    Ok(entries)
}

/// Parse one line, or `None` if it is not an entry.
pub fn parse_line(line: &str) -> Option<ManifestEntry> {
    if !line.chars().next()?.is_alphanumeric() {
        return None;
    }

    let mut fields = line.splitn(POSITIONAL_FIELDS + 1, ',').map(clean);

    let filename = fields.next().flatten()?;
    let mut entry = ManifestEntry::new(filename);
    entry.registry_key_check = fields.next().flatten();
    entry.location = fields.next().flatten();
    entry.cosmetic_name = fields.next().flatten();
    entry.parameters = fields.next().flatten();

    Some(entry)
}

fn clean(field: &str) -> Option<String> {
    let trimmed = field.trim_matches(|c: char| c.is_whitespace() || c == '\r' || c == '\n');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_line_example() {
        let text = "foo.msi,, http://a.test/,Foo Component,\r\n\
                    bar.exe,HKLM\\X#Y,http://b.test/,Bar,/silent";
        let entries = parse_manifest(text, 128, CapacityPolicy::Truncate).unwrap();

        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].filename, "foo.msi");
        assert_eq!(entries[0].registry_key_check, None);
        assert_eq!(entries[0].location.as_deref(), Some("http://a.test/"));
        assert_eq!(entries[0].cosmetic_name.as_deref(), Some("Foo Component"));
        assert_eq!(entries[0].parameters, None);

        assert_eq!(entries[1].filename, "bar.exe");
        assert_eq!(entries[1].registry_key_check.as_deref(), Some("HKLM\\X#Y"));
        assert_eq!(entries[1].location.as_deref(), Some("http://b.test/"));
        assert_eq!(entries[1].cosmetic_name.as_deref(), Some("Bar"));
        assert_eq!(entries[1].parameters.as_deref(), Some("/silent"));
    }

    #[test]
    fn test_path_filename_fails_manifest() {
        let text = "ok.msi\nsub/../../victim.txt,,http://bad.test/,X,\n";
        let err = parse_manifest(text, 128, CapacityPolicy::Truncate).unwrap_err();
        assert_eq!(
            err,
            ManifestError::UnsafeFilename {
                filename: "sub/../../victim.txt".to_string()
            }
        );
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let text = "# comment\n\n   indented.msi\n;other\nreal.msi\n\tTabbed.exe";
        let entries = parse_manifest(text, 128, CapacityPolicy::Truncate).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "real.msi");
    }

    #[test]
    fn test_short_lines_leave_fields_unset() {
        let entry = parse_line("only.msi").unwrap();
        assert_eq!(entry.filename, "only.msi");
        assert!(entry.registry_key_check.is_none());
        assert!(entry.location.is_none());
        assert!(entry.cosmetic_name.is_none());
        assert!(entry.parameters.is_none());
        assert!(!entry.is_installed);
        assert!(entry.local_path.is_none());
    }

    #[test]
    fn test_parameters_keep_commas() {
        let entry = parse_line("x.msi,,,X,PROP=a,b /quiet").unwrap();
        assert_eq!(entry.parameters.as_deref(), Some("PROP=a,b /quiet"));
    }

    #[test]
    fn test_truncate_at_capacity() {
        let text = "a.msi\nb.msi\nc.msi\nd.msi";
        let entries = parse_manifest(text, 2, CapacityPolicy::Truncate).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["a.msi", "b.msi"]);
    }

    #[test]
    fn test_reject_at_capacity() {
        let text = "a.msi\nb.msi\nc.msi";
        let result = parse_manifest(text, 2, CapacityPolicy::Reject);
        assert!(matches!(
            result,
            Err(ManifestError::TooManyEntries { capacity: 2 })
        ));
        assert_eq!(
            parse_manifest("a.msi\nb.msi", 2, CapacityPolicy::Reject)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_decode_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "a.msi,,,Ä".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_manifest(&bytes), "a.msi,,,Ä");
    }

    #[test]
    fn test_decode_utf16be_with_bom() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "b.exe".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_manifest(&bytes), "b.exe");
    }

    #[test]
    fn test_decode_utf8_bom_and_latin1() {
        assert_eq!(decode_manifest(b"\xEF\xBB\xBFc.msi"), "c.msi");
        assert_eq!(decode_manifest(b"caf\xE9.msi"), "café.msi");
    }

    proptest! {
        #[test]
        fn prop_comment_or_indented_lines_never_parse(
            lead in prop::sample::select(vec!['#', ' ', '\t', ';', '-']),
            rest in "[ -~]{0,40}",
        ) {
            let line = format!("{}{}", lead, rest);
            prop_assert!(parse_line(&line).is_none());
        }

        #[test]
        fn prop_entry_count_never_exceeds_capacity(
            names in prop::collection::vec("[a-z][a-z0-9]{0,8}\\.msi", 0..40),
            capacity in 0usize..20,
        ) {
            let text = names.join("\n");
            let entries = parse_manifest(&text, capacity, CapacityPolicy::Truncate).unwrap();
            prop_assert_eq!(entries.len(), names.len().min(capacity));
            for (entry, name) in entries.iter().zip(&names) {
                prop_assert_eq!(&entry.filename, name);
            }
        }
    }
}
