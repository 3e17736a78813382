//! Manifest command - parse a manifest file and list its entries.

use std::path::PathBuf;

use chainboot::config::ConfigFile;
use chainboot::manifest::{load_file, CapacityPolicy, Manifest};
use console::style;

use crate::error::CliError;

/// Arguments for the manifest command.
pub struct ManifestArgs {
    pub file: PathBuf,
    pub max_entries: Option<usize>,
    pub strict: bool,
}

/// Run the manifest command.
pub fn run(args: ManifestArgs, config: &ConfigFile) -> Result<(), CliError> {
    let capacity = args.max_entries.unwrap_or(config.bootstrap.max_entries);
    let policy = if args.strict || config.bootstrap.strict_capacity {
        CapacityPolicy::Reject
    } else {
        CapacityPolicy::Truncate
    };

    let manifest = load_file(&args.file, capacity, policy)?;
    print!("{}", render(&manifest));
    Ok(())
}

fn render(manifest: &Manifest) -> String {
    let mut out = format!(
        "{} ({} entries)\n",
        style(&manifest.source).bold(),
        manifest.len()
    );

    for (index, entry) in manifest.entries.iter().enumerate() {
        out.push_str(&format!(
            "\n{:>3}. {}\n",
            index + 1,
            style(&entry.filename).cyan()
        ));
        let fields = [
            ("name", entry.cosmetic_name.as_deref()),
            ("presence key", entry.registry_key_check.as_deref()),
            ("location", entry.location.as_deref()),
            ("parameters", entry.parameters.as_deref()),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                out.push_str(&format!("     {:<13} {}\n", format!("{}:", label), value));
            }
        }
    }
    out
}
