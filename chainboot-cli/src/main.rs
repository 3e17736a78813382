//! Chainboot CLI - Command-line interface
//!
//! Bootstraps an application: loads the component manifest, acquires and
//! verifies each component, installs what is missing and launches the engine.

mod commands;
mod error;
mod progress;

use std::path::PathBuf;

use chainboot::config::config_file_path;
use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::manifest::ManifestArgs;
use commands::run::RunArgs;
use commands::trust::{SignArgs, VerifyArgs};
use error::CliError;

#[derive(Parser)]
#[command(name = "chainboot")]
#[command(about = "Bootstrap installer for chained prerequisite components", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.config/chainboot/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install missing components and launch the engine
    Run {
        /// Parent package the bootstrapper was shipped in
        #[arg(long, value_name = "PATH")]
        parent: Option<PathBuf>,

        /// Additional component server (URL or directory), tried in order
        #[arg(long = "server", value_name = "URL|DIR")]
        servers: Vec<String>,

        /// Never contact network servers
        #[arg(long)]
        offline: bool,

        /// Engine install root
        #[arg(long, value_name = "DIR")]
        install_root: Option<PathBuf>,

        /// Directory for downloaded components
        #[arg(long, value_name = "DIR")]
        staging_dir: Option<PathBuf>,

        /// Locale used for localized manifests (e.g. en-US)
        #[arg(long)]
        locale: Option<String>,

        /// Download timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,

        /// Arguments forwarded to the engine
        #[arg(last = true)]
        forwarded: Vec<String>,
    },

    /// Parse a manifest file and list its entries
    Manifest {
        /// Manifest file
        file: PathBuf,

        /// Maximum number of entries (default: bootstrap.max_entries)
        #[arg(long)]
        max_entries: Option<usize>,

        /// Fail instead of truncating an oversized manifest
        #[arg(long)]
        strict: bool,
    },

    /// Check component signatures against the trusted keys
    Verify {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Additional trusted public key (base64)
        #[arg(long = "key", value_name = "KEY")]
        keys: Vec<String>,
    },

    /// Append a signature to component files
    Sign {
        /// Private signing key (base64)
        #[arg(long, value_name = "KEY")]
        key: String,

        /// Files to sign
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Generate a new signing key pair
    Keygen,

    /// View and modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);

    match cli.command {
        Commands::Run {
            parent,
            servers,
            offline,
            install_root,
            staging_dir,
            locale,
            timeout,
            no_progress,
            forwarded,
        } => {
            let file = commands::load_config(&config_path)?;
            commands::run::run(
                RunArgs {
                    parent,
                    servers,
                    offline,
                    install_root,
                    staging_dir,
                    locale,
                    timeout,
                    no_progress,
                    forwarded,
                },
                &file,
            )
        }
        Commands::Manifest {
            file,
            max_entries,
            strict,
        } => {
            let config = commands::load_config(&config_path)?;
            commands::manifest::run(
                ManifestArgs {
                    file,
                    max_entries,
                    strict,
                },
                &config,
            )
        }
        Commands::Verify { files, keys } => {
            let config = commands::load_config(&config_path)?;
            commands::trust::verify(VerifyArgs { files, keys }, &config)
        }
        Commands::Sign { key, files } => commands::trust::sign(SignArgs { key, files }),
        Commands::Keygen => commands::trust::keygen(),
        Commands::Config { command } => commands::config::run(command, &config_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_forwards_trailing_args() {
        let cli = Cli::try_parse_from([
            "chainboot",
            "run",
            "--server",
            "http://a.test/",
            "--server",
            "/mnt/media",
            "--offline",
            "--",
            "--open",
            "doc.txt",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                servers,
                offline,
                forwarded,
                ..
            } => {
                assert_eq!(servers, vec!["http://a.test/", "/mnt/media"]);
                assert!(offline);
                assert_eq!(forwarded, vec!["--open", "doc.txt"]);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["chainboot", "config", "path", "--config", "/tmp/c.ini"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.ini")));
    }
}
