//! Run command - perform a full bootstrap and launch the engine.
//!
//! The orchestrator runs on a worker thread while the main thread renders
//! progress. Ctrl+C cancels the run cooperatively.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chainboot::config::{BootstrapConfig, ConfigFile};
use chainboot::log::init_logging;
use chainboot::orchestrator::{Collaborators, Orchestrator, RunOutcome, RunSummary};
use chainboot::BootstrapError;
use console::style;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;
use crate::progress::{ConsoleProgress, RENDER_INTERVAL};

/// Arguments for the run command.
#[derive(Debug, Default)]
pub struct RunArgs {
    pub parent: Option<PathBuf>,
    pub servers: Vec<String>,
    pub offline: bool,
    pub install_root: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub locale: Option<String>,
    pub timeout: Option<u64>,
    pub no_progress: bool,
    pub forwarded: Vec<String>,
}

/// Run the bootstrap.
pub fn run(args: RunArgs, file: &ConfigFile) -> Result<(), CliError> {
    let _logging = init_logging(&file.logging).map_err(CliError::Logging)?;
    tracing::info!(version = chainboot::VERSION, "chainboot starting");

    let progress = if args.no_progress {
        ConsoleProgress::hidden()
    } else {
        ConsoleProgress::new()
    };
    let config = build_config(file, args);
    let collaborators = Collaborators::system(&config)?.with_progress(Arc::new(progress.clone()));

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, cancelling...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let worker = thread::Builder::new()
        .name("orchestrator".to_string())
        .spawn(move || Orchestrator::new(config, collaborators, token).run())
        .map_err(CliError::Io)?;

    while !worker.is_finished() {
        progress.tick();
        thread::sleep(RENDER_INTERVAL);
    }
    let result = worker.join().map_err(|_| {
        CliError::Bootstrap(BootstrapError::Internal(
            "orchestrator thread panicked".to_string(),
        ))
    })?;
    progress.finish();

    match result? {
        RunOutcome::Launched(summary) => print_summary(&summary),
        RunOutcome::Cancelled { stage } => {
            println!("{} during {}", style("Cancelled").yellow().bold(), stage);
        }
    }
    Ok(())
}

/// Apply command-line overrides to the configured settings.
fn build_config(file: &ConfigFile, args: RunArgs) -> BootstrapConfig {
    let mut config = BootstrapConfig::from_file(file).with_forwarded_args(args.forwarded);

    if let Some(parent) = args.parent {
        config = config.with_parent_package(parent);
    }
    for server in args.servers {
        config = config.with_server(server);
    }
    if args.offline {
        config = config.with_allow_online(false);
    }
    if let Some(root) = args.install_root {
        config = config.with_install_root(root);
    }
    if let Some(staging) = args.staging_dir {
        config = config.with_staging_dir(staging);
    }
    if let Some(locale) = args.locale {
        config = config.with_locale(Some(locale));
    }
    if let Some(secs) = args.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config
}

fn print_summary(summary: &RunSummary) {
    println!("Manifest: {}", summary.manifest_source);
    for entry in &summary.entries {
        let state = match entry.outcome {
            Some(chainboot::manifest::EntryOutcome::PresenceSatisfied) => style("present").dim(),
            Some(_) => style("installed").green(),
            None => style("pending").yellow(),
        };
        println!("  {:<10} {}", state, entry.display_name());
    }
    if summary.reboot_required {
        println!("{}", style("A reboot is required to finish installation.").yellow());
    }
    println!(
        "Launched {} {} (pid {})",
        summary.engine.path.display(),
        summary.engine.version,
        summary.engine_pid
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let mut file = ConfigFile::default();
        file.bootstrap.servers = vec!["/srv/mirror".to_string()];
        file.download.timeout = 30;

        let config = build_config(
            &file,
            RunArgs {
                parent: Some(PathBuf::from("/media/app/app.pkg")),
                servers: vec!["http://extra.test/".to_string()],
                offline: true,
                install_root: Some(PathBuf::from("/opt/engine")),
                locale: Some("fr-FR".to_string()),
                timeout: Some(5),
                forwarded: vec!["--open".to_string(), "doc.txt".to_string()],
                ..Default::default()
            },
        );

        assert_eq!(
            config.servers,
            vec!["/srv/mirror".to_string(), "http://extra.test/".to_string()]
        );
        assert!(!config.allow_online);
        assert_eq!(config.parent_dir(), Some(PathBuf::from("/media/app")));
        assert_eq!(config.install_root, PathBuf::from("/opt/engine"));
        assert_eq!(config.locale.as_deref(), Some("fr-FR"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.forwarded_args.len(), 2);
    }

    #[test]
    fn test_defaults_come_from_file() {
        let mut file = ConfigFile::default();
        file.bootstrap.allow_online = false;

        let config = build_config(&file, RunArgs::default());

        assert!(!config.allow_online);
        assert!(config.parent_package.is_none());
        assert!(config.forwarded_args.is_empty());
    }
}
