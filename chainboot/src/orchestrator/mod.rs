//! Install orchestration.
//!
//! A run moves through a fixed sequence of stages:
//!
//! ```text
//! Init → LoadManifest → ResolveEntry × N → InstallEntry × N → Finalize → Launch → Terminal
//! ```
//!
//! Every entry is resolved before the first one is installed, and entries
//! are installed in manifest order. Each entry is a hard prerequisite, so the
//! first failure ends the run. Cancellation is cooperative: the token is
//! checked at every loop head and before each blocking call, and a cancelled
//! run ends with [`RunOutcome::Cancelled`] rather than an error.

mod collaborators;

pub use collaborators::Collaborators;

use std::fs;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::chain::{ChainChannel, ChainMonitor, ChainProgress, CHANNEL_ENV};
use crate::config::BootstrapConfig;
use crate::engine::{find_latest_engine, EngineLocation};
use crate::error::{BootstrapError, BootstrapResult};
use crate::fetch::TransferProgress;
use crate::installer::{expand_args, ArtifactKind, InstallStatus};
use crate::manifest::{EntryOutcome, ManifestEntry, ManifestLoader};
use crate::resolver::{Resolution, SourceResolver};

/// Share of overall progress spent resolving.
const RESOLVE_SHARE: u32 = 40;

/// Share of overall progress spent installing.
const INSTALL_SHARE: u32 = 50;

/// Overall progress once the engine has been activated.
const FINALIZE_PERCENT: u8 = 95;

/// Blended chain progress tops out here.
const CHAIN_PROGRESS_MAX: u32 = 85;

/// Stage of a bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    LoadManifest,
    /// Resolving the entry at this index.
    ResolveEntry(usize),
    /// Installing the entry at this index.
    InstallEntry(usize),
    Finalize,
    Launch,
    Terminal,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::LoadManifest => f.write_str("load-manifest"),
            Self::ResolveEntry(index) => write!(f, "resolve-entry[{}]", index),
            Self::InstallEntry(index) => write!(f, "install-entry[{}]", index),
            Self::Finalize => f.write_str("finalize"),
            Self::Launch => f.write_str("launch"),
            Self::Terminal => f.write_str("terminal"),
        }
    }
}

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Where the manifest came from.
    pub manifest_source: String,
    /// Manifest entries with their outcomes.
    pub entries: Vec<ManifestEntry>,
    /// The engine that was launched.
    pub engine: EngineLocation,
    /// Process id of the launched engine.
    pub engine_pid: u32,
    /// Some installer asked for a reboot.
    pub reboot_required: bool,
}

impl RunSummary {
    /// Number of entries installed by this run (not presence-satisfied).
    pub fn installed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| {
                e.is_installed && e.outcome != Some(EntryOutcome::PresenceSatisfied)
            })
            .count()
    }
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The engine was launched.
    Launched(RunSummary),
    /// The run was cancelled during `stage`.
    Cancelled { stage: Stage },
}

enum Flow {
    Continue,
    Cancelled,
}

/// Drives one bootstrap run.
pub struct Orchestrator {
    config: BootstrapConfig,
    collaborators: Collaborators,
    token: CancellationToken,
    stage: Stage,
    reboot_required: bool,
    created_staging: bool,
}

impl Orchestrator {
    pub fn new(
        config: BootstrapConfig,
        collaborators: Collaborators,
        token: CancellationToken,
    ) -> Self {
        Self {
            config,
            collaborators,
            token,
            stage: Stage::Init,
            reboot_required: false,
            created_staging: false,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The configuration this run uses.
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Execute the run to completion, failure or cancellation.
    ///
    /// A staging directory created by the run is removed afterwards.
    pub fn run(&mut self) -> BootstrapResult<RunOutcome> {
        let result = self.run_stages();
        self.remove_staging();

        match &result {
            Ok(RunOutcome::Launched(summary)) => {
                tracing::info!(
                    engine = %summary.engine.path.display(),
                    version = %summary.engine.version,
                    installed = summary.installed_count(),
                    "Bootstrap complete"
                );
            }
            Ok(RunOutcome::Cancelled { stage }) => {
                tracing::info!(stage = %stage, "Bootstrap cancelled");
            }
            Err(e) => {
                tracing::error!(stage = %self.stage, exit_code = e.exit_code(), error = %e, "Bootstrap failed");
            }
        }
        result
    }

    fn run_stages(&mut self) -> BootstrapResult<RunOutcome> {
        self.prepare_staging()?;

        self.enter(Stage::LoadManifest);
        if self.token.is_cancelled() {
            return Ok(self.cancelled());
        }
        let progress = self.collaborators.progress.clone();
        progress.set_large_message("Reading bootstrap manifest");
        let manifest = ManifestLoader::new(
            &self.config,
            self.collaborators.fetcher.as_ref(),
            self.collaborators.parent.as_deref(),
        )
        .load()?;
        let manifest_source = manifest.source.clone();
        let mut entries = manifest.entries;

        if let Flow::Cancelled = self.resolve_all(&mut entries)? {
            return Ok(self.cancelled());
        }
        if let Flow::Cancelled = self.install_all(&mut entries)? {
            return Ok(self.cancelled());
        }

        self.enter(Stage::Finalize);
        if self.token.is_cancelled() {
            return Ok(self.cancelled());
        }
        self.finalize();
        progress.set_progress(FINALIZE_PERCENT);

        self.enter(Stage::Launch);
        if self.token.is_cancelled() {
            return Ok(self.cancelled());
        }
        let (engine, engine_pid) = self.launch()?;
        progress.set_progress(100);

        self.enter(Stage::Terminal);
        Ok(RunOutcome::Launched(RunSummary {
            manifest_source,
            entries,
            engine,
            engine_pid,
            reboot_required: self.reboot_required,
        }))
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "Stage transition");
        self.stage = stage;
    }

    fn cancelled(&mut self) -> RunOutcome {
        let stage = self.stage;
        self.collaborators.progress.set_status_message("Cancelled");
        self.enter(Stage::Terminal);
        RunOutcome::Cancelled { stage }
    }

    fn prepare_staging(&mut self) -> BootstrapResult<()> {
        let path = &self.config.staging_dir;
        if !path.is_dir() {
            fs::create_dir_all(path).map_err(|source| BootstrapError::StagingUnavailable {
                path: path.clone(),
                source,
            })?;
            self.created_staging = true;
        }
        tracing::debug!(staging = %path.display(), "Staging directory ready");
        Ok(())
    }

    fn remove_staging(&mut self) {
        if !self.created_staging {
            return;
        }
        self.created_staging = false;
        if let Err(e) = fs::remove_dir_all(&self.config.staging_dir) {
            tracing::warn!(staging = %self.config.staging_dir.display(), error = %e, "Failed to remove staging directory");
        }
    }

    /// Whether the forced-reinstall marker disables presence skipping.
    fn force_reinstall(&self) -> bool {
        match &self.config.force_reinstall_key {
            Some(key) if self.collaborators.presence.key_present(key) => {
                tracing::info!(key = %key, "Forced reinstall requested, ignoring presence checks");
                true
            }
            _ => false,
        }
    }

    fn resolve_all(&mut self, entries: &mut [ManifestEntry]) -> BootstrapResult<Flow> {
        let force = self.force_reinstall();
        let total = entries.len();
        let progress = self.collaborators.progress.clone();
        progress.set_large_message("Locating components");

        for (index, entry) in entries.iter_mut().enumerate() {
            if self.token.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            self.enter(Stage::ResolveEntry(index));

            let flow = self.resolve_entry(entry, force, index, total);
            progress.set_progress(scaled(0, RESOLVE_SHARE, index + 1, total));
            if let Flow::Cancelled = flow? {
                return Ok(Flow::Cancelled);
            }
        }
        Ok(Flow::Continue)
    }

    fn resolve_entry(
        &self,
        entry: &mut ManifestEntry,
        force: bool,
        index: usize,
        total: usize,
    ) -> BootstrapResult<Flow> {
        if let Some(key) = entry.registry_key_check.as_deref() {
            if !force && self.collaborators.presence.key_present(key) {
                tracing::info!(entry = %entry.filename, key, "Already installed, skipping");
                entry.mark_installed(EntryOutcome::PresenceSatisfied);
                return Ok(Flow::Continue);
            }
        }

        let progress = self.collaborators.progress.as_ref();
        progress.set_status_message(&format!("Locating {}", entry.display_name()));

        let start = scaled(0, RESOLVE_SHARE, index, total);
        let end = scaled(0, RESOLVE_SHARE, index + 1, total);
        let on_transfer = |transfer: TransferProgress| {
            if let TransferProgress::Percent(percent) = transfer {
                progress.set_progress(blend(start, end, u32::from(percent), 100));
            }
        };

        let resolver = SourceResolver::new(
            &self.config,
            self.collaborators.trust.as_ref(),
            self.collaborators.fetcher.as_ref(),
            self.collaborators.parent.as_deref(),
            self.token.clone(),
        );

        match resolver.resolve(&entry.filename, entry.location.as_deref(), &on_transfer) {
            Resolution::Found(path) => {
                entry.local_path = Some(path);
                Ok(Flow::Continue)
            }
            Resolution::NotFound { rejected: 0 } => Err(BootstrapError::DownloadFailed {
                filename: entry.filename.clone(),
                location: location_label(entry),
            }),
            Resolution::NotFound { rejected } => Err(BootstrapError::SignatureInvalid {
                filename: entry.filename.clone(),
                location: location_label(entry),
                rejected,
            }),
            Resolution::Cancelled => Ok(Flow::Cancelled),
        }
    }

    fn install_all(&mut self, entries: &mut [ManifestEntry]) -> BootstrapResult<Flow> {
        let total = entries.len();
        let progress = self.collaborators.progress.clone();
        progress.set_large_message("Installing components");

        for (index, entry) in entries.iter_mut().enumerate() {
            if self.token.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            self.enter(Stage::InstallEntry(index));

            let flow = self.install_entry(entry, index, total);
            progress.set_progress(scaled(RESOLVE_SHARE, INSTALL_SHARE, index + 1, total));
            if let Flow::Cancelled = flow? {
                return Ok(Flow::Cancelled);
            }
        }
        Ok(Flow::Continue)
    }

    fn install_entry(
        &mut self,
        entry: &mut ManifestEntry,
        index: usize,
        total: usize,
    ) -> BootstrapResult<Flow> {
        if entry.is_installed {
            tracing::debug!(entry = %entry.filename, "Already satisfied");
            return Ok(Flow::Continue);
        }

        let Some(path) = entry.local_path.clone() else {
            return Err(BootstrapError::Internal(format!(
                "{} reached installation without a resolved copy",
                entry.filename
            )));
        };

        let progress = self.collaborators.progress.clone();
        progress.set_status_message(&format!("Installing {}", entry.display_name()));
        let start = scaled(RESOLVE_SHARE, INSTALL_SHARE, index, total);
        let end = scaled(RESOLVE_SHARE, INSTALL_SHARE, index + 1, total);

        if self.is_chain_component(&entry.filename) {
            return self.install_chained(entry, &path, start, end);
        }

        let kind = ArtifactKind::from_filename(&entry.filename).ok_or_else(|| {
            BootstrapError::UnknownComponentType {
                filename: entry.filename.clone(),
            }
        })?;

        let (status, outcome) = match kind {
            ArtifactKind::Executable => {
                let args = self.entry_args(entry, &self.config.default_exe_params)?;
                tracing::info!(entry = %entry.filename, ?args, "Running installer");
                let code = self
                    .collaborators
                    .runner
                    .run(&path, &args)
                    .map_err(|source| BootstrapError::LaunchFailed {
                        program: path.clone(),
                        source,
                    })?;
                (InstallStatus(code), EntryOutcome::InstalledViaExe)
            }
            ArtifactKind::Package => {
                let args = self.entry_args(entry, &self.config.default_package_params)?;
                tracing::info!(entry = %entry.filename, ?args, "Installing package");
                let hook = |percent: u8| {
                    progress.set_progress(blend(start, end, u32::from(percent), 100));
                };
                let status = self
                    .collaborators
                    .package_manager
                    .install(&path, &args, &hook)
                    .map_err(|source| BootstrapError::LaunchFailed {
                        program: PathBuf::from(&self.config.package_manager),
                        source,
                    })?;
                (status, EntryOutcome::InstalledViaPackage)
            }
        };

        self.record_status(entry, status)?;
        entry.mark_installed(outcome);
        Ok(Flow::Continue)
    }

    fn install_chained(
        &mut self,
        entry: &mut ManifestEntry,
        path: &Path,
        start: u8,
        end: u8,
    ) -> BootstrapResult<Flow> {
        let channel_path = self
            .config
            .staging_dir
            .join(format!("chain-{}.bin", std::process::id()));
        let channel = ChainChannel::create(&channel_path).map_err(|source| {
            BootstrapError::StagingUnavailable {
                path: channel_path.clone(),
                source,
            }
        })?;
        let channel_arg = channel_path.to_string_lossy().to_string();

        let mut args = self.entry_args(entry, &self.config.default_exe_params)?;
        let chain_args = expand_args(&self.config.chain_args, &[("channel", &channel_arg)])
            .map_err(|reason| {
                BootstrapError::Internal(format!("invalid chain arguments: {}", reason))
            })?;
        args.extend(chain_args);
        let env = [(CHANNEL_ENV.to_string(), channel_arg)];

        tracing::info!(entry = %entry.filename, ?args, "Starting chained installer");
        let mut child = match self.collaborators.runner.spawn(path, &args, &env) {
            Ok(child) => child,
            Err(source) => {
                release_channel(channel);
                return Err(BootstrapError::LaunchFailed {
                    program: path.to_path_buf(),
                    source,
                });
            }
        };

        let progress = self.collaborators.progress.clone();
        let mut on_progress = |update: &ChainProgress| {
            if !update.step.is_empty() {
                progress.set_status_message(&update.step);
            }
            progress.set_progress(blend(
                start,
                end,
                u32::from(update.percent),
                CHAIN_PROGRESS_MAX,
            ));
        };
        let result = ChainMonitor::new(&channel, self.token.clone())
            .monitor(child.as_mut(), &mut on_progress);
        release_channel(channel);

        tracing::info!(
            entry = %entry.filename,
            pid = child.id(),
            result = %format!("{:#010x}", result.code),
            crashed = result.crashed,
            aborted = result.aborted,
            "Chained installer finished"
        );

        if result.aborted {
            return Ok(Flow::Cancelled);
        }

        let status = InstallStatus(result.code);
        if !status.is_success() {
            return Err(BootstrapError::ChainFailed {
                filename: entry.filename.clone(),
                result: result.code,
            });
        }
        self.reboot_required |= status.reboot_required();
        entry.mark_installed(EntryOutcome::InstalledViaChain);
        Ok(Flow::Continue)
    }

    fn record_status(&mut self, entry: &ManifestEntry, status: InstallStatus) -> BootstrapResult<()> {
        if !status.is_success() {
            return Err(BootstrapError::InstallFailed {
                filename: entry.filename.clone(),
                status: status.code(),
            });
        }
        if status.reboot_required() {
            tracing::info!(entry = %entry.filename, "Installer requested a reboot");
            self.reboot_required = true;
        }
        Ok(())
    }

    fn is_chain_component(&self, filename: &str) -> bool {
        self.config
            .chain_component
            .as_deref()
            .is_some_and(|chain| chain.eq_ignore_ascii_case(filename))
    }

    /// Manifest parameters, or `default`, with `{install_root}` filled in.
    fn entry_args(&self, entry: &ManifestEntry, default: &str) -> BootstrapResult<Vec<String>> {
        let template = entry.parameters.as_deref().unwrap_or(default);
        let root = self.config.install_root.to_string_lossy();
        expand_args(template, &[("install_root", &root)]).map_err(|reason| {
            BootstrapError::Internal(format!(
                "invalid parameters for {}: {}",
                entry.filename, reason
            ))
        })
    }

    /// Activate the newest installed engine. Failures are logged, not fatal.
    fn finalize(&self) {
        let Some(engine) = find_latest_engine(&self.config.install_root, &self.config.engine_name)
        else {
            tracing::debug!(root = %self.config.install_root.display(), "No engine to activate");
            return;
        };

        self.collaborators
            .progress
            .set_status_message(&format!("Activating {}", engine.version));

        let root = self.config.install_root.to_string_lossy();
        let args = match expand_args(&self.config.activate_args, &[("install_root", &root)]) {
            Ok(args) => args,
            Err(reason) => {
                tracing::warn!(%reason, "Invalid activation arguments");
                return;
            }
        };

        match self.collaborators.runner.run(&engine.path, &args) {
            Ok(0) => {
                tracing::info!(engine = %engine.path.display(), version = %engine.version, "Engine activated")
            }
            Ok(code) => {
                tracing::warn!(engine = %engine.path.display(), exit_code = code, "Engine activation reported failure")
            }
            Err(e) => {
                tracing::warn!(engine = %engine.path.display(), error = %e, "Engine activation failed to start")
            }
        }
    }

    fn launch(&self) -> BootstrapResult<(EngineLocation, u32)> {
        let engine = find_latest_engine(&self.config.install_root, &self.config.engine_name)
            .ok_or_else(|| BootstrapError::EngineNotFunctioning {
                engine: self.config.engine_name.clone(),
                root: self.config.install_root.clone(),
            })?;

        self.collaborators
            .progress
            .set_status_message(&format!("Starting {}", self.config.engine_name));

        let child = self
            .collaborators
            .runner
            .spawn(&engine.path, &self.config.forwarded_args, &[])
            .map_err(|source| BootstrapError::EngineLaunchFailed {
                program: engine.path.clone(),
                source,
            })?;
        let pid = child.id();

        tracing::info!(engine = %engine.path.display(), version = %engine.version, pid, "Engine launched");
        Ok((engine, pid))
    }
}

fn location_label(entry: &ManifestEntry) -> String {
    entry
        .location
        .clone()
        .unwrap_or_else(|| "configured sources".to_string())
}

fn release_channel(channel: ChainChannel) {
    let path = channel.path().to_path_buf();
    if let Err(e) = channel.remove() {
        tracing::warn!(channel = %path.display(), error = %e, "Failed to remove chain channel");
    }
}

/// `done` of `total` steps mapped into `[offset, offset + share]`.
fn scaled(offset: u32, share: u32, done: usize, total: usize) -> u8 {
    let fraction = if total == 0 {
        share
    } else {
        (share as usize * done.min(total) / total) as u32
    };
    (offset + fraction).min(100) as u8
}

/// `value` of `max` mapped into `[start, end]`.
fn blend(start: u8, end: u8, value: u32, max: u32) -> u8 {
    let span = u32::from(end.saturating_sub(start));
    let value = value.min(max);
    (u32::from(start) + span * value / max.max(1)).min(100) as u8
}
