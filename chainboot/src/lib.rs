//! Chainboot - prerequisite bootstrap installer
//!
//! This library provides the acquisition-and-installation core used by the
//! `chainboot` binary: it loads a bootstrap manifest, resolves every listed
//! component through an ordered set of fallback sources, refuses anything
//! that fails signature verification, installs what is missing and finally
//! activates and launches the installed engine.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator ──► ManifestLoader ──► parse_manifest
//!      │
//!      ├──► SourceResolver ──► TrustGate
//!      │         └──► Fetcher / ParentPackage
//!      │
//!      ├──► PackageManager / ProcessRunner
//!      │
//!      └──► ChainMonitor ──► ChainChannel (shared with the chained child)
//! ```
//!
//! Every external collaborator (HTTP transport, package manager, presence
//! lookups, progress UI, process launching) sits behind a trait so the
//! orchestrator can be driven entirely by in-memory fakes in tests.

pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod installer;
pub mod log;
pub mod manifest;
pub mod orchestrator;
pub mod package;
pub mod presence;
pub mod progress;
pub mod resolver;
pub mod trust;

/// Library version, as recorded in Cargo metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::{BootstrapError, BootstrapResult};
