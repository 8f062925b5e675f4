//! # selfupdate
//!
//! Self-update client: finds an application's update in a manifest document,
//! downloads its files, and verifies them so the caller can swap in the new
//! version and relaunch.
//!
//! This crate handles:
//! - Manifest retrieval and parsing, keyed by application identifier
//! - Version gating (only strictly newer versions are offered)
//! - Sequential artifact download into a per-attempt staging directory
//! - SHA-256 content digest verification
//! - Progress events over a channel and cancellation from any thread
//!
//! ## Outcomes
//!
//! A download attempt always ends in exactly one [`DownloadOutcome`]:
//! `Succeeded`, `IntegrityFailed`, `TransportFailed`, or `Cancelled`. A
//! partially downloaded or partially verified update is never reported as a
//! success. Staged files stay on disk until the caller installs or discards
//! them.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod pipeline;
pub mod progress;
#[cfg(test)]
mod proptests;
#[cfg(test)]
mod test_support;
pub mod transport;
pub mod updater;
pub mod verify;
pub mod version;

// Re-export main types for convenience
pub use config::{LoggingConfig, NetworkConfig, StagingConfig, UpdateConfig};
pub use error::UpdateError;
pub use fetch::ManifestFetcher;
pub use manifest::{parse_document, FileEntry, UpdateManifest};
pub use pipeline::{
    DownloadEvent, DownloadHandle, DownloadOutcome, DownloadPipeline, DownloadReport,
    PipelineState,
};
pub use progress::{format_bytes, DownloadProgress};
pub use transport::{HttpTransport, ProgressSink, Transport};
pub use updater::Updater;
pub use verify::DigestVerifier;
pub use version::{parse_version, Version};
