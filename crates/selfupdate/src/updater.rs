//! Updater - the caller-facing entry points.
//!
//! Combines the manifest fetcher and the download pipeline:
//! 1. `check_for_update` fetches the manifest and compares versions
//! 2. `download_update` / `spawn_download` stage and verify the files
//!
//! Installing the staged files and relaunching are left to the caller.

use std::sync::Arc;

use crate::version::Version;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::UpdateConfig;
use crate::error::UpdateError;
use crate::fetch::ManifestFetcher;
use crate::manifest::UpdateManifest;
use crate::pipeline::{DownloadHandle, DownloadPipeline, DownloadReport};
use crate::transport::{build_client, HttpTransport, Transport};

/// Checks for and downloads updates.
///
/// # Example
///
/// ```ignore
/// use selfupdate::{UpdateConfig, Updater};
///
/// let updater = Updater::new(UpdateConfig::default())?;
/// let local = selfupdate::Version::new(1, 0, 0);
///
/// if let Some(manifest) = updater
///     .check_for_update("https://example.com/updates.json", "com.example.app", &local)
///     .await?
/// {
///     let report = updater.download_update(&manifest).await?;
///     if report.is_success() {
///         // move report.staged_files() into place, then relaunch
///     } else {
///         report.discard()?;
///     }
/// }
/// ```
pub struct Updater {
    config: UpdateConfig,
    fetcher: ManifestFetcher,
    pipeline: DownloadPipeline,
}

impl Updater {
    /// Create an updater that downloads over HTTP(S).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: UpdateConfig) -> Result<Self, UpdateError> {
        let client = build_client(&config.network)?;
        let transport = Arc::new(HttpTransport::with_client(client.clone()));
        let fetcher = ManifestFetcher::with_client(client);
        Ok(Self::assemble(config, fetcher, transport))
    }

    /// Create an updater with a custom download transport.
    pub fn with_transport(
        config: UpdateConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, UpdateError> {
        let fetcher = ManifestFetcher::new(&config.network)?;
        Ok(Self::assemble(config, fetcher, transport))
    }

    fn assemble(
        config: UpdateConfig,
        fetcher: ManifestFetcher,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let pipeline = DownloadPipeline::new(transport, config.staging.root());
        Self {
            config,
            fetcher,
            pipeline,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Get the download pipeline.
    pub fn pipeline(&self) -> &DownloadPipeline {
        &self.pipeline
    }

    /// Probe whether the manifest at `manifest_url` is reachable.
    pub async fn manifest_exists(&self, manifest_url: &str) -> bool {
        self.fetcher.exists(manifest_url).await
    }

    /// Check for an update newer than `local_version`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(manifest))` if the manifest lists a strictly newer version
    /// - `Ok(None)` if there is no record for `app_id`, or it is not newer
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be retrieved or parsed.
    pub async fn check_for_update(
        &self,
        manifest_url: &str,
        app_id: &str,
        local_version: &Version,
    ) -> Result<Option<UpdateManifest>, UpdateError> {
        info!(app_id, current = %local_version, "Checking for updates");

        let Some(manifest) = self.fetcher.parse(manifest_url, app_id).await? else {
            return Ok(None);
        };

        if manifest.is_newer_than(local_version) {
            info!(
                "Update available: {} -> {}",
                local_version,
                manifest.version()
            );
            Ok(Some(manifest))
        } else {
            info!(
                "No update available (current: {}, latest: {})",
                local_version,
                manifest.version()
            );
            Ok(None)
        }
    }

    /// Download and verify a manifest's files on the current task.
    ///
    /// Progress events are discarded; use [`spawn_download`](Self::spawn_download)
    /// to observe them or to cancel.
    pub async fn download_update(
        &self,
        manifest: &UpdateManifest,
    ) -> Result<DownloadReport, UpdateError> {
        let (tx, _rx) = mpsc::unbounded_channel();
        self.pipeline
            .run(manifest.files(), &tx, &CancellationToken::new())
            .await
    }

    /// Download and verify a manifest's files on a background task.
    pub fn spawn_download(&self, manifest: &UpdateManifest) -> DownloadHandle {
        info!(version = %manifest.version(), files = manifest.files().len(), "Downloading update");
        self.pipeline.spawn(manifest.files().to_vec())
    }
}
