//! Manifest retrieval.
//!
//! Fetches manifest documents over HTTP(S) and hands them to
//! [`parse_document`]. Certificates are validated by the client; there is no
//! option to accept arbitrary server certificates.

use futures_util::StreamExt;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::error::UpdateError;
use crate::manifest::{parse_document, UpdateManifest};
use crate::transport::build_client;

/// Default upper bound on a manifest document's size (4 MiB).
pub const DEFAULT_MAX_MANIFEST_BYTES: u64 = 4 * 1024 * 1024;

/// Retrieves and parses update manifests.
#[derive(Debug, Clone)]
pub struct ManifestFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl ManifestFetcher {
    /// Create a fetcher with the given network settings.
    pub fn new(config: &NetworkConfig) -> Result<Self, UpdateError> {
        Ok(Self::with_client(build_client(config)?))
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: DEFAULT_MAX_MANIFEST_BYTES,
        }
    }

    /// Set the largest manifest document the fetcher will read.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Probe whether a manifest is reachable.
    ///
    /// Returns true only for a `200 OK` answer. Transport errors, timeouts,
    /// and any other status all yield false.
    pub async fn exists(&self, location: &str) -> bool {
        match self.client.get(location).send().await {
            Ok(response) => {
                let status = response.status();
                debug!(url = location, status = status.as_u16(), "Manifest probe");
                status == StatusCode::OK
            }
            Err(e) => {
                debug!(url = location, error = %e, "Manifest probe failed");
                false
            }
        }
    }

    /// Fetch raw bytes from a URL into memory.
    ///
    /// Suitable for small documents like manifests.
    pub async fn fetch(&self, location: &str) -> Result<Vec<u8>, UpdateError> {
        debug!(url = location, "Fetching manifest");

        let response = self.client.get(location).send().await?;

        if !response.status().is_success() {
            return Err(UpdateError::DownloadFailed {
                status: response.status().as_u16(),
            });
        }

        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            warn!(url = location, limit = self.max_bytes, "Manifest exceeds size limit");
            return Err(UpdateError::ManifestTooLarge { limit: self.max_bytes });
        }

        // Content-Length may be absent
        let mut data = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if data.len() as u64 + chunk.len() as u64 > self.max_bytes {
                warn!(url = location, limit = self.max_bytes, "Manifest exceeds size limit");
                return Err(UpdateError::ManifestTooLarge { limit: self.max_bytes });
            }
            data.extend_from_slice(&chunk);
        }

        debug!(url = location, bytes = data.len(), "Fetched manifest");
        Ok(data)
    }

    /// Fetch the manifest at `location` and extract the record for `app_id`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(manifest))` if the document has a valid record for `app_id`
    /// - `Ok(None)` if the document has no record for `app_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be retrieved, is not a valid
    /// document, or the matching record is malformed.
    pub async fn parse(
        &self,
        location: &str,
        app_id: &str,
    ) -> Result<Option<UpdateManifest>, UpdateError> {
        let data = self.fetch(location).await.map_err(|e| {
            warn!(url = location, error = %e, "Failed to retrieve manifest");
            e
        })?;

        let manifest = parse_document(&data, app_id)?;
        match &manifest {
            Some(m) => info!(url = location, app_id, version = %m.version(), "Manifest found"),
            None => info!(url = location, app_id, "No update listed for application"),
        }
        Ok(manifest)
    }
}
