//! Byte transfer for update artifacts.
//!
//! The pipeline drives downloads through the [`Transport`] trait so it can be
//! exercised without a network. [`HttpTransport`] is the production
//! implementation on top of `reqwest`, with normal TLS certificate
//! validation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Url;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::error::UpdateError;

/// Progress sink handed to a transfer: `(bytes_received, total_bytes)`.
///
/// `total_bytes` is zero when the length is unknown.
pub type ProgressSink<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Moves the bytes at a URL into a local file.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download `url` into `dest`, creating or truncating it.
    ///
    /// Implementations report progress through `progress` as bytes arrive and
    /// must stop with `UpdateError::Cancelled` once `cancel` fires.
    ///
    /// Returns the number of bytes written.
    async fn download(
        &self,
        url: &Url,
        dest: &Path,
        progress: ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, UpdateError>;
}

/// Build the HTTP client shared by manifest fetches and downloads.
pub fn build_client(config: &NetworkConfig) -> Result<reqwest::Client, UpdateError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .read_timeout(Duration::from_secs(config.read_timeout_secs))
        .user_agent(&config.user_agent)
        .build()?;
    Ok(client)
}

/// HTTP(S) transport streaming response bodies to disk.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the given network settings.
    pub fn new(config: &NetworkConfig) -> Result<Self, UpdateError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    /// Create a transport around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn download(
        &self,
        url: &Url,
        dest: &Path,
        progress: ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, UpdateError> {
        info!(url = %url, dest = %dest.display(), "Starting download");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
            response = self.client.get(url.clone()).send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::DownloadFailed {
                status: status.as_u16(),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;

        progress(downloaded, total);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(url = %url, downloaded, "Download cancelled");
                    return Err(UpdateError::Cancelled);
                }
                next = stream.next() => next,
            };

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| UpdateError::NetworkError(e.to_string()))?;

            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total);
        }

        file.flush().await?;
        file.sync_all().await?;

        if total > 0 && downloaded != total {
            warn!(url = %url, expected = total, actual = downloaded, "Truncated download");
            return Err(UpdateError::NetworkError(format!(
                "body ended after {} of {} bytes",
                downloaded, total
            )));
        }

        info!(url = %url, bytes = downloaded, "Download complete");
        Ok(downloaded)
    }
}
