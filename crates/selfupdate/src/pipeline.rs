//! Download-and-verify pipeline.
//!
//! One attempt downloads every file of a manifest, strictly in order, into a
//! fresh staging directory and then verifies each staged file's digest. The
//! attempt ends in exactly one [`DownloadOutcome`]:
//!
//! ```text
//! Idle -> Downloading(0) -> ... -> Downloading(n-1) -> Verifying -> Succeeded
//!              |                          |                |
//!              +-- TransportFailed / Cancelled             +-- IntegrityFailed / Cancelled
//! ```
//!
//! Progress and lifecycle notifications are sent over an unbounded channel so
//! a UI can drain them on its own thread without ever stalling a transfer.
//! The pipeline never retries and never deletes what it staged; the caller
//! owns the staging directory once a [`DownloadReport`] is returned.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::UpdateError;
use crate::manifest::FileEntry;
use crate::progress::DownloadProgress;
use crate::transport::Transport;
use crate::verify::DigestVerifier;

/// Extension given to staged files.
const STAGING_EXTENSION: &str = "download";

/// Where an attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Attempt created, nothing started
    Idle,
    /// Transferring the file at this index
    Downloading(usize),
    /// All files transferred, checking digests
    Verifying,
    /// Every file downloaded and verified
    Succeeded,
    /// A staged file failed digest verification
    IntegrityFailed,
    /// A transfer failed
    TransportFailed,
    /// The attempt was cancelled
    Cancelled,
}

impl PipelineState {
    /// Check if no further transitions can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::IntegrityFailed | Self::TransportFailed | Self::Cancelled
        )
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Terminal result of a download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// All files downloaded and verified
    Succeeded,
    /// The file at `index` did not verify
    IntegrityFailed { index: usize, reason: String },
    /// The transfer of the file at `index` failed; later files were not tried
    TransportFailed { index: usize, message: String },
    /// The attempt was cancelled
    Cancelled,
}

impl DownloadOutcome {
    /// Check if the attempt succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// The terminal state this outcome corresponds to.
    pub fn state(&self) -> PipelineState {
        match self {
            Self::Succeeded => PipelineState::Succeeded,
            Self::IntegrityFailed { .. } => PipelineState::IntegrityFailed,
            Self::TransportFailed { .. } => PipelineState::TransportFailed,
            Self::Cancelled => PipelineState::Cancelled,
        }
    }
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "update downloaded and verified"),
            Self::IntegrityFailed { index, reason } => {
                write!(f, "file #{} failed verification: {}", index, reason)
            }
            Self::TransportFailed { index, message } => {
                write!(f, "file #{} failed to download: {}", index, message)
            }
            Self::Cancelled => write!(f, "update download cancelled"),
        }
    }
}

/// Notification emitted while an attempt runs.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// Transfer of a file is starting
    FileStarted {
        index: usize,
        file_count: usize,
        file_name: String,
    },
    /// Bytes arrived for the current file
    Progress(DownloadProgress),
    /// A file finished transferring into `path`
    FileCompleted { index: usize, path: PathBuf },
    /// All transfers finished, digests are being checked
    Verifying,
    /// The attempt reached its terminal outcome
    Completed {
        outcome: DownloadOutcome,
        staged_paths: Vec<PathBuf>,
    },
}

/// Result of a finished attempt, handed to the caller.
///
/// The caller owns the staging directory: it either moves the staged files
/// into place or calls [`DownloadReport::discard`].
#[derive(Debug, Clone)]
pub struct DownloadReport {
    outcome: DownloadOutcome,
    staging_dir: PathBuf,
    staged_paths: Vec<PathBuf>,
    file_names: Vec<String>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl DownloadReport {
    /// Terminal outcome of the attempt.
    pub fn outcome(&self) -> &DownloadOutcome {
        &self.outcome
    }

    /// Check if the attempt succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Directory holding this attempt's staged files.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Staged file paths, index-aligned with the manifest's files.
    ///
    /// Shorter than the file list when a transfer failed or was cancelled.
    pub fn staged_paths(&self) -> &[PathBuf] {
        &self.staged_paths
    }

    /// Staged paths paired with the file name each should be installed as.
    pub fn staged_files(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.staged_paths
            .iter()
            .zip(&self.file_names)
            .map(|(path, name)| (path.as_path(), name.as_str()))
    }

    /// When the attempt started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the attempt reached its outcome.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Take ownership of the staged paths.
    pub fn into_staged_paths(self) -> Vec<PathBuf> {
        self.staged_paths
    }

    /// Delete the staging directory and everything in it.
    pub fn discard(self) -> Result<(), UpdateError> {
        if self.staging_dir.exists() {
            std::fs::remove_dir_all(&self.staging_dir)?;
            debug!(dir = %self.staging_dir.display(), "Discarded staging directory");
        }
        Ok(())
    }
}

/// State of one attempt. Never shared between attempts.
#[derive(Debug)]
struct DownloadSession {
    staging_dir: PathBuf,
    staged_paths: Vec<PathBuf>,
    state: PipelineState,
    started_at: DateTime<Utc>,
}

impl DownloadSession {
    async fn create(staging_root: &Path) -> Result<Self, UpdateError> {
        let staging_dir = staging_root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&staging_dir).await?;

        Ok(Self {
            staging_dir,
            staged_paths: Vec::new(),
            state: PipelineState::Idle,
            started_at: Utc::now(),
        })
    }

    fn next_staging_path(&self) -> PathBuf {
        self.staging_dir
            .join(format!("{}.{}", Uuid::new_v4(), STAGING_EXTENSION))
    }

    fn transition(&mut self, state: PipelineState) {
        debug!(from = ?self.state, to = ?state, "Pipeline state change");
        self.state = state;
    }

    fn finish(mut self, outcome: DownloadOutcome, files: &[FileEntry]) -> DownloadReport {
        self.transition(outcome.state());

        let finished_at = Utc::now();
        let elapsed_ms = (finished_at - self.started_at).num_milliseconds();
        if outcome.is_success() {
            info!(files = self.staged_paths.len(), elapsed_ms, "Download attempt succeeded");
        } else {
            warn!(%outcome, staged = self.staged_paths.len(), elapsed_ms, "Download attempt failed");
        }

        let file_names = files
            .iter()
            .take(self.staged_paths.len())
            .map(|f| f.file_name().to_string())
            .collect();

        DownloadReport {
            outcome,
            staging_dir: self.staging_dir,
            staged_paths: self.staged_paths,
            file_names,
            started_at: self.started_at,
            finished_at,
        }
    }
}

/// Downloads and verifies a manifest's files.
///
/// Cheap to clone; each [`run`](Self::run) or [`spawn`](Self::spawn) creates
/// its own session.
#[derive(Clone)]
pub struct DownloadPipeline {
    transport: Arc<dyn Transport>,
    verifier: DigestVerifier,
    staging_root: PathBuf,
}

impl DownloadPipeline {
    /// Create a pipeline that stages attempts under `staging_root`.
    pub fn new(transport: Arc<dyn Transport>, staging_root: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            verifier: DigestVerifier::new(),
            staging_root: staging_root.into(),
        }
    }

    /// Root under which each attempt creates its staging directory.
    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Run one attempt to completion on the current task.
    ///
    /// Events are sent to `events`; a closed receiver is ignored. The final
    /// event is always [`DownloadEvent::Completed`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the staging directory cannot be created.
    /// Every other failure is reported through the report's outcome.
    pub async fn run(
        &self,
        files: &[FileEntry],
        events: &mpsc::UnboundedSender<DownloadEvent>,
        cancel: &CancellationToken,
    ) -> Result<DownloadReport, UpdateError> {
        let mut session = DownloadSession::create(&self.staging_root).await?;
        info!(
            files = files.len(),
            staging_dir = %session.staging_dir.display(),
            "Starting download attempt"
        );

        let outcome = self.drive(&mut session, files, events, cancel).await;
        let report = session.finish(outcome, files);

        let _ = events.send(DownloadEvent::Completed {
            outcome: report.outcome.clone(),
            staged_paths: report.staged_paths.clone(),
        });
        Ok(report)
    }

    /// Run one attempt on a background task.
    ///
    /// Must be called from within a tokio runtime. Dropping the returned
    /// handle cancels the attempt.
    pub fn spawn(&self, files: Vec<FileEntry>) -> DownloadHandle {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let pipeline = self.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move { pipeline.run(&files, &tx, &task_cancel).await });

        DownloadHandle {
            guard: cancel.clone().drop_guard(),
            cancel,
            events: rx,
            task,
        }
    }

    async fn drive(
        &self,
        session: &mut DownloadSession,
        files: &[FileEntry],
        events: &mpsc::UnboundedSender<DownloadEvent>,
        cancel: &CancellationToken,
    ) -> DownloadOutcome {
        for (index, entry) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                return DownloadOutcome::Cancelled;
            }

            session.transition(PipelineState::Downloading(index));
            let dest = session.next_staging_path();
            let _ = events.send(DownloadEvent::FileStarted {
                index,
                file_count: files.len(),
                file_name: entry.file_name().to_string(),
            });

            let sink = |downloaded: u64, total: u64| {
                let _ = events.send(DownloadEvent::Progress(DownloadProgress::new(
                    index, downloaded, total,
                )));
            };

            match self
                .transport
                .download(entry.source(), &dest, &sink, cancel)
                .await
            {
                Ok(bytes) => {
                    debug!(index, bytes, path = %dest.display(), "File staged");
                    session.staged_paths.push(dest.clone());
                    let _ = events.send(DownloadEvent::FileCompleted { index, path: dest });
                }
                Err(UpdateError::Cancelled) => return DownloadOutcome::Cancelled,
                Err(_) if cancel.is_cancelled() => return DownloadOutcome::Cancelled,
                Err(e) => {
                    error!(index, url = %entry.source(), error = %e, "Download failed");
                    return DownloadOutcome::TransportFailed {
                        index,
                        message: e.to_string(),
                    };
                }
            }
        }

        session.transition(PipelineState::Verifying);
        let _ = events.send(DownloadEvent::Verifying);

        for (index, (path, entry)) in session.staged_paths.iter().zip(files).enumerate() {
            if cancel.is_cancelled() {
                return DownloadOutcome::Cancelled;
            }

            let verifier = self.verifier;
            let path = path.clone();
            let expected = entry.digest().to_string();
            let result = tokio::task::spawn_blocking(move || verifier.verify(&path, &expected))
                .await
                .map_err(UpdateError::from)
                .and_then(|r| r);

            if let Err(e) = result {
                return DownloadOutcome::IntegrityFailed {
                    index,
                    reason: e.to_string(),
                };
            }
        }

        DownloadOutcome::Succeeded
    }
}

/// Handle to an attempt running on a background task.
pub struct DownloadHandle {
    guard: DropGuard,
    cancel: CancellationToken,
    events: mpsc::UnboundedReceiver<DownloadEvent>,
    task: JoinHandle<Result<DownloadReport, UpdateError>>,
}

impl DownloadHandle {
    /// Request cancellation. Safe to call from any thread, any number of times.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this attempt, for wiring into other shutdown paths.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Receive the next event; `None` once the attempt has finished and all
    /// events were drained.
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        self.events.recv().await
    }

    /// Wait for the attempt to finish.
    ///
    /// Undrained events are dropped.
    pub async fn join(self) -> Result<DownloadReport, UpdateError> {
        let DownloadHandle { guard, task, .. } = self;
        let result = task.await;
        guard.disarm();
        result?
    }
}
