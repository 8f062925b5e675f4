//! CLI command definitions and execution.
//!
//! The binary is a thin front end over [`Updater`]: it plays the part of the
//! UI, draining progress events and reporting the outcome.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};

use crate::config::UpdateConfig;
use crate::manifest::UpdateManifest;
use crate::pipeline::{DownloadEvent, DownloadOutcome};
use crate::updater::Updater;
use crate::version::parse_version;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Update handled (or none available)
    Success = 0,
    /// General error, including manifest retrieval and parse failures
    GeneralError = 1,
    /// A downloaded file failed verification
    IntegrityFailed = 2,
    /// A download failed
    TransportFailed = 3,
    /// The download was cancelled
    Cancelled = 4,
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }
}

impl From<&DownloadOutcome> for ExitCode {
    fn from(outcome: &DownloadOutcome) -> Self {
        match outcome {
            DownloadOutcome::Succeeded => ExitCode::Success,
            DownloadOutcome::IntegrityFailed { .. } => ExitCode::IntegrityFailed,
            DownloadOutcome::TransportFailed { .. } => ExitCode::TransportFailed,
            DownloadOutcome::Cancelled => ExitCode::Cancelled,
        }
    }
}

/// Self-update client
#[derive(Parser, Debug)]
#[command(name = "selfupdate")]
#[command(version, about = "Check for and download application updates")]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true, env = "SELFUPDATE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether a newer version is available
    Check(TargetArgs),
    /// Download and verify the newer version's files
    Download(DownloadArgs),
}

/// Which manifest and application to look at
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Manifest URL (defaults to `manifest_url` from the config)
    #[arg(long)]
    pub manifest: Option<String>,

    /// Application identifier (defaults to `app_id` from the config)
    #[arg(long)]
    pub app_id: Option<String>,

    /// Version currently installed
    #[arg(long)]
    pub current_version: String,
}

/// Arguments for `download`
#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Directory under which the attempt is staged
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Keep staged files when the download fails
    #[arg(long)]
    pub keep_failed: bool,
}

impl Cli {
    /// Execute the CLI command with a pre-loaded configuration
    pub async fn execute_with_config(self, mut config: UpdateConfig) -> anyhow::Result<ExitCode> {
        if let Commands::Download(DownloadArgs {
            staging_dir: Some(dir),
            ..
        }) = &self.command
        {
            config.staging.root = Some(dir.clone());
        }
        let updater = Updater::new(config)?;

        match self.command {
            Commands::Check(args) => {
                if let Some(manifest) = check(&updater, &args).await? {
                    print_manifest(&manifest);
                }
                Ok(ExitCode::Success)
            }
            Commands::Download(args) => download(&updater, &args).await,
        }
    }
}

/// Resolve the target and run an update check.
async fn check(updater: &Updater, args: &TargetArgs) -> anyhow::Result<Option<UpdateManifest>> {
    let config = updater.config();
    let manifest_url = args
        .manifest
        .clone()
        .or_else(|| config.manifest_url.clone())
        .ok_or_else(|| anyhow!("no manifest URL: pass --manifest or set manifest_url"))?;
    let app_id = args
        .app_id
        .clone()
        .or_else(|| config.app_id.clone())
        .ok_or_else(|| anyhow!("no application id: pass --app-id or set app_id"))?;
    let current = parse_version(&args.current_version)
        .with_context(|| format!("invalid --current-version `{}`", args.current_version))?;

    let manifest = updater
        .check_for_update(&manifest_url, &app_id, &current)
        .await
        .context("update check failed")?;

    if manifest.is_none() {
        println!("{} {} is up to date", app_id, current);
    }
    Ok(manifest)
}

async fn download(updater: &Updater, args: &DownloadArgs) -> anyhow::Result<ExitCode> {
    let Some(manifest) = check(updater, &args.target).await? else {
        return Ok(ExitCode::Success);
    };
    print_manifest(&manifest);

    let mut handle = updater.spawn_download(&manifest);

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let file_count = manifest.files().len();
    while let Some(event) = handle.next_event().await {
        print_event(&event, file_count);
    }

    let report = handle.join().await?;
    let code = ExitCode::from(report.outcome());

    if report.is_success() {
        println!("Staged in {}", report.staging_dir().display());
        for (path, name) in report.staged_files() {
            println!("  {} -> {}", path.display(), name);
        }
        println!("Launch: {} {}", manifest.launch_file(), manifest.launch_args());
    } else {
        eprintln!("Download failed: {}", report.outcome());
        if !args.keep_failed {
            report.discard().context("failed to remove staging directory")?;
        }
    }

    Ok(code)
}

fn print_manifest(manifest: &UpdateManifest) {
    println!("Update available: {}", manifest.version());
    if !manifest.description().is_empty() {
        println!("{}", manifest.description());
    }
}

fn print_event(event: &DownloadEvent, file_count: usize) {
    match event {
        DownloadEvent::FileStarted { index, file_name, .. } => {
            println!("[{}/{}] {}", index + 1, file_count, file_name);
        }
        DownloadEvent::Progress(progress) => {
            let mut out = std::io::stdout();
            let _ = write!(out, "\r  {}    ", progress);
            let _ = out.flush();
        }
        DownloadEvent::FileCompleted { .. } => println!(),
        DownloadEvent::Verifying => println!("Verifying {} file(s)", file_count),
        DownloadEvent::Completed { .. } => {}
    }
}
