//! Terminal command handlers
//!
//! Each subcommand builds a `Session` on top of the task runtime and renders
//! its events through a `TerminalDisplay`.

pub mod config;
pub mod display;
pub mod download;
pub mod formats;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::core::config::AppConfig;
use crate::core::engine::YtDlpEngine;
use crate::core::manager::{DisplaySurface, Session};
use crate::core::models::TaskEvent;
use crate::core::options::DownloadOptions;
use crate::core::runtime::{spawn_task_runtime, EventReceiver};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download every queued URL in order
    Download(download::DownloadArgs),

    /// List the available formats of a URL
    Formats(formats::FormatsArgs),

    /// Inspect or reset the configuration
    #[command(subcommand)]
    Config(config::ConfigCommand),
}

/// Dispatch the parsed command line
pub async fn run(cli: Cli, app_config: AppConfig) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Download(args) => download::run(args, &app_config).await,
        Command::Formats(args) => formats::run(args, &app_config).await,
        Command::Config(cmd) => config::run(cmd, &app_config, cli.config.as_deref()).await,
    }
}

/// Session wired to a yt-dlp engine as configured
pub fn build_session(
    app_config: &AppConfig,
    options: DownloadOptions,
) -> anyhow::Result<(Session, EventReceiver)> {
    let engine = YtDlpEngine::new(&app_config.engine);

    let (runtime, events) = spawn_task_runtime(Arc::new(engine), app_config.progress.interval())
        .context("Failed to start the task runtime")?;
    let session = Session::new(runtime, options, app_config.engine.retry_policy());
    Ok((session, events))
}

/// Apply events until the current task finishes. The first Ctrl-C requests
/// cancellation; the task still runs to its `Finished` event.
pub async fn pump_events(
    session: &mut Session,
    events: &mut EventReceiver,
    display: &mut dyn DisplaySurface,
) -> anyhow::Result<()> {
    let mut cancel_sent = false;
    loop {
        tokio::select! {
            event = events.recv() => {
                let event = event.context("Task runtime stopped unexpectedly")?;
                session.apply_event(&event, display);
                if matches!(event, TaskEvent::Finished { .. }) {
                    return Ok(());
                }
            }
            signal = tokio::signal::ctrl_c(), if !cancel_sent => {
                cancel_sent = true;
                match signal {
                    Ok(()) => {
                        session.cancel(display).await?;
                    }
                    Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
                }
            }
        }
    }
}
