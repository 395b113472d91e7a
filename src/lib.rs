//! ytdlp-queue - Core Library
//!
//! A queued, cancelable front-end for the yt-dlp media downloader: URL queue,
//! option translation, a single background worker with throttled progress
//! and cooperative cancellation, plus the terminal commands built on top.

pub mod commands;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{
    config::AppConfig,
    engine::{MediaEngine, YtDlpEngine},
    manager::{DisplaySurface, RunSummary, Session},
    models::{AppError, AppResult, DownloadItem, FormatEntry, TaskEvent, TaskKind},
    options::{DownloadOptions, EngineConfig},
    queue::UrlQueue,
    runtime::{spawn_task_runtime, CancelFlag, TaskRuntimeHandle},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize the library with default settings
pub fn init() -> anyhow::Result<()> {
    utils::logging::init_tracing("info", None);
    tracing::info!("{} v{} initialized", NAME, VERSION);
    Ok(())
}
