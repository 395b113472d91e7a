//! Core business logic module
//!
//! This module contains the queue, option translation, engine adapter, task
//! runtime and foreground session of the downloader.

pub mod config;
pub mod engine;
pub mod formats;
pub mod manager;
pub mod models;
pub mod options;
pub mod progress_tracker;
pub mod queue;
pub mod runtime;

#[cfg(test)]
mod test_engine;



#[cfg(test)]
mod runtime_integration_tests;

// Re-export commonly used types
pub use config::AppConfig;
pub use engine::{MediaEngine, YtDlpEngine};
pub use manager::{DisplaySurface, Session};
pub use runtime::{spawn_task_runtime, CancelFlag, TaskRuntimeHandle};
