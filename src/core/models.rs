//! Core data models shared by the queue, the task runner and the front-end

use serde::{Deserialize, Serialize};

/// Kind of work a background task performs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskKind {
    ListFormats,

    DownloadQueue,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::ListFormats => write!(f, "list-formats"),
            TaskKind::DownloadQueue => write!(f, "download-queue"),
        }
    }
}

/// A single queued URL

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadItem {
    pub url: String,

    pub added_at: chrono::DateTime<chrono::Utc>,
}

impl DownloadItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            added_at: chrono::Utc::now(),
        }
    }
}

/// One row of the format listing

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormatEntry {
    pub format_id: String,

    pub display: String,
}

/// Events emitted by the background worker, consumed by the foreground in
/// receipt order

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum TaskEvent {
    Log {
        message: String,
    },
    Progress {
        percent: f64,
        status: String,
    },
    FormatsReady {
        formats: Vec<FormatEntry>,
    },
    ItemStarted {
        url: String,
    },
    ItemDone {
        url: String,
    },
    Error {
        message: String,
    },
    /// Always the last event of a task
    Finished {
        task: TaskKind,
        cancelled: bool,
    },
}

impl TaskEvent {
    pub fn log(message: impl Into<String>) -> Self {
        TaskEvent::Log {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        TaskEvent::Error {
            message: message.into(),
        }
    }
}

/// Application error types

#[derive(Debug, thiserror::Error)]

pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Canceled by user")]
    Cancelled,

    #[error("A task is already running.")]
    Busy,

    #[error("Queue empty: add at least one URL to the queue.")]
    QueueEmpty,

    #[error("No URL: paste a URL in the input or add something to the queue.")]
    NoUrl,

    #[error("Invalid output folder: {0}")]
    InvalidOutputDir(String),

    #[error("System error: {0}")]
    System(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

/// Result type alias for application operations

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = TaskEvent::Progress {
            percent: 50.0,
            status: "half".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Progress");
        assert_eq!(json["payload"]["percent"], 50.0);
    }

    #[test]
    fn test_cancelled_message() {
        assert_eq!(AppError::Cancelled.to_string(), "Canceled by user");
    }

    #[test]
    fn test_task_kind_display() {
        assert_eq!(TaskKind::ListFormats.to_string(), "list-formats");
        assert_eq!(TaskKind::DownloadQueue.to_string(), "download-queue");
    }
}
