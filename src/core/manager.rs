//! Foreground dispatcher
//!
//! `Session` is the single foreground owner of the queue, the current
//! options and the display state. It validates user actions, submits tasks
//! to the runtime and applies worker events, in receipt order, to a
//! `DisplaySurface`.

use std::path::Path;
use tracing::{debug, info};

use crate::core::models::{AppError, AppResult, FormatEntry, TaskEvent, TaskKind};
use crate::core::options::{DownloadOptions, EngineConfig, RetryPolicy, BEST_FORMAT};
use crate::core::queue::{safe_strip_lines, UrlQueue};
use crate::core::runtime::TaskRuntimeHandle;

/// Label of the default format choice
pub const BEST_FORMAT_LABEL: &str = "best (default)";

/// Something able to show the session's state to the user
pub trait DisplaySurface {
    fn append_log(&mut self, line: &str);

    fn set_progress(&mut self, percent: u8);

    fn set_status(&mut self, status: &str);

    fn formats_loaded(&mut self, _choices: &[FormatChoice]) {}

    fn task_finished(&mut self, _task: TaskKind, _cancelled: bool) {}
}

/// An entry of the format picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatChoice {
    pub label: String,
    pub format_id: String,
}

impl FormatChoice {
    pub fn best() -> Self {
        Self {
            label: BEST_FORMAT_LABEL.to_string(),
            format_id: BEST_FORMAT.to_string(),
        }
    }
}

impl From<&FormatEntry> for FormatChoice {
    fn from(entry: &FormatEntry) -> Self {
        Self {
            label: entry.display.clone(),
            format_id: entry.format_id.clone(),
        }
    }
}

/// Counters for the current or last download run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub started: usize,
    pub completed: usize,
    pub errors: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.started.saturating_sub(self.completed)
    }
}

pub struct Session {
    runtime: TaskRuntimeHandle,
    queue: UrlQueue,
    options: DownloadOptions,
    retry: RetryPolicy,
    format_choices: Vec<FormatChoice>,
    progress: u8,
    status: String,
    busy: bool,
    summary: RunSummary,
}

impl Session {
    pub fn new(runtime: TaskRuntimeHandle, options: DownloadOptions, retry: RetryPolicy) -> Self {
        Self {
            runtime,
            queue: UrlQueue::new(),
            options,
            retry,
            format_choices: vec![FormatChoice::best()],
            progress: 0,
            status: "Idle".to_string(),
            busy: false,
            summary: RunSummary::default(),
        }
    }

    pub fn queue(&self) -> &UrlQueue {
        &self.queue
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut DownloadOptions {
        &mut self.options
    }

    pub fn format_choices(&self) -> &[FormatChoice] {
        &self.format_choices
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Engine record for the current options
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::from_options(&self.options, self.retry)
    }

    pub fn add_to_queue(&mut self, text: &str) -> usize {
        self.queue.add_from_text(text)
    }

    pub fn remove_selected(&mut self, indices: &[usize]) -> AppResult<usize> {
        self.queue.remove_selected(indices)
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// List formats for the first URL of `input_text`, or the queue head
    pub async fn list_formats_for_first_url(
        &mut self,
        input_text: &str,
        display: &mut dyn DisplaySurface,
    ) -> AppResult<String> {
        let url = match safe_strip_lines(input_text).into_iter().next() {
            Some(url) => url,
            None => self
                .queue
                .first()
                .map(|item| item.url.clone())
                .ok_or(AppError::NoUrl)?,
        };

        let task_id = self
            .runtime
            .list_formats(url.clone(), self.engine_config())
            .await?;
        display.append_log(&format!("Listing formats for: {}", url));
        self.busy = true;
        Ok(task_id)
    }

    /// Validate and submit the whole queue
    pub async fn start_download(&mut self, display: &mut dyn DisplaySurface) -> AppResult<String> {
        if self.queue.is_empty() {
            return Err(AppError::QueueEmpty);
        }
        validate_output_dir(&self.options.output_dir)?;

        let task_id = self
            .runtime
            .download_queue(self.queue.snapshot(), self.engine_config())
            .await?;

        info!("Download of {} item(s) submitted as {}", self.queue.len(), task_id);
        self.busy = true;
        self.summary = RunSummary::default();
        self.set_progress(0, display);
        self.set_status("Starting…", display);
        display.append_log("=== Download started ===");
        Ok(task_id)
    }

    pub async fn cancel(&mut self, display: &mut dyn DisplaySurface) -> AppResult<bool> {
        display.append_log("Cancel requested…");
        self.runtime.cancel().await
    }

    /// Apply one worker event to the session state and the display
    pub fn apply_event(&mut self, event: &TaskEvent, display: &mut dyn DisplaySurface) {
        debug!("Applying event {:?}", event);
        match event {
            TaskEvent::Log { message } => display.append_log(message),
            TaskEvent::Progress { percent, status } => {
                let clamped = percent.clamp(0.0, 100.0) as u8;
                self.set_progress(clamped, display);
                self.set_status(status, display);
            }
            TaskEvent::FormatsReady { formats } => {
                self.format_choices = std::iter::once(FormatChoice::best())
                    .chain(formats.iter().map(FormatChoice::from))
                    .collect();
                display.formats_loaded(&self.format_choices);
                display.append_log(&format!("Loaded {} formats.", formats.len()));
            }
            TaskEvent::ItemStarted { url } => {
                self.summary.started += 1;
                self.set_status(&format!("Downloading: {}", url), display);
            }
            TaskEvent::ItemDone { url } => {
                self.summary.completed += 1;
                display.append_log(&format!("Done: {}", url));
            }
            TaskEvent::Error { message } => {
                self.summary.errors += 1;
                display.append_log(&format!("ERROR: {}", message));
            }
            TaskEvent::Finished { task, cancelled } => {
                self.busy = false;
                if *task == TaskKind::DownloadQueue {
                    self.summary.cancelled = *cancelled;
                }
                let status = if *cancelled { "Canceled" } else { "Idle" };
                self.set_status(status, display);
                display.append_log("=== Task finished ===");
                display.task_finished(*task, *cancelled);
            }
        }
    }

    fn set_progress(&mut self, percent: u8, display: &mut dyn DisplaySurface) {
        self.progress = percent.min(100);
        display.set_progress(self.progress);
    }

    fn set_status(&mut self, status: &str, display: &mut dyn DisplaySurface) {
        self.status = status.to_string();
        display.set_status(status);
    }
}

/// The output folder must be non-blank and an existing directory
pub fn validate_output_dir(dir: &Path) -> AppResult<()> {
    let text = dir.to_string_lossy();
    if text.trim().is_empty() {
        return Err(AppError::InvalidOutputDir("no folder chosen".to_string()));
    }
    if !dir.is_dir() {
        return Err(AppError::InvalidOutputDir(format!(
            "{} is not an existing directory",
            dir.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_output_dir(dir.path()).is_ok());
        assert!(matches!(
            validate_output_dir(Path::new("")),
            Err(AppError::InvalidOutputDir(_))
        ));
        assert!(validate_output_dir(&dir.path().join("missing")).is_err());

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(validate_output_dir(&file).is_err());
    }

    #[test]
    fn test_run_summary_failed() {
        let summary = RunSummary {
            started: 3,
            completed: 1,
            errors: 0,
            cancelled: false,
        };
        assert_eq!(summary.failed(), 2);
    }
}
