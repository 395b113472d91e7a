//! Progress relay
//!
//! Receives raw engine progress callbacks on the worker side, throttles them
//! and turns them into percent/status pairs for the display surface. Every
//! callback is also a cancellation point.

use std::time::{Duration, Instant};
use tracing::trace;

use crate::core::engine::{EngineProgress, ProgressHook, ProgressStatus};
use crate::core::models::{AppError, AppResult, TaskEvent};
use crate::core::runtime::{CancelFlag, EventSender};

/// Lower bound for the interval between two relayed "downloading" updates
pub const MIN_RELAY_INTERVAL: Duration = Duration::from_millis(150);

/// Status shown once the engine reports the transfer complete
pub const FINISHED_STATUS: &str = "Download finished. Post-processing…";

/// Human-readable byte count, "?" when unknown
pub fn human_bytes(n: Option<f64>) -> String {
    let Some(mut n) = n else {
        return "?".to_string();
    };
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut unit = 0;
    while n >= 1024.0 && unit < UNITS.len() - 1 {
        n /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", n, UNITS[unit])
}

/// Percentage of `downloaded` over the best known total, 0 when no total
pub fn progress_percent(progress: &EngineProgress) -> f64 {
    match progress.total() {
        Some(total) if total > 0.0 => progress.downloaded_bytes as f64 / total * 100.0,
        _ => 0.0,
    }
}

/// Status line for a downloading update
pub fn format_status(progress: &EngineProgress) -> String {
    let pct = progress_percent(progress);
    let eta = progress
        .eta
        .map(|eta| eta.to_string())
        .unwrap_or_else(|| "?".to_string());
    format!(
        "{:5.1}%  |  {} / {}  |  {}/s  |  ETA {}s",
        pct,
        human_bytes(Some(progress.downloaded_bytes as f64)),
        human_bytes(progress.total()),
        human_bytes(progress.speed),
        eta
    )
}

/// Throttled progress formatter, installed as the engine's progress hook
pub struct ProgressRelay {
    events: EventSender,
    cancel: CancelFlag,
    interval: Duration,
    last_update: Option<Instant>,
}

impl ProgressRelay {
    pub fn new(events: EventSender, cancel: CancelFlag, interval: Duration) -> Self {
        Self {
            events,
            cancel,
            interval: interval.max(MIN_RELAY_INTERVAL),
            last_update: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Handle one callback as if it arrived at `now`
    pub fn relay_at(&mut self, progress: &EngineProgress, now: Instant) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        match progress.status {
            ProgressStatus::Downloading => {
                if let Some(last) = self.last_update {
                    if now.saturating_duration_since(last) < self.interval {
                        return Ok(());
                    }
                }
                self.last_update = Some(now);

                let percent = progress_percent(progress);
                let status = format_status(progress);
                trace!("relaying progress {:.1}%", percent);
                self.emit(TaskEvent::Progress { percent, status });
            }
            ProgressStatus::Finished => {
                self.emit(TaskEvent::Progress {
                    percent: 100.0,
                    status: FINISHED_STATUS.to_string(),
                });
            }
            ProgressStatus::Other => {}
        }
        Ok(())
    }

    fn emit(&self, event: TaskEvent) {
        // The foreground may already be gone; progress is best effort.
        let _ = self.events.send(event);
    }
}

impl ProgressHook for ProgressRelay {
    fn on_progress(&mut self, progress: &EngineProgress) -> AppResult<()> {
        self.relay_at(progress, Instant::now())
    }
}
