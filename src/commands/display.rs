//! Terminal rendering of a session

use std::io::Write;

use indicatif::ProgressStyle;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::writer::get_indicatif_stderr_writer;

use crate::core::manager::{DisplaySurface, FormatChoice};
use crate::core::models::TaskKind;
use crate::utils::logging::progress_span;

const BAR_TEMPLATE: &str = "{bar:30.cyan/blue} {pos:>3}% {wide_msg}";

/// Progress bar plus log lines printed above it. The bar lives on a tracing
/// span, so it shares stderr with log output. Without the indicatif layer,
/// or when the bar is disabled, log lines go straight to stderr.
pub struct TerminalDisplay {
    bar: Option<Span>,
}

impl TerminalDisplay {
    pub fn new(show_bar: bool) -> Self {
        let bar = show_bar
            .then(progress_span)
            .filter(|span| !span.is_disabled());
        if let Some(span) = &bar {
            let style = ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");
            span.pb_set_style(&style);
            span.pb_set_length(100);
            span.pb_start();
        }
        Self { bar }
    }

    pub fn has_bar(&self) -> bool {
        self.bar.is_some()
    }

    /// Close the bar span, removing the bar
    pub fn finish(&mut self) {
        self.bar = None;
    }
}

impl DisplaySurface for TerminalDisplay {
    fn append_log(&mut self, line: &str) {
        match get_indicatif_stderr_writer() {
            Some(mut writer) => {
                if writeln!(writer, "{line}").is_err() {
                    eprintln!("{line}");
                }
            }
            None => eprintln!("{line}"),
        }
    }

    fn set_progress(&mut self, percent: u8) {
        if let Some(span) = &self.bar {
            span.pb_set_position(u64::from(percent));
        }
    }

    fn set_status(&mut self, status: &str) {
        if let Some(span) = &self.bar {
            span.pb_set_message(status);
        }
    }

    fn formats_loaded(&mut self, choices: &[FormatChoice]) {
        self.finish();
        for choice in choices {
            println!("{:<8} {}", choice.format_id, choice.label);
        }
    }

    fn task_finished(&mut self, task: TaskKind, cancelled: bool) {
        tracing::debug!("{} task finished (cancelled: {})", task, cancelled);
        if task == TaskKind::DownloadQueue {
            self.finish();
        }
    }
}
