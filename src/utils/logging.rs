use std::path::Path;
use std::sync::OnceLock;

use tracing::{Metadata, Span, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use super::file_utils::ensure_dir_exists;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Target of the span that carries the terminal progress bar
pub const PROGRESS_TARGET: &str = "ytdlp_queue::progress";

/// Filter from `RUST_LOG`, or `level` applied to this crate
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("ytdlp_queue={level}").into())
}

fn is_progress_span(meta: &Metadata<'_>) -> bool {
    meta.is_span() && meta.target() == PROGRESS_TARGET
}

/// Span whose progress bar is drawn by the indicatif layer. It is disabled
/// when no such layer is installed.
pub fn progress_span() -> Span {
    tracing::info_span!(target: PROGRESS_TARGET, "progress")
}

/// Subscriber writing log lines to stderr through the indicatif layer, so
/// they print above the progress bar instead of through it
pub fn stderr_subscriber(level: &str) -> impl Subscriber + Send + Sync + 'static {
    let indicatif_layer = IndicatifLayer::new();
    let fmt_layer = fmt::layer()
        .with_writer(indicatif_layer.get_stderr_writer())
        .with_filter(build_filter(level));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(indicatif_layer.with_filter(filter_fn(is_progress_span)))
}

/// Install the global subscriber. Logs go to stderr, or to a daily file under
/// `log_dir` when one is given. The progress bar is drawn on stderr either
/// way. Repeated calls are ignored.
pub fn init_tracing(level: &str, log_dir: Option<&Path>) {
    if let Some(log_dir) = log_dir {
        if let Err(err) = ensure_dir_exists(log_dir) {
            eprintln!("{err}");
        } else {
            let file_appender = tracing_appender::rolling::daily(log_dir, "ytdlp-queue.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);

            let fmt_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(build_filter(level));
            let _ = tracing_subscriber::registry()
                .with(fmt_layer)
                .with(IndicatifLayer::new().with_filter(filter_fn(is_progress_span)))
                .try_init();
            return;
        }
    }

    let _ = stderr_subscriber(level).try_init();
}
