//! Engine adapter
//!
//! The extraction/download engine is driven as a child process. Progress is
//! read from a templated line the engine prints for every progress callback,
//! which keeps parsing independent of the engine's human-readable output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::models::{AppError, AppResult};
use crate::core::options::{EngineConfig, RetryPolicy};

/// Marker in front of every templated progress line
pub const PROGRESS_PREFIX: &str = "[ytdlp-queue]";

/// Default engine executable name
pub const DEFAULT_PROGRAM: &str = "yt-dlp";

fn progress_template() -> String {
    format!(
        "download:{}%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s",
        PROGRESS_PREFIX
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
    Other,
}

/// One progress callback from the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProgress {
    pub status: ProgressStatus,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<f64>,
    /// Bytes per second
    pub speed: Option<f64>,
    /// Seconds
    pub eta: Option<u64>,
}

impl EngineProgress {
    /// Exact total when known, otherwise the engine's estimate
    pub fn total(&self) -> Option<f64> {
        self.total_bytes
            .filter(|t| *t > 0)
            .map(|t| t as f64)
            .or(self.total_bytes_estimate.filter(|t| *t > 0.0))
    }
}

fn parse_optional_number(field: &str) -> Option<f64> {
    match field.trim() {
        "" | "NA" | "None" | "null" => None,
        value => value.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

/// Parse a templated progress line, None for any other output
pub fn parse_progress_line(line: &str) -> Option<EngineProgress> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let fields: Vec<&str> = rest.split('|').collect();
    if fields.len() != 6 {
        return None;
    }

    let status = match fields[0].trim() {
        "downloading" => ProgressStatus::Downloading,
        "finished" => ProgressStatus::Finished,
        _ => ProgressStatus::Other,
    };

    Some(EngineProgress {
        status,
        downloaded_bytes: parse_optional_number(fields[1]).map_or(0, |v| v.max(0.0) as u64),
        total_bytes: parse_optional_number(fields[2]).map(|v| v.max(0.0) as u64),
        total_bytes_estimate: parse_optional_number(fields[3]),
        speed: parse_optional_number(fields[4]),
        eta: parse_optional_number(fields[5]).map(|v| v.max(0.0).round() as u64),
    })
}

/// Receives progress callbacks during a download. Returning an error aborts
/// the download with that error.
pub trait ProgressHook: Send {
    fn on_progress(&mut self, progress: &EngineProgress) -> AppResult<()>;
}

/// Media extraction/download engine
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Extract the info record for `url` without downloading anything
    async fn extract_info(&self, url: &str, config: &EngineConfig) -> AppResult<serde_json::Value>;

    /// Download `url`, reporting progress through `hook`
    async fn download(
        &self,
        url: &str,
        config: &EngineConfig,
        hook: &mut dyn ProgressHook,
    ) -> AppResult<()>;
}

/// Engine section of the application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Engine executable; looked up on PATH when unset
    pub program: Option<String>,
    /// Arguments placed before ours, e.g. ["-m", "yt_dlp"] with a python program
    pub args_prefix: Vec<String>,
    pub info_timeout_seconds: u64,
    pub retries: u32,
    pub fragment_retries: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            program: None,
            args_prefix: Vec::new(),
            info_timeout_seconds: 120,
            retries: retry.retries,
            fragment_retries: retry.fragment_retries,
        }
    }
}

impl EngineSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            fragment_retries: self.fragment_retries,
        }
    }
}

/// Resolve the engine executable: configured value, PATH, then common
/// install locations
pub fn locate_program(configured: Option<&str>) -> String {
    if let Some(program) = configured.map(str::trim).filter(|p| !p.is_empty()) {
        return program.to_string();
    }

    let names: &[&str] = if cfg!(windows) {
        &["yt-dlp.exe", "yt-dlp"]
    } else {
        &["yt-dlp"]
    };

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            for name in names {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return candidate.to_string_lossy().into_owned();
                }
            }
        }
    }

    let common_paths = [
        "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
        "/usr/local/bin/yt-dlp",
        "/usr/bin/yt-dlp",
    ];
    for path in common_paths {
        if Path::new(path).exists() {
            return path.to_string();
        }
    }

    DEFAULT_PROGRAM.to_string()
}

/// Pick the most useful line out of the engine's stderr
fn summarize_failure(stderr: &str, status: ExitStatus) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if let Some(error_line) = lines.iter().rev().find(|l| l.starts_with("ERROR:")) {
        return error_line.trim_start_matches("ERROR:").trim().to_string();
    }
    if let Some(last) = lines.last() {
        return last.to_string();
    }
    match status.code() {
        Some(code) => format!("engine exited with status {}", code),
        None => "engine terminated by signal".to_string(),
    }
}

/// Child-process driver for yt-dlp
pub struct YtDlpEngine {
    program: String,
    args_prefix: Vec<String>,
    info_timeout: Duration,
}

impl YtDlpEngine {
    pub fn new(settings: &EngineSettings) -> Self {
        let program = locate_program(settings.program.as_deref());
        info!("Using engine program: {} {:?}", program, settings.args_prefix);
        Self {
            program,
            args_prefix: settings.args_prefix.clone(),
            info_timeout: Duration::from_secs(settings.info_timeout_seconds.max(1)),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args_prefix)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group: a terminal Ctrl-C reaches only this program,
        // which stops the engine through the cancel flag.
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    fn spawn_error(&self, err: std::io::Error) -> AppError {
        if err.kind() == std::io::ErrorKind::NotFound {
            AppError::Engine(format!("Engine program not found: {}", self.program))
        } else {
            AppError::Engine(format!("Failed to start {}: {}", self.program, err))
        }
    }

    /// Engine version string, e.g. "2024.08.06"
    pub async fn version(&self) -> AppResult<String> {
        let output = self
            .command()
            .arg("--version")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Engine(summarize_failure(&stderr, output.status)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract_info(&self, url: &str, config: &EngineConfig) -> AppResult<serde_json::Value> {
        let mut cmd = self.command();
        cmd.args(config.to_args())
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--")
            .arg(url);

        debug!("Extracting info for {}", url);
        let output = tokio::time::timeout(self.info_timeout, cmd.output())
            .await
            .map_err(|_| {
                AppError::Engine(format!(
                    "Timed out after {}s while extracting info",
                    self.info_timeout.as_secs()
                ))
            })?
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Engine(summarize_failure(&stderr, output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json_line = stdout
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or_else(|| AppError::Parse("Engine printed no info record".to_string()))?;
        Ok(serde_json::from_str(json_line)?)
    }

    async fn download(
        &self,
        url: &str,
        config: &EngineConfig,
        hook: &mut dyn ProgressHook,
    ) -> AppResult<()> {
        let mut cmd = self.command();
        cmd.args(config.to_args())
            .arg("--progress")
            .arg("--newline")
            .arg("--progress-template")
            .arg(progress_template())
            .arg("--")
            .arg(url);

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::System("Failed to capture engine stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::System("Failed to capture engine stderr".into()))?;

        let stderr_task = tokio::spawn(async move {
            let mut collected = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "engine", "{}", line);
                collected.push_str(&line);
                collected.push('\n');
            }
            collected
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            let Some(progress) = parse_progress_line(&line) else {
                debug!(target: "engine", "{}", line);
                continue;
            };
            if let Err(err) = hook.on_progress(&progress) {
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to stop engine process: {}", kill_err);
                }
                stderr_task.abort();
                return Err(err);
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            Err(AppError::Engine(summarize_failure(&stderr, status)))
        }
    }
}
