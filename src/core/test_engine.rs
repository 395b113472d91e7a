//! Scripted engine used by the runtime and session tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::core::engine::{EngineProgress, MediaEngine, ProgressHook, ProgressStatus};
use crate::core::models::{AppError, AppResult};
use crate::core::options::EngineConfig;

/// What the engine does for a given URL
#[derive(Debug, Clone)]
pub enum Script {
    /// Report each downloaded byte count, then finish
    Succeed { chunks: Vec<u64>, total: u64 },
    Fail(String),
    /// Keep reporting progress until the hook aborts
    UntilCancelled,
    /// Stay silent for a while, then succeed without any callback
    Silent(Duration),
    Panic,
}

#[derive(Default)]
pub struct ScriptedEngine {
    scripts: HashMap<String, Script>,
    infos: HashMap<String, Value>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }

    pub fn with_info(mut self, url: &str, info: Value) -> Self {
        self.infos.insert(url.to_string(), info);
        self
    }

    /// URLs passed to `download`, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

fn downloading(downloaded: u64, total: u64) -> EngineProgress {
    EngineProgress {
        status: ProgressStatus::Downloading,
        downloaded_bytes: downloaded,
        total_bytes: Some(total),
        total_bytes_estimate: None,
        speed: Some(1024.0),
        eta: Some(1),
    }
}

#[async_trait]
impl MediaEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn extract_info(&self, url: &str, _config: &EngineConfig) -> AppResult<Value> {
        self.infos
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Engine(format!("Unsupported URL: {}", url)))
    }

    async fn download(
        &self,
        url: &str,
        _config: &EngineConfig,
        hook: &mut dyn ProgressHook,
    ) -> AppResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }

        match self.scripts.get(url).cloned() {
            Some(Script::Succeed { chunks, total }) => {
                for downloaded in chunks {
                    hook.on_progress(&downloading(downloaded, total))?;
                }
                hook.on_progress(&EngineProgress {
                    status: ProgressStatus::Finished,
                    ..downloading(total, total)
                })
            }
            Some(Script::Fail(message)) => Err(AppError::Engine(message)),
            Some(Script::UntilCancelled) => {
                let mut downloaded = 0;
                loop {
                    downloaded += 1;
                    hook.on_progress(&downloading(downloaded, 1_000_000))?;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
            Some(Script::Silent(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Some(Script::Panic) => panic!("scripted engine panic for {}", url),
            None => Ok(()),
        }
    }
}
