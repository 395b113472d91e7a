//! Task runtime integration tests
//!
//! Drive the router with a scripted engine and check the event stream the
//! foreground would receive.

#[cfg(test)]
mod tests {
    use crate::core::models::{AppError, AppResult, DownloadItem, TaskEvent, TaskKind};
    use crate::core::options::{DownloadOptions, EngineConfig, RetryPolicy};
    use crate::core::progress_tracker::FINISHED_STATUS;
    use crate::core::runtime::{spawn_task_runtime, EventReceiver};
    use crate::core::test_engine::{Script, ScriptedEngine};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config() -> EngineConfig {
        EngineConfig::from_options(&DownloadOptions::default(), RetryPolicy::default())
    }

    fn items(urls: &[&str]) -> Vec<DownloadItem> {
        urls.iter().map(|u| DownloadItem::new(*u)).collect()
    }

    /// Collect events up to and including `Finished`
    async fn collect_until_finished(rx: &mut EventReceiver) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        loop {
            let event = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for task events")
                .expect("event channel closed");
            let finished = matches!(event, TaskEvent::Finished { .. });
            events.push(event);
            if finished {
                return events;
            }
        }
    }

    fn logs(events: &[TaskEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::Log { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_download_queue_event_order() -> AppResult<()> {
        let engine = ScriptedEngine::new()
            .with_script(
                "https://a.example/v",
                Script::Succeed {
                    chunks: vec![100, 500],
                    total: 1000,
                },
            )
            .with_script(
                "https://b.example/v",
                Script::Succeed {
                    chunks: vec![],
                    total: 10,
                },
            );
        let (handle, mut rx) = spawn_task_runtime(Arc::new(engine), Duration::from_millis(150))?;

        handle
            .download_queue(
                items(&["https://a.example/v", "https://b.example/v"]),
                test_config(),
            )
            .await?;
        let events = collect_until_finished(&mut rx).await;

        assert_eq!(
            events[0],
            TaskEvent::ItemStarted {
                url: "https://a.example/v".into()
            }
        );
        assert_eq!(events[1], TaskEvent::log("--- [1/2] https://a.example/v ---"));
        // First progress passes, the second one is inside the throttle window
        assert!(matches!(&events[2], TaskEvent::Progress { percent, .. } if (*percent - 10.0).abs() < 1e-9));
        assert_eq!(
            events[3],
            TaskEvent::Progress {
                percent: 100.0,
                status: FINISHED_STATUS.to_string()
            }
        );
        assert_eq!(
            events[4],
            TaskEvent::ItemDone {
                url: "https://a.example/v".into()
            }
        );
        assert!(logs(&events).contains(&"--- [2/2] https://b.example/v ---".to_string()));
        assert_eq!(
            events.last(),
            Some(&TaskEvent::Finished {
                task: TaskKind::DownloadQueue,
                cancelled: false
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_item_failure_continues_with_next_item() -> AppResult<()> {
        let engine = Arc::new(
            ScriptedEngine::new()
                .with_script("https://bad.example/v", Script::Fail("Unsupported URL".into()))
                .with_script(
                    "https://good.example/v",
                    Script::Succeed {
                        chunks: vec![1],
                        total: 2,
                    },
                ),
        );
        let (handle, mut rx) = spawn_task_runtime(engine.clone(), Duration::from_millis(150))?;

        handle
            .download_queue(
                items(&["https://bad.example/v", "https://good.example/v"]),
                test_config(),
            )
            .await?;
        let events = collect_until_finished(&mut rx).await;

        assert!(logs(&events).contains(&"Error: Engine error: Unsupported URL".to_string()));
        assert!(events.contains(&TaskEvent::ItemDone {
            url: "https://good.example/v".into()
        }));
        assert!(!events.contains(&TaskEvent::ItemDone {
            url: "https://bad.example/v".into()
        }));
        assert_eq!(
            engine.calls(),
            vec!["https://bad.example/v", "https://good.example/v"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_busy_rejection_and_cancel_mid_download() -> AppResult<()> {
        let engine = Arc::new(
            ScriptedEngine::new()
                .with_script("https://slow.example/v", Script::UntilCancelled)
                .with_script(
                    "https://never.example/v",
                    Script::Succeed {
                        chunks: vec![],
                        total: 1,
                    },
                ),
        );
        let (handle, mut rx) = spawn_task_runtime(engine.clone(), Duration::from_millis(150))?;

        handle
            .download_queue(
                items(&["https://slow.example/v", "https://never.example/v"]),
                test_config(),
            )
            .await?;
        assert!(handle.is_busy().await?);

        let second = handle
            .list_formats("https://other.example/v".into(), test_config())
            .await;
        assert!(matches!(second, Err(AppError::Busy)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.cancel().await?);

        let events = collect_until_finished(&mut rx).await;
        assert!(logs(&events).contains(&"Canceled.".to_string()));
        assert_eq!(
            events.last(),
            Some(&TaskEvent::Finished {
                task: TaskKind::DownloadQueue,
                cancelled: true
            })
        );
        assert_eq!(engine.calls(), vec!["https://slow.example/v"]);
        assert!(!handle.is_busy().await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_new_task_accepted_after_finished() -> AppResult<()> {
        let engine = ScriptedEngine::new()
            .with_script("https://slow.example/v", Script::UntilCancelled)
            .with_info("https://slow.example/v", json!({"formats": []}));
        let (handle, mut rx) = spawn_task_runtime(Arc::new(engine), Duration::from_millis(150))?;

        handle
            .download_queue(items(&["https://slow.example/v"]), test_config())
            .await?;
        handle.cancel().await?;
        collect_until_finished(&mut rx).await;

        // The cancel flag is reset for the next task
        handle
            .list_formats("https://slow.example/v".into(), test_config())
            .await?;
        let events = collect_until_finished(&mut rx).await;
        assert_eq!(
            events,
            vec![
                TaskEvent::FormatsReady { formats: vec![] },
                TaskEvent::Finished {
                    task: TaskKind::ListFormats,
                    cancelled: false
                }
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_list_formats_sorted_and_error_path() -> AppResult<()> {
        let engine = ScriptedEngine::new().with_info(
            "https://a.example/v",
            json!({
                "formats": [
                    {"format_id": "18", "ext": "mp4", "format_note": "360p"},
                    {"format_id": "22", "ext": "mp4", "format_note": "720p"}
                ]
            }),
        );
        let (handle, mut rx) = spawn_task_runtime(Arc::new(engine), Duration::from_millis(150))?;

        handle
            .list_formats("https://a.example/v".into(), test_config())
            .await?;
        let events = collect_until_finished(&mut rx).await;
        match &events[0] {
            TaskEvent::FormatsReady { formats } => {
                let ids: Vec<&str> = formats.iter().map(|f| f.format_id.as_str()).collect();
                assert_eq!(ids, vec!["22", "18"]);
            }
            other => panic!("unexpected event {:?}", other),
        }

        handle
            .list_formats("https://missing.example/v".into(), test_config())
            .await?;
        let events = collect_until_finished(&mut rx).await;
        assert_eq!(
            events[0],
            TaskEvent::error("Engine error: Unsupported URL: https://missing.example/v")
        );
        assert_eq!(events.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_idle_cancel_does_not_affect_next_task() -> AppResult<()> {
        let engine = Arc::new(ScriptedEngine::new());
        let (handle, mut rx) = spawn_task_runtime(engine.clone(), Duration::from_millis(150))?;

        // Nothing running: the request is recorded but reports no task
        assert!(!handle.cancel().await?);

        handle
            .download_queue(items(&["https://a.example/v"]), test_config())
            .await?;
        let events = collect_until_finished(&mut rx).await;
        assert!(events.contains(&TaskEvent::ItemDone {
            url: "https://a.example/v".into()
        }));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_observed_at_next_item_boundary() -> AppResult<()> {
        let engine = Arc::new(
            ScriptedEngine::new()
                .with_script(
                    "https://quiet.example/v",
                    Script::Silent(Duration::from_millis(200)),
                )
                .with_script(
                    "https://next.example/v",
                    Script::Succeed {
                        chunks: vec![],
                        total: 1,
                    },
                ),
        );
        let (handle, mut rx) = spawn_task_runtime(engine.clone(), Duration::from_millis(150))?;

        handle
            .download_queue(
                items(&["https://quiet.example/v", "https://next.example/v"]),
                test_config(),
            )
            .await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.cancel().await?);

        let events = collect_until_finished(&mut rx).await;
        // The silent item cannot observe the request and completes normally
        assert!(events.contains(&TaskEvent::ItemDone {
            url: "https://quiet.example/v".into()
        }));
        assert!(logs(&events).contains(&"Canceled before next item.".to_string()));
        assert!(!events.contains(&TaskEvent::ItemStarted {
            url: "https://next.example/v".into()
        }));
        assert_eq!(engine.calls(), vec!["https://quiet.example/v"]);
        assert_eq!(
            events.last(),
            Some(&TaskEvent::Finished {
                task: TaskKind::DownloadQueue,
                cancelled: true
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_worker_panic_still_finishes() -> AppResult<()> {
        let engine = ScriptedEngine::new().with_script("https://boom.example/v", Script::Panic);
        let (handle, mut rx) = spawn_task_runtime(Arc::new(engine), Duration::from_millis(150))?;

        handle
            .download_queue(items(&["https://boom.example/v"]), test_config())
            .await?;
        let events = collect_until_finished(&mut rx).await;

        assert!(events
            .iter()
            .any(|e| matches!(e, TaskEvent::Error { message } if message.starts_with("Worker failed"))));
        assert!(matches!(events.last(), Some(TaskEvent::Finished { .. })));
        assert!(!handle.is_busy().await?);
        Ok(())
    }
}
