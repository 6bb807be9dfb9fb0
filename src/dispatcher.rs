//! Delayed, best-effort release hook dispatch.
//!
//! A scheduled trigger is a detached tokio task that sleeps and then POSTs
//! once. It cannot be cancelled, holds nothing but its tag and payload while
//! waiting, and is lost if the process exits first.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, error, info};

use crate::downstream::{ReleaseApi, TriggerPayload};
use crate::error::{RelayError, Result};

#[derive(Clone)]
pub struct TriggerDispatcher {
    api: Arc<dyn ReleaseApi>,
    image_repo: String,
    test_name: String,
}

impl TriggerDispatcher {
    pub fn new(api: Arc<dyn ReleaseApi>, image_repo: String, test_name: String) -> Self {
        Self {
            api,
            image_repo,
            test_name,
        }
    }

    /// Sends the release hook now. Failures are logged and returned, never retried.
    pub async fn dispatch(&self, tag: &str, payload: &TriggerPayload) -> Result<()> {
        info!(
            "Triggering TaaS test run for image {}:{} on test {}...",
            self.image_repo, tag, self.test_name
        );
        match self.api.post_release_hook(tag, payload).await {
            Ok(()) => {
                info!("Test run triggered successfully!");
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                Err(e)
            }
        }
    }

    /// Fires [`dispatch`](Self::dispatch) once after `delay` without blocking the caller.
    pub fn schedule(
        &self,
        tag: String,
        payload: TriggerPayload,
        delay: Duration,
    ) -> ScheduledTrigger {
        let dispatcher = self.clone();
        let task_tag = tag.clone();
        let handle = tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                dispatcher.dispatch(&task_tag, &payload).await
            }
            .instrument(Span::current()),
        );
        ScheduledTrigger { tag, delay, handle }
    }
}

/// Handle to a pending trigger. Dropping it leaves the trigger running.
#[derive(Debug)]
pub struct ScheduledTrigger {
    tag: String,
    delay: Duration,
    handle: JoinHandle<Result<()>>,
}

impl ScheduledTrigger {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the trigger to fire and returns the dispatch outcome.
    pub async fn wait(self) -> Result<()> {
        self.handle.await.map_err(|e| RelayError::Dispatch {
            tag: self.tag,
            message: format!("trigger task did not complete: {}", e),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::{DiagnosticRecord, Release};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingApi {
        fail: bool,
        posted: Mutex<Vec<(String, TriggerPayload)>>,
    }

    #[async_trait]
    impl ReleaseApi for RecordingApi {
        async fn fetch_diagnostic(&self, _test_name: &str) -> Result<DiagnosticRecord> {
            unreachable!()
        }

        async fn fetch_releases(&self, _app_key: &str) -> Result<Vec<Release>> {
            unreachable!()
        }

        async fn post_release_hook(&self, tag: &str, payload: &TriggerPayload) -> Result<()> {
            if self.fail {
                return Err(RelayError::Dispatch {
                    tag: tag.to_string(),
                    message: "503 Service Unavailable".into(),
                });
            }
            self.posted
                .lock()
                .unwrap()
                .push((tag.to_string(), payload.clone()));
            Ok(())
        }
    }

    fn payload() -> TriggerPayload {
        TriggerPayload::new(
            DiagnosticRecord {
                app: "foo".into(),
                space: "prod".into(),
                id: "x".into(),
                action: "create".into(),
                result: "succeeded".into(),
            },
            "r2".into(),
        )
    }

    fn dispatcher(api: Arc<RecordingApi>) -> TriggerDispatcher {
        TriggerDispatcher::new(api, "akkeris/ui".into(), "ui-tests-taas".into())
    }

    #[tokio::test(start_paused = true)]
    async fn fires_only_after_delay() {
        let api = Arc::new(RecordingApi::default());
        let trigger = dispatcher(api.clone()).schedule(
            "release-1".into(),
            payload(),
            Duration::from_secs(180),
        );
        assert_eq!(trigger.delay(), Duration::from_secs(180));
        // Let the task start its timer.
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(179)).await;
        tokio::task::yield_now().await;
        assert!(api.posted.lock().unwrap().is_empty());
        assert!(!trigger.is_finished());

        tokio::time::advance(Duration::from_secs(1)).await;
        trigger.wait().await.unwrap();

        let posted = api.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "release-1");
        assert_eq!(posted[0].1.release.id, "r2");
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_reported_not_retried() {
        let api = Arc::new(RecordingApi {
            fail: true,
            ..Default::default()
        });
        let trigger = dispatcher(api.clone()).schedule(
            "release-1".into(),
            payload(),
            Duration::from_secs(60),
        );
        let err = trigger.wait().await.unwrap_err();
        assert!(matches!(err, RelayError::Dispatch { .. }));
        assert!(api.posted.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_task_error_names_the_tag() {
        let api = Arc::new(RecordingApi::default());
        let trigger = dispatcher(api.clone()).schedule(
            "release-7".into(),
            payload(),
            Duration::from_secs(60),
        );
        assert_eq!(trigger.tag(), "release-7");
        trigger.handle.abort();

        let err = trigger.wait().await.unwrap_err();
        assert!(matches!(err, RelayError::Dispatch { ref tag, .. } if tag == "release-7"));
        assert!(err.to_string().contains("'release-7'"));
        assert!(api.posted.lock().unwrap().is_empty());
    }
}
