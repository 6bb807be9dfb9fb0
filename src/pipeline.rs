//! Per-hook processing after validation: resolve, time, schedule.

use std::sync::Arc;
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::dispatcher::{ScheduledTrigger, TriggerDispatcher};
use crate::downstream::ReleaseApi;
use crate::error::Result;
use crate::resolver::ReleaseResolver;
use crate::schedule::{Clock, TriggerCadence};

/// Everything one accepted hook needs. Cloned into each hook's task; holds
/// no mutable state, so hooks never interfere with each other.
#[derive(Clone)]
pub struct HookPipeline {
    resolver: ReleaseResolver,
    dispatcher: TriggerDispatcher,
    cadence: TriggerCadence,
    clock: Arc<dyn Clock>,
    image_repo: String,
    test_name: String,
}

impl HookPipeline {
    pub fn new(config: &RelayConfig, api: Arc<dyn ReleaseApi>, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: ReleaseResolver::new(api.clone()),
            dispatcher: TriggerDispatcher::new(
                api,
                config.image_repo.clone(),
                config.test_name.clone(),
            ),
            cadence: TriggerCadence::from_config(config),
            clock,
            image_repo: config.image_repo.clone(),
            test_name: config.test_name.clone(),
        }
    }

    /// Resolves the release for the configured test and schedules its trigger.
    pub async fn run(&self, tag: String) -> Result<ScheduledTrigger> {
        let payload = self.resolver.resolve(&self.test_name).await?;

        let now = self.clock.now();
        let delay = self.cadence.delay_until_next_trigger(now);
        info!(
            "Scheduling trigger for image {}:{} on test {} at {} (in {}s)",
            self.image_repo,
            tag,
            self.test_name,
            self.cadence.next_trigger_at(now).to_rfc3339(),
            delay.as_secs()
        );

        Ok(self.dispatcher.schedule(tag, payload, delay))
    }

    /// [`run`](Self::run) with failures logged and swallowed.
    pub async fn process(&self, tag: String) -> Option<ScheduledTrigger> {
        match self.run(tag).await {
            Ok(trigger) => Some(trigger),
            Err(e) => {
                error!("Hook processing aborted: {}", e);
                None
            }
        }
    }
}
