use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tracing::{debug, info};

use common::{Decision, Notifier, Urgency};

use crate::dispatch::{dispatch_isolated, DispatchReport, Effect};

/// Delivers one message to every enabled channel, each in isolation.
///
/// Disabled channels are skipped silently. There are no retries: a failed
/// delivery is logged and recorded in the returned report only.
#[derive(Clone)]
pub struct NotificationFanout {
    channels: Vec<Arc<dyn Notifier>>,
    timeout: Duration,
}

impl NotificationFanout {
    pub fn new(channels: Vec<Arc<dyn Notifier>>, timeout: Duration) -> Self {
        Self { channels, timeout }
    }

    /// Names of channels that will actually receive messages.
    pub fn enabled_channels(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|c| c.is_enabled())
            .map(|c| c.name())
            .collect()
    }

    /// Trading signal, with urgency derived from the decision category.
    pub async fn notify(&self, title: &str, body: &str, category: Decision) -> DispatchReport {
        self.send(title, body, Urgency::from(category)).await
    }

    /// Lifecycle message (startup, shutdown) sent to every channel.
    pub async fn notify_system(&self, title: &str, body: &str) -> DispatchReport {
        info!(title = %title, "System notification");
        self.send(&format!("[system] {title}"), body, Urgency::Medium)
            .await
    }

    pub async fn send(&self, title: &str, body: &str, urgency: Urgency) -> DispatchReport {
        let effects: Vec<Effect> = self
            .channels
            .iter()
            .filter(|c| {
                let enabled = c.is_enabled();
                if !enabled {
                    debug!(channel = c.name(), "Channel disabled, skipping");
                }
                enabled
            })
            .map(|c| {
                let channel = c.clone();
                let fut = async move { channel.send(title, body, urgency).await }.boxed();
                (c.name().to_string(), fut)
            })
            .collect();

        dispatch_isolated("notify", effects, self.timeout).await
    }
}
