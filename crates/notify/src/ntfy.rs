use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use common::{Notifier, NtfyConfig, Result, Urgency};

use crate::{check_status, http_client, send_error};

/// Push notifications through an ntfy server (`POST {base}/{topic}`).
pub struct NtfyNotifier {
    enabled: bool,
    url: String,
    http: Client,
}

impl NtfyNotifier {
    pub fn new(base_url: &str, topic: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            enabled: true,
            url: format!("{}/{}", base_url.trim_end_matches('/'), topic),
            http: http_client(timeout)?,
        })
    }

    pub fn from_config(cfg: &NtfyConfig, timeout: Duration) -> Result<Self> {
        match (&cfg.topic, cfg.enabled) {
            (Some(topic), true) => Self::new(&cfg.base_url, topic, timeout),
            (None, true) => {
                warn!("ntfy notification enabled but NTFY_TOPIC is not set; channel disabled");
                Ok(Self {
                    enabled: false,
                    url: String::new(),
                    http: http_client(timeout)?,
                })
            }
            _ => Ok(Self {
                enabled: false,
                url: String::new(),
                http: http_client(timeout)?,
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// ntfy priority header value (1..=5).
pub fn priority(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::High => "5",
        Urgency::Medium => "4",
        Urgency::Low => "3",
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    fn name(&self) -> &str {
        "ntfy"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, title: &str, body: &str, urgency: Urgency) -> Result<()> {
        // Title goes in the query string so non-ASCII text survives.
        let resp = self
            .http
            .post(&self.url)
            .query(&[("title", title)])
            .header("Priority", priority(urgency))
            .header("Tags", "trading")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| send_error("ntfy", e))?;

        check_status("ntfy", resp).await?;
        info!(title = %title, "ntfy push sent");
        Ok(())
    }
}
