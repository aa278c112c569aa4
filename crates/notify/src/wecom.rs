use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use common::{Notifier, Result, Urgency, WeComConfig};

use crate::{check_status, http_client, send_error};

/// WeCom (WeChat Work) group-bot webhook. Messages are sent as markdown.
pub struct WeComNotifier {
    webhook_url: Option<String>,
    http: Client,
}

#[derive(Debug, Serialize)]
struct MarkdownMessage {
    msgtype: &'static str,
    markdown: MarkdownContent,
}

#[derive(Debug, Serialize)]
struct MarkdownContent {
    content: String,
}

fn payload(title: &str, body: &str) -> MarkdownMessage {
    MarkdownMessage {
        msgtype: "markdown",
        markdown: MarkdownContent {
            content: format!("### {title}\n{body}"),
        },
    }
}

impl WeComNotifier {
    pub fn from_config(cfg: &WeComConfig, timeout: Duration) -> Result<Self> {
        let webhook_url = match (&cfg.webhook_url, cfg.enabled) {
            (Some(url), true) => Some(url.clone()),
            (None, true) => {
                warn!("WeCom notification enabled but WECOM_WEBHOOK_URL is not set; channel disabled");
                None
            }
            _ => None,
        };
        Ok(Self {
            webhook_url,
            http: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl Notifier for WeComNotifier {
    fn name(&self) -> &str {
        "wecom"
    }

    fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn send(&self, title: &str, body: &str, _urgency: Urgency) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            return Ok(());
        };

        let resp = self
            .http
            .post(url)
            .json(&payload(title, body))
            .send()
            .await
            .map_err(|e| send_error("wecom", e))?;

        check_status("wecom", resp).await?;
        info!(title = %title, "WeCom message sent");
        Ok(())
    }
}
