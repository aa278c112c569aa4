//! Notification delivery channels. Each implements [`common::Notifier`];
//! fan-out across channels lives in the engine.

pub mod email;
pub mod ntfy;
pub mod wecom;

pub use email::EmailNotifier;
pub use ntfy::NtfyNotifier;
pub use wecom::WeComNotifier;

use std::time::Duration;

use common::{Error, Result};

/// Shared reqwest client for webhook-style channels.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
}

/// Map a reqwest send failure onto the error taxonomy.
pub(crate) fn send_error(channel: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("{channel}: {e}"))
    } else {
        Error::Notify(format!("{channel} request failed: {e}"))
    }
}

/// Turn a non-2xx response into `Error::Notify` with status and truncated body.
pub(crate) async fn check_status(channel: &str, resp: reqwest::Response) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Notify(format!(
        "{channel} returned {status}: {}",
        common::truncate_payload(&body)
    )))
}
