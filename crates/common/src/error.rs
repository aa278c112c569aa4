use thiserror::Error;

/// Longest slice of a remote payload kept in an error message.
const MAX_PAYLOAD_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Advisor error: {0}")]
    Advisor(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Network, timeout and remote-status failures. These are retried on the
    /// next scheduled tick rather than surfaced.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Exchange(_) | Error::Http(_) | Error::Advisor(_) | Error::Notify(_) | Error::Timeout(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Cut a remote response body down to something that fits in a log line.
pub fn truncate_payload(body: &str) -> String {
    if body.chars().count() <= MAX_PAYLOAD_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(MAX_PAYLOAD_CHARS).collect();
    cut.push_str("...");
    cut
}
