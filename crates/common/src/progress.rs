use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Indicators,
    Advisor,
    Strategy,
    Persist,
    Notify,
    /// Emitted once at the end of every run, whatever the outcome.
    Summary,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Fetch => "fetch",
            Stage::Indicators => "indicators",
            Stage::Advisor => "advisor",
            Stage::Strategy => "strategy",
            Stage::Persist => "persist",
            Stage::Notify => "notify",
            Stage::Summary => "summary",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Started,
    Completed,
    Skipped,
    /// Finished on a fallback value after a failure.
    Degraded,
    Failed,
}

/// One line of the live progress narrative for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Shared by every event of the same run.
    pub run_id: Uuid,
    pub symbol: String,
    pub stage: Stage,
    pub status: StageStatus,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(
        run_id: Uuid,
        symbol: impl Into<String>,
        stage: Stage,
        status: StageStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            symbol: symbol.into(),
            stage,
            status,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} {:?}: {}",
            self.symbol, self.stage, self.status, self.message
        )
    }
}
