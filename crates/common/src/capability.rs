use async_trait::async_trait;

use crate::{
    AdvisorDecision, CandleSeries, DecisionRecord, Instrument, Market, MarketSnapshot,
    ProgressEvent, Result, Urgency,
};

/// Source of OHLCV candles.
///
/// An empty series is a valid answer ("nothing traded yet") and is distinct
/// from an error. `Error::Config` means the source cannot serve the request at
/// all.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Short name used in logs, e.g. "okx".
    fn name(&self) -> &str;

    /// Whether this source can serve instruments of `market`.
    fn supports(&self, _market: Market) -> bool {
        true
    }

    /// Fetch the most recent `limit` candles for the instrument's symbol and interval.
    async fn fetch(&self, instrument: &Instrument, limit: usize) -> Result<CandleSeries>;
}

/// Turns a market snapshot into a categorical decision plus rationale.
///
/// Callers must treat any error as "advisor unavailable" and substitute
/// [`AdvisorDecision::unavailable`].
#[async_trait]
pub trait DecisionAdvisor: Send + Sync {
    async fn analyze(&self, snapshot: &MarketSnapshot) -> Result<AdvisorDecision>;
}

/// One notification delivery channel (email, push, webhook, chat).
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Disabled channels are skipped by the fan-out without error.
    fn is_enabled(&self) -> bool;

    async fn send(&self, title: &str, body: &str, urgency: Urgency) -> Result<()>;
}

/// Best-effort persistence of decision records.
///
/// Saving the same record key twice must leave the store consistent.
#[async_trait]
pub trait ResultSink: Send + Sync {
    fn name(&self) -> &str;

    async fn save(&self, record: &DecisionRecord) -> Result<()>;
}

/// Push interface for live pipeline progress. Delivery is fire-and-forget.
pub trait WorkflowObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}
