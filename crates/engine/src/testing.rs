//! Scripted capability doubles shared by the engine's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use common::{
    AdvisorDecision, Candle, CandleSeries, Decision, DecisionAdvisor, DecisionRecord, Error,
    IndicatorSet, Instrument, Interval, Market, MarketDataSource, MarketSnapshot, Notifier,
    ProgressEvent, Result, ResultSink, Urgency, WorkflowObserver,
};
use strategy::IndicatorProvider;

pub fn btc() -> Instrument {
    Instrument::new("BTC/USDT", "Bitcoin", Market::Crypto, Interval::OneHour)
}

pub fn candles(n: usize) -> CandleSeries {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    CandleSeries::new(
        (0..n)
            .map(|i| {
                let open_time = start + chrono::Duration::hours(i as i64);
                let close = 100.0 + i as f64;
                Candle {
                    open_time,
                    close_time: open_time + chrono::Duration::milliseconds(3_599_999),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10.0,
                    amount: None,
                    pct_change: None,
                }
            })
            .collect(),
    )
}

pub enum SourceScript {
    Candles(usize),
    Fail(fn() -> Error),
}

pub struct ScriptedSource {
    script: SourceScript,
    pub calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: SourceScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, _instrument: &Instrument, _limit: usize) -> Result<CandleSeries> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            SourceScript::Candles(n) => Ok(candles(*n)),
            SourceScript::Fail(make) => Err(make()),
        }
    }
}

/// Ignores the candles and returns a fixed set.
pub struct FixedIndicators(pub IndicatorSet);

impl FixedIndicators {
    pub fn rsi(value: f64) -> Arc<Self> {
        let mut set = IndicatorSet::new();
        set.insert(IndicatorSet::RSI, vec![value]);
        Arc::new(Self(set))
    }
}

impl IndicatorProvider for FixedIndicators {
    fn compute(&self, _candles: &CandleSeries) -> IndicatorSet {
        self.0.clone()
    }
}

pub struct ScriptedAdvisor {
    pub decision: Decision,
    pub confidence: f64,
    pub delay: Option<Duration>,
}

impl ScriptedAdvisor {
    pub fn new(decision: Decision, confidence: f64) -> Arc<Self> {
        Arc::new(Self {
            decision,
            confidence,
            delay: None,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            decision: Decision::StrongBuy,
            confidence: 0.9,
            delay: Some(delay),
        })
    }
}

#[async_trait]
impl DecisionAdvisor for ScriptedAdvisor {
    async fn analyze(&self, _snapshot: &MarketSnapshot) -> Result<AdvisorDecision> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(AdvisorDecision::new(self.decision, self.confidence, "scripted"))
    }
}

#[derive(Default)]
pub struct MemorySink {
    pub fail: bool,
    pub saved: Mutex<Vec<DecisionRecord>>,
}

impl MemorySink {
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            saved: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, record: &DecisionRecord) -> Result<()> {
        if self.fail {
            return Err(Error::Other("disk full".into()));
        }
        self.saved.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Urgency)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn send(&self, title: &str, _body: &str, urgency: Urgency) -> Result<()> {
        self.sent.lock().unwrap().push((title.to_string(), urgency));
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingObserver {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl WorkflowObserver for CollectingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
