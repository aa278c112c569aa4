use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use common::{
    AdvisorDecision, CandleSeries, DecisionAdvisor, DecisionRecord, Error, IndicatorSet,
    Instrument, MarketDataSource, MarketSnapshot, ProgressEvent, ResultSink, Stage, StageStatus,
    WorkflowObserver,
};
use strategy::{build_snapshot, IndicatorProvider, StrategyScorer};

use crate::dispatch::{dispatch_isolated, Effect};
use crate::fanout::NotificationFanout;
use crate::message::signal_message;
use crate::observer::NullObserver;

/// Result of one pipeline run for one instrument.
#[derive(Debug)]
pub enum WorkflowOutcome {
    Completed(Box<DecisionRecord>),
    /// The data source answered with zero candles. Not a failure.
    SkippedNoData,
    Failed(Error),
}

impl WorkflowOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, WorkflowOutcome::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Candles requested per run.
    pub candle_limit: usize,
    pub fetch_timeout: Duration,
    pub advisor_timeout: Duration,
    /// Per-sink and per-channel timeout for persistence and notification.
    pub effect_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            candle_limit: 100,
            fetch_timeout: Duration::from_secs(30),
            advisor_timeout: Duration::from_secs(30),
            effect_timeout: Duration::from_secs(30),
        }
    }
}

/// Fetch → indicators → advisor → score → persist → notify, for one instrument.
///
/// Only the fetch stage can fail a run. Every later stage falls back to a
/// safe default and the run carries on. Each stage reports start and end to
/// the observer, followed by one summary event.
pub struct WorkflowPipeline {
    source: Arc<dyn MarketDataSource>,
    indicators: Arc<dyn IndicatorProvider>,
    advisor: Option<Arc<dyn DecisionAdvisor>>,
    scorer: StrategyScorer,
    sinks: Vec<Arc<dyn ResultSink>>,
    fanout: NotificationFanout,
    observer: Arc<dyn WorkflowObserver>,
    settings: PipelineSettings,
}

/// Emits progress events for one run.
struct RunReporter<'a> {
    run_id: Uuid,
    symbol: &'a str,
    observer: &'a dyn WorkflowObserver,
}

impl RunReporter<'_> {
    fn emit(&self, stage: Stage, status: StageStatus, message: impl Into<String>) {
        let event = ProgressEvent::new(self.run_id, self.symbol, stage, status, message);
        self.observer.on_event(&event);
    }
}

impl WorkflowPipeline {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        indicators: Arc<dyn IndicatorProvider>,
        scorer: StrategyScorer,
        fanout: NotificationFanout,
    ) -> Self {
        Self {
            source,
            indicators,
            advisor: None,
            scorer,
            sinks: Vec::new(),
            fanout,
            observer: Arc::new(NullObserver),
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn DecisionAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn fanout(&self) -> &NotificationFanout {
        &self.fanout
    }

    /// Run every stage for `instrument`. Never panics and never returns early
    /// without a summary event.
    pub async fn run(&self, instrument: &Instrument) -> WorkflowOutcome {
        let reporter = RunReporter {
            run_id: Uuid::new_v4(),
            symbol: &instrument.symbol,
            observer: self.observer.as_ref(),
        };
        info!(symbol = %instrument.symbol, interval = %instrument.interval, "Pipeline run started");

        let outcome = match AssertUnwindSafe(self.run_stages(&reporter, instrument))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(symbol = %instrument.symbol, reason = %reason, "Pipeline run panicked");
                WorkflowOutcome::Failed(Error::Other(format!("pipeline panicked: {reason}")))
            }
        };

        let (status, summary) = match &outcome {
            WorkflowOutcome::Completed(record) => (
                StageStatus::Completed,
                format!(
                    "{} with confidence {:.2}",
                    record.strategy.decision, record.strategy.confidence
                ),
            ),
            WorkflowOutcome::SkippedNoData => {
                (StageStatus::Skipped, "no candles available".to_string())
            }
            WorkflowOutcome::Failed(e) => (StageStatus::Failed, format!("run failed: {e}")),
        };
        info!(symbol = %instrument.symbol, status = ?status, "{summary}");
        reporter.emit(Stage::Summary, status, summary);
        outcome
    }

    async fn run_stages(&self, r: &RunReporter<'_>, instrument: &Instrument) -> WorkflowOutcome {
        // 1. Fetch
        let candles = match self.fetch(r, instrument).await {
            Ok(c) if c.is_empty() => {
                warn!(symbol = %instrument.symbol, "No candles returned, skipping run");
                r.emit(Stage::Fetch, StageStatus::Skipped, "no candles returned");
                return WorkflowOutcome::SkippedNoData;
            }
            Ok(c) => c,
            Err(e) => {
                error!(symbol = %instrument.symbol, error = %e, "Candle fetch failed");
                r.emit(Stage::Fetch, StageStatus::Failed, e.to_string());
                return WorkflowOutcome::Failed(e);
            }
        };
        r.emit(
            Stage::Fetch,
            StageStatus::Completed,
            format!("{} candles", candles.len()),
        );

        // 2. Indicators
        let indicators = self.compute_indicators(r, &candles);

        // 3. Advisor
        let snapshot = build_snapshot(instrument, &candles, &indicators);
        let advisor = self.consult_advisor(r, snapshot.as_ref()).await;

        // 4. Strategy
        r.emit(Stage::Strategy, StageStatus::Started, "scoring");
        let strategy = self.scorer.score(&indicators, &advisor);
        info!(
            symbol = %instrument.symbol,
            decision = %strategy.decision,
            confidence = strategy.confidence,
            "Strategy result"
        );
        r.emit(Stage::Strategy, StageStatus::Completed, strategy.details.clone());

        // 5. Persist
        let Some(latest) = candles.latest() else {
            return WorkflowOutcome::SkippedNoData;
        };
        let record = match DecisionRecord::build(instrument, latest, &indicators, &advisor, strategy)
        {
            Ok(record) => record,
            Err(e) => {
                error!(symbol = %instrument.symbol, error = %e, "Failed to build decision record");
                r.emit(Stage::Persist, StageStatus::Failed, e.to_string());
                return WorkflowOutcome::Failed(e);
            }
        };
        self.persist(r, &record).await;

        // 6. Notify
        self.notify(r, &record, snapshot.as_ref(), &advisor).await;

        WorkflowOutcome::Completed(Box::new(record))
    }

    async fn fetch(&self, r: &RunReporter<'_>, instrument: &Instrument) -> common::Result<CandleSeries> {
        r.emit(
            Stage::Fetch,
            StageStatus::Started,
            format!("requesting {} {} candles", self.settings.candle_limit, instrument.interval),
        );
        let timeout = self.settings.fetch_timeout;
        tokio::time::timeout(timeout, self.source.fetch(instrument, self.settings.candle_limit))
            .await
            .map_err(|_| Error::Timeout(format!("candle fetch exceeded {}s", timeout.as_secs())))?
    }

    fn compute_indicators(&self, r: &RunReporter<'_>, candles: &CandleSeries) -> IndicatorSet {
        r.emit(Stage::Indicators, StageStatus::Started, "computing indicators");
        let computed =
            std::panic::catch_unwind(AssertUnwindSafe(|| self.indicators.compute(candles)));
        match computed {
            Ok(set) if set.is_empty() => {
                warn!(candles = candles.len(), "No indicators computed (insufficient history)");
                r.emit(
                    Stage::Indicators,
                    StageStatus::Degraded,
                    "insufficient history for any indicator",
                );
                set
            }
            Ok(set) => {
                let names: Vec<&str> = set.names().collect();
                r.emit(Stage::Indicators, StageStatus::Completed, names.join(", "));
                set
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(reason = %reason, "Indicator computation panicked");
                r.emit(Stage::Indicators, StageStatus::Degraded, reason);
                IndicatorSet::new()
            }
        }
    }

    async fn consult_advisor(
        &self,
        r: &RunReporter<'_>,
        snapshot: Option<&MarketSnapshot>,
    ) -> AdvisorDecision {
        r.emit(Stage::Advisor, StageStatus::Started, "consulting advisor");
        let result = match (&self.advisor, snapshot) {
            (None, _) => Err("no advisor configured".to_string()),
            (_, None) => Err("no market snapshot".to_string()),
            (Some(advisor), Some(snapshot)) => {
                let call = AssertUnwindSafe(advisor.analyze(snapshot)).catch_unwind();
                match tokio::time::timeout(self.settings.advisor_timeout, call).await {
                    Ok(Ok(Ok(decision))) => Ok(decision),
                    Ok(Ok(Err(e))) => Err(e.to_string()),
                    Ok(Err(panic)) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
                    Err(_) => Err(format!(
                        "timed out after {}s",
                        self.settings.advisor_timeout.as_secs()
                    )),
                }
            }
        };

        match result {
            Ok(decision) => {
                r.emit(
                    Stage::Advisor,
                    StageStatus::Completed,
                    format!("{} ({:.2})", decision.category, decision.confidence),
                );
                decision
            }
            Err(reason) => {
                warn!(reason = %reason, "Advisor unavailable, using neutral default");
                let fallback = AdvisorDecision::unavailable(&reason);
                r.emit(Stage::Advisor, StageStatus::Degraded, fallback.rationale.clone());
                fallback
            }
        }
    }

    async fn persist(&self, r: &RunReporter<'_>, record: &DecisionRecord) {
        if self.sinks.is_empty() {
            r.emit(Stage::Persist, StageStatus::Skipped, "no result sink configured");
            return;
        }
        r.emit(Stage::Persist, StageStatus::Started, record.key().to_string());

        let effects: Vec<Effect> = self
            .sinks
            .iter()
            .map(|sink| {
                let name = sink.name().to_string();
                let sink = sink.clone();
                let fut = async move { sink.save(record).await }.boxed();
                (name, fut)
            })
            .collect();
        let report = dispatch_isolated("persist", effects, self.settings.effect_timeout).await;

        if report.all_succeeded() {
            r.emit(
                Stage::Persist,
                StageStatus::Completed,
                format!("saved to {}", report.succeeded.join(", ")),
            );
        } else {
            r.emit(
                Stage::Persist,
                StageStatus::Degraded,
                describe_failures(&report.failed),
            );
        }
    }

    async fn notify(
        &self,
        r: &RunReporter<'_>,
        record: &DecisionRecord,
        snapshot: Option<&MarketSnapshot>,
        advisor: &AdvisorDecision,
    ) {
        let decision = record.strategy.decision;
        if decision.is_neutral() {
            info!(symbol = %record.symbol, "Neutral signal, notification suppressed");
            r.emit(Stage::Notify, StageStatus::Skipped, "neutral signal suppressed");
            return;
        }

        r.emit(Stage::Notify, StageStatus::Started, format!("sending {decision} signal"));
        let (title, body) = signal_message(record, snapshot, advisor);
        let report = self.fanout.notify(&title, &body, decision).await;

        if report.all_succeeded() {
            r.emit(
                Stage::Notify,
                StageStatus::Completed,
                format!("delivered to {} channel(s)", report.succeeded.len()),
            );
        } else {
            r.emit(
                Stage::Notify,
                StageStatus::Degraded,
                describe_failures(&report.failed),
            );
        }
    }
}

fn describe_failures(failed: &[(String, String)]) -> String {
    failed
        .iter()
        .map(|(name, reason)| format!("{name}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use common::{Decision, Urgency};
    use std::sync::atomic::Ordering;

    struct Harness {
        sink: Arc<MemorySink>,
        notifier: Arc<RecordingNotifier>,
        observer: Arc<CollectingObserver>,
    }

    fn pipeline(
        source: Arc<ScriptedSource>,
        indicators: Arc<dyn IndicatorProvider>,
        advisor: Option<Arc<ScriptedAdvisor>>,
        sink: Arc<MemorySink>,
    ) -> (WorkflowPipeline, Harness) {
        let notifier = Arc::new(RecordingNotifier::default());
        let observer = Arc::new(CollectingObserver::default());
        let fanout = NotificationFanout::new(vec![notifier.clone()], Duration::from_secs(1));
        let mut pipeline =
            WorkflowPipeline::new(source, indicators, StrategyScorer::default(), fanout)
                .with_sink(sink.clone())
                .with_observer(observer.clone())
                .with_settings(PipelineSettings {
                    advisor_timeout: Duration::from_millis(50),
                    ..PipelineSettings::default()
                });
        if let Some(advisor) = advisor {
            pipeline = pipeline.with_advisor(advisor);
        }
        (
            pipeline,
            Harness {
                sink,
                notifier,
                observer,
            },
        )
    }

    fn last_status(h: &Harness, stage: Stage) -> Option<StageStatus> {
        h.observer
            .events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|e| e.stage == stage)
            .map(|e| e.status)
    }

    #[tokio::test]
    async fn oversold_buy_signal_is_persisted_and_notified() {
        let (p, h) = pipeline(
            ScriptedSource::new(SourceScript::Candles(60)),
            FixedIndicators::rsi(25.0),
            Some(ScriptedAdvisor::new(Decision::Buy, 0.7)),
            Arc::new(MemorySink::default()),
        );

        let outcome = p.run(&btc()).await;
        let WorkflowOutcome::Completed(record) = outcome else {
            panic!("expected completed run, got {outcome:?}");
        };
        assert_eq!(record.strategy.decision, Decision::Buy);
        assert!((record.strategy.confidence - 0.70).abs() < 1e-9);

        assert_eq!(h.sink.saved.lock().unwrap().len(), 1);
        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, Urgency::Medium);
        assert!(sent[0].0.contains("BTC/USDT"));
        drop(sent);

        assert_eq!(last_status(&h, Stage::Summary), Some(StageStatus::Completed));
        let events = h.observer.events.lock().unwrap();
        let run_id = events[0].run_id;
        assert!(events.iter().all(|e| e.run_id == run_id));
    }

    #[tokio::test]
    async fn zero_candles_skip_without_side_effects() {
        let (p, h) = pipeline(
            ScriptedSource::new(SourceScript::Candles(0)),
            FixedIndicators::rsi(25.0),
            Some(ScriptedAdvisor::new(Decision::StrongBuy, 0.9)),
            Arc::new(MemorySink::default()),
        );

        assert!(matches!(p.run(&btc()).await, WorkflowOutcome::SkippedNoData));
        assert!(h.sink.saved.lock().unwrap().is_empty());
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        assert_eq!(last_status(&h, Stage::Summary), Some(StageStatus::Skipped));
    }

    #[tokio::test]
    async fn fetch_failure_fails_the_run() {
        let source = ScriptedSource::new(SourceScript::Fail(|| {
            Error::Config("no data source configured for CN market (600519.SH)".into())
        }));
        let (p, h) = pipeline(
            source.clone(),
            FixedIndicators::rsi(25.0),
            None,
            Arc::new(MemorySink::default()),
        );

        let outcome = p.run(&btc()).await;
        assert!(matches!(outcome, WorkflowOutcome::Failed(Error::Config(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(last_status(&h, Stage::Fetch), Some(StageStatus::Failed));
        assert_eq!(last_status(&h, Stage::Summary), Some(StageStatus::Failed));
        assert!(h.sink.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_advisor_degrades_to_neutral_and_suppresses_notification() {
        let (p, h) = pipeline(
            ScriptedSource::new(SourceScript::Candles(60)),
            FixedIndicators::rsi(25.0),
            Some(ScriptedAdvisor::slow(Duration::from_secs(5))),
            Arc::new(MemorySink::default()),
        );

        let WorkflowOutcome::Completed(record) = p.run(&btc()).await else {
            panic!("advisor timeout must not fail the run");
        };
        assert_eq!(record.strategy.decision, Decision::Neutral);
        assert!(record.advisor_json.contains("advisor unavailable"));
        assert_eq!(h.sink.saved.lock().unwrap().len(), 1);
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        assert_eq!(last_status(&h, Stage::Advisor), Some(StageStatus::Degraded));
        assert_eq!(last_status(&h, Stage::Notify), Some(StageStatus::Skipped));
    }

    #[tokio::test]
    async fn missing_advisor_is_treated_as_unavailable() {
        let (p, h) = pipeline(
            ScriptedSource::new(SourceScript::Candles(60)),
            FixedIndicators::rsi(50.0),
            None,
            Arc::new(MemorySink::default()),
        );

        let WorkflowOutcome::Completed(record) = p.run(&btc()).await else {
            panic!("expected completed run");
        };
        assert_eq!(record.strategy.decision, Decision::Neutral);
        assert_eq!(last_status(&h, Stage::Advisor), Some(StageStatus::Degraded));
    }

    #[tokio::test]
    async fn sink_failure_still_notifies() {
        let (p, h) = pipeline(
            ScriptedSource::new(SourceScript::Candles(60)),
            FixedIndicators::rsi(75.0),
            Some(ScriptedAdvisor::new(Decision::StrongSell, 0.9)),
            MemorySink::failing(),
        );

        assert!(matches!(p.run(&btc()).await, WorkflowOutcome::Completed(_)));
        assert_eq!(last_status(&h, Stage::Persist), Some(StageStatus::Degraded));
        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, Urgency::High);
    }

    #[tokio::test]
    async fn empty_indicator_set_degrades_but_completes() {
        let (p, h) = pipeline(
            ScriptedSource::new(SourceScript::Candles(3)),
            Arc::new(FixedIndicators(IndicatorSet::new())),
            Some(ScriptedAdvisor::new(Decision::Sell, 0.6)),
            Arc::new(MemorySink::default()),
        );

        let WorkflowOutcome::Completed(record) = p.run(&btc()).await else {
            panic!("expected completed run");
        };
        assert_eq!(record.strategy.technical_score, 0.5);
        assert_eq!(last_status(&h, Stage::Indicators), Some(StageStatus::Degraded));
    }

    struct Exploding;

    impl IndicatorProvider for Exploding {
        fn compute(&self, _candles: &CandleSeries) -> IndicatorSet {
            panic!("index out of bounds")
        }
    }

    #[tokio::test]
    async fn panicking_indicator_provider_is_contained() {
        let (p, h) = pipeline(
            ScriptedSource::new(SourceScript::Candles(60)),
            Arc::new(Exploding),
            Some(ScriptedAdvisor::new(Decision::Buy, 0.6)),
            Arc::new(MemorySink::default()),
        );

        assert!(matches!(p.run(&btc()).await, WorkflowOutcome::Completed(_)));
        assert_eq!(last_status(&h, Stage::Indicators), Some(StageStatus::Degraded));
    }
}
