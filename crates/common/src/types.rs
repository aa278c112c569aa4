use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Instruments ─────────────────────────────────────────────────────────────

/// Venue group an instrument trades in. Also the unit of per-market scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Cn,
    Hk,
    Us,
    Crypto,
}

impl Market {
    pub const ALL: [Market; 4] = [Market::Cn, Market::Hk, Market::Us, Market::Crypto];

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Cn => "CN",
            Market::Hk => "HK",
            Market::Us => "US",
            Market::Crypto => "CRYPTO",
        }
    }

    /// Bar size used when a registration does not name one.
    pub fn default_interval(&self) -> Interval {
        match self {
            Market::Crypto => Interval::OneMinute,
            _ => Interval::OneDay,
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Market {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "CN" => Ok(Market::Cn),
            "HK" => Ok(Market::Hk),
            "US" => Ok(Market::Us),
            "CRYPTO" => Ok(Market::Crypto),
            other => Err(Error::Validation(format!("unknown market '{other}'"))),
        }
    }
}

/// Candle bar size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1w",
        }
    }

    /// Length of one bar in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        const MINUTE: i64 = 60 * 1000;
        match self {
            Interval::OneMinute => MINUTE,
            Interval::FiveMinutes => 5 * MINUTE,
            Interval::FifteenMinutes => 15 * MINUTE,
            Interval::ThirtyMinutes => 30 * MINUTE,
            Interval::OneHour => 60 * MINUTE,
            Interval::FourHours => 4 * 60 * MINUTE,
            Interval::OneDay => 24 * 60 * MINUTE,
            Interval::OneWeek => 7 * 24 * 60 * MINUTE,
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1m" => Ok(Interval::OneMinute),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            "30m" => Ok(Interval::ThirtyMinutes),
            "1h" => Ok(Interval::OneHour),
            "4h" => Ok(Interval::FourHours),
            "1d" => Ok(Interval::OneDay),
            "1w" => Ok(Interval::OneWeek),
            other => Err(Error::Validation(format!("unknown interval '{other}'"))),
        }
    }
}

/// A tradable symbol watched by the bot. Unique by `symbol` within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Venue symbol, e.g. "BTC/USDT" or "00700.HK".
    pub symbol: String,
    /// Human-readable name shown in notifications and the dashboard.
    #[serde(alias = "name")]
    pub display_name: String,
    pub market: Market,
    pub interval: Interval,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        market: Market,
        interval: Interval,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
            market,
            interval,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(Error::Validation("instrument symbol is required".into()));
        }
        if self.display_name.trim().is_empty() {
            return Err(Error::Validation(format!(
                "instrument '{}' is missing a display name",
                self.symbol
            )));
        }
        Ok(())
    }
}

/// Loosely-typed registration input (dashboard JSON, Telegram arguments).
/// Converted into an [`Instrument`] with `TryFrom`, which rejects missing fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstrumentDraft {
    pub symbol: Option<String>,
    #[serde(alias = "name")]
    pub display_name: Option<String>,
    pub market: Option<Market>,
    /// Optional; falls back to the market's default bar size.
    pub interval: Option<Interval>,
}

impl TryFrom<InstrumentDraft> for Instrument {
    type Error = Error;

    fn try_from(draft: InstrumentDraft) -> Result<Self> {
        let symbol = draft
            .symbol
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Validation("instrument symbol is required".into()))?;
        let display_name = draft
            .display_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Validation(format!("instrument '{symbol}' is missing a display name")))?;
        let market = draft
            .market
            .ok_or_else(|| Error::Validation(format!("instrument '{symbol}' is missing a market")))?;
        let interval = draft.interval.unwrap_or_else(|| market.default_interval());

        Ok(Instrument {
            symbol,
            display_name,
            market,
            interval,
        })
    }
}

// ─── Candles ─────────────────────────────────────────────────────────────────

/// One OHLCV bar. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Traded value, where the venue reports it.
    #[serde(default)]
    pub amount: Option<f64>,
    /// Percent change against the previous close, where the venue reports it.
    #[serde(default)]
    pub pct_change: Option<f64>,
}

/// Candles ordered strictly by `open_time`, one per open time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandleSeries(Vec<Candle>);

impl CandleSeries {
    /// Sort by open time and collapse duplicates. When two candles share an
    /// open time the one appearing later in the input wins.
    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.open_time);
        let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match out.last_mut() {
                Some(prev) if prev.open_time == candle.open_time => *prev = candle,
                _ => out.push(candle),
            }
        }
        Self(out)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.0.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.0.iter().map(|c| c.close).collect()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.0
    }

    /// Keep only the most recent `limit` candles.
    pub fn truncate_to_latest(mut self, limit: usize) -> Self {
        if self.0.len() > limit {
            let excess = self.0.len() - limit;
            self.0.drain(..excess);
        }
        self
    }
}

// ─── Indicators ──────────────────────────────────────────────────────────────

/// Indicator name → series aligned to a suffix of the input candles.
/// An indicator without enough history is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorSet(BTreeMap<String, Vec<f64>>);

impl IndicatorSet {
    pub const RSI: &'static str = "rsi";
    pub const MACD: &'static str = "macd";
    pub const MACD_SIGNAL: &'static str = "macd_signal";
    pub const MACD_HISTOGRAM: &'static str = "macd_histogram";
    pub const BB_UPPER: &'static str = "bb_upper";
    pub const BB_MIDDLE: &'static str = "bb_middle";
    pub const BB_LOWER: &'static str = "bb_lower";
    pub const SMA20: &'static str = "sma20";
    pub const EMA12: &'static str = "ema12";
    pub const EMA26: &'static str = "ema26";

    pub fn new() -> Self {
        Self::default()
    }

    /// Empty series are not stored, so `contains` always implies a value.
    pub fn insert(&mut self, name: impl Into<String>, series: Vec<f64>) {
        if !series.is_empty() {
            self.0.insert(name.into(), series);
        }
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Latest value of a series. Non-finite values count as absent.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.get(name)
            .and_then(|s| s.last().copied())
            .filter(|v| v.is_finite())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Relationship of the MACD line to its signal line over the last two bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacdCrossover {
    /// MACD crossed above the signal line on the latest bar.
    Bullish,
    /// MACD crossed below the signal line on the latest bar.
    Bearish,
    /// No crossover on the latest bar.
    None,
}

impl std::fmt::Display for MacdCrossover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MacdCrossover::Bullish => write!(f, "bullish crossover"),
            MacdCrossover::Bearish => write!(f, "bearish crossover"),
            MacdCrossover::None => write!(f, "no crossover"),
        }
    }
}

/// Structured summary handed to the decision advisor. Every indicator value
/// is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub instrument: Instrument,
    pub latest: Candle,
    pub candle_count: usize,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub macd_crossover: Option<MacdCrossover>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub sma20: Option<f64>,
    pub ema12: Option<f64>,
    pub ema26: Option<f64>,
}

// ─── Decisions ───────────────────────────────────────────────────────────────

/// Categorical trading decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::StrongBuy => "STRONG_BUY",
            Decision::Buy => "BUY",
            Decision::Neutral => "NEUTRAL",
            Decision::Sell => "SELL",
            Decision::StrongSell => "STRONG_SELL",
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Decision::Neutral
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Decision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "STRONG_BUY" => Ok(Decision::StrongBuy),
            "BUY" => Ok(Decision::Buy),
            "NEUTRAL" => Ok(Decision::Neutral),
            "SELL" => Ok(Decision::Sell),
            "STRONG_SELL" => Ok(Decision::StrongSell),
            other => Err(Error::Validation(format!("unknown decision '{other}'"))),
        }
    }
}

/// Delivery urgency. Channels translate it into their own priority scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    /// Map a free-form category label. Anything unrecognised is `Medium`.
    pub fn for_label(label: &str) -> Self {
        label
            .parse::<Decision>()
            .map(Urgency::from)
            .unwrap_or(Urgency::Medium)
    }
}

impl From<Decision> for Urgency {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::StrongBuy | Decision::StrongSell => Urgency::High,
            Decision::Buy | Decision::Sell => Urgency::Medium,
            Decision::Neutral => Urgency::Low,
        }
    }
}

/// Advisor output for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorDecision {
    pub category: Decision,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub rationale: String,
    /// Truncated rationale for notifications.
    pub summary: String,
}

impl AdvisorDecision {
    pub const DEFAULT_CONFIDENCE: f64 = 0.5;
    pub const SUMMARY_CHARS: usize = 100;

    pub fn new(category: Decision, confidence: f64, rationale: impl Into<String>) -> Self {
        let rationale = rationale.into();
        let confidence = if confidence.is_nan() {
            Self::DEFAULT_CONFIDENCE
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            category,
            confidence,
            summary: summarize(&rationale, Self::SUMMARY_CHARS),
            rationale,
        }
    }

    /// Substitute used whenever the advisor cannot be consulted.
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::new(
            Decision::Neutral,
            Self::DEFAULT_CONFIDENCE,
            format!("advisor unavailable: {reason}"),
        )
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn summarize(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Blend of indicator score and advisor decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub decision: Decision,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Indicator-only score in `[0, 1]`, 0.5 being neutral.
    pub technical_score: f64,
    pub details: String,
}

/// Stable identity of a decision record: one per closed candle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub symbol: String,
    pub interval: Interval,
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.symbol,
            self.interval,
            self.timestamp.timestamp_millis()
        )
    }
}

/// Persisted outcome of one completed pipeline run. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub symbol: String,
    pub display_name: String,
    pub market: Market,
    pub interval: Interval,
    /// Close time of the last candle in the analysed window.
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Serialized [`IndicatorSet`].
    pub indicators_json: String,
    /// Serialized [`AdvisorDecision`].
    pub advisor_json: String,
    pub strategy: StrategyResult,
}

impl DecisionRecord {
    pub fn build(
        instrument: &Instrument,
        latest: &Candle,
        indicators: &IndicatorSet,
        advisor: &AdvisorDecision,
        strategy: StrategyResult,
    ) -> Result<Self> {
        Ok(Self {
            symbol: instrument.symbol.clone(),
            display_name: instrument.display_name.clone(),
            market: instrument.market,
            interval: instrument.interval,
            timestamp: latest.close_time,
            open: latest.open,
            high: latest.high,
            low: latest.low,
            close: latest.close,
            volume: latest.volume,
            indicators_json: serde_json::to_string(indicators)?,
            advisor_json: serde_json::to_string(advisor)?,
            strategy,
        })
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            symbol: self.symbol.clone(),
            interval: self.interval,
            timestamp: self.timestamp,
        }
    }
}

// ─── Bot lifecycle ───────────────────────────────────────────────────────────

/// Lifecycle state of the bot controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BotState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for BotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotState::Stopped => write!(f, "stopped"),
            BotState::Starting => write!(f, "starting"),
            BotState::Running => write!(f, "running"),
            BotState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Point-in-time view of the controller. Recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotStatus {
    pub is_running: bool,
    pub state: BotState,
    pub monitored_instruments: Vec<Instrument>,
    pub active_job_count: usize,
    /// Registered jobs, sorted by key.
    #[serde(default)]
    pub scheduled_jobs: Vec<ScheduledJob>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub key: String,
    pub cron: String,
}

/// What the scheduler does when a job fires while its previous run is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the new tick and log a warning.
    #[default]
    Skip,
    /// Run both concurrently.
    Allow,
}

impl FromStr for OverlapPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(OverlapPolicy::Skip),
            "allow" => Ok(OverlapPolicy::Allow),
            other => Err(Error::Config(format!(
                "overlap policy must be 'skip' or 'allow', got '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(open_ms: i64, close: f64) -> Candle {
        Candle {
            open_time: Utc.timestamp_millis_opt(open_ms).unwrap(),
            close_time: Utc.timestamp_millis_opt(open_ms + 59_999).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            amount: None,
            pct_change: None,
        }
    }

    #[test]
    fn candle_series_sorts_and_dedups_by_open_time() {
        let series = CandleSeries::new(vec![
            candle(120_000, 3.0),
            candle(0, 1.0),
            candle(60_000, 2.0),
            candle(60_000, 2.5),
        ]);
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![1.0, 2.5, 3.0]);
        let times: Vec<_> = series.as_slice().iter().map(|c| c.open_time).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn candle_series_truncates_to_latest() {
        let series = CandleSeries::new((0..10).map(|i| candle(i * 60_000, i as f64)).collect());
        let tail = series.truncate_to_latest(3);
        assert_eq!(tail.closes(), vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn indicator_set_ignores_empty_series_and_non_finite_latest() {
        let mut set = IndicatorSet::new();
        set.insert(IndicatorSet::RSI, vec![]);
        set.insert(IndicatorSet::MACD, vec![1.0, f64::NAN]);
        assert!(!set.contains(IndicatorSet::RSI));
        assert!(set.contains(IndicatorSet::MACD));
        assert_eq!(set.latest(IndicatorSet::MACD), None);
    }

    #[test]
    fn urgency_mapping() {
        assert_eq!(Urgency::from(Decision::StrongBuy), Urgency::High);
        assert_eq!(Urgency::from(Decision::StrongSell), Urgency::High);
        assert_eq!(Urgency::from(Decision::Buy), Urgency::Medium);
        assert_eq!(Urgency::from(Decision::Sell), Urgency::Medium);
        assert_eq!(Urgency::from(Decision::Neutral), Urgency::Low);
        assert_eq!(Urgency::for_label("strong sell"), Urgency::High);
        assert_eq!(Urgency::for_label("moonshot"), Urgency::Medium);
    }

    #[test]
    fn draft_rejects_missing_fields() {
        let missing_market = InstrumentDraft {
            symbol: Some("AAPL".into()),
            display_name: Some("Apple".into()),
            ..Default::default()
        };
        assert!(matches!(
            Instrument::try_from(missing_market),
            Err(Error::Validation(_))
        ));

        let blank_symbol = InstrumentDraft {
            symbol: Some("  ".into()),
            display_name: Some("Apple".into()),
            market: Some(Market::Us),
            interval: None,
        };
        assert!(matches!(
            Instrument::try_from(blank_symbol),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn draft_defaults_interval_from_market() {
        let draft = InstrumentDraft {
            symbol: Some("600519.SH".into()),
            display_name: Some("Kweichow Moutai".into()),
            market: Some(Market::Cn),
            interval: None,
        };
        let instrument = Instrument::try_from(draft).unwrap();
        assert_eq!(instrument.interval, Interval::OneDay);
    }

    #[test]
    fn advisor_decision_clamps_and_summarizes() {
        let long = "a".repeat(250);
        let d = AdvisorDecision::new(Decision::Buy, 1.7, long);
        assert_eq!(d.confidence, 1.0);
        assert_eq!(d.summary.chars().count(), AdvisorDecision::SUMMARY_CHARS + 3);

        let nan = AdvisorDecision::new(Decision::Sell, f64::NAN, "x");
        assert_eq!(nan.confidence, AdvisorDecision::DEFAULT_CONFIDENCE);
    }

    #[test]
    fn unavailable_advisor_is_neutral_half() {
        let d = AdvisorDecision::unavailable("timed out");
        assert_eq!(d.category, Decision::Neutral);
        assert_eq!(d.confidence, 0.5);
        assert!(d.rationale.starts_with("advisor unavailable"));
    }

    #[test]
    fn decision_parses_loose_spellings() {
        assert_eq!("strong-buy".parse::<Decision>().unwrap(), Decision::StrongBuy);
        assert_eq!(" Sell ".parse::<Decision>().unwrap(), Decision::Sell);
        assert!("hold".parse::<Decision>().is_err());
    }

    #[test]
    fn record_key_is_stable_for_same_candle() {
        let instrument = Instrument::new("BTC/USDT", "Bitcoin", Market::Crypto, Interval::OneMinute);
        let latest = candle(0, 100.0);
        let strategy = StrategyResult {
            decision: Decision::Neutral,
            confidence: 0.5,
            technical_score: 0.5,
            details: String::new(),
        };
        let advisor = AdvisorDecision::unavailable("offline");
        let a = DecisionRecord::build(&instrument, &latest, &IndicatorSet::new(), &advisor, strategy.clone())
            .unwrap();
        let b = DecisionRecord::build(&instrument, &latest, &IndicatorSet::new(), &advisor, strategy)
            .unwrap();
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().to_string(), "BTC/USDT|1m|59999");
    }
}
