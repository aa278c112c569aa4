pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;

use common::{CandleSeries, IndicatorSet};
use tracing::{debug, warn};

use crate::config::IndicatorParams;
use crate::IndicatorProvider;
use bollinger::BollingerBands;
use macd::MacdIndicator;
use moving_average::{ema_series, sma_series};
use rsi::RsiIndicator;

/// Computes the standard indicator set over candle closes.
///
/// Each indicator is inserted only when the series is long enough for it;
/// a short series yields a partial (possibly empty) set.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    rsi: RsiIndicator,
    macd: MacdIndicator,
    bollinger: BollingerBands,
}

impl IndicatorEngine {
    pub fn new(params: &IndicatorParams) -> Self {
        Self {
            rsi: RsiIndicator::new(params.rsi_period),
            macd: MacdIndicator::new(params.macd_fast, params.macd_slow, params.macd_signal),
            bollinger: BollingerBands::new(params.bb_period, params.bb_std_dev),
        }
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(&IndicatorParams::default())
    }
}

impl IndicatorProvider for IndicatorEngine {
    fn compute(&self, candles: &CandleSeries) -> IndicatorSet {
        let closes = candles.closes();
        let mut set = IndicatorSet::new();

        if let Some(rsi) = self.rsi.series(&closes) {
            set.insert(IndicatorSet::RSI, rsi);
        }
        if let Some(macd) = self.macd.series(&closes) {
            set.insert(IndicatorSet::MACD, macd.macd);
            set.insert(IndicatorSet::MACD_SIGNAL, macd.signal);
            set.insert(IndicatorSet::MACD_HISTOGRAM, macd.histogram);
        }
        if let Some(bands) = self.bollinger.series(&closes) {
            set.insert(IndicatorSet::BB_UPPER, bands.upper);
            set.insert(IndicatorSet::BB_MIDDLE, bands.middle);
            set.insert(IndicatorSet::BB_LOWER, bands.lower);
        }
        if let Some(sma) = sma_series(&closes, 20) {
            set.insert(IndicatorSet::SMA20, sma);
        }
        if let Some(ema) = ema_series(&closes, 12) {
            set.insert(IndicatorSet::EMA12, ema);
        }
        if let Some(ema) = ema_series(&closes, 26) {
            set.insert(IndicatorSet::EMA26, ema);
        }

        if set.is_empty() {
            warn!(
                candles = closes.len(),
                "Not enough history for any indicator"
            );
        } else {
            debug!(candles = closes.len(), indicators = set.len(), "Indicators computed");
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::Candle;

    fn series(n: usize) -> CandleSeries {
        CandleSeries::new(
            (0..n)
                .map(|i| {
                    let t = i as i64 * 60_000;
                    let close = 100.0 + (i as f64 * 0.3).sin() * 5.0;
                    Candle {
                        open_time: Utc.timestamp_millis_opt(t).unwrap(),
                        close_time: Utc.timestamp_millis_opt(t + 59_999).unwrap(),
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

    #[test]
    fn full_history_yields_every_indicator() {
        let set = IndicatorEngine::default().compute(&series(100));
        for name in [
            IndicatorSet::RSI,
            IndicatorSet::MACD,
            IndicatorSet::MACD_SIGNAL,
            IndicatorSet::MACD_HISTOGRAM,
            IndicatorSet::BB_UPPER,
            IndicatorSet::BB_MIDDLE,
            IndicatorSet::BB_LOWER,
            IndicatorSet::SMA20,
            IndicatorSet::EMA12,
            IndicatorSet::EMA26,
        ] {
            assert!(set.contains(name), "missing {name}");
        }
        assert_eq!(set.get(IndicatorSet::RSI).unwrap().len(), 100 - 14);
        assert_eq!(set.get(IndicatorSet::SMA20).unwrap().len(), 100 - 19);
    }

    #[test]
    fn partial_history_omits_long_lookbacks() {
        // 20 closes: RSI, Bollinger, SMA20, EMA12 fit; MACD and EMA26 do not.
        let set = IndicatorEngine::default().compute(&series(20));
        assert!(set.contains(IndicatorSet::RSI));
        assert!(set.contains(IndicatorSet::BB_MIDDLE));
        assert!(set.contains(IndicatorSet::EMA12));
        assert!(!set.contains(IndicatorSet::MACD));
        assert!(!set.contains(IndicatorSet::EMA26));
    }

    #[test]
    fn macd_line_present_before_signal() {
        let set = IndicatorEngine::default().compute(&series(30));
        assert!(set.contains(IndicatorSet::MACD));
        assert!(!set.contains(IndicatorSet::MACD_SIGNAL));
        assert!(!set.contains(IndicatorSet::MACD_HISTOGRAM));
    }

    #[test]
    fn empty_series_yields_empty_set() {
        assert!(IndicatorEngine::default()
            .compute(&CandleSeries::empty())
            .is_empty());
    }
}
