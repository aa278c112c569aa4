use common::{CandleSeries, IndicatorSet, Instrument, MarketSnapshot};

use crate::indicators::macd;

/// Summarise the latest candle and indicator values for the advisor.
/// Returns `None` for an empty series.
pub fn build_snapshot(
    instrument: &Instrument,
    candles: &CandleSeries,
    indicators: &IndicatorSet,
) -> Option<MarketSnapshot> {
    let latest = candles.latest()?.clone();

    let macd_crossover = match (
        indicators.get(IndicatorSet::MACD),
        indicators.get(IndicatorSet::MACD_SIGNAL),
    ) {
        (Some(line), Some(signal)) if is_finite_tail(line) && is_finite_tail(signal) => {
            macd::crossover(line, signal)
        }
        _ => None,
    };

    Some(MarketSnapshot {
        instrument: instrument.clone(),
        latest,
        candle_count: candles.len(),
        rsi: indicators.latest(IndicatorSet::RSI),
        macd: indicators.latest(IndicatorSet::MACD),
        macd_signal: indicators.latest(IndicatorSet::MACD_SIGNAL),
        macd_histogram: indicators.latest(IndicatorSet::MACD_HISTOGRAM),
        macd_crossover,
        bb_upper: indicators.latest(IndicatorSet::BB_UPPER),
        bb_middle: indicators.latest(IndicatorSet::BB_MIDDLE),
        bb_lower: indicators.latest(IndicatorSet::BB_LOWER),
        sma20: indicators.latest(IndicatorSet::SMA20),
        ema12: indicators.latest(IndicatorSet::EMA12),
        ema26: indicators.latest(IndicatorSet::EMA26),
    })
}

fn is_finite_tail(series: &[f64]) -> bool {
    series.iter().rev().take(2).all(|v| v.is_finite())
}
