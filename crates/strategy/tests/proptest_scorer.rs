use chrono::{TimeZone, Utc};
use common::{AdvisorDecision, Candle, CandleSeries, Decision, IndicatorSet};
use proptest::prelude::*;
use strategy::{IndicatorEngine, IndicatorProvider, StrategyScorer};

fn any_f64() -> impl Strategy<Value = f64> {
    prop_oneof![
        any::<f64>(),
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
        -1_000.0f64..1_000.0f64,
    ]
}

fn decision() -> impl Strategy<Value = Decision> {
    prop_oneof![
        Just(Decision::StrongBuy),
        Just(Decision::Buy),
        Just(Decision::Neutral),
        Just(Decision::Sell),
        Just(Decision::StrongSell),
    ]
}

fn candles(closes: &[f64]) -> CandleSeries {
    CandleSeries::new(
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let t = i as i64 * 60_000;
                Candle {
                    open_time: Utc.timestamp_millis_opt(t).unwrap(),
                    close_time: Utc.timestamp_millis_opt(t + 59_999).unwrap(),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1.0,
                    amount: None,
                    pct_change: None,
                }
            })
            .collect(),
    )
}

proptest! {
    /// Confidence stays within [0, 1] whatever the indicator and advisor inputs.
    #[test]
    fn scorer_confidence_is_clamped(
        rsi in any_f64(),
        macd in any_f64(),
        signal in any_f64(),
        advisor_confidence in any_f64(),
        category in decision(),
    ) {
        let mut set = IndicatorSet::new();
        set.insert(IndicatorSet::RSI, vec![rsi]);
        set.insert(IndicatorSet::MACD, vec![macd]);
        set.insert(IndicatorSet::MACD_SIGNAL, vec![signal]);

        let mut advisor = AdvisorDecision::new(category, 0.5, "generated");
        advisor.confidence = advisor_confidence;

        let result = StrategyScorer::default().score(&set, &advisor);
        prop_assert!(result.confidence.is_finite());
        prop_assert!((0.0..=1.0).contains(&result.confidence));
        prop_assert!((0.0..=1.0).contains(&result.technical_score));
        prop_assert_eq!(result.decision, category);
    }

    /// Indicators without enough history are omitted, never computed from a
    /// partial window.
    #[test]
    fn short_series_omit_indicators(closes in prop::collection::vec(1.0f64..1_000.0, 0..40)) {
        let n = closes.len();
        let set = IndicatorEngine::default().compute(&candles(&closes));

        prop_assert_eq!(set.contains(IndicatorSet::RSI), n >= 15);
        prop_assert_eq!(set.contains(IndicatorSet::MACD), n >= 26);
        prop_assert_eq!(set.contains(IndicatorSet::MACD_SIGNAL), n >= 34);
        prop_assert_eq!(set.contains(IndicatorSet::BB_UPPER), n >= 20);
        prop_assert_eq!(set.contains(IndicatorSet::SMA20), n >= 20);
        prop_assert_eq!(set.contains(IndicatorSet::EMA12), n >= 12);
        prop_assert_eq!(set.contains(IndicatorSet::EMA26), n >= 26);
    }
}
