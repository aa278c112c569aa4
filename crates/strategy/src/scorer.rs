use common::{AdvisorDecision, IndicatorSet, StrategyResult};
use tracing::debug;

use crate::config::ScoringConfig;

/// Neutral midpoint of the technical score.
const BASE_SCORE: f64 = 0.5;

/// Blends the indicator-derived technical score with the advisor decision.
///
/// The advisor's category is authoritative; the technical score only moves
/// the confidence. Output confidence is always finite and inside `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct StrategyScorer {
    config: ScoringConfig,
}

impl StrategyScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Indicator-only score in `[0, 1]`. Absent indicators contribute nothing.
    pub fn technical_score(&self, indicators: &IndicatorSet) -> f64 {
        let cfg = &self.config;
        let mut score = BASE_SCORE;

        if let Some(rsi) = indicators.latest(IndicatorSet::RSI) {
            if rsi < cfg.oversold {
                score += cfg.rsi_adjustment;
            } else if rsi > cfg.overbought {
                score -= cfg.rsi_adjustment;
            }
        }

        if let (Some(macd), Some(signal)) = (
            indicators.latest(IndicatorSet::MACD),
            indicators.latest(IndicatorSet::MACD_SIGNAL),
        ) {
            if macd > signal {
                score += cfg.macd_adjustment;
            } else {
                score -= cfg.macd_adjustment;
            }
        }

        // Bollinger position relative to price is not scored yet.

        clamp_unit(score)
    }

    pub fn score(&self, indicators: &IndicatorSet, advisor: &AdvisorDecision) -> StrategyResult {
        let technical = self.technical_score(indicators);
        let advisor_confidence = if advisor.confidence.is_finite() {
            advisor.confidence.clamp(0.0, 1.0)
        } else {
            AdvisorDecision::DEFAULT_CONFIDENCE
        };

        let confidence = clamp_unit(
            advisor_confidence * self.config.advisor_weight
                + technical * self.config.technical_weight,
        );

        let details = format!(
            "technical score {:.2}, advisor {} ({:.2}), blended confidence {:.2}",
            technical, advisor.category, advisor_confidence, confidence
        );
        debug!(
            decision = %advisor.category,
            technical,
            confidence,
            "Strategy scored"
        );

        StrategyResult {
            decision: advisor.category,
            confidence,
            technical_score: technical,
            details,
        }
    }
}

/// Clamp into `[0, 1]`, mapping NaN to the neutral midpoint.
fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        BASE_SCORE
    } else {
        value.clamp(0.0, 1.0)
    }
}
