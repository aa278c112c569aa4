use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Thresholds and weights used by [`crate::StrategyScorer`].
///
/// Loaded from the `[scoring]` table of the watchlist file:
/// ```toml
/// [scoring]
/// oversold = 30.0
/// overbought = 70.0
/// rsi_adjustment = 0.2
/// macd_adjustment = 0.1
/// advisor_weight = 0.6
/// technical_weight = 0.4
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// RSI below this is treated as oversold (bullish bias).
    pub oversold: f64,
    /// RSI above this is treated as overbought (bearish bias).
    pub overbought: f64,
    pub rsi_adjustment: f64,
    pub macd_adjustment: f64,
    pub advisor_weight: f64,
    pub technical_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            oversold: 30.0,
            overbought: 70.0,
            rsi_adjustment: 0.2,
            macd_adjustment: 0.1,
            advisor_weight: 0.6,
            technical_weight: 0.4,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.oversold,
            self.overbought,
            self.rsi_adjustment,
            self.macd_adjustment,
            self.advisor_weight,
            self.technical_weight,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::Config("scoring parameters must be finite".into()));
        }
        if self.oversold >= self.overbought {
            return Err(Error::Config(format!(
                "scoring.oversold ({}) must be below scoring.overbought ({})",
                self.oversold, self.overbought
            )));
        }
        if self.advisor_weight < 0.0 || self.technical_weight < 0.0 {
            return Err(Error::Config("scoring weights must not be negative".into()));
        }
        Ok(())
    }
}

/// Indicator periods, from the `[indicators]` table of the watchlist file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
        }
    }
}

impl IndicatorParams {
    pub fn validate(&self) -> Result<()> {
        if self.rsi_period < 2 {
            return Err(Error::Config("indicators.rsi_period must be >= 2".into()));
        }
        if self.macd_fast == 0 || self.macd_fast >= self.macd_slow {
            return Err(Error::Config(format!(
                "indicators.macd_fast ({}) must be positive and below macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }
        if self.macd_signal == 0 || self.bb_period == 0 {
            return Err(Error::Config(
                "indicators.macd_signal and bb_period must be positive".into(),
            ));
        }
        if !self.bb_std_dev.is_finite() || self.bb_std_dev <= 0.0 {
            return Err(Error::Config("indicators.bb_std_dev must be positive".into()));
        }
        Ok(())
    }
}
