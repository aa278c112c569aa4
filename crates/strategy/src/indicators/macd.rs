use common::MacdCrossover;

use super::moving_average::ema_series;

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// MACD line = EMA(fast) − EMA(slow), signal = EMA(macd_line, signal_period),
/// histogram = MACD − signal.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

/// The three MACD series, each aligned to the suffix of the input closes.
/// `signal` and `histogram` are shorter than `macd` by `signal_period - 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        debug_assert!(fast < slow, "MACD fast period must be less than slow period");
        Self { fast, slow, signal }
    }

    /// Closes needed for the first MACD line value.
    pub fn line_lookback(&self) -> usize {
        self.slow
    }

    /// Closes needed for the first signal/histogram value.
    pub fn signal_lookback(&self) -> usize {
        self.slow + self.signal - 1
    }

    /// Compute the MACD series from closes (oldest first).
    /// Returns `None` if there isn't enough data for the MACD line itself;
    /// the signal and histogram are empty until `signal_lookback` closes exist.
    pub fn series(&self, closes: &[f64]) -> Option<MacdSeries> {
        if self.fast == 0 || self.fast >= self.slow || closes.len() < self.line_lookback() {
            return None;
        }
        let fast = ema_series(closes, self.fast)?;
        let slow = ema_series(closes, self.slow)?;

        // fast EMA starts `slow - fast` bars earlier than the slow EMA
        let offset = self.slow - self.fast;
        let macd: Vec<f64> = slow
            .iter()
            .enumerate()
            .map(|(i, s)| fast[i + offset] - s)
            .collect();

        let signal = if closes.len() >= self.signal_lookback() {
            ema_series(&macd, self.signal).unwrap_or_default()
        } else {
            Vec::new()
        };
        let histogram = macd[macd.len() - signal.len()..]
            .iter()
            .zip(&signal)
            .map(|(m, s)| m - s)
            .collect();

        Some(MacdSeries {
            macd,
            signal,
            histogram,
        })
    }
}

/// Crossover on the latest bar, from suffix-aligned MACD and signal series.
/// Needs two values of each.
pub fn crossover(macd: &[f64], signal: &[f64]) -> Option<MacdCrossover> {
    if macd.len() < 2 || signal.len() < 2 {
        return None;
    }
    let prev_macd = macd[macd.len() - 2];
    let curr_macd = macd[macd.len() - 1];
    let prev_sig = signal[signal.len() - 2];
    let curr_sig = signal[signal.len() - 1];

    if prev_macd <= prev_sig && curr_macd > curr_sig {
        Some(MacdCrossover::Bullish)
    } else if prev_macd >= prev_sig && curr_macd < curr_sig {
        Some(MacdCrossover::Bearish)
    } else {
        Some(MacdCrossover::None)
    }
}
