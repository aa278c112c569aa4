/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
/// Produces nothing until at least `period + 1` closes are available.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        debug_assert!(period >= 2, "RSI period must be >= 2");
        Self { period }
    }

    /// Minimum number of closes needed for the first value.
    pub fn lookback(&self) -> usize {
        self.period + 1
    }

    /// RSI series for a slice of closes (oldest first).
    ///
    /// The output has `closes.len() - period` values; value `i` belongs to
    /// close `period + i`. Returns `None` when history is too short.
    pub fn series(&self, closes: &[f64]) -> Option<Vec<f64>> {
        if self.period == 0 || closes.len() < self.lookback() {
            return None;
        }

        let period = self.period as f64;
        let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let initial = &changes[..self.period];

        // First average gain/loss over the initial `period` changes
        let mut avg_gain = initial.iter().filter(|&&c| c > 0.0).sum::<f64>() / period;
        let mut avg_loss = initial.iter().filter(|&&c| c < 0.0).map(|c| c.abs()).sum::<f64>() / period;

        let mut out = Vec::with_capacity(changes.len() - self.period + 1);
        out.push(rsi_from(avg_gain, avg_loss));

        // Wilder smoothing over remaining changes
        for &change in &changes[self.period..] {
            let gain = if change > 0.0 { change } else { 0.0 };
            let loss = if change < 0.0 { change.abs() } else { 0.0 };
            avg_gain = (avg_gain * (period - 1.0) + gain) / period;
            avg_loss = (avg_loss * (period - 1.0) + loss) / period;
            out.push(rsi_from(avg_gain, avg_loss));
        }

        Some(out)
    }

    /// Latest RSI value, if there is enough history.
    pub fn latest(&self, closes: &[f64]) -> Option<f64> {
        self.series(closes).and_then(|s| s.last().copied())
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // A flat window carries no momentum either way.
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
