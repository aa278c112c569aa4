/// Simple moving average series. Value `i` belongs to close `period - 1 + i`.
pub fn sma_series(values: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || values.len() < period {
        return None;
    }
    let p = period as f64;
    Some(values.windows(period).map(|w| w.iter().sum::<f64>() / p).collect())
}

/// Exponential moving average seeded with the SMA of the first `period` values.
/// Same alignment as [`sma_series`].
pub fn ema_series(values: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || values.len() < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &v in &values[period..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    Some(out)
}
