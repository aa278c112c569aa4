use std::fmt::Write;

use common::MarketSnapshot;

/// Render the analysis request sent to the model.
pub fn build_prompt(snapshot: &MarketSnapshot) -> String {
    let inst = &snapshot.instrument;
    let c = &snapshot.latest;
    let mut p = String::with_capacity(1024);

    let _ = writeln!(
        p,
        "As a professional market analyst, assess {} ({}, {} market) on the {} timeframe.",
        inst.symbol, inst.display_name, inst.market, inst.interval
    );
    let _ = writeln!(p);
    let _ = writeln!(p, "Latest candle (closed {}):", c.close_time.to_rfc3339());
    let _ = writeln!(p, "- Open: {}", c.open);
    let _ = writeln!(p, "- High: {}", c.high);
    let _ = writeln!(p, "- Low: {}", c.low);
    let _ = writeln!(p, "- Close: {}", c.close);
    let _ = writeln!(p, "- Volume: {}", c.volume);
    if let Some(pct) = c.pct_change {
        let _ = writeln!(p, "- Change: {pct:.2}%");
    }
    let _ = writeln!(p);
    let _ = writeln!(p, "Technical indicators ({} candles):", snapshot.candle_count);
    let _ = writeln!(p, "- RSI: {}", fmt_opt(snapshot.rsi, 2));
    let _ = writeln!(
        p,
        "- MACD: {} (signal {}, histogram {})",
        fmt_opt(snapshot.macd, 4),
        fmt_opt(snapshot.macd_signal, 4),
        fmt_opt(snapshot.macd_histogram, 4)
    );
    if let Some(cross) = snapshot.macd_crossover {
        let _ = writeln!(p, "- MACD crossover: {cross}");
    }
    let _ = writeln!(p, "- Bollinger upper: {}", fmt_opt(snapshot.bb_upper, 2));
    let _ = writeln!(p, "- Bollinger middle: {}", fmt_opt(snapshot.bb_middle, 2));
    let _ = writeln!(p, "- Bollinger lower: {}", fmt_opt(snapshot.bb_lower, 2));
    let _ = writeln!(p, "- SMA(20): {}", fmt_opt(snapshot.sma20, 2));
    let _ = writeln!(
        p,
        "- EMA(12) / EMA(26): {} / {}",
        fmt_opt(snapshot.ema12, 2),
        fmt_opt(snapshot.ema26, 2)
    );
    let _ = writeln!(p);
    let _ = writeln!(
        p,
        "Give a trading recommendation. Choose exactly one of: STRONG_BUY, BUY, NEUTRAL, SELL, STRONG_SELL."
    );
    let _ = write!(p, "Then briefly explain your reasoning.");
    p
}

pub(crate) fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{Candle, Instrument, Interval, Market};

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            instrument: Instrument::new("AAPL", "Apple", Market::Us, Interval::OneDay),
            latest: Candle {
                open_time: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
                close_time: Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap(),
                open: 170.0,
                high: 172.5,
                low: 169.0,
                close: 171.2,
                volume: 1_000_000.0,
                amount: None,
                pct_change: Some(0.7),
            },
            candle_count: 100,
            rsi: Some(28.456),
            macd: None,
            macd_signal: None,
            macd_histogram: None,
            macd_crossover: None,
            bb_upper: Some(180.0),
            bb_middle: Some(172.0),
            bb_lower: Some(164.0),
            sma20: None,
            ema12: None,
            ema26: None,
        }
    }

    #[test]
    fn prompt_lists_values_and_marks_absent_ones() {
        let p = build_prompt(&snapshot());
        assert!(p.contains("AAPL (Apple, US market) on the 1d timeframe"));
        assert!(p.contains("RSI: 28.46"));
        assert!(p.contains("MACD: N/A"));
        assert!(p.contains("Bollinger lower: 164.00"));
        assert!(p.contains("STRONG_BUY, BUY, NEUTRAL, SELL, STRONG_SELL"));
        assert!(!p.contains("MACD crossover"));
    }
}
