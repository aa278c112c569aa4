use std::fmt::Write;

use common::{AdvisorDecision, DecisionRecord, MarketSnapshot};

/// Title and body of a trading-signal notification.
pub fn signal_message(
    record: &DecisionRecord,
    snapshot: Option<&MarketSnapshot>,
    advisor: &AdvisorDecision,
) -> (String, String) {
    let strategy = &record.strategy;
    let title = format!(
        "Trading signal for {} ({}): {}",
        record.symbol, record.interval, strategy.decision
    );

    let value = |v: Option<f64>, decimals: usize| match v {
        Some(v) => format!("{v:.decimals$}"),
        None => "N/A".to_string(),
    };
    let snap = |f: fn(&MarketSnapshot) -> Option<f64>| snapshot.and_then(f);

    let mut body = String::new();
    let _ = writeln!(body, "Name: {} ({})", record.display_name, record.market);
    let _ = writeln!(
        body,
        "Candle close: {}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(body, "Close price: {}", record.close);
    let _ = writeln!(body, "Decision: {}", strategy.decision);
    let _ = writeln!(body, "Confidence: {:.1}%", strategy.confidence * 100.0);
    let _ = writeln!(body, "Details: {}", strategy.details);
    let _ = writeln!(body, "RSI: {}", value(snap(|s| s.rsi), 2));
    let _ = writeln!(
        body,
        "MACD: {} (signal {})",
        value(snap(|s| s.macd), 4),
        value(snap(|s| s.macd_signal), 4)
    );
    let _ = writeln!(
        body,
        "Bollinger: upper {} / middle {} / lower {}",
        value(snap(|s| s.bb_upper), 2),
        value(snap(|s| s.bb_middle), 2),
        value(snap(|s| s.bb_lower), 2)
    );
    let _ = write!(body, "Advisor: {}", advisor.summary);

    (title, body)
}
