use common::Decision;

/// Labels recognised in advisor replies, strong variants first.
const STRONG_LABELS: &[(&str, Decision)] = &[
    ("STRONG_BUY", Decision::StrongBuy),
    ("STRONG_SELL", Decision::StrongSell),
    ("强烈买入", Decision::StrongBuy),
    ("强烈卖出", Decision::StrongSell),
];

const PLAIN_LABELS: &[(&str, Decision)] = &[
    ("BUY", Decision::Buy),
    ("SELL", Decision::Sell),
    ("NEUTRAL", Decision::Neutral),
    ("买入", Decision::Buy),
    ("卖出", Decision::Sell),
    ("中性", Decision::Neutral),
];

/// Extract the decision label from a free-text advisor reply.
///
/// Strong labels win over plain ones, since "STRONG_BUY" also contains "BUY".
/// Within a tier the label appearing earliest in the text is taken. A reply
/// with no recognisable label is `Neutral`.
pub fn parse_decision(content: &str) -> Decision {
    let normalized = content.to_uppercase().replace([' ', '-'], "_");

    earliest(&normalized, STRONG_LABELS)
        .or_else(|| earliest(&normalized, PLAIN_LABELS))
        .unwrap_or(Decision::Neutral)
}

fn earliest(text: &str, labels: &[(&str, Decision)]) -> Option<Decision> {
    labels
        .iter()
        .filter_map(|(label, decision)| text.find(label).map(|pos| (pos, *decision)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, decision)| decision)
}
