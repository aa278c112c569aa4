pub mod config;
pub mod indicators;
pub mod scorer;
pub mod snapshot;

pub use config::{IndicatorParams, ScoringConfig};
pub use indicators::IndicatorEngine;
pub use scorer::StrategyScorer;
pub use snapshot::build_snapshot;

use common::{CandleSeries, IndicatorSet};

/// Series-in, series-out indicator computation.
///
/// Implementations must never panic on short input: an indicator without
/// enough history is left out of the returned set.
pub trait IndicatorProvider: Send + Sync {
    fn compute(&self, candles: &CandleSeries) -> IndicatorSet;
}
