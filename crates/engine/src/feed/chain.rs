use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use common::{CandleSeries, Error, Instrument, Market, MarketDataSource, Result};

/// Ordered list of candidate sources with primary/fallback semantics.
///
/// For an instrument, only candidates supporting its market are tried, in
/// order. The first candidate to answer (an empty series counts as an answer)
/// serves the request. Failures fall through to the next candidate; if every
/// candidate fails the last error is returned.
#[derive(Clone, Default)]
pub struct SourceChain {
    sources: Vec<Arc<dyn MarketDataSource>>,
}

impl SourceChain {
    pub fn new(sources: Vec<Arc<dyn MarketDataSource>>) -> Self {
        Self { sources }
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl MarketDataSource for SourceChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn supports(&self, market: Market) -> bool {
        self.sources.iter().any(|s| s.supports(market))
    }

    async fn fetch(&self, instrument: &Instrument, limit: usize) -> Result<CandleSeries> {
        let mut last_err = None;

        for (rank, source) in self
            .sources
            .iter()
            .filter(|s| s.supports(instrument.market))
            .enumerate()
        {
            match source.fetch(instrument, limit).await {
                Ok(series) => {
                    info!(
                        symbol = %instrument.symbol,
                        source = source.name(),
                        fallback = rank > 0,
                        candles = series.len(),
                        "Candles served"
                    );
                    return Ok(series);
                }
                Err(e) => {
                    warn!(
                        symbol = %instrument.symbol,
                        source = source.name(),
                        error = %e,
                        "Data source failed, trying next candidate"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::Config(format!(
                "no data source configured for {} market ({})",
                instrument.market, instrument.symbol
            ))
        }))
    }
}
