use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use common::{Error, Instrument, InstrumentDraft, Market, Result};
use strategy::{IndicatorParams, ScoringConfig};

use crate::scheduler::parse_cron;

/// How instruments are grouped into scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobGrouping {
    /// One job per instrument, on its market's schedule.
    #[default]
    PerInstrument,
    /// One job per market, running every instrument of that market.
    PerMarket,
}

/// Default schedule per market, evaluated in local time.
pub fn default_cron(market: Market) -> &'static str {
    match market {
        Market::Crypto => "0 * * * * *",
        Market::Cn => "0 30 15 * * Mon-Fri",
        Market::Hk => "0 30 16 * * Mon-Fri",
        Market::Us => "0 0 5 * * Tue-Sat",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub grouping: JobGrouping,
    /// Per-market overrides of [`default_cron`].
    pub cron: BTreeMap<Market, String>,
}

impl ScheduleConfig {
    pub fn cron_for(&self, market: Market) -> &str {
        self.cron
            .get(&market)
            .map(String::as_str)
            .unwrap_or_else(|| default_cron(market))
    }

    /// Scheduler key of the job that runs `instrument`.
    pub fn job_key(&self, instrument: &Instrument) -> String {
        match self.grouping {
            JobGrouping::PerInstrument => instrument.symbol.clone(),
            JobGrouping::PerMarket => market_job_key(instrument.market),
        }
    }
}

pub fn market_job_key(market: Market) -> String {
    format!("market:{market}")
}

/// Instruments plus schedule, scoring and indicator parameters.
///
/// ```toml
/// [schedule]
/// grouping = "per_instrument"
///
/// [schedule.cron]
/// CN = "30 15 * * 1-5"
///
/// [[instrument]]
/// symbol = "BTC/USDT"
/// name = "Bitcoin"
/// market = "CRYPTO"
/// interval = "1m"
/// ```
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    pub instruments: Vec<Instrument>,
    pub schedule: ScheduleConfig,
    pub scoring: ScoringConfig,
    pub indicators: IndicatorParams,
}

#[derive(Deserialize)]
struct WatchlistFile {
    #[serde(default, rename = "instrument")]
    instruments: Vec<InstrumentDraft>,
    #[serde(default)]
    schedule: ScheduleConfig,
    #[serde(default)]
    scoring: ScoringConfig,
    #[serde(default)]
    indicators: IndicatorParams,
}

impl Watchlist {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read watchlist '{}': {e}", path.display()))
        })?;
        let watchlist = Self::parse(&content)
            .map_err(|e| Error::Config(format!("watchlist '{}': {e}", path.display())))?;
        info!(
            path = %path.display(),
            instruments = watchlist.instruments.len(),
            grouping = ?watchlist.schedule.grouping,
            "Watchlist loaded"
        );
        Ok(watchlist)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: WatchlistFile =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;

        let mut seen = HashSet::new();
        let mut instruments = Vec::with_capacity(file.instruments.len());
        for draft in file.instruments {
            let instrument =
                Instrument::try_from(draft).map_err(|e| Error::Config(e.to_string()))?;
            if !seen.insert(instrument.symbol.clone()) {
                warn!(symbol = %instrument.symbol, "Duplicate instrument in watchlist, ignoring");
                continue;
            }
            instruments.push(instrument);
        }

        for market in Market::ALL {
            parse_cron(file.schedule.cron_for(market))?;
        }
        file.scoring.validate()?;
        file.indicators.validate()?;

        Ok(Self {
            instruments,
            schedule: file.schedule,
            scoring: file.scoring,
            indicators: file.indicators,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Interval;

    const SAMPLE: &str = r#"
        [schedule]
        grouping = "per_market"

        [schedule.cron]
        CN = "30 15 * * 1-5"

        [scoring]
        advisor_weight = 0.5
        technical_weight = 0.5

        [[instrument]]
        symbol = "BTC/USDT"
        name = "Bitcoin"
        market = "CRYPTO"

        [[instrument]]
        symbol = "600519.SH"
        name = "Kweichow Moutai"
        market = "CN"
        interval = "1d"

        [[instrument]]
        symbol = "BTC/USDT"
        name = "Bitcoin again"
        market = "CRYPTO"
    "#;

    #[test]
    fn parses_sample_with_defaults() {
        let wl = Watchlist::parse(SAMPLE).unwrap();
        assert_eq!(wl.instruments.len(), 2);
        assert_eq!(wl.instruments[0].interval, Interval::OneMinute);
        assert_eq!(wl.schedule.grouping, JobGrouping::PerMarket);
        assert_eq!(wl.schedule.cron_for(Market::Cn), "30 15 * * 1-5");
        assert_eq!(wl.schedule.cron_for(Market::Us), "0 0 5 * * Tue-Sat");
        assert_eq!(wl.scoring.advisor_weight, 0.5);
        assert_eq!(wl.scoring.oversold, 30.0);
        assert_eq!(wl.indicators.rsi_period, 14);
        assert_eq!(wl.schedule.job_key(&wl.instruments[1]), "market:CN");
    }

    #[test]
    fn unknown_market_fails_load() {
        let bad = r#"
            [[instrument]]
            symbol = "X"
            name = "X"
            market = "MOON"
        "#;
        assert!(matches!(Watchlist::parse(bad), Err(Error::Config(_))));
    }

    #[test]
    fn missing_name_fails_load() {
        let bad = r#"
            [[instrument]]
            symbol = "AAPL"
            market = "US"
        "#;
        assert!(matches!(Watchlist::parse(bad), Err(Error::Config(_))));
    }

    #[test]
    fn bad_cron_fails_load() {
        let bad = r#"
            [schedule.cron]
            HK = "whenever"
        "#;
        assert!(matches!(Watchlist::parse(bad), Err(Error::Config(_))));
    }

    #[test]
    fn empty_file_is_valid() {
        let wl = Watchlist::parse("").unwrap();
        assert!(wl.instruments.is_empty());
        assert_eq!(wl.schedule.grouping, JobGrouping::PerInstrument);
    }
}
