use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use common::{Candle, CandleSeries, Error, Instrument, Market, MarketDataSource, Result};

use super::{close_time, fetch_body, http_client, millis, num, split_pair};

const BASE_URL: &str = "https://api.binance.com";
const MAX_LIMIT: usize = 1000;

/// Binance public klines (`/api/v3/klines`). Crypto pairs only; no signing needed.
pub struct BinanceSource {
    base_url: String,
    http: Client,
}

impl BinanceSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: BASE_URL.to_string(),
            http: http_client(timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// "BTC/USDT" → "BTCUSDT".
fn pair_symbol(symbol: &str) -> String {
    match split_pair(symbol) {
        Some((base, quote)) => format!("{base}{quote}").to_uppercase(),
        None => symbol.to_uppercase(),
    }
}

/// Rows are `[openTime, o, h, l, c, v, closeTime, quoteVolume, ...]`, oldest first.
fn parse_klines(body: &str, interval: common::Interval) -> Result<CandleSeries> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)
        .map_err(|e| Error::Exchange(format!("binance: malformed klines response: {e}")))?;

    let candles = rows
        .iter()
        .map(|row| {
            let open_time = millis(row.first()?)?;
            Some(Candle {
                open_time,
                close_time: close_time(open_time, interval),
                open: num(row.get(1)?)?,
                high: num(row.get(2)?)?,
                low: num(row.get(3)?)?,
                close: num(row.get(4)?)?,
                volume: num(row.get(5)?)?,
                amount: row.get(7).and_then(num),
                pct_change: None,
            })
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::Exchange("binance: malformed kline row".into()))?;

    Ok(CandleSeries::new(candles))
}

#[async_trait]
impl MarketDataSource for BinanceSource {
    fn name(&self) -> &str {
        "binance"
    }

    fn supports(&self, market: Market) -> bool {
        market == Market::Crypto
    }

    async fn fetch(&self, instrument: &Instrument, limit: usize) -> Result<CandleSeries> {
        let symbol = pair_symbol(&instrument.symbol);
        let limit = limit.clamp(1, MAX_LIMIT).to_string();
        debug!(symbol = %symbol, interval = %instrument.interval, limit = %limit, "Fetching Binance klines");

        let req = self
            .http
            .get(format!("{}/api/v3/klines", self.base_url))
            .query(&[
                ("symbol", symbol.as_str()),
                ("interval", instrument.interval.as_str()),
                ("limit", limit.as_str()),
            ]);
        let body = fetch_body("binance", req).await?;
        parse_klines(&body, instrument.interval)
    }
}
