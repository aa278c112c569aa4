use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use common::{Candle, CandleSeries, Error, Instrument, Interval, Market, MarketDataSource, Result};

use super::{close_time, fetch_body, http_client, millis, num, split_pair};

const BASE_URL: &str = "https://www.okx.com";
/// Largest page the candles endpoint returns.
const MAX_LIMIT: usize = 300;

/// OKX public candles (`/api/v5/market/candles`). Crypto pairs only.
pub struct OkxSource {
    base_url: String,
    http: Client,
}

#[derive(Deserialize)]
struct CandlesResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

impl OkxSource {
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

/// "BTC/USDT" → "BTC-USDT".
fn inst_id(symbol: &str) -> String {
    match split_pair(symbol) {
        Some((base, quote)) => format!("{}-{}", base.to_uppercase(), quote.to_uppercase()),
        None => symbol.to_uppercase(),
    }
}

fn bar(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "1m",
        Interval::FiveMinutes => "5m",
        Interval::FifteenMinutes => "15m",
        Interval::ThirtyMinutes => "30m",
        Interval::OneHour => "1H",
        Interval::FourHours => "4H",
        Interval::OneDay => "1Dutc",
        Interval::OneWeek => "1Wutc",
    }
}

/// Rows are `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`, newest first.
fn parse_candles(body: &str, interval: Interval) -> Result<CandleSeries> {
    let resp: CandlesResponse = serde_json::from_str(body)
        .map_err(|e| Error::Exchange(format!("okx: malformed candles response: {e}")))?;
    if resp.code != "0" {
        return Err(Error::Exchange(format!("okx error {}: {}", resp.code, resp.msg)));
    }

    let mut candles = Vec::with_capacity(resp.data.len());
    for row in &resp.data {
        let parsed = (|| {
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
        })();
        match parsed {
            Some(c) => candles.push(c),
            None => return Err(Error::Exchange(format!("okx: malformed candle row {row:?}"))),
        }
    }
    Ok(CandleSeries::new(candles))
}

#[async_trait]
impl MarketDataSource for OkxSource {
    fn name(&self) -> &str {
        "okx"
    }

    fn supports(&self, market: Market) -> bool {
        market == Market::Crypto
    }

    async fn fetch(&self, instrument: &Instrument, limit: usize) -> Result<CandleSeries> {
        let inst = inst_id(&instrument.symbol);
        let limit = limit.clamp(1, MAX_LIMIT).to_string();
        debug!(inst_id = %inst, bar = bar(instrument.interval), limit = %limit, "Fetching OKX candles");

        let req = self
            .http
            .get(format!("{}/api/v5/market/candles", self.base_url))
            .query(&[
                ("instId", inst.as_str()),
                ("bar", bar(instrument.interval)),
                ("limit", limit.as_str()),
            ]);
        let body = fetch_body("okx", req).await?;
        parse_candles(&body, instrument.interval)
    }
}
