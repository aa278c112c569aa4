use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use common::{Candle, CandleSeries, Error, Instrument, Interval, Market, MarketDataSource, Result};

use super::{fetch_body, http_client, num};

const BASE_URL: &str = "http://api.tushare.pro";
const FIELDS: &str = "ts_code,trade_date,open,high,low,close,pre_close,change,pct_chg,vol,amount";

/// Tushare Pro daily bars for CN, HK and US equities. Token required.
pub struct TushareSource {
    token: String,
    base_url: String,
    http: Client,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: ApiParams<'a>,
    fields: &'a str,
}

#[derive(Serialize)]
struct ApiParams<'a> {
    ts_code: &'a str,
    start_date: String,
    end_date: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<ApiData>,
}

#[derive(Deserialize)]
struct ApiData {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

impl TushareSource {
    pub fn new(token: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            token,
            base_url: BASE_URL.to_string(),
            http: http_client(timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Tushare endpoint for an instrument's market.
fn api_name(instrument: &Instrument) -> Result<&'static str> {
    match instrument.market {
        Market::Cn => {
            let s = instrument.symbol.to_uppercase();
            if s.ends_with(".SH") || s.ends_with(".SZ") {
                Ok("daily")
            } else {
                Err(Error::Validation(format!(
                    "CN symbol '{}' must end with .SH or .SZ",
                    instrument.symbol
                )))
            }
        }
        Market::Hk => Ok("hk_daily"),
        Market::Us => Ok("us_daily"),
        Market::Crypto => Err(Error::Config("tushare does not serve crypto pairs".into())),
    }
}

/// Request window: `2 × limit` calendar days ending today, as YYYYMMDD.
fn date_window(today: NaiveDate, limit: usize) -> (String, String) {
    let start = today
        .checked_sub_days(Days::new(2 * limit as u64))
        .unwrap_or(NaiveDate::MIN);
    (
        start.format("%Y%m%d").to_string(),
        today.format("%Y%m%d").to_string(),
    )
}

/// CN `daily` reports volume in lots of 100 shares and amount in thousands.
fn parse_bars(body: &str, api: &str) -> Result<CandleSeries> {
    let resp: ApiResponse = serde_json::from_str(body)
        .map_err(|e| Error::Exchange(format!("tushare: malformed response: {e}")))?;
    if resp.code != 0 {
        return Err(Error::Exchange(format!(
            "tushare error {}: {}",
            resp.code,
            resp.msg.unwrap_or_default()
        )));
    }
    let Some(data) = resp.data else {
        return Ok(CandleSeries::empty());
    };

    let col = |name: &str| data.fields.iter().position(|f| f == name);
    let (Some(date_i), Some(open_i), Some(high_i), Some(low_i), Some(close_i), Some(vol_i)) = (
        col("trade_date"),
        col("open"),
        col("high"),
        col("low"),
        col("close"),
        col("vol"),
    ) else {
        return Err(Error::Exchange("tushare: response is missing OHLCV fields".into()));
    };
    let amount_i = col("amount");
    let pct_i = col("pct_chg");
    let (vol_scale, amount_scale) = if api == "daily" { (100.0, 1000.0) } else { (1.0, 1.0) };

    let mut candles = Vec::with_capacity(data.items.len());
    for row in &data.items {
        let date = row
            .get(date_i)
            .and_then(Value::as_str)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
            .ok_or_else(|| Error::Exchange(format!("tushare: bad trade_date in {row:?}")))?;
        let Some(open_time) = date.and_hms_opt(0, 0, 0).map(|t| t.and_utc()) else {
            continue;
        };
        let field = |i: usize| row.get(i).and_then(num);
        let (Some(open), Some(high), Some(low), Some(close)) =
            (field(open_i), field(high_i), field(low_i), field(close_i))
        else {
            return Err(Error::Exchange(format!("tushare: bad price row {row:?}")));
        };

        candles.push(Candle {
            open_time,
            close_time: open_time + chrono::Duration::milliseconds(Interval::OneDay.duration_ms() - 1),
            open,
            high,
            low,
            close,
            volume: field(vol_i).unwrap_or(0.0) * vol_scale,
            amount: amount_i.and_then(field).map(|a| a * amount_scale),
            pct_change: pct_i.and_then(field),
        });
    }
    Ok(CandleSeries::new(candles))
}

#[async_trait]
impl MarketDataSource for TushareSource {
    fn name(&self) -> &str {
        "tushare"
    }

    fn supports(&self, market: Market) -> bool {
        market != Market::Crypto
    }

    async fn fetch(&self, instrument: &Instrument, limit: usize) -> Result<CandleSeries> {
        if instrument.interval != Interval::OneDay {
            return Err(Error::Config(format!(
                "tushare serves daily bars only, '{}' requested {}",
                instrument.symbol, instrument.interval
            )));
        }
        let api = api_name(instrument)?;
        let (start_date, end_date) = date_window(Utc::now().date_naive(), limit);
        debug!(api, ts_code = %instrument.symbol, %start_date, %end_date, "Calling Tushare");

        let body = ApiRequest {
            api_name: api,
            token: &self.token,
            params: ApiParams {
                ts_code: &instrument.symbol,
                start_date,
                end_date,
            },
            fields: FIELDS,
        };
        let req = self.http.post(&self.base_url).json(&body);
        let text = fetch_body("tushare", req).await?;
        Ok(parse_bars(&text, api)?.truncate_to_latest(limit))
    }
}
