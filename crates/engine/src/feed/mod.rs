//! Market data sources and the ordered fallback chain.

pub mod binance;
pub mod chain;
pub mod okx;
pub mod tushare;

pub use binance::BinanceSource;
pub use chain::SourceChain;
pub use okx::OkxSource;
pub use tushare::TushareSource;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use common::{Config, Error, Interval, MarketDataSource, Result};

/// Build the source chain in the order named by `DATA_SOURCES`.
/// Unknown names are logged and skipped.
pub fn chain_from_config(config: &Config) -> Result<SourceChain> {
    let mut sources: Vec<Arc<dyn MarketDataSource>> = Vec::new();
    for name in &config.data_sources {
        match name.as_str() {
            "okx" => sources.push(Arc::new(OkxSource::new(config.http_timeout)?)),
            "binance" => sources.push(Arc::new(BinanceSource::new(config.http_timeout)?)),
            "tushare" => match &config.tushare_token {
                Some(token) => sources.push(Arc::new(TushareSource::new(
                    token.clone(),
                    config.http_timeout,
                )?)),
                None => warn!("TUSHARE_TOKEN not set; tushare source disabled"),
            },
            other => warn!(source = %other, "Unknown data source in DATA_SOURCES, ignoring"),
        }
    }
    Ok(SourceChain::new(sources))
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
}

/// Send a prepared request and return the body of a 2xx response.
pub(crate) async fn fetch_body(source: &str, req: reqwest::RequestBuilder) -> Result<String> {
    let resp = req.send().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(format!("{source}: {e}"))
        } else {
            Error::Http(format!("{source}: {e}"))
        }
    })?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| Error::Http(format!("{source}: {e}")))?;

    if !status.is_success() {
        return Err(Error::Exchange(format!(
            "{source} HTTP {status}: {}",
            common::truncate_payload(&body)
        )));
    }
    Ok(body)
}

/// Numeric field that venues send either as a JSON string or a number.
pub(crate) fn num(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

pub(crate) fn millis(value: &Value) -> Option<DateTime<Utc>> {
    let ms = match value {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    Utc.timestamp_millis_opt(ms).single()
}

/// Close time of a bar opened at `open_time`: one millisecond before the next bar.
pub(crate) fn close_time(open_time: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    open_time + chrono::Duration::milliseconds(interval.duration_ms() - 1)
}

/// Split "BTC/USDT" (or "BTC-USDT") into base and quote.
pub(crate) fn split_pair(symbol: &str) -> Option<(&str, &str)> {
    symbol
        .split_once('/')
        .or_else(|| symbol.split_once('-'))
        .filter(|(b, q)| !b.is_empty() && !q.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_parse_from_strings_and_numbers() {
        assert_eq!(num(&Value::from("1.5")), Some(1.5));
        assert_eq!(num(&Value::from(2)), Some(2.0));
        assert_eq!(num(&Value::Null), None);
    }

    #[test]
    fn close_time_is_one_ms_before_next_bar() {
        let open = Utc.timestamp_millis_opt(0).unwrap();
        assert_eq!(
            close_time(open, Interval::OneMinute).timestamp_millis(),
            59_999
        );
    }

    #[test]
    fn pairs_split_on_slash_or_dash() {
        assert_eq!(split_pair("BTC/USDT"), Some(("BTC", "USDT")));
        assert_eq!(split_pair("ETH-USDT"), Some(("ETH", "USDT")));
        assert_eq!(split_pair("BTCUSDT"), None);
    }
}
