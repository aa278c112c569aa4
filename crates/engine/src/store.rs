use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::{debug, info};

use common::{DecisionRecord, Error, Result, ResultSink};

/// SQLite-backed decision history.
///
/// `(symbol, interval, timestamp)` is unique; saving a record for a candle
/// that is already stored is a no-op.
#[derive(Clone)]
pub struct SqliteSink {
    db: SqlitePool,
}

/// One stored decision, as served by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DecisionRow {
    pub id: i64,
    pub symbol: String,
    pub display_name: String,
    pub market: String,
    pub interval: String,
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub indicators_json: String,
    pub advisor_json: String,
    pub decision: String,
    pub confidence: f64,
    pub technical_score: f64,
    pub details: String,
    pub created_at: String,
}

impl SqliteSink {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let sink = Self::new(db);
        sink.migrate().await?;
        info!("Database ready");
        Ok(sink)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.db)
            .await
            .map_err(|e| Error::Other(format!("database migration failed: {e}")))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Newest first. `symbol = None` lists every instrument.
    pub async fn recent(
        &self,
        symbol: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<DecisionRow>> {
        let rows = sqlx::query_as::<_, DecisionRow>(
            r#"
            SELECT id, symbol, display_name, market, interval, timestamp,
                   open, high, low, close, volume, indicators_json, advisor_json,
                   decision, confidence, technical_score, details, created_at
            FROM decision_records
            WHERE (?1 IS NULL OR symbol = ?1)
            ORDER BY timestamp DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(symbol)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn count(&self, symbol: Option<&str>) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM decision_records WHERE (?1 IS NULL OR symbol = ?1)",
        )
        .bind(symbol)
        .fetch_one(&self.db)
        .await?;
        Ok(total)
    }
}

#[async_trait]
impl ResultSink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(&self, record: &DecisionRecord) -> Result<()> {
        let timestamp = record
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        let result = sqlx::query(
            r#"
            INSERT INTO decision_records (
                symbol, display_name, market, interval, timestamp,
                open, high, low, close, volume,
                indicators_json, advisor_json,
                decision, confidence, technical_score, details
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ON CONFLICT(symbol, interval, timestamp) DO NOTHING
            "#,
        )
        .bind(&record.symbol)
        .bind(&record.display_name)
        .bind(record.market.as_str())
        .bind(record.interval.as_str())
        .bind(&timestamp)
        .bind(record.open)
        .bind(record.high)
        .bind(record.low)
        .bind(record.close)
        .bind(record.volume)
        .bind(&record.indicators_json)
        .bind(&record.advisor_json)
        .bind(record.strategy.decision.label())
        .bind(record.strategy.confidence)
        .bind(record.strategy.technical_score)
        .bind(&record.strategy.details)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            debug!(key = %record.key(), "Decision already stored, skipping");
        } else {
            debug!(key = %record.key(), "Decision stored");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{
        AdvisorDecision, Candle, Decision, IndicatorSet, Instrument, Interval, Market,
        StrategyResult,
    };

    async fn sink() -> SqliteSink {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let sink = SqliteSink::new(db);
        sink.migrate().await.unwrap();
        sink
    }

    fn record(symbol: &str, open_ms: i64, decision: Decision) -> DecisionRecord {
        let instrument = Instrument::new(symbol, symbol, Market::Crypto, Interval::OneMinute);
        let candle = Candle {
            open_time: Utc.timestamp_millis_opt(open_ms).unwrap(),
            close_time: Utc.timestamp_millis_opt(open_ms + 59_999).unwrap(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10.0,
            amount: None,
            pct_change: None,
        };
        let strategy = StrategyResult {
            decision,
            confidence: 0.6,
            technical_score: 0.5,
            details: "test".into(),
        };
        DecisionRecord::build(
            &instrument,
            &candle,
            &IndicatorSet::new(),
            &AdvisorDecision::new(decision, 0.7, "because"),
            strategy,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn replaying_same_candle_is_idempotent() {
        let sink = sink().await;
        let first = record("BTC/USDT", 0, Decision::Buy);
        let replay = record("BTC/USDT", 0, Decision::Sell);

        sink.save(&first).await.unwrap();
        sink.save(&replay).await.unwrap();

        let rows = sink.recent(Some("BTC/USDT"), 10, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].decision, "BUY");
        assert_eq!(rows[0].timestamp, "1970-01-01T00:00:59.999Z");
    }

    #[tokio::test]
    async fn recent_pages_newest_first_and_filters() {
        let sink = sink().await;
        for i in 0..5 {
            sink.save(&record("BTC/USDT", i * 60_000, Decision::Buy))
                .await
                .unwrap();
        }
        sink.save(&record("ETH/USDT", 0, Decision::Sell)).await.unwrap();

        let page = sink.recent(Some("BTC/USDT"), 2, 1).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].timestamp > page[1].timestamp);
        assert_eq!(sink.count(Some("BTC/USDT")).await.unwrap(), 5);
        assert_eq!(sink.count(None).await.unwrap(), 6);
        assert_eq!(sink.recent(None, 100, 0).await.unwrap().len(), 6);
    }
}
