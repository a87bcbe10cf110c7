//! Index-friendly per-schema range queries (design §4.8).
//!
//! Every query here follows the same construction discipline: filter
//! first by `instrument_id IN (...)` (the composite index's leading
//! column), then by the `ts_event` range, then by any schema-specific
//! filter, ordered `(instrument_id, ts_event DESC)`.

use chrono::{DateTime, Utc};
use ingestor_core::IngestError;
use ingestor_model::enums::Granularity;
use ingestor_model::identifiers::InstrumentId;
use ingestor_model::{Definition, Ohlcv, Statistics, Tbbo, Trade};
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Row};

/// The common range-query arguments every `query_<schema>` method shares.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    pub instrument_ids: Vec<InstrumentId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: Option<i64>,
}

/// Executes the per-schema range queries against the hypertables.
pub struct QueryBuilder {
    pool: PgPool,
}

impl QueryBuilder {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns [`IngestError::StorageTransient`] if the query fails.
    pub async fn query_ohlcv(
        &self,
        query: &RangeQuery,
        granularity: Option<Granularity>,
    ) -> Result<Vec<Ohlcv>, IngestError> {
        let ids: Vec<i64> = query.instrument_ids.iter().map(|id| i64::from(id.0)).collect();
        let granularity_text = granularity.map(|g| enum_text(&g));

        let rows = sqlx::query(
            "SELECT instrument_id, ts_event, ts_recv, granularity, open_price, high_price,
                    low_price, close_price, volume
             FROM ohlcv
             WHERE instrument_id = ANY($1) AND ts_event BETWEEN $2 AND $3
               AND ($4::text IS NULL OR granularity = $4)
             ORDER BY instrument_id, ts_event DESC
             LIMIT $5",
        )
        .bind(&ids)
        .bind(query.start)
        .bind(query.end)
        .bind(granularity_text)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::StorageTransient(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(Ohlcv {
                    instrument_id: InstrumentId(row_i64(row, "instrument_id")? as u32),
                    ts_event: row_get(row, "ts_event")?,
                    ts_recv: row.try_get("ts_recv").ok(),
                    granularity: decode_enum(&row_text(row, "granularity")?)?,
                    open_price: row_get(row, "open_price")?,
                    high_price: row_get(row, "high_price")?,
                    low_price: row_get(row, "low_price")?,
                    close_price: row_get(row, "close_price")?,
                    volume: row_get(row, "volume")?,
                })
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`IngestError::StorageTransient`] if the query fails.
    pub async fn query_trades(&self, query: &RangeQuery) -> Result<Vec<Trade>, IngestError> {
        let ids: Vec<i64> = query.instrument_ids.iter().map(|id| i64::from(id.0)).collect();
        let rows = sqlx::query(
            "SELECT instrument_id, ts_event, ts_recv, price, size, side, sequence
             FROM trades
             WHERE instrument_id = ANY($1) AND ts_event BETWEEN $2 AND $3
             ORDER BY instrument_id, ts_event DESC
             LIMIT $4",
        )
        .bind(&ids)
        .bind(query.start)
        .bind(query.end)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::StorageTransient(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(Trade {
                    instrument_id: InstrumentId(row_i64(row, "instrument_id")? as u32),
                    ts_event: row_get(row, "ts_event")?,
                    ts_recv: row.try_get("ts_recv").ok(),
                    price: row_get(row, "price")?,
                    size: row_get(row, "size")?,
                    side: ingestor_model::enums::TradeSide::from_code(Some(&row_text(row, "side")?)),
                    sequence: row_i64(row, "sequence")? as u64,
                })
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`IngestError::StorageTransient`] if the query fails.
    pub async fn query_tbbo(&self, query: &RangeQuery) -> Result<Vec<Tbbo>, IngestError> {
        let ids: Vec<i64> = query.instrument_ids.iter().map(|id| i64::from(id.0)).collect();
        let rows = sqlx::query(
            "SELECT instrument_id, ts_event, ts_recv, price, size, side, sequence,
                    bid_px_00, ask_px_00, bid_sz_00, ask_sz_00
             FROM tbbo
             WHERE instrument_id = ANY($1) AND ts_event BETWEEN $2 AND $3
             ORDER BY instrument_id, ts_event DESC
             LIMIT $4",
        )
        .bind(&ids)
        .bind(query.start)
        .bind(query.end)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::StorageTransient(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(Tbbo {
                    instrument_id: InstrumentId(row_i64(row, "instrument_id")? as u32),
                    ts_event: row_get(row, "ts_event")?,
                    ts_recv: row.try_get("ts_recv").ok(),
                    price: row_get(row, "price")?,
                    size: row_get(row, "size")?,
                    side: ingestor_model::enums::TradeSide::from_code(Some(&row_text(row, "side")?)),
                    sequence: row_i64(row, "sequence")? as u64,
                    bid_px_00: row.try_get("bid_px_00").ok(),
                    ask_px_00: row.try_get("ask_px_00").ok(),
                    bid_sz_00: row.try_get("bid_sz_00").ok(),
                    ask_sz_00: row.try_get("ask_sz_00").ok(),
                })
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`IngestError::StorageTransient`] if the query fails.
    pub async fn query_statistics(&self, query: &RangeQuery) -> Result<Vec<Statistics>, IngestError> {
        let ids: Vec<i64> = query.instrument_ids.iter().map(|id| i64::from(id.0)).collect();
        let rows = sqlx::query(
            "SELECT instrument_id, ts_event, ts_recv, stat_type, update_action, price, quantity
             FROM statistics
             WHERE instrument_id = ANY($1) AND ts_event BETWEEN $2 AND $3
             ORDER BY instrument_id, ts_event DESC
             LIMIT $4",
        )
        .bind(&ids)
        .bind(query.start)
        .bind(query.end)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::StorageTransient(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(Statistics {
                    instrument_id: InstrumentId(row_i64(row, "instrument_id")? as u32),
                    ts_event: row_get(row, "ts_event")?,
                    ts_recv: row.try_get("ts_recv").ok(),
                    stat_type: decode_enum(&row_text(row, "stat_type")?)?,
                    update_action: decode_enum(&row_text(row, "update_action")?)?,
                    price: row.try_get("price").ok(),
                    quantity: row.try_get("quantity").ok(),
                })
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`IngestError::StorageTransient`] if the query fails.
    pub async fn query_definitions(&self, query: &RangeQuery) -> Result<Vec<Definition>, IngestError> {
        let ids: Vec<i64> = query.instrument_ids.iter().map(|id| i64::from(id.0)).collect();
        let rows = sqlx::query(
            "SELECT instrument_id, activation, raw_symbol, instrument_class, exchange, asset,
                    expiration, min_price_increment, contract_multiplier, strike_price,
                    leg_count, leg_instrument_ids, leg_ratios
             FROM definitions
             WHERE instrument_id = ANY($1) AND activation BETWEEN $2 AND $3
             ORDER BY instrument_id, activation DESC
             LIMIT $4",
        )
        .bind(&ids)
        .bind(query.start)
        .bind(query.end)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::StorageTransient(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let leg_ids: Vec<i64> = row.try_get("leg_instrument_ids").unwrap_or_default();
                Ok(Definition {
                    instrument_id: InstrumentId(row_i64(row, "instrument_id")? as u32),
                    raw_symbol: row_text(row, "raw_symbol")?,
                    instrument_class: decode_enum(&row_text(row, "instrument_class")?)?,
                    exchange: row_text(row, "exchange")?,
                    asset: row_text(row, "asset")?,
                    activation: row_get(row, "activation")?,
                    expiration: row_get(row, "expiration")?,
                    min_price_increment: row_get(row, "min_price_increment")?,
                    contract_multiplier: row_get(row, "contract_multiplier")?,
                    strike_price: row.try_get("strike_price").ok(),
                    leg_count: row_i64(row, "leg_count")? as u32,
                    leg_instrument_ids: leg_ids.into_iter().map(|id| InstrumentId(id as u32)).collect(),
                    leg_ratios: row.try_get("leg_ratios").unwrap_or_default(),
                })
            })
            .collect()
    }
}

fn row_i64(row: &sqlx::postgres::PgRow, column: &str) -> Result<i64, IngestError> {
    row.try_get(column).map_err(|e| IngestError::StorageTransient(e.to_string()))
}

fn row_text(row: &sqlx::postgres::PgRow, column: &str) -> Result<String, IngestError> {
    row.try_get(column).map_err(|e| IngestError::StorageTransient(e.to_string()))
}

fn row_get<'r, T>(row: &'r sqlx::postgres::PgRow, column: &str) -> Result<T, IngestError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(|e| IngestError::StorageTransient(e.to_string()))
}

fn enum_text<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn decode_enum<T: DeserializeOwned>(text: &str) -> Result<T, IngestError> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|e| IngestError::StorageTransient(format!("decoding enum column {text:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestor_model::enums::Granularity;

    #[test]
    fn enum_text_and_decode_enum_round_trip() {
        let text = enum_text(&Granularity::Day);
        assert_eq!(text, "day");
        let decoded: Granularity = decode_enum(&text).unwrap();
        assert_eq!(decoded, Granularity::Day);
    }
}
