//! Idempotent bulk upsert into the per-schema hypertables (design §4.5).
//!
//! A multi-row `INSERT ... ON CONFLICT DO NOTHING` built with
//! [`sqlx::QueryBuilder`] so one batch is one round trip instead of one
//! per record.

use ingestor_core::IngestError;
use ingestor_model::CanonicalRecord;
use ingestor_model::Schema;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::schema_map;

/// The outcome of loading one batch, per design §4.5's `load` contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows_attempted: u64,
    pub rows_inserted: u64,
    pub rows_skipped_as_duplicate: u64,
}

/// Owns the connection pool and performs idempotent batch loads.
pub struct StorageLoader {
    pool: PgPool,
    /// Batches larger than this are split into multiple statements
    /// (design §4.5, "batches larger than a configured upper bound are
    /// split").
    max_rows_per_statement: usize,
}

impl StorageLoader {
    /// Opens a loader against `pool`, running the schema-column self-check
    /// first so a field-mapping drift fails at startup rather than at
    /// first insert (design §4.5, testable property #8).
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Configuration`] if the self-check fails.
    pub fn open(pool: PgPool, max_rows_per_statement: usize) -> Result<Self, IngestError> {
        schema_map::self_check()?;
        Ok(Self {
            pool,
            max_rows_per_statement,
        })
    }

    /// Closes the pool, waiting for in-flight connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Writes `batch` (all of the same `schema`) as one or more
    /// transactions, splitting at `max_rows_per_statement`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::StorageTransient`] on a connection or
    /// deadlock failure — the caller is expected to retry these via
    /// [`ingestor_core::retry::retry_with`].
    pub async fn load(
        &self,
        batch: &[CanonicalRecord],
        schema: Schema,
    ) -> Result<LoadStats, IngestError> {
        if batch.is_empty() {
            return Ok(LoadStats::default());
        }

        let mut stats = LoadStats::default();
        for chunk in batch.chunks(self.max_rows_per_statement.max(1)) {
            let inserted = self.load_statement(chunk, schema).await?;
            stats.rows_attempted += chunk.len() as u64;
            stats.rows_inserted += inserted;
            stats.rows_skipped_as_duplicate += chunk.len() as u64 - inserted;
        }
        Ok(stats)
    }

    async fn load_statement(
        &self,
        records: &[CanonicalRecord],
        schema: Schema,
    ) -> Result<u64, IngestError> {
        let map = schema_map::column_map(schema);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IngestError::StorageTransient(e.to_string()))?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            map.table,
            map.columns
                .iter()
                .map(|(_, col)| *col)
                .collect::<Vec<_>>()
                .join(", ")
        ));

        match schema {
            Schema::Ohlcv => push_ohlcv_values(&mut builder, records),
            Schema::Trades => push_trade_values(&mut builder, records),
            Schema::Tbbo => push_tbbo_values(&mut builder, records),
            Schema::Statistics => push_statistics_values(&mut builder, records),
            Schema::Definitions => push_definition_values(&mut builder, records),
        }

        builder.push(format!(" ON CONFLICT ({}) DO NOTHING", natural_key_columns(schema)));

        let result = builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| IngestError::StorageTransient(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| IngestError::StorageTransient(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

fn natural_key_columns(schema: Schema) -> &'static str {
    match schema {
        Schema::Ohlcv => "instrument_id, ts_event, granularity",
        Schema::Trades => "instrument_id, ts_event, sequence, price, size, side",
        Schema::Tbbo => "instrument_id, ts_event, sequence",
        Schema::Statistics => "instrument_id, ts_event, stat_type, update_action",
        Schema::Definitions => "instrument_id, activation",
    }
}

/// Renders a unit-variant enum to the same wire string its `Serialize`
/// impl produces, so the stored text matches the canonical mapping rules
/// (design §4.3) instead of duplicating a second hand-written match arm.
fn enum_text<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn push_ohlcv_values<'a>(builder: &mut QueryBuilder<'a, Postgres>, records: &'a [CanonicalRecord]) {
    builder.push_values(records, |mut row, record| {
        let CanonicalRecord::Ohlcv(bar) = record else {
            unreachable!("push_ohlcv_values called with a non-OHLCV batch");
        };
        row.push_bind(i64::from(bar.instrument_id.0))
            .push_bind(bar.ts_event)
            .push_bind(bar.ts_recv)
            .push_bind(enum_text(&bar.granularity))
            .push_bind(bar.open_price)
            .push_bind(bar.high_price)
            .push_bind(bar.low_price)
            .push_bind(bar.close_price)
            .push_bind(bar.volume);
    });
}

fn push_trade_values<'a>(builder: &mut QueryBuilder<'a, Postgres>, records: &'a [CanonicalRecord]) {
    builder.push_values(records, |mut row, record| {
        let CanonicalRecord::Trade(trade) = record else {
            unreachable!("push_trade_values called with a non-Trades batch");
        };
        row.push_bind(i64::from(trade.instrument_id.0))
            .push_bind(trade.ts_event)
            .push_bind(trade.ts_recv)
            .push_bind(trade.price)
            .push_bind(trade.size)
            .push_bind(trade.side.code())
            .push_bind(trade.sequence as i64);
    });
}

fn push_tbbo_values<'a>(builder: &mut QueryBuilder<'a, Postgres>, records: &'a [CanonicalRecord]) {
    builder.push_values(records, |mut row, record| {
        let CanonicalRecord::Tbbo(quote) = record else {
            unreachable!("push_tbbo_values called with a non-TBBO batch");
        };
        row.push_bind(i64::from(quote.instrument_id.0))
            .push_bind(quote.ts_event)
            .push_bind(quote.ts_recv)
            .push_bind(quote.price)
            .push_bind(quote.size)
            .push_bind(quote.side.code())
            .push_bind(quote.sequence as i64)
            .push_bind(quote.bid_px_00)
            .push_bind(quote.ask_px_00)
            .push_bind(quote.bid_sz_00)
            .push_bind(quote.ask_sz_00);
    });
}

fn push_statistics_values<'a>(builder: &mut QueryBuilder<'a, Postgres>, records: &'a [CanonicalRecord]) {
    builder.push_values(records, |mut row, record| {
        let CanonicalRecord::Statistics(stat) = record else {
            unreachable!("push_statistics_values called with a non-Statistics batch");
        };
        row.push_bind(i64::from(stat.instrument_id.0))
            .push_bind(stat.ts_event)
            .push_bind(stat.ts_recv)
            .push_bind(enum_text(&stat.stat_type))
            .push_bind(stat.price)
            .push_bind(stat.quantity)
            .push_bind(enum_text(&stat.update_action));
    });
}

fn push_definition_values<'a>(builder: &mut QueryBuilder<'a, Postgres>, records: &'a [CanonicalRecord]) {
    builder.push_values(records, |mut row, record| {
        let CanonicalRecord::Definition(def) = record else {
            unreachable!("push_definition_values called with a non-Definitions batch");
        };
        let leg_ids: Vec<i64> = def.leg_instrument_ids.iter().map(|id| i64::from(id.0)).collect();
        row.push_bind(i64::from(def.instrument_id.0))
            .push_bind(def.activation)
            .push_bind(def.raw_symbol.clone())
            .push_bind(enum_text(&def.instrument_class))
            .push_bind(def.exchange.clone())
            .push_bind(def.asset.clone())
            .push_bind(def.expiration)
            .push_bind(def.min_price_increment)
            .push_bind(def.contract_multiplier)
            .push_bind(def.strike_price)
            .push_bind(def.leg_count as i32)
            .push_bind(leg_ids)
            .push_bind(def.leg_ratios.clone());
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestor_model::stubs::ohlcv_stub;
    use rstest::rstest;

    #[rstest]
    fn natural_key_columns_cover_every_schema() {
        for schema in Schema::all() {
            assert!(!natural_key_columns(schema).is_empty());
        }
    }

    #[rstest]
    fn enum_text_matches_serde_wire_representation() {
        let bar = ohlcv_stub();
        assert_eq!(enum_text(&bar.granularity), "day");
    }

    #[rstest]
    fn load_stats_default_is_all_zero() {
        let stats = LoadStats::default();
        assert_eq!(stats.rows_attempted, 0);
        assert_eq!(stats.rows_inserted, 0);
        assert_eq!(stats.rows_skipped_as_duplicate, 0);
    }
}
