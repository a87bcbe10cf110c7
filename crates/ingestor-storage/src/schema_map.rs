//! The static canonical-field → database-column map, and the startup
//! self-check that prevents the silent data loss the source suffered
//! from field-name mismatches (design §4.5, testable property #8).

use ingestor_core::IngestError;
use ingestor_model::Schema;

/// One schema's authoritative column mapping: its hypertable name and the
/// `(canonical_field, db_column)` pairs every [`ingestor_model`] struct
/// field must appear in.
#[derive(Debug, Clone, Copy)]
pub struct SchemaColumnMap {
    pub table: &'static str,
    pub columns: &'static [(&'static str, &'static str)],
}

const OHLCV_COLUMNS: SchemaColumnMap = SchemaColumnMap {
    table: "ohlcv",
    columns: &[
        ("instrument_id", "instrument_id"),
        ("ts_event", "ts_event"),
        ("ts_recv", "ts_recv"),
        ("granularity", "granularity"),
        ("open_price", "open_price"),
        ("high_price", "high_price"),
        ("low_price", "low_price"),
        ("close_price", "close_price"),
        ("volume", "volume"),
    ],
};

const TRADES_COLUMNS: SchemaColumnMap = SchemaColumnMap {
    table: "trades",
    columns: &[
        ("instrument_id", "instrument_id"),
        ("ts_event", "ts_event"),
        ("ts_recv", "ts_recv"),
        ("price", "price"),
        ("size", "size"),
        ("side", "side"),
        ("sequence", "sequence"),
    ],
};

const TBBO_COLUMNS: SchemaColumnMap = SchemaColumnMap {
    table: "tbbo",
    columns: &[
        ("instrument_id", "instrument_id"),
        ("ts_event", "ts_event"),
        ("ts_recv", "ts_recv"),
        ("price", "price"),
        ("size", "size"),
        ("side", "side"),
        ("sequence", "sequence"),
        ("bid_px_00", "bid_px_00"),
        ("ask_px_00", "ask_px_00"),
        ("bid_sz_00", "bid_sz_00"),
        ("ask_sz_00", "ask_sz_00"),
    ],
};

const STATISTICS_COLUMNS: SchemaColumnMap = SchemaColumnMap {
    table: "statistics",
    columns: &[
        ("instrument_id", "instrument_id"),
        ("ts_event", "ts_event"),
        ("ts_recv", "ts_recv"),
        ("stat_type", "stat_type"),
        ("price", "price"),
        ("quantity", "quantity"),
        ("update_action", "update_action"),
    ],
};

const DEFINITIONS_COLUMNS: SchemaColumnMap = SchemaColumnMap {
    table: "definitions",
    columns: &[
        ("instrument_id", "instrument_id"),
        ("activation", "activation"),
        ("raw_symbol", "raw_symbol"),
        ("instrument_class", "instrument_class"),
        ("exchange", "exchange"),
        ("asset", "asset"),
        ("expiration", "expiration"),
        ("min_price_increment", "min_price_increment"),
        ("contract_multiplier", "contract_multiplier"),
        ("strike_price", "strike_price"),
        ("leg_count", "leg_count"),
        ("leg_instrument_ids", "leg_instrument_ids"),
        ("leg_ratios", "leg_ratios"),
    ],
};

#[must_use]
pub fn column_map(schema: Schema) -> SchemaColumnMap {
    match schema {
        Schema::Ohlcv => OHLCV_COLUMNS,
        Schema::Trades => TRADES_COLUMNS,
        Schema::Tbbo => TBBO_COLUMNS,
        Schema::Statistics => STATISTICS_COLUMNS,
        Schema::Definitions => DEFINITIONS_COLUMNS,
    }
}

/// The canonical struct's own field list, independent of the column map
/// above — the self-check's whole point is catching the two falling out
/// of sync.
fn canonical_fields(schema: Schema) -> &'static [&'static str] {
    match schema {
        Schema::Ohlcv => &[
            "instrument_id",
            "ts_event",
            "ts_recv",
            "granularity",
            "open_price",
            "high_price",
            "low_price",
            "close_price",
            "volume",
        ],
        Schema::Trades => &[
            "instrument_id",
            "ts_event",
            "ts_recv",
            "price",
            "size",
            "side",
            "sequence",
        ],
        Schema::Tbbo => &[
            "instrument_id",
            "ts_event",
            "ts_recv",
            "price",
            "size",
            "side",
            "sequence",
            "bid_px_00",
            "ask_px_00",
            "bid_sz_00",
            "ask_sz_00",
        ],
        Schema::Statistics => &[
            "instrument_id",
            "ts_event",
            "ts_recv",
            "stat_type",
            "price",
            "quantity",
            "update_action",
        ],
        Schema::Definitions => &[
            "instrument_id",
            "activation",
            "raw_symbol",
            "instrument_class",
            "exchange",
            "asset",
            "expiration",
            "min_price_increment",
            "contract_multiplier",
            "strike_price",
            "leg_count",
            "leg_instrument_ids",
            "leg_ratios",
        ],
    }
}

/// Verifies that every canonical field of every schema has an entry in
/// that schema's column map. Run once at [`crate::loader::StorageLoader::open`]
/// time so a mismatch is a startup failure, never a silent first-insert
/// data loss (design §4.5).
///
/// # Errors
///
/// Returns [`IngestError::Configuration`] naming the first schema/field
/// pair missing a column mapping.
pub fn self_check() -> Result<(), IngestError> {
    for schema in Schema::all() {
        let map = column_map(schema);
        for field in canonical_fields(schema) {
            if !map.columns.iter().any(|(canonical, _)| canonical == field) {
                return Err(IngestError::Configuration(format!(
                    "schema-column self-check failed: {schema:?}.{field} has no database column mapping"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn self_check_passes_for_every_schema_as_shipped() {
        assert!(self_check().is_ok());
    }

    #[rstest]
    #[case(Schema::Ohlcv)]
    #[case(Schema::Trades)]
    #[case(Schema::Tbbo)]
    #[case(Schema::Statistics)]
    #[case(Schema::Definitions)]
    fn every_canonical_field_has_a_column(#[case] schema: Schema) {
        let map = column_map(schema);
        for field in canonical_fields(schema) {
            assert!(
                map.columns.iter().any(|(canonical, _)| canonical == field),
                "missing column mapping for {schema:?}.{field}"
            );
        }
    }
}
