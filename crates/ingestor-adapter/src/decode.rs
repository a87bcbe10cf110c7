//! Structural decoding of vendor JSON into the rule engine's
//! [`SourceRecord`] shape (design §4.2, Stage A).
//!
//! The vendor wire format is a flat JSON object per record; this module's
//! only job is converting that object's values into [`FieldValue`]s
//! without yet applying any field renaming or type coercion — that is
//! `ingestor-rules`' job. A field absent from the JSON object is decoded
//! as [`FieldValue::Null`] so `is null` checks downstream see it the same
//! way whether the vendor omitted the field or sent a JSON `null`.

use chrono::{DateTime, Utc};
use ingestor_core::IngestError;
use ingestor_model::Schema;
use ingestor_rules::{FieldValue, SourceRecord};
use rust_decimal::Decimal;
use serde_json::Value;

/// Decodes one vendor JSON record into a [`SourceRecord`].
///
/// # Errors
///
/// Returns [`IngestError::VendorSchemaMismatch`] if `raw` is not a JSON
/// object.
pub fn decode_record(schema: Schema, raw: &Value) -> Result<SourceRecord, IngestError> {
    let Value::Object(fields) = raw else {
        return Err(IngestError::VendorSchemaMismatch {
            schema: schema.table_name().to_string(),
            reason: format!("expected a JSON object, got {raw}"),
        });
    };

    let mut record = SourceRecord::new();
    for (key, value) in fields {
        record.insert(key.clone(), json_to_field_value(value));
    }
    for field in known_fields(schema) {
        record.entry((*field).to_string()).or_insert(FieldValue::Null);
    }
    Ok(record)
}

/// The vendor field names this schema's records are documented to carry
/// (design §3's per-schema attribute table), used to backfill a field the
/// vendor omitted entirely as [`FieldValue::Null`] rather than leaving it
/// absent from the map. Direct name mapping being the common case (design
/// §4.3), these double as the vendor's own field names for every mapping
/// that does not rename them.
fn known_fields(schema: Schema) -> &'static [&'static str] {
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
            "ts_event",
            "raw_symbol",
            "instrument_class",
            "exchange",
            "asset",
            "expiration",
            "activation",
            "min_price_increment",
            "contract_multiplier",
            "strike_price",
            "leg_count",
            "leg_instrument_ids",
            "leg_ratios",
        ],
    }
}

/// Decodes an entire page of vendor records, short-circuiting on the
/// first malformed record.
///
/// # Errors
///
/// Returns the first [`IngestError::VendorSchemaMismatch`] encountered.
pub fn decode_page(schema: Schema, raw_records: &[Value]) -> Result<Vec<SourceRecord>, IngestError> {
    raw_records.iter().map(|r| decode_record(schema, r)).collect()
}

/// Filters a decoded `definitions` page down to the symbols the job
/// actually requested, undoing the fetch-all-then-filter vendor quirk
/// (design §9; see [`crate::symbology::request_symbols_for_schema`]).
///
/// Matching is against the decoded record's `raw_symbol` field; records
/// missing that field are dropped rather than erroring, since they cannot
/// be attributed to any requested symbol.
#[must_use]
pub fn filter_definitions(records: Vec<SourceRecord>, requested_symbols: &[String]) -> Vec<SourceRecord> {
    if requested_symbols.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|record| {
            record
                .get("raw_symbol")
                .and_then(FieldValue::as_str)
                .is_some_and(|symbol| requested_symbols.iter().any(|s| s == symbol))
        })
        .collect()
}

fn json_to_field_value(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                FieldValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                Decimal::try_from(f).map(FieldValue::Decimal).unwrap_or(FieldValue::Null)
            } else {
                FieldValue::Null
            }
        }
        Value::String(s) => {
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                FieldValue::Timestamp(ts.with_timezone(&Utc))
            } else {
                FieldValue::Str(s.clone())
            }
        }
        Value::Array(_) | Value::Object(_) => FieldValue::Str(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn decodes_flat_object_preserving_nulls() {
        let raw = json!({
            "instrument_id": 42,
            "bid_px_00": null,
            "price": "101.25",
            "ts_event": "2024-01-15T10:00:00Z",
        });
        let record = decode_record(Schema::Tbbo, &raw).unwrap();
        assert_eq!(record.get("instrument_id"), Some(&FieldValue::Int(42)));
        assert_eq!(record.get("bid_px_00"), Some(&FieldValue::Null));
        assert!(matches!(record.get("ts_event"), Some(FieldValue::Timestamp(_))));
    }

    #[rstest]
    fn backfills_omitted_schema_field_as_null() {
        let raw = json!({ "instrument_id": 42, "ask_px_00": 10 });
        let record = decode_record(Schema::Tbbo, &raw).unwrap();
        assert_eq!(record.get("bid_px_00"), Some(&FieldValue::Null));
        assert_eq!(record.get("ask_sz_00"), Some(&FieldValue::Null));
    }

    #[rstest]
    fn is_null_evaluates_true_for_a_field_the_vendor_omitted() {
        let raw = json!({ "instrument_id": 42, "ask_px_00": 10 });
        let record = decode_record(Schema::Tbbo, &raw).unwrap();
        assert!(ingestor_rules::expr::evaluate_bool("bid_px_00 is null", &record).unwrap());
    }

    #[rstest]
    fn rejects_non_object_record() {
        let raw = json!([1, 2, 3]);
        let err = decode_record(Schema::Ohlcv, &raw).unwrap_err();
        assert!(matches!(err, IngestError::VendorSchemaMismatch { .. }));
    }

    #[rstest]
    fn filter_definitions_keeps_only_requested_symbols() {
        let mut a = SourceRecord::new();
        a.insert("raw_symbol".to_string(), FieldValue::Str("ESH4".to_string()));
        let mut b = SourceRecord::new();
        b.insert("raw_symbol".to_string(), FieldValue::Str("NQH4".to_string()));

        let filtered = filter_definitions(vec![a, b], &["ESH4".to_string()]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(
            filtered[0].get("raw_symbol"),
            Some(&FieldValue::Str("ESH4".to_string()))
        );
    }
}
