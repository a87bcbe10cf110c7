//! Projects a canonical record back into the rule engine's flat
//! [`SourceRecord`] shape so that business rules declared in the mapping
//! document's `validation_rules` section (design §4.3/§4.4) can be
//! evaluated against it with the same `evalexpr`-backed language used
//! during transformation.
//!
//! Every field is inserted, including absent optional fields as
//! [`FieldValue::Null`] — this is what makes `bid_px_00 is null`-style
//! rules work against a record whose quote has no resting interest on
//! one side (testable property #6).

use ingestor_model::{CanonicalRecord, Definition, Ohlcv, Statistics, Tbbo, Trade};
use ingestor_rules::value::{FieldValue, SourceRecord};
use rust_decimal::Decimal;

fn opt_decimal(value: Option<Decimal>) -> FieldValue {
    value.map_or(FieldValue::Null, FieldValue::Decimal)
}

/// Flattens `record` into a [`SourceRecord`] keyed by canonical field name.
#[must_use]
pub fn canonical_to_fields(record: &CanonicalRecord) -> SourceRecord {
    match record {
        CanonicalRecord::Ohlcv(bar) => ohlcv_fields(bar),
        CanonicalRecord::Trade(trade) => trade_fields(trade),
        CanonicalRecord::Tbbo(tbbo) => tbbo_fields(tbbo),
        CanonicalRecord::Statistics(stat) => statistics_fields(stat),
        CanonicalRecord::Definition(def) => definition_fields(def),
    }
}

fn ohlcv_fields(bar: &Ohlcv) -> SourceRecord {
    SourceRecord::from([
        ("instrument_id".to_string(), FieldValue::Int(i64::from(bar.instrument_id.0))),
        ("ts_event".to_string(), FieldValue::Timestamp(bar.ts_event)),
        ("ts_recv".to_string(), bar.ts_recv.map_or(FieldValue::Null, FieldValue::Timestamp)),
        ("open_price".to_string(), FieldValue::Decimal(bar.open_price)),
        ("high_price".to_string(), FieldValue::Decimal(bar.high_price)),
        ("low_price".to_string(), FieldValue::Decimal(bar.low_price)),
        ("close_price".to_string(), FieldValue::Decimal(bar.close_price)),
        ("volume".to_string(), FieldValue::Decimal(bar.volume)),
    ])
}

fn trade_fields(trade: &Trade) -> SourceRecord {
    SourceRecord::from([
        ("instrument_id".to_string(), FieldValue::Int(i64::from(trade.instrument_id.0))),
        ("ts_event".to_string(), FieldValue::Timestamp(trade.ts_event)),
        ("ts_recv".to_string(), trade.ts_recv.map_or(FieldValue::Null, FieldValue::Timestamp)),
        ("price".to_string(), FieldValue::Decimal(trade.price)),
        ("size".to_string(), FieldValue::Decimal(trade.size)),
        ("side".to_string(), FieldValue::Str(trade.side.code().to_string())),
        ("sequence".to_string(), FieldValue::Int(trade.sequence as i64)),
    ])
}

fn tbbo_fields(tbbo: &Tbbo) -> SourceRecord {
    SourceRecord::from([
        ("instrument_id".to_string(), FieldValue::Int(i64::from(tbbo.instrument_id.0))),
        ("ts_event".to_string(), FieldValue::Timestamp(tbbo.ts_event)),
        ("ts_recv".to_string(), tbbo.ts_recv.map_or(FieldValue::Null, FieldValue::Timestamp)),
        ("price".to_string(), FieldValue::Decimal(tbbo.price)),
        ("size".to_string(), FieldValue::Decimal(tbbo.size)),
        ("side".to_string(), FieldValue::Str(tbbo.side.code().to_string())),
        ("sequence".to_string(), FieldValue::Int(tbbo.sequence as i64)),
        ("bid_px_00".to_string(), opt_decimal(tbbo.bid_px_00)),
        ("ask_px_00".to_string(), opt_decimal(tbbo.ask_px_00)),
        ("bid_sz_00".to_string(), opt_decimal(tbbo.bid_sz_00)),
        ("ask_sz_00".to_string(), opt_decimal(tbbo.ask_sz_00)),
    ])
}

fn statistics_fields(stat: &Statistics) -> SourceRecord {
    SourceRecord::from([
        ("instrument_id".to_string(), FieldValue::Int(i64::from(stat.instrument_id.0))),
        ("ts_event".to_string(), FieldValue::Timestamp(stat.ts_event)),
        ("ts_recv".to_string(), stat.ts_recv.map_or(FieldValue::Null, FieldValue::Timestamp)),
        ("stat_type".to_string(), FieldValue::Str(format!("{:?}", stat.stat_type))),
        ("update_action".to_string(), FieldValue::Str(format!("{:?}", stat.update_action))),
        ("price".to_string(), opt_decimal(stat.price)),
        ("quantity".to_string(), opt_decimal(stat.quantity)),
    ])
}

fn definition_fields(def: &Definition) -> SourceRecord {
    SourceRecord::from([
        ("instrument_id".to_string(), FieldValue::Int(i64::from(def.instrument_id.0))),
        ("raw_symbol".to_string(), FieldValue::Str(def.raw_symbol.clone())),
        ("instrument_class".to_string(), FieldValue::Str(format!("{:?}", def.instrument_class))),
        ("exchange".to_string(), FieldValue::Str(def.exchange.clone())),
        ("asset".to_string(), FieldValue::Str(def.asset.clone())),
        ("activation".to_string(), FieldValue::Timestamp(def.activation)),
        ("expiration".to_string(), FieldValue::Timestamp(def.expiration)),
        ("min_price_increment".to_string(), FieldValue::Decimal(def.min_price_increment)),
        ("contract_multiplier".to_string(), FieldValue::Decimal(def.contract_multiplier)),
        ("strike_price".to_string(), opt_decimal(def.strike_price)),
        ("leg_count".to_string(), FieldValue::Int(i64::from(def.leg_count))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestor_model::stubs::tbbo_stub;
    use rstest::rstest;

    #[rstest]
    fn absent_quote_side_projects_to_null() {
        let mut quote = tbbo_stub();
        quote.bid_px_00 = None;
        let record = CanonicalRecord::Tbbo(quote);
        let fields = canonical_to_fields(&record);
        assert!(fields.get("bid_px_00").unwrap().is_null());
        assert!(!fields.get("ask_px_00").unwrap().is_null());
    }
}
