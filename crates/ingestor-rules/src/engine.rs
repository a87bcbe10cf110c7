//! The rule engine itself: loads a mapping document and applies it to
//! vendor records, design §4.3.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use ingestor_core::IngestError;
use ingestor_model::{
    CanonicalRecord, Definition, InstrumentClass, InstrumentId, Ohlcv, Schema, Statistics,
    StatType, Tbbo, Trade, TradeSide, UpdateAction,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::mapping::{FieldMapping, MappingDocument, TargetType};
use crate::value::{FieldValue, SourceRecord};

/// Applies a loaded [`MappingDocument`] to vendor records, producing
/// canonical records.
///
/// One engine instance is bound to a single mapping document (and
/// therefore a single `target_schema`) — the orchestrator holds one per
/// schema it ingests, the way it holds one adapter per job.
pub struct RuleEngine {
    document: MappingDocument,
    target_schema: Schema,
}

impl RuleEngine {
    /// Parses and structurally validates a mapping document.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Configuration`] when the document is
    /// malformed, names an unknown schema, or has dangling rule
    /// references.
    pub fn load(yaml: &str) -> Result<Self, IngestError> {
        let document = MappingDocument::parse(yaml).map_err(IngestError::Configuration)?;
        let target_schema = parse_schema(&document.target_schema)
            .map_err(IngestError::Configuration)?;
        Ok(Self {
            document,
            target_schema,
        })
    }

    #[must_use]
    pub fn target_schema(&self) -> Schema {
        self.target_schema
    }

    /// The schema's declared `validation_rules`, for the orchestrator to
    /// hand to [`ingestor_validate::validator::Validator::with_rules`]
    /// without re-parsing the mapping document.
    #[must_use]
    pub fn validation_rules(&self) -> &[crate::mapping::ValidationRuleSpec] {
        &self.document.validation_rules
    }

    /// Transforms a single vendor record into a canonical record.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Transformation`] when a mapping
    /// expression fails to evaluate, or a required target field is
    /// missing or of the wrong shape after mapping.
    pub fn transform_record(&self, record: &SourceRecord) -> Result<CanonicalRecord, IngestError> {
        let mut mapped = self.apply_field_mappings(record)?;
        self.apply_conditional_mappings(record, &mut mapped)?;
        self.apply_defaults(&mut mapped);
        self.apply_type_conversions(&mut mapped)?;
        instantiate(self.target_schema, &mapped)
    }

    /// Transforms a batch of vendor records.
    ///
    /// This is the only entry point the orchestrator is permitted to
    /// call with more than one record in hand — calling
    /// [`Self::transform_record`] once per record defeats the
    /// conditional-mapping evaluation order guarantee and is a
    /// different (slower, non-batched) code path; the orchestrator must
    /// never narrow a batch down to a single-record call here.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; callers that want
    /// per-record partial failure should catch
    /// [`IngestError::Transformation`] per record themselves rather than
    /// call this in a tight loop of one.
    pub fn transform_batch(
        &self,
        records: &[SourceRecord],
    ) -> Result<Vec<CanonicalRecord>, IngestError> {
        records.iter().map(|r| self.transform_record(r)).collect()
    }

    fn apply_field_mappings(&self, record: &SourceRecord) -> Result<SourceRecord, IngestError> {
        let mut mapped = SourceRecord::new();
        for (target, mapping) in &self.document.field_mappings {
            let value = resolve_mapping(mapping, record, target)?;
            mapped.insert(target.clone(), value);
        }
        Ok(mapped)
    }

    fn apply_conditional_mappings(
        &self,
        record: &SourceRecord,
        mapped: &mut SourceRecord,
    ) -> Result<(), IngestError> {
        for conditional in &self.document.conditional_mappings {
            let matched = crate::expr::evaluate_bool(&conditional.when, record).map_err(|e| {
                IngestError::Transformation {
                    field: conditional.when.clone(),
                    reason: e,
                }
            })?;
            if matched {
                for (target, mapping) in &conditional.then {
                    let value = resolve_mapping(mapping, record, target)?;
                    mapped.insert(target.clone(), value);
                }
                break;
            }
        }
        Ok(())
    }

    fn apply_defaults(&self, mapped: &mut SourceRecord) {
        for (field, default_yaml) in &self.document.defaults {
            let needs_default = match mapped.get(field) {
                None => true,
                Some(FieldValue::Null) => true,
                Some(_) => false,
            };
            if needs_default {
                mapped.insert(field.clone(), yaml_to_field_value(default_yaml));
            }
        }
    }

    fn apply_type_conversions(&self, mapped: &mut SourceRecord) -> Result<(), IngestError> {
        for (field, conversion) in &self.document.type_conversions {
            let Some(current) = mapped.get(field).cloned() else {
                continue;
            };
            if current.is_null() {
                continue;
            }
            let converted = convert(&current, conversion, field)?;
            mapped.insert(field.clone(), converted);
        }
        Ok(())
    }
}

fn parse_schema(name: &str) -> Result<Schema, String> {
    match name {
        "ohlcv" => Ok(Schema::Ohlcv),
        "trades" => Ok(Schema::Trades),
        "tbbo" => Ok(Schema::Tbbo),
        "statistics" => Ok(Schema::Statistics),
        "definitions" => Ok(Schema::Definitions),
        other => Err(format!("unknown target_schema {other:?}")),
    }
}

fn resolve_mapping(
    mapping: &FieldMapping,
    record: &SourceRecord,
    target: &str,
) -> Result<FieldValue, IngestError> {
    match mapping {
        FieldMapping::SourceField(source) => {
            Ok(record.get(source).cloned().unwrap_or(FieldValue::Null))
        }
        FieldMapping::Detailed {
            source_field,
            literal,
            expression,
        } => {
            if let Some(expr) = expression {
                let truthy =
                    crate::expr::evaluate_bool(expr, record).map_err(|e| {
                        IngestError::Transformation {
                            field: target.to_string(),
                            reason: e,
                        }
                    })?;
                Ok(FieldValue::Bool(truthy))
            } else if let Some(literal) = literal {
                Ok(yaml_to_field_value(literal))
            } else if let Some(source) = source_field {
                Ok(record.get(source).cloned().unwrap_or(FieldValue::Null))
            } else {
                Err(IngestError::Transformation {
                    field: target.to_string(),
                    reason: "field mapping declares neither source_field, literal, nor expression"
                        .to_string(),
                })
            }
        }
    }
}

fn yaml_to_field_value(value: &serde_yaml::Value) -> FieldValue {
    match value {
        serde_yaml::Value::Null => FieldValue::Null,
        serde_yaml::Value::Bool(b) => FieldValue::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                FieldValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                Decimal::try_from(f)
                    .map(FieldValue::Decimal)
                    .unwrap_or(FieldValue::Null)
            } else {
                FieldValue::Null
            }
        }
        serde_yaml::Value::String(s) => FieldValue::Str(s.clone()),
        _ => FieldValue::Null,
    }
}

fn convert(
    value: &FieldValue,
    conversion: &crate::mapping::TypeConversion,
    field: &str,
) -> Result<FieldValue, IngestError> {
    let transformation_err = |reason: String| IngestError::Transformation {
        field: field.to_string(),
        reason,
    };
    match conversion.to {
        TargetType::Decimal => {
            let mut decimal = value.as_decimal().ok_or_else(|| {
                transformation_err(format!("cannot convert {value:?} to decimal"))
            })?;
            if let Some(precision) = conversion.precision {
                decimal *= pow10(-precision);
            }
            Ok(FieldValue::Decimal(decimal))
        }
        TargetType::Int => match value {
            FieldValue::Int(i) => Ok(FieldValue::Int(*i)),
            FieldValue::Str(s) => s
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|e| transformation_err(e.to_string())),
            other => Err(transformation_err(format!("cannot convert {other:?} to int"))),
        },
        TargetType::UtcDatetime => convert_timestamp(value, conversion, field),
        TargetType::Symbol => {
            let s = value
                .as_str()
                .ok_or_else(|| transformation_err(format!("cannot convert {value:?} to symbol")))?;
            ingestor_core::symbols::validate_symbol(s).map_err(transformation_err)?;
            Ok(FieldValue::Str(s.to_string()))
        }
        TargetType::Str => Ok(FieldValue::Str(match value {
            FieldValue::Str(s) => s.clone(),
            other => format!("{other:?}"),
        })),
        TargetType::Bool => match value {
            FieldValue::Bool(b) => Ok(FieldValue::Bool(*b)),
            other => Err(transformation_err(format!("cannot convert {other:?} to bool"))),
        },
    }
}

/// `10^exp`, computed by repeated multiplication/division since
/// `rust_decimal`'s checked power helpers require the `maths` feature,
/// which the workspace does not otherwise need.
fn pow10(exp: i32) -> Decimal {
    let base = Decimal::from(10);
    let mut result = Decimal::ONE;
    if exp >= 0 {
        for _ in 0..exp {
            result *= base;
        }
    } else {
        for _ in 0..exp.unsigned_abs() {
            result /= base;
        }
    }
    result
}

fn convert_timestamp(
    value: &FieldValue,
    _conversion: &crate::mapping::TypeConversion,
    field: &str,
) -> Result<FieldValue, IngestError> {
    if let FieldValue::Timestamp(ts) = value {
        return Ok(FieldValue::Timestamp(*ts));
    }
    let Some(text) = value.as_str() else {
        return Err(IngestError::Transformation {
            field: field.to_string(),
            reason: format!("cannot convert {value:?} to a timestamp"),
        });
    };
    if let Ok(aware) = DateTime::parse_from_rfc3339(text) {
        return Ok(FieldValue::Timestamp(aware.with_timezone(&Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        warn!(field, text, "naive timestamp coerced to UTC");
        return Ok(FieldValue::Timestamp(
            DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
        ));
    }
    Err(IngestError::Transformation {
        field: field.to_string(),
        reason: format!("{text:?} is not a recognized timestamp format"),
    })
}

fn require<'a>(
    mapped: &'a SourceRecord,
    field: &str,
) -> Result<&'a FieldValue, IngestError> {
    mapped
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| IngestError::Transformation {
            field: field.to_string(),
            reason: "required target field is missing after mapping".to_string(),
        })
}

fn require_decimal(mapped: &SourceRecord, field: &str) -> Result<Decimal, IngestError> {
    require(mapped, field)?.as_decimal().ok_or_else(|| IngestError::Transformation {
        field: field.to_string(),
        reason: "expected a decimal value".to_string(),
    })
}

fn optional_decimal(mapped: &SourceRecord, field: &str) -> Option<Decimal> {
    mapped.get(field).and_then(FieldValue::as_decimal)
}

fn require_timestamp(mapped: &SourceRecord, field: &str) -> Result<DateTime<Utc>, IngestError> {
    require(mapped, field)?
        .as_timestamp()
        .ok_or_else(|| IngestError::Transformation {
            field: field.to_string(),
            reason: "expected a UTC timestamp value".to_string(),
        })
}

fn optional_timestamp(mapped: &SourceRecord, field: &str) -> Option<DateTime<Utc>> {
    mapped.get(field).and_then(FieldValue::as_timestamp)
}

fn require_instrument_id(mapped: &SourceRecord, field: &str) -> Result<InstrumentId, IngestError> {
    match require(mapped, field)? {
        FieldValue::Int(i) => Ok(InstrumentId(*i as u32)),
        other => Err(IngestError::Transformation {
            field: field.to_string(),
            reason: format!("expected an integer instrument_id, got {other:?}"),
        }),
    }
}

fn require_string(mapped: &SourceRecord, field: &str) -> Result<String, IngestError> {
    require(mapped, field)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| IngestError::Transformation {
            field: field.to_string(),
            reason: "expected a string value".to_string(),
        })
}

fn require_u64(mapped: &SourceRecord, field: &str) -> Result<u64, IngestError> {
    match require(mapped, field)? {
        FieldValue::Int(i) if *i >= 0 => Ok(*i as u64),
        other => Err(IngestError::Transformation {
            field: field.to_string(),
            reason: format!("expected a non-negative integer, got {other:?}"),
        }),
    }
}

fn deserialize_enum<T: DeserializeOwned>(
    mapped: &SourceRecord,
    field: &str,
) -> Result<T, IngestError> {
    let value = require(mapped, field)?;
    let text = value.as_str().ok_or_else(|| IngestError::Transformation {
        field: field.to_string(),
        reason: format!("expected a string enum value, got {value:?}"),
    })?;
    serde_yaml::from_value(serde_yaml::Value::String(text.to_string())).map_err(|e| {
        IngestError::Transformation {
            field: field.to_string(),
            reason: format!("{text:?} is not a recognized value: {e}"),
        }
    })
}

fn instantiate(schema: Schema, mapped: &SourceRecord) -> Result<CanonicalRecord, IngestError> {
    match schema {
        Schema::Ohlcv => Ok(CanonicalRecord::Ohlcv(Ohlcv {
            instrument_id: require_instrument_id(mapped, "instrument_id")?,
            ts_event: require_timestamp(mapped, "ts_event")?,
            ts_recv: optional_timestamp(mapped, "ts_recv"),
            granularity: deserialize_enum(mapped, "granularity")?,
            open_price: require_decimal(mapped, "open_price")?,
            high_price: require_decimal(mapped, "high_price")?,
            low_price: require_decimal(mapped, "low_price")?,
            close_price: require_decimal(mapped, "close_price")?,
            volume: require_decimal(mapped, "volume")?,
        })),
        Schema::Trades => Ok(CanonicalRecord::Trade(Trade {
            instrument_id: require_instrument_id(mapped, "instrument_id")?,
            ts_event: require_timestamp(mapped, "ts_event")?,
            ts_recv: optional_timestamp(mapped, "ts_recv"),
            price: require_decimal(mapped, "price")?,
            size: require_decimal(mapped, "size")?,
            side: mapped
                .get("side")
                .and_then(FieldValue::as_str)
                .map(|s| TradeSide::from_code(Some(s)))
                .unwrap_or(TradeSide::None),
            sequence: require_u64(mapped, "sequence")?,
        })),
        Schema::Tbbo => Ok(CanonicalRecord::Tbbo(Tbbo {
            instrument_id: require_instrument_id(mapped, "instrument_id")?,
            ts_event: require_timestamp(mapped, "ts_event")?,
            ts_recv: optional_timestamp(mapped, "ts_recv"),
            price: require_decimal(mapped, "price")?,
            size: require_decimal(mapped, "size")?,
            side: mapped
                .get("side")
                .and_then(FieldValue::as_str)
                .map(|s| TradeSide::from_code(Some(s)))
                .unwrap_or(TradeSide::None),
            sequence: require_u64(mapped, "sequence")?,
            bid_px_00: optional_decimal(mapped, "bid_px_00"),
            ask_px_00: optional_decimal(mapped, "ask_px_00"),
            bid_sz_00: optional_decimal(mapped, "bid_sz_00"),
            ask_sz_00: optional_decimal(mapped, "ask_sz_00"),
        })),
        Schema::Statistics => Ok(CanonicalRecord::Statistics(Statistics {
            instrument_id: require_instrument_id(mapped, "instrument_id")?,
            ts_event: require_timestamp(mapped, "ts_event")?,
            ts_recv: optional_timestamp(mapped, "ts_recv"),
            stat_type: deserialize_enum::<StatType>(mapped, "stat_type")?,
            update_action: deserialize_enum::<UpdateAction>(mapped, "update_action")?,
            price: optional_decimal(mapped, "price"),
            quantity: optional_decimal(mapped, "quantity"),
        })),
        Schema::Definitions => {
            let leg_count = mapped
                .get("leg_count")
                .and_then(|v| match v {
                    FieldValue::Int(i) => Some(*i as u32),
                    _ => None,
                })
                .unwrap_or(0);
            Ok(CanonicalRecord::Definition(Definition {
                instrument_id: require_instrument_id(mapped, "instrument_id")?,
                raw_symbol: require_string(mapped, "raw_symbol")?,
                instrument_class: deserialize_enum::<InstrumentClass>(mapped, "instrument_class")?,
                exchange: require_string(mapped, "exchange")?,
                asset: require_string(mapped, "asset")?,
                activation: require_timestamp(mapped, "activation")?,
                expiration: require_timestamp(mapped, "expiration")?,
                min_price_increment: require_decimal(mapped, "min_price_increment")?,
                contract_multiplier: require_decimal(mapped, "contract_multiplier")?,
                strike_price: optional_decimal(mapped, "strike_price"),
                leg_count,
                leg_instrument_ids: Vec::new(),
                leg_ratios: Vec::new(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn source(pairs: &[(&str, FieldValue)]) -> SourceRecord {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>()
    }

    const TBBO_MAPPING: &str = r#"
source_model: tbbo_raw
target_schema: tbbo
field_mappings:
  instrument_id: instrument_id
  ts_event: ts_event
  price: trade_price
  size: trade_size
  sequence: sequence
  side: side_code
  bid_px_00: bid_px_00
  ask_px_00: ask_px_00
defaults:
  bid_sz_00: null
  ask_sz_00: null
"#;

    #[rstest]
    fn transforms_a_direct_mapping_record() {
        let engine = RuleEngine::load(TBBO_MAPPING).unwrap();
        let record = source(&[
            ("instrument_id", FieldValue::Int(7)),
            (
                "ts_event",
                FieldValue::Timestamp(chrono::Utc::now()),
            ),
            ("trade_price", FieldValue::Decimal(rust_decimal::Decimal::new(10025, 2))),
            ("trade_size", FieldValue::Decimal(rust_decimal::Decimal::new(5, 0))),
            ("sequence", FieldValue::Int(42)),
            ("side_code", FieldValue::Str("B".to_string())),
            ("bid_px_00", FieldValue::Null),
            ("ask_px_00", FieldValue::Decimal(rust_decimal::Decimal::new(10030, 2))),
        ]);

        let canonical = engine.transform_record(&record).unwrap();
        match canonical {
            CanonicalRecord::Tbbo(tbbo) => {
                assert_eq!(tbbo.instrument_id, InstrumentId(7));
                assert!(tbbo.bid_px_00.is_none());
                assert!(tbbo.ask_px_00.is_some());
            }
            other => panic!("expected Tbbo, got {other:?}"),
        }
    }

    #[rstest]
    fn missing_required_field_is_a_transformation_error() {
        let engine = RuleEngine::load(TBBO_MAPPING).unwrap();
        let record = source(&[("instrument_id", FieldValue::Int(7))]);
        let err = engine.transform_record(&record).unwrap_err();
        assert!(matches!(err, IngestError::Transformation { .. }));
    }

    #[rstest]
    fn transform_batch_preserves_order_and_length() {
        let engine = RuleEngine::load(TBBO_MAPPING).unwrap();
        let good_record = source(&[
            ("instrument_id", FieldValue::Int(7)),
            ("ts_event", FieldValue::Timestamp(chrono::Utc::now())),
            ("trade_price", FieldValue::Decimal(rust_decimal::Decimal::new(10025, 2))),
            ("trade_size", FieldValue::Decimal(rust_decimal::Decimal::new(5, 0))),
            ("sequence", FieldValue::Int(1)),
            ("side_code", FieldValue::Str("A".to_string())),
            ("bid_px_00", FieldValue::Null),
            ("ask_px_00", FieldValue::Null),
        ]);
        let batch = vec![good_record.clone(), good_record];
        let result = engine.transform_batch(&batch).unwrap();
        assert_eq!(result.len(), 2);
    }
}
