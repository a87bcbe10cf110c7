//! The safe expression language used by `conditional_mappings` and
//! `validation_rules` (design §4.3).
//!
//! `evalexpr` supplies the arithmetic/boolean grammar; this module layers
//! the one extension the mapping grammar needs on top of it — the `is
//! null` / `is not null` predicate — on top of it. The predicate is
//! resolved directly against `record` and rewritten to the literal
//! `true`/`false` *before* the expression reaches `evalexpr`, so a field
//! that is genuinely absent from `record` (as opposed to present with an
//! explicit null) never needs to exist as an `evalexpr` variable — handing
//! `evalexpr` an identifier it has no value for is what used to make `X is
//! null` fail instead of evaluate true for an absent `X`. No file or
//! process access is ever exposed to the evaluation context, so the
//! language stays a closed, safe subset.

use std::sync::OnceLock;

use evalexpr::{ContextWithMutableVariables, EvalexprError, HashMapContext, Value as EvalValue};
use regex::Regex;

use crate::value::{FieldValue, SourceRecord};

fn is_null_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b([A-Za-z_][A-Za-z0-9_.]*)\s+is\s+(not\s+)?null\b").unwrap()
    })
}

/// Rewrites `field is null` / `field is not null` into the literal
/// `true`/`false` the predicate evaluates to against `record` — computed
/// here in Rust rather than deferred to `evalexpr`, so an absent field
/// (not in `record` at all) is treated exactly like one present with an
/// explicit [`FieldValue::Null`] (design §4.3, testable property #6).
fn rewrite_is_null(expr: &str, record: &SourceRecord) -> String {
    is_null_pattern()
        .replace_all(expr, |caps: &regex::Captures<'_>| {
            let field = &caps[1];
            let is_null = record.get(field).map_or(true, FieldValue::is_null);
            let holds = if caps.get(2).is_some() { !is_null } else { is_null };
            holds.to_string()
        })
        .into_owned()
}

fn field_value_to_eval(value: &FieldValue) -> EvalValue {
    match value {
        FieldValue::Null => EvalValue::Empty,
        FieldValue::Bool(b) => EvalValue::Boolean(*b),
        FieldValue::Int(i) => EvalValue::Int(*i),
        FieldValue::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(EvalValue::Float)
            .unwrap_or(EvalValue::Empty),
        FieldValue::Str(s) => EvalValue::String(s.clone()),
        FieldValue::Timestamp(ts) => EvalValue::String(ts.to_rfc3339()),
    }
}

/// Builds an `evalexpr` context containing every field of `record` that is
/// actually present (including explicitly null ones). Fields absent from
/// `record` are not variables here at all — `rewrite_is_null` resolves any
/// `is null`/`is not null` predicate over them before the expression ever
/// reaches this context, so their absence only matters if the expression
/// also references them outside an `is null` check.
///
/// # Errors
///
/// Returns an error only if `evalexpr` itself rejects a variable name,
/// which does not happen for the identifiers this engine generates.
pub fn build_context(record: &SourceRecord) -> Result<HashMapContext, EvalexprError> {
    let mut context = HashMapContext::new();
    for (name, value) in record {
        context.set_value(name.clone(), field_value_to_eval(value))?;
    }
    Ok(context)
}

/// Evaluates a boolean expression against a source record, treating
/// absent fields identically to fields explicitly present with a null
/// value (design §4.3, testable property #6).
///
/// # Errors
///
/// Returns a message describing the parse or evaluation failure —
/// callers wrap this as [`ingestor_core::IngestError::Transformation`]
/// or `::Validation` depending on which rule family invoked it.
pub fn evaluate_bool(expr: &str, record: &SourceRecord) -> Result<bool, String> {
    let rewritten = rewrite_is_null(expr, record);
    let context = build_context(record).map_err(|e| e.to_string())?;
    evalexpr::eval_boolean_with_context(&rewritten, &context).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record_with(pairs: &[(&str, FieldValue)]) -> SourceRecord {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[rstest]
    fn is_null_true_for_absent_field() {
        let record = record_with(&[("ask_px_00", FieldValue::Int(10))]);
        assert!(evaluate_bool("bid_px_00 is null", &record).unwrap());
    }

    #[rstest]
    fn is_null_true_for_explicit_null() {
        let record = record_with(&[("bid_px_00", FieldValue::Null)]);
        assert!(evaluate_bool("bid_px_00 is null", &record).unwrap());
    }

    #[rstest]
    fn is_null_false_for_present_value() {
        let record = record_with(&[("bid_px_00", FieldValue::Int(5))]);
        assert!(!evaluate_bool("bid_px_00 is null", &record).unwrap());
    }

    #[rstest]
    fn tbbo_cross_check_passes_when_one_side_absent() {
        let record = record_with(&[("ask_px_00", FieldValue::Int(10))]);
        let expr = "bid_px_00 is null or ask_px_00 is null or bid_px_00 <= ask_px_00";
        assert!(evaluate_bool(expr, &record).unwrap());
    }

    #[rstest]
    fn comparison_uses_numeric_fields() {
        let record = record_with(&[
            ("bid_px_00", FieldValue::Int(12)),
            ("ask_px_00", FieldValue::Int(10)),
        ]);
        let expr = "bid_px_00 is null or ask_px_00 is null or bid_px_00 <= ask_px_00";
        assert!(!evaluate_bool(expr, &record).unwrap());
    }

    #[rstest]
    fn is_not_null_negates_correctly() {
        let record = record_with(&[("bid_px_00", FieldValue::Null)]);
        assert!(!evaluate_bool("bid_px_00 is not null", &record).unwrap());
    }
}
