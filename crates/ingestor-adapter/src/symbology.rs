//! Symbol notation handling and the definitions-schema vendor quirk.
//!
//! The vendor's `definitions` schema has no per-symbol range endpoint — it
//! only supports a fetch-all-then-filter query against `ALL_SYMBOLS`
//! (design §9, carried over from the adapter's upstream behaviour rather
//! than invented here). Every other schema supports the normal
//! symbols-plus-`stype_in` request shape.

use ingestor_core::symbols::{validate_symbol, SymbolType};
use ingestor_core::IngestError;
use ingestor_model::Schema;

/// The vendor's special "fetch every instrument, filter client-side"
/// sentinel, used only for the `definitions` schema.
pub const ALL_SYMBOLS: &str = "ALL_SYMBOLS";

/// Validates every symbol in a job's symbol list and returns the
/// `stype_in` string the vendor's query API expects.
///
/// # Errors
///
/// Returns [`IngestError::SymbolResolution`] naming every symbol that
/// failed character-set validation.
pub fn validate_symbols(symbols: &[String]) -> Result<(), IngestError> {
    let invalid: Vec<String> = symbols
        .iter()
        .filter(|s| validate_symbol(s).is_err())
        .cloned()
        .collect();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(IngestError::SymbolResolution(invalid))
    }
}

#[must_use]
pub fn stype_in_code(symbol_type: SymbolType) -> &'static str {
    match symbol_type {
        SymbolType::Continuous => "continuous",
        SymbolType::Parent => "parent",
        SymbolType::Native => "native",
    }
}

/// Resolves what symbols and `stype_in` value to send to the vendor for a
/// given schema, applying the `definitions` fetch-all quirk.
///
/// For every schema but `definitions` this passes the job's own symbols
/// and type straight through. For `definitions`, the vendor only supports
/// querying the entire dataset's instrument catalog and filtering the
/// response locally, so the request is widened to [`ALL_SYMBOLS`] and the
/// caller is responsible for filtering the decoded result back down to
/// the job's requested symbols (see [`crate::decode::filter_definitions`]).
#[must_use]
pub fn request_symbols_for_schema<'a>(
    schema: Schema,
    symbols: &'a [String],
    symbol_type: SymbolType,
) -> (Vec<String>, &'static str) {
    if schema == Schema::Definitions {
        (vec![ALL_SYMBOLS.to_string()], "parent")
    } else {
        (symbols.to_vec(), stype_in_code(symbol_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn validate_symbols_collects_every_rejected_symbol() {
        let symbols = vec!["ES.c.0".to_string(), "bad symbol".to_string(), "also/bad".to_string()];
        let err = validate_symbols(&symbols).unwrap_err();
        match err {
            IngestError::SymbolResolution(bad) => assert_eq!(bad.len(), 2),
            other => panic!("expected SymbolResolution, got {other:?}"),
        }
    }

    #[rstest]
    fn definitions_schema_widens_to_all_symbols() {
        let symbols = vec!["ES.c.0".to_string()];
        let (req_symbols, stype) =
            request_symbols_for_schema(Schema::Definitions, &symbols, SymbolType::Continuous);
        assert_eq!(req_symbols, vec![ALL_SYMBOLS.to_string()]);
        assert_eq!(stype, "parent");
    }

    #[rstest]
    fn other_schemas_pass_symbols_through_unchanged() {
        let symbols = vec!["ES.c.0".to_string(), "NQ.c.0".to_string()];
        let (req_symbols, stype) =
            request_symbols_for_schema(Schema::Ohlcv, &symbols, SymbolType::Continuous);
        assert_eq!(req_symbols, symbols);
        assert_eq!(stype, "continuous");
    }
}
