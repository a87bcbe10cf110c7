//! Symbol notation and `stype` validation.
//!
//! The vendor accepts symbols in several notations. The source's validation
//! regex was too strict and rejected purely-numeric symbols (common in
//! option/future native notations); design §9 calls for accepting
//! alphanumerics plus the `.`, `_`, `-` separators.

use regex::Regex;
use std::sync::OnceLock;

/// The notation a symbol is expressed in, as accepted by the vendor
/// adapter (design §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolType {
    Continuous,
    Parent,
    Native,
}

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid regex"))
}

/// Validates that `symbol` uses only the accepted character set, regardless
/// of its declared `SymbolType`. Numeric-only symbols (e.g. native option
/// strikes) are valid.
///
/// # Errors
///
/// Returns an error describing the rejected character(s) if `symbol` is
/// empty or contains anything outside `[A-Za-z0-9._-]`.
pub fn validate_symbol(symbol: &str) -> Result<(), String> {
    if symbol.is_empty() {
        return Err("symbol must not be empty".to_string());
    }
    if !symbol_pattern().is_match(symbol) {
        return Err(format!(
            "symbol '{symbol}' contains characters outside the accepted set [A-Za-z0-9._-]"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ES.c.0", true)]
    #[case("NQZ4", true)]
    #[case("720", true)] // purely numeric native strike, previously rejected
    #[case("ES_FUT-1", true)]
    #[case("", false)]
    #[case("ES c 0", false)]
    #[case("ES/c/0", false)]
    fn validates_accepted_character_set(#[case] symbol: &str, #[case] expected_ok: bool) {
        assert_eq!(validate_symbol(symbol).is_ok(), expected_ok);
    }
}
