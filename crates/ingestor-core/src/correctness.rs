//! Functions for correctness checks, in the *design by contract* style.
//!
//! A condition is a predicate which must be true just prior to storage or
//! just after transformation, for correct behavior per the domain
//! invariants in design §3. Every check returns a `Result` carrying a
//! descriptive message on failure rather than panicking, so the validator
//! can attach the message to a rejected record's quarantine entry.

use rust_decimal::Decimal;

/// Checks that `value` is strictly positive (`> 0`).
///
/// # Errors
///
/// Returns an error if `value` is zero or negative.
pub fn check_positive(value: Decimal, param: &str) -> Result<(), String> {
    if value <= Decimal::ZERO {
        return Err(format!(
            "invalid value for '{param}', was not positive: {value}"
        ));
    }
    Ok(())
}

/// Checks that `value` is non-negative (`>= 0`).
///
/// # Errors
///
/// Returns an error if `value` is negative.
pub fn check_non_negative(value: Decimal, param: &str) -> Result<(), String> {
    if value < Decimal::ZERO {
        return Err(format!(
            "invalid value for '{param}', was negative: {value}"
        ));
    }
    Ok(())
}

/// Checks `lower <= value`.
///
/// # Errors
///
/// Returns an error if `value` is less than `lower`.
pub fn check_at_least(value: Decimal, lower: Decimal, param: &str) -> Result<(), String> {
    if value < lower {
        return Err(format!(
            "invalid value for '{param}': {value} is less than minimum {lower}"
        ));
    }
    Ok(())
}

/// Checks the string `s` is non-empty and not solely whitespace.
///
/// # Errors
///
/// Returns an error if `s` is empty or all whitespace.
pub fn check_nonempty_string<T: AsRef<str>>(s: T, param: &str) -> Result<(), String> {
    let s = s.as_ref();
    if s.trim().is_empty() {
        return Err(format!("invalid string for '{param}', was empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(1.0), true)]
    #[case(dec!(0.0), false)]
    #[case(dec!(-1.0), false)]
    fn positive_check(#[case] value: Decimal, #[case] expected_ok: bool) {
        assert_eq!(check_positive(value, "price").is_ok(), expected_ok);
    }

    #[rstest]
    #[case(dec!(0.0), true)]
    #[case(dec!(-0.01), false)]
    fn non_negative_check(#[case] value: Decimal, #[case] expected_ok: bool) {
        assert_eq!(check_non_negative(value, "volume").is_ok(), expected_ok);
    }

    #[rstest]
    #[case("   ", false)]
    #[case("", false)]
    #[case("ES.c.0", true)]
    fn nonempty_string_check(#[case] s: &str, #[case] expected_ok: bool) {
        assert_eq!(check_nonempty_string(s, "symbol").is_ok(), expected_ok);
    }
}
