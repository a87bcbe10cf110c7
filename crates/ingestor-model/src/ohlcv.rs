//! The OHLCV canonical schema (daily and intraday), design §3.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::Granularity;
use crate::identifiers::InstrumentId;

/// A single open/high/low/close/volume bar.
///
/// Natural key: `(instrument_id, ts_event, granularity)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    pub instrument_id: InstrumentId,
    pub ts_event: DateTime<Utc>,
    pub ts_recv: Option<DateTime<Utc>>,
    pub granularity: Granularity,
    pub open_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub close_price: Decimal,
    pub volume: Decimal,
}

impl Ohlcv {
    /// Checks the structural/business invariants from design §3:
    /// `low <= min(open, close) <= max(open, close) <= high`, all four
    /// prices strictly positive, and volume non-negative.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when an invariant does not hold.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (name, value) in [
            ("open_price", self.open_price),
            ("high_price", self.high_price),
            ("low_price", self.low_price),
            ("close_price", self.close_price),
        ] {
            ingestor_core::correctness::check_positive(value, name)?;
        }
        ingestor_core::correctness::check_non_negative(self.volume, "volume")?;

        let body_low = self.open_price.min(self.close_price);
        let body_high = self.open_price.max(self.close_price);
        if self.low_price > body_low {
            return Err(format!(
                "low_price {} exceeds min(open, close) {}",
                self.low_price, body_low
            ));
        }
        if body_high > self.high_price {
            return Err(format!(
                "max(open, close) {body_high} exceeds high_price {}",
                self.high_price
            ));
        }
        Ok(())
    }
}

impl Display for Ohlcv {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{:?},{},{},{},{},{}",
            self.instrument_id,
            self.granularity,
            self.open_price,
            self.high_price,
            self.low_price,
            self.close_price,
            self.volume
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs::ohlcv_stub;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    fn happy_path_invariants_hold() {
        let bar = ohlcv_stub();
        assert!(bar.check_invariants().is_ok());
    }

    #[rstest]
    fn high_below_low_is_rejected() {
        let mut bar = ohlcv_stub();
        bar.high_price = dec!(100);
        bar.low_price = dec!(150);
        assert!(bar.check_invariants().is_err());
    }

    #[rstest]
    fn zero_price_is_rejected() {
        let mut bar = ohlcv_stub();
        bar.open_price = dec!(0);
        assert!(bar.check_invariants().is_err());
    }

    #[rstest]
    fn negative_volume_is_rejected() {
        let mut bar = ohlcv_stub();
        bar.volume = dec!(-1);
        assert!(bar.check_invariants().is_err());
    }
}
