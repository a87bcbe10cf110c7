//! Builder functions for canonical records, for reuse across this crate's
//! and downstream crates' test suites (enabled via the `stubs` feature).

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;

use crate::definition::Definition;
use crate::enums::{Granularity, InstrumentClass, StatType, TradeSide, UpdateAction};
use crate::identifiers::InstrumentId;
use crate::ohlcv::Ohlcv;
use crate::statistics::Statistics;
use crate::tbbo::Tbbo;
use crate::trade::Trade;

/// A well-formed daily OHLCV bar for instrument 1.
#[must_use]
pub fn ohlcv_stub() -> Ohlcv {
    Ohlcv {
        instrument_id: InstrumentId(1),
        ts_event: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        ts_recv: None,
        granularity: Granularity::Day,
        open_price: dec!(100.00),
        high_price: dec!(105.00),
        low_price: dec!(99.50),
        close_price: dec!(103.25),
        volume: dec!(15000),
    }
}

/// A well-formed trade tick for instrument 1.
#[must_use]
pub fn trade_stub() -> Trade {
    Trade {
        instrument_id: InstrumentId(1),
        ts_event: Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap(),
        ts_recv: None,
        price: dec!(103.10),
        size: dec!(5),
        side: TradeSide::Bid,
        sequence: 1,
    }
}

/// A well-formed TBBO record for instrument 1, with both sides of the
/// quote present.
#[must_use]
pub fn tbbo_stub() -> Tbbo {
    Tbbo {
        instrument_id: InstrumentId(1),
        ts_event: Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap(),
        ts_recv: None,
        price: dec!(103.10),
        size: dec!(5),
        side: TradeSide::Bid,
        sequence: 1,
        bid_px_00: Some(dec!(103.05)),
        ask_px_00: Some(dec!(103.15)),
        bid_sz_00: Some(dec!(10)),
        ask_sz_00: Some(dec!(8)),
    }
}

/// A well-formed settlement-price statistic for instrument 1.
#[must_use]
pub fn statistics_stub() -> Statistics {
    Statistics {
        instrument_id: InstrumentId(1),
        ts_event: Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap(),
        ts_recv: None,
        stat_type: StatType::SettlementPrice,
        update_action: UpdateAction::Add,
        price: Some(dec!(103.25)),
        quantity: None,
    }
}

/// A well-formed, non-spread instrument definition for instrument 1.
#[must_use]
pub fn definition_stub() -> Definition {
    Definition {
        instrument_id: InstrumentId(1),
        raw_symbol: "ESH4".to_string(),
        instrument_class: InstrumentClass::Future,
        exchange: "XCME".to_string(),
        asset: "ES".to_string(),
        activation: Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(),
        expiration: Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
        min_price_increment: dec!(0.25),
        contract_multiplier: dec!(50),
        strike_price: None,
        leg_count: 0,
        leg_instrument_ids: Vec::new(),
        leg_ratios: Vec::new(),
    }
}
