//! Canonical market-data record schemas (design §3).
//!
//! `ingestor-model` defines the five canonical schemas that flow through the
//! pipeline — OHLCV, Trades, TBBO, Statistics, and Definitions — along with
//! the identifiers and enums they share. Every canonical record carries
//! `ts_event` (UTC, timezone-aware) and `instrument_id`; financial
//! quantities are `rust_decimal::Decimal`, never a native float, so
//! precision is preserved end-to-end the way the design requires.
//!
//! Records are immutable value objects: the adapter constructs them, the
//! rule engine produces a new value rather than mutating the source, and
//! storage serializes them without further mutation (design §3,
//! "Ownership and lifecycle").

#![deny(unsafe_code)]
#![deny(nonstandard_style)]

pub mod definition;
pub mod enums;
pub mod identifiers;
pub mod ohlcv;
pub mod record;
pub mod statistics;
pub mod tbbo;
pub mod trade;

#[cfg(any(test, feature = "stubs"))]
pub mod stubs;

pub use definition::Definition;
pub use enums::{Granularity, InstrumentClass, StatType, TradeSide, UpdateAction};
pub use identifiers::InstrumentId;
pub use ohlcv::Ohlcv;
pub use record::{CanonicalRecord, Schema};
pub use statistics::Statistics;
pub use tbbo::Tbbo;
pub use trade::Trade;
