//! Two-stage validation of canonical market-data records (design §4.4).
//!
//! Stage A (structural) is performed by the adapter and rule engine
//! before a record ever reaches this crate; stage B (business rules) is
//! what [`validator::Validator`] enforces here, re-checking structural
//! invariants defensively and then applying the schema's declared
//! `validation_rules`.

#![deny(unsafe_code)]
#![deny(nonstandard_style)]

pub mod fields;
pub mod validator;

pub use validator::{RejectedRecord, Stage, ValidatedRecord, ValidationNote, Validator};
