//! Declarative, YAML-driven vendor-to-canonical record transformer (design
//! §4.3).
//!
//! `ingestor-rules` owns three concerns: the mapping-document grammar
//! ([`mapping`]), the safe expression language used by conditional mappings
//! and validation rules ([`expr`]), and the engine that applies a loaded
//! document to vendor records ([`engine`]). The dynamically-typed
//! [`value::FieldValue`]/[`value::SourceRecord`] pair is the currency every
//! stage here operates on, before a record has been cast into its
//! statically-typed canonical shape.

#![deny(unsafe_code)]
#![deny(nonstandard_style)]

pub mod engine;
pub mod expr;
pub mod mapping;
pub mod value;

pub use engine::RuleEngine;
pub use mapping::{MappingDocument, Severity, ValidationRuleSpec};
pub use value::{FieldValue, SourceRecord};
