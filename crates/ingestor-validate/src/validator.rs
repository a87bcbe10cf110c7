//! Stage B business-rule validation (design §4.4).
//!
//! Stage A (structural) is already accomplished by the typed-record
//! instantiation inside the adapter and the rule engine's `instantiate`
//! step — by the time a [`CanonicalRecord`] reaches this validator it is
//! already well-typed. This module re-runs each record's own
//! `check_invariants` as a cheap re-assertion (a batch may have been
//! built from records produced by more than one rule engine instance) and
//! then applies the schema's declared `validation_rules` in order.

use std::collections::HashMap;

use ingestor_model::{CanonicalRecord, Schema};
use ingestor_rules::mapping::{Severity, ValidationRuleSpec};
use serde::Serialize;

use crate::fields::canonical_to_fields;

/// The stage at which a record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Structural,
    BusinessRule,
}

/// A business-rule violation accepted at `warning` or `info` severity,
/// attached to the record's metadata rather than rejecting it (design
/// §4.4).
#[derive(Debug, Clone, Serialize)]
pub struct ValidationNote {
    pub rule: String,
    pub severity: Severity,
    pub reason: String,
}

/// A record that passed validation, carrying any non-fatal notes
/// accumulated along the way.
#[derive(Debug, Clone)]
pub struct ValidatedRecord {
    pub record: CanonicalRecord,
    pub notes: Vec<ValidationNote>,
}

/// A record rejected at either validation stage, with enough context for
/// the quarantine sink to reproduce the failure (design §4.7).
#[derive(Debug, Clone)]
pub struct RejectedRecord {
    pub record: CanonicalRecord,
    pub stage: Stage,
    pub rule: String,
    pub reason: String,
}

/// Applies the business-rule set declared for each schema to canonical
/// batches.
///
/// One `Validator` instance typically holds rule sets for every schema a
/// job family ingests, loaded from the same mapping documents the rule
/// engine parses (design §4.3's `validation_rules` section).
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rule_sets: HashMap<Schema, Vec<ValidationRuleSpec>>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the rule set for `schema`.
    pub fn with_rules(mut self, schema: Schema, rules: Vec<ValidationRuleSpec>) -> Self {
        self.rule_sets.insert(schema, rules);
        self
    }

    /// Validates `batch`, splitting it into records that may proceed to
    /// storage and records that must be quarantined.
    ///
    /// Per record: structural invariants are checked first; then each
    /// rule in the schema's rule set is evaluated in declaration order.
    /// The first `error`-severity violation rejects the record;
    /// `warning`/`info` violations are accumulated onto the accepted
    /// record instead.
    #[must_use]
    pub fn validate(
        &self,
        batch: Vec<CanonicalRecord>,
        schema: Schema,
    ) -> (Vec<ValidatedRecord>, Vec<RejectedRecord>) {
        let empty = Vec::new();
        let rules = self.rule_sets.get(&schema).unwrap_or(&empty);

        let mut valid = Vec::new();
        let mut rejected = Vec::new();

        for record in batch {
            if let Err(reason) = record.check_invariants() {
                rejected.push(RejectedRecord {
                    record,
                    stage: Stage::Structural,
                    rule: "check_invariants".to_string(),
                    reason,
                });
                continue;
            }

            match self.apply_business_rules(&record, rules) {
                Ok(notes) => valid.push(ValidatedRecord { record, notes }),
                Err((rule, reason)) => rejected.push(RejectedRecord {
                    record,
                    stage: Stage::BusinessRule,
                    rule,
                    reason,
                }),
            }
        }

        (valid, rejected)
    }

    fn apply_business_rules(
        &self,
        record: &CanonicalRecord,
        rules: &[ValidationRuleSpec],
    ) -> Result<Vec<ValidationNote>, (String, String)> {
        if rules.is_empty() {
            return Ok(Vec::new());
        }
        let fields = canonical_to_fields(record);
        let mut notes = Vec::new();

        for rule in rules {
            let holds = ingestor_rules::expr::evaluate_bool(&rule.expression, &fields)
                .map_err(|e| (rule.name.clone(), e))?;
            if holds {
                continue;
            }
            let reason = format!("rule {:?} evaluated false: {}", rule.name, rule.expression);
            match rule.severity {
                Severity::Error => return Err((rule.name.clone(), reason)),
                Severity::Warning | Severity::Info => notes.push(ValidationNote {
                    rule: rule.name.clone(),
                    severity: rule.severity,
                    reason,
                }),
            }
        }
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestor_model::stubs::{ohlcv_stub, tbbo_stub};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn tbbo_not_crossed_rule() -> ValidationRuleSpec {
        ValidationRuleSpec {
            name: "tbbo_not_crossed".to_string(),
            expression: "bid_px_00 is null or ask_px_00 is null or bid_px_00 <= ask_px_00"
                .to_string(),
            severity: Severity::Error,
        }
    }

    #[rstest]
    fn structural_failure_is_rejected_before_business_rules_run() {
        let validator = Validator::new();
        let mut bar = ohlcv_stub();
        bar.high_price = dec!(1);
        bar.low_price = dec!(100);
        let (valid, rejected) = validator.validate(vec![CanonicalRecord::Ohlcv(bar)], Schema::Ohlcv);
        assert!(valid.is_empty());
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].stage, Stage::Structural);
    }

    #[rstest]
    fn crossed_quote_fails_business_rule_after_passing_structural() {
        let validator = Validator::new().with_rules(Schema::Tbbo, vec![tbbo_not_crossed_rule()]);
        let mut quote = tbbo_stub();
        quote.bid_px_00 = Some(dec!(100));
        quote.ask_px_00 = Some(dec!(90));
        let (valid, rejected) = validator.validate(vec![CanonicalRecord::Tbbo(quote)], Schema::Tbbo);
        assert!(valid.is_empty());
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].stage, Stage::BusinessRule);
        assert_eq!(rejected[0].rule, "tbbo_not_crossed");
    }

    #[rstest]
    fn one_sided_quote_passes_the_is_null_guard() {
        let validator = Validator::new().with_rules(Schema::Tbbo, vec![tbbo_not_crossed_rule()]);
        let mut quote = tbbo_stub();
        quote.bid_px_00 = None;
        let (valid, rejected) = validator.validate(vec![CanonicalRecord::Tbbo(quote)], Schema::Tbbo);
        assert_eq!(valid.len(), 1);
        assert!(rejected.is_empty());
        assert!(valid[0].notes.is_empty());
    }

    #[rstest]
    fn warning_severity_accepts_but_annotates() {
        let warn_rule = ValidationRuleSpec {
            name: "unusually_wide_spread".to_string(),
            expression: "ask_px_00 is null or bid_px_00 is null or (ask_px_00 - bid_px_00) <= 1"
                .to_string(),
            severity: Severity::Warning,
        };
        let validator = Validator::new().with_rules(Schema::Tbbo, vec![warn_rule]);
        let mut quote = tbbo_stub();
        quote.bid_px_00 = Some(dec!(100));
        quote.ask_px_00 = Some(dec!(110));
        let (valid, rejected) = validator.validate(vec![CanonicalRecord::Tbbo(quote)], Schema::Tbbo);
        assert!(rejected.is_empty());
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].notes.len(), 1);
        assert_eq!(valid[0].notes[0].severity, Severity::Warning);
    }

    #[rstest]
    fn empty_batch_yields_empty_output() {
        let validator = Validator::new();
        let (valid, rejected) = validator.validate(Vec::new(), Schema::Ohlcv);
        assert!(valid.is_empty());
        assert!(rejected.is_empty());
    }
}
