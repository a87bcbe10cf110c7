//! The mapping-document grammar, design §4.3.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How a single target field is populated from a source record.
///
/// The shorthand form (a bare string) is the common case — a direct
/// rename from one source field name to the target field name. The
/// detailed form covers literals and computed expressions.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldMapping {
    /// `target_field: source_field_name`
    SourceField(String),
    /// `target_field: { literal: ... }` or `{ expression: "..." }`
    Detailed {
        #[serde(default)]
        source_field: Option<String>,
        #[serde(default)]
        literal: Option<serde_yaml::Value>,
        #[serde(default)]
        expression: Option<String>,
    },
}

/// The target representation a mapped value must be coerced to, design
/// §4.3's `type_conversions` section.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Decimal,
    Int,
    UtcDatetime,
    Symbol,
    Str,
    Bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeConversion {
    pub to: TargetType,
    /// Decimal scaling, applied as `value * 10^(-precision)` when the
    /// source unit differs from the canonical unit (e.g. vendor ticks to
    /// dollars).
    #[serde(default)]
    pub precision: Option<i32>,
    /// Timezone assumed for a naive source timestamp before it is
    /// coerced to UTC. Absent means "assume UTC and warn" per design §4.3.
    #[serde(default)]
    pub tz_default: Option<String>,
}

/// `{ when: expression, then: partial field_mappings }` — evaluated in
/// declaration order, first match wins in addition to the base mappings
/// (design §4.3).
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionalMapping {
    pub when: String,
    pub then: IndexMap<String, FieldMapping>,
}

/// A field- or record-level boolean rule consumed by the validator
/// (design §4.4), carried here because it is declared alongside the
/// mapping it applies to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationRuleSpec {
    pub name: String,
    pub expression: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
}

fn default_severity() -> Severity {
    Severity::Error
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// The complete per-schema mapping document, design §4.3.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingDocument {
    pub source_model: String,
    pub target_schema: String,
    pub field_mappings: IndexMap<String, FieldMapping>,
    #[serde(default)]
    pub type_conversions: IndexMap<String, TypeConversion>,
    #[serde(default)]
    pub conditional_mappings: Vec<ConditionalMapping>,
    #[serde(default)]
    pub defaults: IndexMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRuleSpec>,
}

impl MappingDocument {
    /// Parses and structurally validates a mapping document: unknown
    /// top-level keys are already rejected by serde's strict deny, this
    /// additionally checks for dangling rule references — a
    /// `conditional_mappings` entry targeting a field with no base
    /// mapping and no default is permitted (conditionals may introduce
    /// new fields), but an empty `field_mappings` section is not.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason describing the first structural
    /// problem found.
    pub fn parse(yaml: &str) -> Result<Self, String> {
        let doc: MappingDocument =
            serde_yaml::from_str(yaml).map_err(|e| format!("mapping document: {e}"))?;
        doc.validate_structure()?;
        Ok(doc)
    }

    fn validate_structure(&self) -> Result<(), String> {
        if self.field_mappings.is_empty() {
            return Err(format!(
                "mapping for source_model {:?} has no field_mappings",
                self.source_model
            ));
        }
        for conditional in &self.conditional_mappings {
            if conditional.then.is_empty() {
                return Err(format!(
                    "conditional_mapping {:?} has an empty then-clause",
                    conditional.when
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: &str = r#"
source_model: tbbo_raw
target_schema: tbbo
field_mappings:
  instrument_id: instrument_id
  price: trade_price
  size: trade_size
  bid_px_00:
    source_field: bid_px_00
type_conversions:
  price:
    to: decimal
    precision: 9
conditional_mappings:
  - when: "side_code is null"
    then:
      side:
        literal: "N"
defaults:
  sequence: 0
validation_rules:
  - name: tbbo_not_crossed
    expression: "bid_px_00 is null or ask_px_00 is null or bid_px_00 <= ask_px_00"
    severity: error
"#;

    #[rstest]
    fn parses_well_formed_document() {
        let doc = MappingDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.source_model, "tbbo_raw");
        assert_eq!(doc.field_mappings.len(), 4);
        assert_eq!(doc.conditional_mappings.len(), 1);
        assert_eq!(doc.validation_rules.len(), 1);
    }

    #[rstest]
    fn rejects_unknown_top_level_key() {
        let bad = format!("{SAMPLE}\nbogus_section: true\n");
        assert!(MappingDocument::parse(&bad).is_err());
    }

    #[rstest]
    fn rejects_empty_field_mappings() {
        let bad = r#"
source_model: x
target_schema: trades
field_mappings: {}
"#;
        assert!(MappingDocument::parse(bad).is_err());
    }
}
