//! Durable, structured capture of rejected records (design §4.7).
//!
//! One append-only NDJSON file per `(job, run, schema)`, written with a
//! chunk-scoped file handle — opened once per run and held for the
//! duration of that run's writes, released when the [`QuarantineSink`]
//! is dropped (design §5, "quarantine file handle: chunk-scoped").

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use ingestor_core::IngestError;
use ingestor_model::{CanonicalRecord, Schema};
use serde::Serialize;
use serde_json::Value;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// One self-contained quarantine entry, design §3's quarantine store
/// layout.
#[derive(Debug, Clone, Serialize)]
pub struct QuarantineEntry {
    pub ts: DateTime<Utc>,
    pub schema: Schema,
    pub stage: String,
    pub rule_or_reason: String,
    pub severity: String,
    pub original: Value,
    pub transformed: Option<Value>,
    pub error: String,
}

/// Appends rejected records to `{root}/{job}/{run_ts}/{schema}.ndjson`.
///
/// One sink instance is constructed per job run; its file handles are
/// opened lazily per schema on first write and held open for the life of
/// the sink.
pub struct QuarantineSink {
    run_dir: PathBuf,
    handles: Mutex<HashMap<Schema, File>>,
}

impl QuarantineSink {
    /// Creates (but does not yet open any files under) the run directory
    /// `{root}/{job}/{run_ts}`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Configuration`] if the directory cannot be
    /// created (e.g. the root is not writable).
    pub async fn open(root: &Path, job: &str, run_ts: DateTime<Utc>) -> Result<Self, IngestError> {
        let run_dir = root.join(job).join(run_ts.format("%Y%m%dT%H%M%SZ").to_string());
        fs::create_dir_all(&run_dir)
            .await
            .map_err(|e| IngestError::Configuration(format!("quarantine root not writable: {e}")))?;
        Ok(Self {
            run_dir,
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// The directory this sink is writing into — always printed to the
    /// user per design §7's "quarantine directory path is always printed".
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Appends one entry to the schema's NDJSON file, opening it on first
    /// use.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::StorageTransient`] if the write fails.
    pub async fn write(&self, entry: &QuarantineEntry) -> Result<(), IngestError> {
        let line = serde_json::to_string(entry)
            .map_err(|e| IngestError::StorageTransient(format!("quarantine entry serialization: {e}")))?;

        let path = self.run_dir.join(format!("{}.ndjson", entry.schema.table_name()));
        let mut handles = self.handles.lock().expect("quarantine handle mutex poisoned");
        if !handles.contains_key(&entry.schema) {
            drop(handles);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| IngestError::StorageTransient(e.to_string()))?;
            handles = self.handles.lock().expect("quarantine handle mutex poisoned");
            handles.insert(entry.schema, file);
        }

        let file = handles.get_mut(&entry.schema).expect("just inserted above");
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| IngestError::StorageTransient(e.to_string()))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| IngestError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    /// Builds a [`QuarantineEntry`] from a structural rejection (no
    /// canonical record was ever successfully instantiated, so `original`
    /// is the best-effort partial value).
    #[must_use]
    pub fn structural_entry(
        schema: Schema,
        rule_or_reason: &str,
        error: &str,
        original: Value,
    ) -> QuarantineEntry {
        QuarantineEntry {
            ts: Utc::now(),
            schema,
            stage: "structural".to_string(),
            rule_or_reason: rule_or_reason.to_string(),
            severity: "error".to_string(),
            original,
            transformed: None,
            error: error.to_string(),
        }
    }

    /// Builds a [`QuarantineEntry`] from a business-rule rejection, where
    /// a canonical record was instantiated but failed its rule set.
    #[must_use]
    pub fn business_rule_entry(record: &CanonicalRecord, rule: &str, error: &str) -> QuarantineEntry {
        QuarantineEntry {
            ts: Utc::now(),
            schema: record.schema(),
            stage: "business_rule".to_string(),
            rule_or_reason: rule.to_string(),
            severity: "error".to_string(),
            original: serde_json::to_value(record).unwrap_or(Value::Null),
            transformed: None,
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[tokio::test]
    async fn writes_are_appended_to_a_run_and_schema_scoped_file() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = QuarantineSink::open(tmp.path(), "databento-ohlcv", Utc::now())
            .await
            .unwrap();

        let entry = QuarantineSink::structural_entry(
            Schema::Ohlcv,
            "high_ge_low",
            "high 100 < low 150",
            json!({"high_price": 100, "low_price": 150}),
        );
        sink.write(&entry).await.unwrap();
        sink.write(&entry).await.unwrap();

        let path = sink.run_dir().join("ohlcv.ndjson");
        let contents = tokio::fs::read_to_string(path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
