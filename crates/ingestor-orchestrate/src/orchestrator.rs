//! The pipeline orchestrator (C7, design §4.1): drives one job's
//! extraction → transformation → validation → storage, chunk by chunk,
//! with retries, quarantine, progress tracking, and cooperative
//! cancellation.
//!
//! A single driving loop owns a handful of collaborators and pulls work
//! through them in order — one finite, job-scoped run rather than a
//! long-lived event loop.

use std::sync::Arc;

use chrono::Utc;
use ingestor_adapter::{FetchParams, HistoricalAdapter, VendorClient};
use ingestor_core::retry::{retry_with, RetryPolicy};
use ingestor_core::time::{chunk_date_range, chunk_identifier, symbol_group_hash, DateChunk};
use ingestor_core::{IngestError, ShutdownSignal};
use ingestor_model::CanonicalRecord;
use ingestor_rules::{RuleEngine, SourceRecord};
use ingestor_storage::{
    ChunkStats, ProgressStatus, ProgressTracker, QuarantineSink, StorageLoader,
};
use ingestor_validate::{RejectedRecord, Stage, Validator};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::{JobConfig, SystemConfig};
use crate::stats::PipelineStats;

/// One check performed by [`PipelineOrchestrator::status`].
#[derive(Debug, Clone)]
pub struct StatusCheck {
    pub name: &'static str,
    pub healthy: bool,
    pub detail: String,
}

/// The environment/dependency probe §4.1's `status()` operation returns.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub checks: Vec<StatusCheck>,
}

impl StatusReport {
    #[must_use]
    pub fn healthy(&self) -> bool {
        self.checks.iter().all(|c| c.healthy)
    }
}

/// Drives one job end to end.
///
/// One instance is constructed per job run — it owns the job's vendor
/// session, rule engine, validator, and quarantine sink for the lifetime
/// of that run (design §5, "Adapter session: job-scoped").
///
/// Because [`HistoricalAdapter::fetch`] streams an entire requested date
/// range as one continuous sequence, this orchestrator computes the same
/// chunk boundaries itself via [`chunk_date_range`] and calls `fetch`
/// once per chunk (pinning `chunk_days` to `None` for that call) so each
/// fetch corresponds to exactly one progress-tracked unit, per §4.1's
/// per-chunk skip/retry/fail algorithm.
pub struct PipelineOrchestrator<C: VendorClient + 'static> {
    job_name: String,
    job: JobConfig,
    system: SystemConfig,
    retry_policy: RetryPolicy,
    adapter: HistoricalAdapter<C>,
    engine: RuleEngine,
    validator: Validator,
    loader: StorageLoader,
    progress: ProgressTracker,
    quarantine: Option<QuarantineSink>,
    pool: PgPool,
    shutdown: ShutdownSignal,
}

impl<C: VendorClient + 'static> PipelineOrchestrator<C> {
    /// Builds an orchestrator for one job run: loads the job's mapping
    /// document, opens the storage loader (running its schema-column
    /// self-check), ensures the progress table exists, and opens the
    /// quarantine sink if the job requests one.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Configuration`] if the mapping document
    /// cannot be read or parsed, if it targets a different schema than
    /// the job declares, or if the storage self-check fails. Returns
    /// [`IngestError::StorageTransient`] if the progress table cannot be
    /// created.
    pub async fn new(
        client: Arc<C>,
        job_name: String,
        job: JobConfig,
        retry_policy: RetryPolicy,
        system: SystemConfig,
        pool: PgPool,
        shutdown: ShutdownSignal,
    ) -> Result<Self, IngestError> {
        let mapping_yaml = std::fs::read_to_string(&job.mapping_path).map_err(|e| {
            IngestError::Configuration(format!(
                "reading mapping file {}: {e}",
                job.mapping_path.display()
            ))
        })?;
        let engine = RuleEngine::load(&mapping_yaml)?;
        if engine.target_schema() != job.schema {
            return Err(IngestError::Configuration(format!(
                "mapping file {} targets schema {}, job declares {}",
                job.mapping_path.display(),
                engine.target_schema(),
                job.schema
            )));
        }
        let validator = Validator::new().with_rules(job.schema, engine.validation_rules().to_vec());

        let loader = StorageLoader::open(pool.clone(), system.max_rows_per_statement)?;
        let progress = ProgressTracker::new(pool.clone());
        progress.ensure_schema().await?;

        let quarantine = if job.quarantine_enabled {
            Some(QuarantineSink::open(&system.quarantine_root, &job_name, Utc::now()).await?)
        } else {
            None
        };

        let adapter = HistoricalAdapter::new(client, retry_policy);

        Ok(Self {
            job_name,
            job,
            system,
            retry_policy,
            adapter,
            engine,
            validator,
            loader,
            progress,
            quarantine,
            pool,
            shutdown,
        })
    }

    /// The run's quarantine directory, if quarantine is enabled for this
    /// job — always printed to the user per design §7.
    #[must_use]
    pub fn quarantine_dir(&self) -> Option<&std::path::Path> {
        self.quarantine.as_ref().map(QuarantineSink::run_dir)
    }

    /// Validates the job's symbols and opens (then closes) the vendor
    /// session, performing no fetch, transform, or storage work (design
    /// §6's `--dry-run`).
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::SymbolResolution`] if any symbol fails
    /// character-set validation, or the vendor session's own connect
    /// error otherwise.
    pub async fn dry_run(&self) -> Result<(), IngestError> {
        HistoricalAdapter::<C>::validate_job_symbols(
            &self.fetch_params(self.job.start_date, self.job.end_date),
        )?;
        self.adapter.connect().await?;
        self.adapter.disconnect().await;
        Ok(())
    }

    /// Drives the job end to end: validates symbols, connects the vendor
    /// session, walks the job's date range chunk by chunk, and returns
    /// the accumulated [`PipelineStats`] (design §4.1's algorithm).
    ///
    /// # Errors
    ///
    /// Returns a fatal, job-level [`IngestError`] (symbol validation,
    /// vendor auth, or configuration) that aborts before any chunk is
    /// attempted. Chunk- and record-level failures are handled
    /// internally and reflected in the returned stats instead.
    pub async fn execute_ingestion(&self) -> Result<PipelineStats, IngestError> {
        let mut stats = PipelineStats::new();
        stats.started_at = Some(Utc::now());

        HistoricalAdapter::<C>::validate_job_symbols(
            &self.fetch_params(self.job.start_date, self.job.end_date),
        )?;
        self.adapter.connect().await?;

        let chunk_days = self.job.chunk_days.or(self.system.default_chunk_days);
        let chunks = chunk_date_range(self.job.start_date, self.job.end_date, chunk_days)
            .map_err(IngestError::Configuration)?;
        let group_hash = symbol_group_hash(&self.job.symbols);

        for chunk in chunks {
            if self.shutdown.is_requested() {
                info!(job = %self.job_name, "shutdown requested, stopping before next chunk");
                break;
            }

            let chunk_id = chunk_identifier(self.job.schema.table_name(), group_hash, &chunk);
            let (status, mut guard) = self.progress.begin(&self.job_name, &chunk_id).await?;
            if status == ProgressStatus::Done {
                stats.chunks_done += 1;
                guard.release().await?;
                continue;
            }

            match self.run_chunk(&chunk, &mut stats).await {
                Ok(records_processed) => {
                    self.progress
                        .finish(
                            &mut guard,
                            &self.job_name,
                            &chunk_id,
                            ChunkStats { records_processed },
                        )
                        .await?;
                    guard.release().await?;
                    stats.chunks_done += 1;
                }
                Err(e) => {
                    warn!(job = %self.job_name, chunk_id, error = %e, "chunk failed");
                    self.progress.fail(&self.job_name, &chunk_id, &e.to_string()).await?;
                    guard.release().await?;
                    stats.chunks_failed += 1;
                    stats.record_error(error_kind(&e));
                    if self.job.fail_fast {
                        break;
                    }
                }
            }
        }

        self.adapter.disconnect().await;
        stats.finished_at = Some(Utc::now());
        Ok(stats)
    }

    /// An environment/dependency probe: DB reachable, vendor credentials
    /// present, quarantine root writable, schema-column self-check
    /// passes (SPEC_FULL §2).
    pub async fn status(&self) -> StatusReport {
        let mut checks = Vec::new();

        checks.push(match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => StatusCheck {
                name: "database",
                healthy: true,
                detail: "reachable".to_string(),
            },
            Err(e) => StatusCheck {
                name: "database",
                healthy: false,
                detail: e.to_string(),
            },
        });

        let api_key_var = format!("{}_API_KEY", self.job.api.to_uppercase());
        let has_credentials = std::env::var(&api_key_var).is_ok();
        checks.push(StatusCheck {
            name: "vendor_credentials",
            healthy: has_credentials,
            detail: if has_credentials {
                format!("{api_key_var} is set")
            } else {
                format!("{api_key_var} is not set")
            },
        });

        let quarantine_writable = tokio::fs::create_dir_all(&self.system.quarantine_root)
            .await
            .is_ok();
        checks.push(StatusCheck {
            name: "quarantine_root",
            healthy: quarantine_writable,
            detail: self.system.quarantine_root.display().to_string(),
        });

        checks.push(match ingestor_storage::schema_map::self_check() {
            Ok(()) => StatusCheck {
                name: "schema_column_map",
                healthy: true,
                detail: "consistent".to_string(),
            },
            Err(e) => StatusCheck {
                name: "schema_column_map",
                healthy: false,
                detail: e.to_string(),
            },
        });

        StatusReport { checks }
    }

    fn fetch_params(&self, start: chrono::NaiveDate, end: chrono::NaiveDate) -> FetchParams {
        FetchParams {
            dataset: self.job.dataset.clone(),
            schema: self.job.schema,
            symbols: self.job.symbols.clone(),
            symbol_type: self.job.symbol_type,
            start,
            end,
            chunk_days: None,
        }
    }

    /// Consumes one chunk's record stream, buffering into batches of
    /// exactly `N` and flushing the partial remainder at chunk end
    /// (design §4.1, step 4). Returns the number of records processed.
    async fn run_chunk(
        &self,
        chunk: &DateChunk,
        stats: &mut PipelineStats,
    ) -> Result<u64, IngestError> {
        let batch_size = self
            .job
            .batch_size
            .unwrap_or(self.system.default_batch_size)
            .max(1);
        let mut rx = self.adapter.fetch(self.fetch_params(chunk.start, chunk.end));

        let mut buffer: Vec<SourceRecord> = Vec::with_capacity(batch_size);
        let mut records_processed = 0u64;

        while let Some(item) = rx.recv().await {
            match item {
                Ok(record) => {
                    stats.records_fetched += 1;
                    buffer.push(record);
                    if buffer.len() >= batch_size {
                        records_processed +=
                            self.process_batch(std::mem::take(&mut buffer), stats).await?;
                        if self.shutdown.is_requested() {
                            // The batch just committed is a safe
                            // boundary; honor cancellation here rather
                            // than starting another one (design §4.1).
                            return Ok(records_processed);
                        }
                    }
                }
                Err(e) if e.is_quarantine_worthy() => {
                    self.quarantine_raw_failure(&e, stats).await?;
                }
                Err(e) => return Err(e),
            }
        }

        if !buffer.is_empty() {
            records_processed += self.process_batch(buffer, stats).await?;
        }

        Ok(records_processed)
    }

    /// Applies the rule engine, then the validator, then the storage
    /// loader to one batch (design §4.1, step 5). Returns the number of
    /// records the batch contained.
    async fn process_batch(
        &self,
        records: Vec<SourceRecord>,
        stats: &mut PipelineStats,
    ) -> Result<u64, IngestError> {
        if records.is_empty() {
            return Ok(0);
        }
        let record_count = records.len() as u64;

        // The common path is always a single batched call — per the rule
        // engine's own contract, narrowing a batch to one-record calls
        // defeats its conditional-mapping evaluation order guarantee.
        // Only on failure do we fall back to a per-record pass, purely to
        // identify which record(s) to quarantine.
        let canonical = match self.engine.transform_batch(&records) {
            Ok(canonical) => canonical,
            Err(_) => self.transform_with_per_record_fallback(records, stats).await,
        };
        stats.records_transformed += canonical.len() as u64;

        let (valid, rejected) = self.validator.validate(canonical, self.job.schema);
        for rejection in &rejected {
            self.quarantine_rejected(rejection, stats).await?;
        }
        stats.records_validated += valid.len() as u64;

        let canonical_batch: Vec<CanonicalRecord> = valid.into_iter().map(|v| v.record).collect();
        let load_stats = retry_with(
            &self.retry_policy,
            || {
                let batch = &canonical_batch;
                async move { self.loader.load(batch, self.job.schema).await }
            },
            IngestError::is_retryable,
        )
        .await?;

        stats.records_stored += load_stats.rows_inserted;
        stats.records_skipped_as_duplicate += load_stats.rows_skipped_as_duplicate;

        Ok(record_count)
    }

    /// Recovery path for a batch that [`RuleEngine::transform_batch`]
    /// rejected outright: re-runs each record through
    /// [`RuleEngine::transform_record`] so the one (or few) bad records
    /// can be quarantined individually while the rest still reach
    /// storage.
    async fn transform_with_per_record_fallback(
        &self,
        records: Vec<SourceRecord>,
        stats: &mut PipelineStats,
    ) -> Vec<CanonicalRecord> {
        let mut canonical = Vec::with_capacity(records.len());
        for record in records {
            match self.engine.transform_record(&record) {
                Ok(value) => canonical.push(value),
                Err(e) => {
                    stats.records_quarantined += 1;
                    stats.record_error(error_kind(&e));
                    if let Some(sink) = &self.quarantine {
                        let (rule, reason) = match &e {
                            IngestError::Transformation { field, reason } => {
                                (field.clone(), reason.clone())
                            }
                            other => ("transformation".to_string(), other.to_string()),
                        };
                        let original =
                            serde_json::to_value(&record).unwrap_or(serde_json::Value::Null);
                        let entry = QuarantineSink::structural_entry(
                            self.job.schema,
                            &rule,
                            &reason,
                            original,
                        );
                        if let Err(write_err) = sink.write(&entry).await {
                            warn!(error = %write_err, "failed to write quarantine entry");
                        }
                    }
                }
            }
        }
        canonical
    }

    async fn quarantine_raw_failure(
        &self,
        err: &IngestError,
        stats: &mut PipelineStats,
    ) -> Result<(), IngestError> {
        stats.records_quarantined += 1;
        stats.record_error(error_kind(err));
        if let Some(sink) = &self.quarantine {
            let entry = QuarantineSink::structural_entry(
                self.job.schema,
                "vendor_schema_mismatch",
                &err.to_string(),
                serde_json::Value::Null,
            );
            sink.write(&entry).await?;
        }
        Ok(())
    }

    async fn quarantine_rejected(
        &self,
        rejection: &RejectedRecord,
        stats: &mut PipelineStats,
    ) -> Result<(), IngestError> {
        stats.records_quarantined += 1;
        stats.record_error(&rejection.rule);
        if let Some(sink) = &self.quarantine {
            let entry = match rejection.stage {
                Stage::Structural => QuarantineSink::structural_entry(
                    self.job.schema,
                    &rejection.rule,
                    &rejection.reason,
                    serde_json::to_value(&rejection.record).unwrap_or(serde_json::Value::Null),
                ),
                Stage::BusinessRule => QuarantineSink::business_rule_entry(
                    &rejection.record,
                    &rejection.rule,
                    &rejection.reason,
                ),
            };
            sink.write(&entry).await?;
        }
        Ok(())
    }
}

/// A stable, lowercase label per [`IngestError`] variant for
/// [`PipelineStats::record_error`]'s "top failure reasons" list.
fn error_kind(err: &IngestError) -> &'static str {
    match err {
        IngestError::Configuration(_) => "configuration",
        IngestError::Auth(_) => "auth",
        IngestError::TransientNetwork(_) => "transient_network",
        IngestError::RateLimited { .. } => "rate_limited",
        IngestError::VendorSchemaMismatch { .. } => "vendor_schema_mismatch",
        IngestError::Transformation { .. } => "transformation",
        IngestError::Validation { .. } => "validation",
        IngestError::StorageTransient(_) => "storage_transient",
        IngestError::StorageConstraint(_) => "storage_constraint",
        IngestError::SymbolResolution(_) => "symbol_resolution",
        IngestError::Other(_) => "other",
    }
}

/// Enumerates the jobs declared in a jobs file (design §4.1's
/// `list_jobs`).
#[must_use]
pub fn list_jobs(jobs: &crate::config::JobsFile) -> Vec<String> {
    jobs.jobs.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestor_core::time::DateChunk;
    use rstest::rstest;

    #[rstest]
    fn error_kind_covers_every_variant_used_in_stats() {
        let cases = [
            IngestError::Configuration("x".into()),
            IngestError::Auth("x".into()),
            IngestError::TransientNetwork("x".into()),
            IngestError::RateLimited { message: "x".into(), retry_after: None },
            IngestError::VendorSchemaMismatch { schema: "ohlcv".into(), reason: "x".into() },
            IngestError::Transformation { field: "x".into(), reason: "x".into() },
            IngestError::Validation { rule: "x".into(), reason: "x".into() },
            IngestError::StorageTransient("x".into()),
            IngestError::StorageConstraint("x".into()),
            IngestError::SymbolResolution(vec!["x".into()]),
        ];
        for case in cases {
            assert!(!error_kind(&case).is_empty());
        }
    }

    #[rstest]
    fn list_jobs_returns_every_declared_job_name() {
        use crate::config::{JobConfig, JobsFile};
        use ingestor_core::symbols::SymbolType;
        use ingestor_model::Schema;
        use indexmap::IndexMap;

        let job = JobConfig {
            api: "databento".to_string(),
            dataset: "GLBX.MDP3".to_string(),
            schema: Schema::Ohlcv,
            symbols: vec!["ES.c.0".to_string()],
            symbol_type: SymbolType::Continuous,
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            chunk_days: None,
            batch_size: None,
            retry_policy: None,
            fail_fast: false,
            quarantine_enabled: true,
            mapping_path: "mappings/ohlcv.yaml".into(),
        };
        let mut jobs = IndexMap::new();
        jobs.insert("ohlcv-es".to_string(), job);
        let file = JobsFile { retry_policy: None, jobs };

        assert_eq!(list_jobs(&file), vec!["ohlcv-es".to_string()]);
    }

    #[rstest]
    fn date_chunk_is_reexported_for_callers_computing_chunk_ids() {
        let chunk = DateChunk {
            start: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        };
        assert!(chunk.start <= chunk.end);
    }
}
