//! The thin command-line driver (design §6): parses arguments, loads
//! configuration, and wires the orchestrator and query builder to stdout.
//! Not part of the core design — the orchestrator's algorithm and the
//! query builder's statements are the contract; this crate only adapts
//! them to a terminal.

#![deny(unsafe_code)]
#![deny(nonstandard_style)]

pub mod logging;
pub mod opt;

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use ingestor_adapter::HttpVendorClient;
use ingestor_core::symbols::SymbolType;
use ingestor_core::{IngestError, ShutdownSignal};
use ingestor_model::enums::Granularity;
use ingestor_model::identifiers::Symbol;
use ingestor_model::Schema;
use ingestor_orchestrate::{
    list_jobs, JobConfig, JobsFile, PipelineOrchestrator, SystemConfig,
};
use ingestor_query::{OutputFormat, QueryBuilder, RangeQuery, SymbolResolver};
use ingestor_storage::connect_pg;

use crate::opt::{Commands, IngestOpt, IngestorCli, ListJobsOpt, QueryOpt, StatusOpt};

/// Process exit codes that don't come from an [`IngestError`] (design §6):
/// a malformed combination of CLI arguments, caught before any component
/// is constructed.
const EXIT_USAGE_ERROR: i32 = 2;

/// Environment-variable prefix for database connection overrides (design
/// §6's `<PREFIX>_HOST`, `_PORT`, `_DBNAME`, `_USER`, `_PASSWORD`).
const DB_ENV_PREFIX: &str = "INGESTOR_PG";

/// A query spanning more than this many days against a high-volume schema
/// prompts for confirmation unless `--force` is given (design §6).
const LARGE_QUERY_SPAN_DAYS: i64 = 7;

/// Runs the parsed CLI invocation to completion, returning the process
/// exit code (design §6's per-command table).
pub async fn run(cli: IngestorCli) -> anyhow::Result<i32> {
    let system = SystemConfig::load(cli.system_config.as_deref())?;

    match cli.command {
        Commands::Ingest(opt) => run_ingest(opt, system).await,
        Commands::Query(opt) => run_query(opt, system).await,
        Commands::ListJobs(opt) => run_list_jobs(opt),
        Commands::Status(opt) => run_status(opt, system).await,
    }
}

fn parse_schema(raw: &str) -> Result<Schema, IngestError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| IngestError::Configuration(format!("unknown schema {raw:?}")))
}

fn parse_symbol_type(raw: &str) -> Result<SymbolType, IngestError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| IngestError::Configuration(format!("unknown symbol type {raw:?}")))
}

fn start_of_day_utc(date: NaiveDate) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is a valid time"))
}

fn end_of_day_utc(date: NaiveDate) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 59).expect("23:59:59 is a valid time"))
}

fn resolve_vendor_credentials(api: &str) -> Result<(String, String), IngestError> {
    let api_upper = api.to_uppercase();
    let api_key = std::env::var(format!("{api_upper}_API_KEY"))
        .map_err(|_| IngestError::Auth(format!("{api_upper}_API_KEY is not set")))?;
    let base_url = std::env::var(format!("{api_upper}_BASE_URL")).map_err(|_| {
        IngestError::Configuration(format!("{api_upper}_BASE_URL is not set"))
    })?;
    Ok((api_key, base_url))
}

/// Resolves the job this `ingest` invocation should run: either the named
/// job from `--jobs-file`, or one assembled from the ad hoc flags.
///
/// # Errors
///
/// Returns [`IngestError::Configuration`] if neither a complete named job
/// nor a complete ad hoc job was supplied.
fn resolve_job(opt: &IngestOpt) -> Result<(JobConfig, ingestor_core::retry::RetryPolicy), IngestError> {
    if let Some(job_name) = &opt.job {
        let file = JobsFile::load(&opt.jobs_file)?;
        let job = file
            .jobs
            .get(job_name)
            .ok_or_else(|| IngestError::Configuration(format!("no job named {job_name:?} in {}", opt.jobs_file.display())))?
            .clone();
        let retry_policy = file.retry_policy_for(&job);
        return Ok((apply_overrides(job, opt), retry_policy));
    }

    let dataset = opt.dataset.clone().ok_or_else(|| {
        IngestError::Configuration("--dataset is required without --job".to_string())
    })?;
    let schema = opt
        .schema
        .as_deref()
        .ok_or_else(|| IngestError::Configuration("--schema is required without --job".to_string()))
        .and_then(parse_schema)?;
    if opt.symbols.is_empty() {
        return Err(IngestError::Configuration(
            "--symbols is required without --job".to_string(),
        ));
    }
    let start_date = opt
        .start_date
        .ok_or_else(|| IngestError::Configuration("--start-date is required without --job".to_string()))?;
    let end_date = opt
        .end_date
        .ok_or_else(|| IngestError::Configuration("--end-date is required without --job".to_string()))?;
    let mapping_path = opt.mapping_path.clone().ok_or_else(|| {
        IngestError::Configuration("--mapping-path is required without --job".to_string())
    })?;
    let symbol_type = opt
        .stype_in
        .as_deref()
        .map(parse_symbol_type)
        .transpose()?
        .unwrap_or(SymbolType::Continuous);

    let job = JobConfig {
        api: opt.api.clone(),
        dataset,
        schema,
        symbols: opt.symbols.clone(),
        symbol_type,
        start_date,
        end_date,
        chunk_days: opt.chunk_days,
        batch_size: opt.batch_size,
        retry_policy: None,
        fail_fast: false,
        quarantine_enabled: true,
        mapping_path,
    };
    Ok((apply_overrides(job, opt), ingestor_core::retry::RetryPolicy::default()))
}

/// CLI flags are the last stage of the defaults → file → environment →
/// CLI precedence order (design §9): they override whatever a named job
/// declared for chunking and batching.
fn apply_overrides(mut job: JobConfig, opt: &IngestOpt) -> JobConfig {
    if let Some(chunk_days) = opt.chunk_days {
        job.chunk_days = Some(chunk_days);
    }
    if let Some(batch_size) = opt.batch_size {
        job.batch_size = Some(batch_size);
    }
    job
}

async fn run_ingest(opt: IngestOpt, system: SystemConfig) -> anyhow::Result<i32> {
    logging::init(system.logging.format, opt.verbose);

    let (job, retry_policy) = match resolve_job(&opt) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("{e}");
            return Ok(EXIT_USAGE_ERROR);
        }
    };

    let (api_key, base_url) = match resolve_vendor_credentials(&opt.api) {
        Ok(creds) => creds,
        Err(e) => {
            eprintln!("{e}");
            return Ok(e.exit_code());
        }
    };

    let pool = connect_pg(&system.resolve_db_options(DB_ENV_PREFIX)).await?;
    let client = Arc::new(HttpVendorClient::new(base_url, api_key));
    let shutdown = ShutdownSignal::new();

    let orchestrator = PipelineOrchestrator::new(
        client,
        opt.job.clone().unwrap_or_else(|| "ad-hoc".to_string()),
        job,
        retry_policy,
        system,
        pool,
        shutdown.clone(),
    )
    .await?;

    if let Some(dir) = orchestrator.quarantine_dir() {
        println!("quarantine directory: {}", dir.display());
    }

    if opt.dry_run {
        orchestrator.dry_run().await?;
        println!("dry run: configuration and symbols are valid, vendor session connected");
        return Ok(0);
    }

    let shutdown_for_ctrlc = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested (ctrl-c)");
            shutdown_for_ctrlc.request();
        }
    });

    let stats = orchestrator.execute_ingestion().await?;
    print_stats(&stats);

    if stats.chunks_failed > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn print_stats(stats: &ingestor_orchestrate::PipelineStats) {
    println!(
        "fetched={} transformed={} validated={} stored={} skipped_as_duplicate={} quarantined={} chunks_done={} chunks_failed={}",
        stats.records_fetched,
        stats.records_transformed,
        stats.records_validated,
        stats.records_stored,
        stats.records_skipped_as_duplicate,
        stats.records_quarantined,
        stats.chunks_done,
        stats.chunks_failed,
    );
    let top = stats.top_failure_reasons(5);
    if !top.is_empty() {
        println!("top failure reasons:");
        for (reason, count) in top {
            println!("  {reason}: {count}");
        }
    }
}

fn is_large_query(schema: Schema, start: NaiveDate, end: NaiveDate) -> bool {
    let span_days = (end - start).num_days();
    let high_volume = matches!(schema, Schema::Trades | Schema::Tbbo | Schema::Statistics);
    high_volume && span_days > LARGE_QUERY_SPAN_DAYS
}

fn confirm_large_query() -> bool {
    eprint!("this query spans a large range over a high-volume schema, proceed? [y/N] ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

async fn run_query(opt: QueryOpt, system: SystemConfig) -> anyhow::Result<i32> {
    logging::init(system.logging.format, false);

    let schema = match opt.schema.as_deref().map(parse_schema).transpose() {
        Ok(schema) => schema.unwrap_or(Schema::Ohlcv),
        Err(e) => {
            eprintln!("{e}");
            return Ok(EXIT_USAGE_ERROR);
        }
    };
    let format: OutputFormat = match opt.output_format.parse() {
        Ok(format) => format,
        Err(e) => {
            eprintln!("{e}");
            return Ok(EXIT_USAGE_ERROR);
        }
    };

    if is_large_query(schema, opt.start_date, opt.end_date) && !opt.force && !confirm_large_query() {
        println!("query aborted");
        return Ok(0);
    }

    let pool = connect_pg(&system.resolve_db_options(DB_ENV_PREFIX)).await?;
    let resolver = SymbolResolver::new(pool.clone());
    let symbols: Vec<Symbol> = opt.symbols.iter().map(|s| Symbol::from(s.as_str())).collect();
    let resolved = match resolver.resolve_symbols(&symbols).await {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("{e}");
            return Ok(e.exit_code());
        }
    };
    let instrument_ids: Vec<_> = resolved.values().copied().collect();

    let query = RangeQuery {
        instrument_ids,
        start: start_of_day_utc(opt.start_date),
        end: end_of_day_utc(opt.end_date),
        limit: opt.limit,
    };
    let builder = QueryBuilder::new(pool);

    let mut out: Box<dyn std::io::Write> = match &opt.output_file {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    };

    let result = match schema {
        Schema::Ohlcv => builder
            .query_ohlcv(&query, Some(Granularity::Day))
            .await
            .and_then(|rows| ingestor_query::write_rows(&rows, format, &mut out)),
        Schema::Trades => builder
            .query_trades(&query)
            .await
            .and_then(|rows| ingestor_query::write_rows(&rows, format, &mut out)),
        Schema::Tbbo => builder
            .query_tbbo(&query)
            .await
            .and_then(|rows| ingestor_query::write_rows(&rows, format, &mut out)),
        Schema::Statistics => builder
            .query_statistics(&query)
            .await
            .and_then(|rows| ingestor_query::write_rows(&rows, format, &mut out)),
        Schema::Definitions => builder
            .query_definitions(&query)
            .await
            .and_then(|rows| ingestor_query::write_rows(&rows, format, &mut out)),
    };

    match result {
        Ok(()) => Ok(0),
        Err(e) => {
            eprintln!("{e}");
            Ok(e.exit_code())
        }
    }
}

fn run_list_jobs(opt: ListJobsOpt) -> anyhow::Result<i32> {
    match &opt.api {
        Some(api) => {
            let file = JobsFile::load(&opt.jobs_file)?;
            for job_name in list_jobs(&file) {
                println!("{api}: {job_name}");
            }
        }
        None => {
            let jobs_dir = Path::new("jobs");
            if !jobs_dir.is_dir() {
                println!("no jobs directory found; pass --api and --jobs-file explicitly");
                return Ok(0);
            }
            for entry in std::fs::read_dir(jobs_dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                    continue;
                }
                let api = path.file_stem().and_then(|s| s.to_str()).unwrap_or("?");
                match JobsFile::load(&path) {
                    Ok(file) => {
                        for job_name in list_jobs(&file) {
                            println!("{api}: {job_name}");
                        }
                    }
                    Err(e) => eprintln!("{}: {e}", path.display()),
                }
            }
        }
    }
    Ok(0)
}

async fn run_status(opt: StatusOpt, system: SystemConfig) -> anyhow::Result<i32> {
    logging::init(system.logging.format, false);

    let file = JobsFile::load(&opt.jobs_file)?;
    let job = file
        .jobs
        .get(&opt.job)
        .ok_or_else(|| IngestError::Configuration(format!("no job named {:?} in {}", opt.job, opt.jobs_file.display())))?
        .clone();
    let retry_policy = file.retry_policy_for(&job);

    let (api_key, base_url) = resolve_vendor_credentials(&opt.api).unwrap_or_default();
    let pool = connect_pg(&system.resolve_db_options(DB_ENV_PREFIX)).await?;
    let client = Arc::new(HttpVendorClient::new(base_url, api_key));
    let shutdown = ShutdownSignal::new();

    let orchestrator = PipelineOrchestrator::new(
        client,
        opt.job.clone(),
        job,
        retry_policy,
        system,
        pool,
        shutdown,
    )
    .await?;

    let report = orchestrator.status().await;
    for check in &report.checks {
        println!(
            "{:<20} {:<8} {}",
            check.name,
            if check.healthy { "ok" } else { "FAIL" },
            check.detail
        );
    }

    Ok(if report.healthy() { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case("ohlcv", true)]
    #[case("tbbo", true)]
    #[case("bogus", false)]
    fn parse_schema_accepts_only_declared_schemas(#[case] raw: &str, #[case] expected_ok: bool) {
        assert_eq!(parse_schema(raw).is_ok(), expected_ok);
    }

    #[rstest]
    fn large_query_flags_multi_day_high_volume_schemas() {
        assert!(is_large_query(Schema::Trades, date(2024, 1, 1), date(2024, 2, 1)));
        assert!(!is_large_query(Schema::Trades, date(2024, 1, 1), date(2024, 1, 2)));
        assert!(!is_large_query(Schema::Ohlcv, date(2024, 1, 1), date(2024, 2, 1)));
    }

    #[rstest]
    fn resolve_job_requires_either_named_job_or_every_ad_hoc_field() {
        let opt = IngestOpt {
            api: "databento".to_string(),
            jobs_file: "jobs.yaml".into(),
            job: None,
            dataset: None,
            schema: None,
            symbols: Vec::new(),
            start_date: None,
            end_date: None,
            stype_in: None,
            mapping_path: None,
            chunk_days: None,
            batch_size: None,
            verbose: false,
            dry_run: false,
        };
        assert!(resolve_job(&opt).is_err());
    }

    #[rstest]
    fn resolve_job_builds_an_ad_hoc_job_from_loose_flags() {
        let opt = IngestOpt {
            api: "databento".to_string(),
            jobs_file: "jobs.yaml".into(),
            job: None,
            dataset: Some("GLBX.MDP3".to_string()),
            schema: Some("ohlcv".to_string()),
            symbols: vec!["ES.c.0".to_string()],
            start_date: Some(date(2024, 1, 15)),
            end_date: Some(date(2024, 1, 16)),
            stype_in: None,
            mapping_path: Some("mappings/ohlcv.yaml".into()),
            chunk_days: Some(3),
            batch_size: None,
            verbose: false,
            dry_run: false,
        };
        let (job, _) = resolve_job(&opt).unwrap();
        assert_eq!(job.schema, Schema::Ohlcv);
        assert_eq!(job.chunk_days, Some(3));
    }
}
