//! Command-line argument parsing (design §6's external-interfaces table).

use clap::Parser;

/// Main CLI structure for parsing command-line arguments and options.
///
/// This is the entry point for the ingestion engine's command-line
/// interface, covering job execution, ad hoc queries, and operational
/// introspection.
#[derive(Debug, Parser)]
#[clap(version, about, author)]
pub struct IngestorCli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Path to the system-wide configuration file (logging, DB, quarantine
    /// root, retry and chunking defaults). Falls back to built-in defaults
    /// if omitted.
    #[arg(long, global = true)]
    pub system_config: Option<std::path::PathBuf>,
}

/// Available top-level commands.
#[derive(Parser, Debug)]
pub enum Commands {
    /// Runs a historical ingestion job.
    Ingest(IngestOpt),
    /// Queries stored canonical records for a symbol/date range.
    Query(QueryOpt),
    /// Lists the jobs declared for a vendor API.
    ListJobs(ListJobsOpt),
    /// Checks connectivity to the database, vendor, and quarantine root.
    Status(StatusOpt),
}

/// Options for `ingest`.
///
/// Either `--job` names a job already declared in the API's jobs file, or
/// the ad hoc fields (`--dataset`, `--schema`, `--symbols`, `--start-date`,
/// `--end-date`) describe one directly; exactly one of those two forms
/// must be supplied (validated in `run`, since clap cannot express this
/// group cleanly across a named job vs. five loose fields).
#[derive(Parser, Debug)]
#[command(about = "Run a historical ingestion job", long_about = None)]
pub struct IngestOpt {
    /// The vendor API id (selects `<API>_API_KEY`/`<API>_BASE_URL` and the
    /// jobs file to resolve `--job` against).
    #[arg(long)]
    pub api: String,

    /// Path to the per-API jobs file.
    #[arg(long, default_value = "jobs.yaml")]
    pub jobs_file: std::path::PathBuf,

    /// Name of an already-declared job in `--jobs-file`.
    #[arg(long)]
    pub job: Option<String>,

    /// Dataset identifier, for an ad hoc job.
    #[arg(long)]
    pub dataset: Option<String>,

    /// Canonical schema, for an ad hoc job: one of ohlcv, trades, tbbo,
    /// statistics, definitions.
    #[arg(long)]
    pub schema: Option<String>,

    /// Symbols to ingest, for an ad hoc job. Comma-separated or repeated.
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Start date (inclusive), `YYYY-MM-DD`, for an ad hoc job.
    #[arg(long)]
    pub start_date: Option<chrono::NaiveDate>,

    /// End date (inclusive), `YYYY-MM-DD`, for an ad hoc job.
    #[arg(long)]
    pub end_date: Option<chrono::NaiveDate>,

    /// Symbol notation for an ad hoc job's symbols (continuous, parent,
    /// native); defaults to continuous.
    #[arg(long)]
    pub stype_in: Option<String>,

    /// Path to the rule-engine mapping document, for an ad hoc job.
    #[arg(long)]
    pub mapping_path: Option<std::path::PathBuf>,

    /// Overrides the job/system default chunk size, in days.
    #[arg(long)]
    pub chunk_days: Option<u32>,

    /// Overrides the job/system default batch size, in records.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Verbose logging (debug level) for this run.
    #[arg(long)]
    pub verbose: bool,

    /// Validates configuration and symbols, connects to the vendor, but
    /// performs no writes to storage.
    #[arg(long)]
    pub dry_run: bool,
}

/// Options for `query`.
#[derive(Parser, Debug)]
#[command(about = "Query stored canonical records", long_about = None)]
pub struct QueryOpt {
    /// Symbols to resolve and query. Comma-separated or repeated.
    #[arg(long, required = true, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Start of the query range (inclusive), `YYYY-MM-DD`.
    #[arg(long)]
    pub start_date: chrono::NaiveDate,

    /// End of the query range (inclusive), `YYYY-MM-DD`.
    #[arg(long)]
    pub end_date: chrono::NaiveDate,

    /// Canonical schema to query: one of ohlcv, trades, tbbo, statistics,
    /// definitions. Defaults to daily OHLCV.
    #[arg(long)]
    pub schema: Option<String>,

    /// Output rendering: table, csv, or json.
    #[arg(long, default_value = "table")]
    pub output_format: String,

    /// Writes output to this file instead of stdout.
    #[arg(long)]
    pub output_file: Option<std::path::PathBuf>,

    /// Caps the number of rows returned.
    #[arg(long)]
    pub limit: Option<i64>,

    /// Skips the confirmation prompt for large queries.
    #[arg(long)]
    pub force: bool,
}

/// Options for `list-jobs`.
#[derive(Parser, Debug)]
#[command(about = "List the jobs declared for a vendor API", long_about = None)]
pub struct ListJobsOpt {
    /// The vendor API id whose jobs file to list. Lists every jobs file
    /// under `jobs/` if omitted.
    #[arg(long)]
    pub api: Option<String>,

    /// Path to the per-API jobs file (used when `--api` is given).
    #[arg(long, default_value = "jobs.yaml")]
    pub jobs_file: std::path::PathBuf,
}

/// Options for `status`.
#[derive(Parser, Debug)]
#[command(about = "Check database, vendor, and quarantine connectivity", long_about = None)]
pub struct StatusOpt {
    /// The vendor API id to check credentials for.
    #[arg(long)]
    pub api: String,

    /// Path to the per-API jobs file, to resolve a representative job's
    /// mapping document.
    #[arg(long, default_value = "jobs.yaml")]
    pub jobs_file: std::path::PathBuf,

    /// Name of the job to probe (any job declared for `--api` works; its
    /// mapping document and schema are used for the self-check).
    #[arg(long)]
    pub job: String,
}
