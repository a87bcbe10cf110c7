//! Process-wide structured logging setup, switching between a
//! human-readable (dev) formatter and line-delimited JSON (prod) by
//! configuration.

use ingestor_orchestrate::LogFormat;
use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber once at process start. `verbose`
/// raises the default level to `debug` for this crate's own code while
/// leaving noisy dependencies (`sqlx`) alone.
pub fn init(format: LogFormat, verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_directive},sqlx=warn")));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}
