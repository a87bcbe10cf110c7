//! Postgres connection options and pool construction.
//!
//! Merges explicit arguments, environment variables (prefixed per design
//! §1.3/§6), and defaults — in that precedence order — through a plain
//! struct rather than a builder macro, since this crate's options are
//! simple enough not to need one.

use ingestor_core::IngestError;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};

/// Connection parameters for the hypertable database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConnectOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub pool_size: u32,
}

impl Default for PostgresConnectOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "ingestor".to_string(),
            password: String::new(),
            database: "ingestor".to_string(),
            pool_size: 4,
        }
    }
}

impl PostgresConnectOptions {
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

impl From<&PostgresConnectOptions> for PgConnectOptions {
    fn from(opt: &PostgresConnectOptions) -> Self {
        Self::new()
            .host(&opt.host)
            .port(opt.port)
            .username(&opt.username)
            .password(&opt.password)
            .database(&opt.database)
            .disable_statement_logging()
    }
}

/// Builds [`PostgresConnectOptions`] by merging explicit arguments,
/// `<prefix>_HOST`/`_PORT`/`_USER`/`_PASSWORD`/`_DBNAME` environment
/// variables, and defaults, in that precedence order (design §6).
///
/// # Panics
///
/// Panics if the `<prefix>_PORT` environment variable is set but is not a
/// valid `u16`.
#[must_use]
pub fn resolve_connect_options(
    prefix: &str,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    database: Option<String>,
) -> PostgresConnectOptions {
    let defaults = PostgresConnectOptions::default();
    PostgresConnectOptions {
        host: host
            .or_else(|| std::env::var(format!("{prefix}_HOST")).ok())
            .unwrap_or(defaults.host),
        port: port
            .or_else(|| {
                std::env::var(format!("{prefix}_PORT"))
                    .ok()
                    .map(|p| p.parse::<u16>().expect("port must be a valid u16"))
            })
            .unwrap_or(defaults.port),
        username: username
            .or_else(|| std::env::var(format!("{prefix}_USER")).ok())
            .unwrap_or(defaults.username),
        password: password
            .or_else(|| std::env::var(format!("{prefix}_PASSWORD")).ok())
            .unwrap_or(defaults.password),
        database: database
            .or_else(|| std::env::var(format!("{prefix}_DBNAME")).ok())
            .unwrap_or(defaults.database),
        pool_size: defaults.pool_size,
    }
}

/// Opens a connection pool for `options`.
///
/// This is the "scoped acquisition with guaranteed release" boundary for
/// storage (design §4.5/§5): callers hold the returned [`PgPool`] for the
/// lifetime of the loader and acquire individual connections from it per
/// batch; `sqlx` returns each connection to the pool when its guard drops,
/// on every exit path including an error return.
///
/// # Errors
///
/// Returns [`IngestError::StorageTransient`] if the pool cannot be
/// established (e.g. the database is unreachable at startup).
pub async fn connect_pg(options: &PostgresConnectOptions) -> Result<PgPool, IngestError> {
    PgPoolOptions::new()
        .max_connections(options.pool_size)
        .connect_with(options.into())
        .await
        .map_err(|e| IngestError::StorageTransient(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn explicit_args_take_precedence_over_defaults() {
        let opts = resolve_connect_options(
            "INGESTOR_PG",
            Some("db.internal".to_string()),
            Some(6543),
            None,
            None,
            None,
        );
        assert_eq!(opts.host, "db.internal");
        assert_eq!(opts.port, 6543);
        assert_eq!(opts.username, "ingestor");
    }

    #[rstest]
    fn connection_string_has_expected_shape() {
        let opts = PostgresConnectOptions {
            host: "localhost".to_string(),
            port: 5432,
            username: "u".to_string(),
            password: "p".to_string(),
            database: "d".to_string(),
            pool_size: 4,
        };
        assert_eq!(opts.connection_string(), "postgres://u:p@localhost:5432/d");
    }
}
