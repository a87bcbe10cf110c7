//! Symbol → `instrument_id` resolution with a read-mostly cache (design
//! §4.8, §5's "no cross-chunk caches except the symbol-resolution cache
//! in the query builder, which is read-mostly and uses copy-on-write or a
//! guarded map").

use std::collections::HashMap;
use std::sync::Arc;

use ingestor_core::IngestError;
use ingestor_model::identifiers::{InstrumentId, Symbol};
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;

/// Resolves user-facing symbols against the `definitions` table, caching
/// hits across calls within a process.
///
/// A symbol may have more than one definition over its lifetime (a
/// revision-controlled instrument, design §3); resolution always takes
/// the definition with the latest `activation`.
#[derive(Clone)]
pub struct SymbolResolver {
    pool: PgPool,
    cache: Arc<RwLock<HashMap<String, InstrumentId>>>,
}

impl SymbolResolver {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Resolves every symbol in `symbols`, returning a map of the ones
    /// found. Cache hits never touch the database; misses are looked up
    /// in one query and written back into the cache.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::SymbolResolution`] naming every symbol that
    /// could not be resolved, and [`IngestError::StorageTransient`] if the
    /// lookup query itself fails.
    pub async fn resolve_symbols(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<Symbol, InstrumentId>, IngestError> {
        let mut resolved = HashMap::new();
        let mut misses = Vec::new();

        {
            let cache = self.cache.read().await;
            for symbol in symbols {
                if let Some(id) = cache.get(symbol.as_ref()) {
                    resolved.insert(symbol.clone(), *id);
                } else {
                    misses.push(symbol.clone());
                }
            }
        }

        if !misses.is_empty() {
            let miss_strs: Vec<&str> = misses.iter().map(Symbol::as_ref).collect();
            let rows = sqlx::query(
                "SELECT DISTINCT ON (raw_symbol) raw_symbol, instrument_id
                 FROM definitions
                 WHERE raw_symbol = ANY($1)
                 ORDER BY raw_symbol, activation DESC",
            )
            .bind(&miss_strs as &[&str])
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IngestError::StorageTransient(e.to_string()))?;

            let mut cache = self.cache.write().await;
            for row in rows {
                let raw_symbol: String = row
                    .try_get("raw_symbol")
                    .map_err(|e| IngestError::StorageTransient(e.to_string()))?;
                let instrument_id: i64 = row
                    .try_get("instrument_id")
                    .map_err(|e| IngestError::StorageTransient(e.to_string()))?;
                let id = InstrumentId(instrument_id as u32);
                cache.insert(raw_symbol.clone(), id);
                resolved.insert(Symbol(raw_symbol), id);
            }
        }

        let unresolved: Vec<String> = symbols
            .iter()
            .filter(|s| !resolved.contains_key(*s))
            .map(|s| s.0.clone())
            .collect();
        if !unresolved.is_empty() {
            return Err(IngestError::SymbolResolution(unresolved));
        }

        Ok(resolved)
    }

    /// Lists up to `limit` distinct known symbols, for CLI discovery.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::StorageTransient`] if the query fails.
    pub async fn available_symbols(&self, limit: i64) -> Result<Vec<Symbol>, IngestError> {
        let rows = sqlx::query("SELECT DISTINCT raw_symbol FROM definitions ORDER BY raw_symbol LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IngestError::StorageTransient(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                row.try_get::<String, _>("raw_symbol")
                    .map(Symbol)
                    .map_err(|e| IngestError::StorageTransient(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_symbol_list_preserves_request_order() {
        let requested = [Symbol::from("ES.c.0"), Symbol::from("ZZZ.UNKNOWN")];
        let resolved: HashMap<Symbol, InstrumentId> =
            HashMap::from([(Symbol::from("ES.c.0"), InstrumentId(1))]);
        let unresolved: Vec<String> = requested
            .iter()
            .filter(|s| !resolved.contains_key(*s))
            .map(|s| s.0.clone())
            .collect();
        assert_eq!(unresolved, vec!["ZZZ.UNKNOWN".to_string()]);
    }
}
