//! Date-range chunking for job execution.
//!
//! The vendor adapter and the orchestrator both need to split a requested
//! `[start, end]` date range into sub-ranges of at most `chunk_days`. The
//! source had an off-by-one here: a request with `start == end` fell out of
//! the `while start < end` loop immediately and produced zero chunks. This
//! implementation always emits at least one chunk for a valid range
//! (design §4.2, testable property #7).

use chrono::{Days, NaiveDate};

/// An inclusive `[start, end]` sub-range of a job's requested date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateChunk {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Splits `[start, end]` into chunks of at most `chunk_days` days each.
///
/// The final chunk is clamped to `end`. `start == end` yields exactly one
/// one-day chunk. `chunk_days == None` yields a single chunk spanning the
/// whole range.
///
/// # Errors
///
/// Returns an error if `start > end` or `chunk_days` is `Some(0)`.
pub fn chunk_date_range(
    start: NaiveDate,
    end: NaiveDate,
    chunk_days: Option<u32>,
) -> Result<Vec<DateChunk>, String> {
    if start > end {
        return Err(format!("start date {start} is after end date {end}"));
    }
    let Some(step) = chunk_days else {
        return Ok(vec![DateChunk { start, end }]);
    };
    if step == 0 {
        return Err("chunk_days must be greater than zero".to_string());
    }

    let mut chunks = Vec::new();
    let mut cursor = start;
    loop {
        let chunk_end = cursor
            .checked_add_days(Days::new(u64::from(step) - 1))
            .unwrap_or(end)
            .min(end);
        chunks.push(DateChunk {
            start: cursor,
            end: chunk_end,
        });
        if chunk_end >= end {
            break;
        }
        cursor = chunk_end
            .checked_add_days(Days::new(1))
            .expect("chunk_end < end, so the next day is representable");
    }
    Ok(chunks)
}

/// A deterministic chunk identifier derived from `(schema, symbol-group-hash,
/// start_date, end_date)`, used as the progress table's primary key
/// (design §3, Progress table).
#[must_use]
pub fn chunk_identifier(schema: &str, symbol_group_hash: u64, chunk: &DateChunk) -> String {
    format!(
        "{schema}:{symbol_group_hash:016x}:{}:{}",
        chunk.start, chunk.end
    )
}

/// A stable hash of a sorted, deduplicated symbol list, used as the
/// "symbol-group-hash" component of a chunk identifier so that two jobs
/// requesting the same symbols produce the same identifier regardless of
/// input ordering.
#[must_use]
pub fn symbol_group_hash(symbols: &[String]) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut sorted: Vec<&str> = symbols.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let mut hasher = DefaultHasher::new();
    sorted.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    fn start_equals_end_yields_one_chunk() {
        let d = date(2024, 1, 15);
        let chunks = chunk_date_range(d, d, Some(5)).unwrap();
        assert_eq!(chunks, vec![DateChunk { start: d, end: d }]);
    }

    #[rstest]
    fn unset_chunk_days_yields_single_chunk() {
        let chunks =
            chunk_date_range(date(2024, 1, 1), date(2024, 3, 1), None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start, date(2024, 1, 1));
        assert_eq!(chunks[0].end, date(2024, 3, 1));
    }

    #[rstest]
    fn splits_into_chunks_of_requested_size_with_final_clamped() {
        let chunks =
            chunk_date_range(date(2024, 1, 1), date(2024, 1, 10), Some(3)).unwrap();
        assert_eq!(
            chunks,
            vec![
                DateChunk { start: date(2024, 1, 1), end: date(2024, 1, 3) },
                DateChunk { start: date(2024, 1, 4), end: date(2024, 1, 6) },
                DateChunk { start: date(2024, 1, 7), end: date(2024, 1, 9) },
                DateChunk { start: date(2024, 1, 10), end: date(2024, 1, 10) },
            ]
        );
    }

    #[rstest]
    fn start_after_end_is_an_error() {
        assert!(chunk_date_range(date(2024, 1, 10), date(2024, 1, 1), None).is_err());
    }

    #[rstest]
    fn zero_chunk_days_is_an_error() {
        assert!(chunk_date_range(date(2024, 1, 1), date(2024, 1, 2), Some(0)).is_err());
    }

    #[rstest]
    fn symbol_group_hash_is_order_independent() {
        let a = vec!["ES.c.0".to_string(), "NQ.c.0".to_string()];
        let b = vec!["NQ.c.0".to_string(), "ES.c.0".to_string()];
        assert_eq!(symbol_group_hash(&a), symbol_group_hash(&b));
    }

    #[rstest]
    fn chunk_identifier_is_deterministic() {
        let chunk = DateChunk { start: date(2024, 1, 1), end: date(2024, 1, 2) };
        let hash = symbol_group_hash(&["ES.c.0".to_string()]);
        let id1 = chunk_identifier("ohlcv-1d", hash, &chunk);
        let id2 = chunk_identifier("ohlcv-1d", hash, &chunk);
        assert_eq!(id1, id2);
    }
}
