//! Rendering query results for the CLI (design §4.8's `to_tabular`
//! adapter, spec §6's `--output-format ∈ {table,csv,json}`).

use std::io::Write;

use ingestor_core::IngestError;
use ingestor_model::{Definition, Ohlcv, Statistics, Tbbo, Trade};
use serde::Serialize;
use tabled::builder::Builder as TableBuilder;
use tabled::settings::Style;

/// The three output shapes a query result can be rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Self::Table),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(IngestError::Configuration(format!(
                "unknown output format {other:?}, expected one of table, csv, json"
            ))),
        }
    }
}

/// A row that knows how to lay itself out as a tabular record, so
/// [`write_rows`] can render any canonical schema without depending on
/// `ingestor-model` carrying a `tabled` dependency of its own.
pub trait TabularRow {
    fn headers() -> Vec<&'static str>;
    fn to_row(&self) -> Vec<String>;
}

impl TabularRow for Ohlcv {
    fn headers() -> Vec<&'static str> {
        vec![
            "instrument_id",
            "ts_event",
            "granularity",
            "open",
            "high",
            "low",
            "close",
            "volume",
        ]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.instrument_id.to_string(),
            self.ts_event.to_rfc3339(),
            format!("{:?}", self.granularity),
            self.open_price.to_string(),
            self.high_price.to_string(),
            self.low_price.to_string(),
            self.close_price.to_string(),
            self.volume.to_string(),
        ]
    }
}

impl TabularRow for Trade {
    fn headers() -> Vec<&'static str> {
        vec!["instrument_id", "ts_event", "price", "size", "side", "sequence"]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.instrument_id.to_string(),
            self.ts_event.to_rfc3339(),
            self.price.to_string(),
            self.size.to_string(),
            self.side.code().to_string(),
            self.sequence.to_string(),
        ]
    }
}

impl TabularRow for Tbbo {
    fn headers() -> Vec<&'static str> {
        vec![
            "instrument_id",
            "ts_event",
            "price",
            "size",
            "side",
            "bid_px_00",
            "ask_px_00",
        ]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.instrument_id.to_string(),
            self.ts_event.to_rfc3339(),
            self.price.to_string(),
            self.size.to_string(),
            self.side.code().to_string(),
            self.bid_px_00.map(|p| p.to_string()).unwrap_or_default(),
            self.ask_px_00.map(|p| p.to_string()).unwrap_or_default(),
        ]
    }
}

impl TabularRow for Statistics {
    fn headers() -> Vec<&'static str> {
        vec!["instrument_id", "ts_event", "stat_type", "update_action", "price", "quantity"]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.instrument_id.to_string(),
            self.ts_event.to_rfc3339(),
            format!("{:?}", self.stat_type),
            format!("{:?}", self.update_action),
            self.price.map(|p| p.to_string()).unwrap_or_default(),
            self.quantity.map(|q| q.to_string()).unwrap_or_default(),
        ]
    }
}

impl TabularRow for Definition {
    fn headers() -> Vec<&'static str> {
        vec![
            "instrument_id",
            "raw_symbol",
            "instrument_class",
            "exchange",
            "activation",
            "expiration",
        ]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.instrument_id.to_string(),
            self.raw_symbol.clone(),
            format!("{:?}", self.instrument_class),
            self.exchange.clone(),
            self.activation.to_rfc3339(),
            self.expiration.to_rfc3339(),
        ]
    }
}

/// Renders `rows` into `format`, written to `out`.
///
/// When there are no rows, prints a user-friendly notice rather than an
/// empty table or an empty array (spec §6's "0 no-results (prints a
/// user-friendly notice)").
///
/// # Errors
///
/// Returns [`IngestError::Configuration`] if serialization fails.
pub fn write_rows<T, W>(rows: &[T], format: OutputFormat, out: &mut W) -> Result<(), IngestError>
where
    T: TabularRow + Serialize,
    W: Write,
{
    if rows.is_empty() {
        writeln!(out, "no rows matched the query").map_err(io_err)?;
        return Ok(());
    }

    match format {
        OutputFormat::Table => {
            let mut builder = TableBuilder::default();
            builder.push_record(T::headers());
            for row in rows {
                builder.push_record(row.to_row());
            }
            let table = builder.build().with(Style::rounded()).to_string();
            writeln!(out, "{table}").map_err(io_err)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::WriterBuilder::new().from_writer(out);
            writer.write_record(T::headers()).map_err(csv_err)?;
            for row in rows {
                writer.write_record(row.to_row()).map_err(csv_err)?;
            }
            writer.flush().map_err(io_err)?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, rows)
                .map_err(|e| IngestError::Configuration(format!("JSON output serialization: {e}")))?;
            writeln!(out).map_err(io_err)?;
        }
    }

    Ok(())
}

fn io_err(e: std::io::Error) -> IngestError {
    IngestError::Configuration(format!("writing query output: {e}"))
}

fn csv_err(e: csv::Error) -> IngestError {
    IngestError::Configuration(format!("writing CSV output: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestor_model::stubs::ohlcv_stub;

    #[test]
    fn empty_rows_print_a_notice_instead_of_an_empty_table() {
        let rows: Vec<Ohlcv> = Vec::new();
        let mut out = Vec::new();
        write_rows(&rows, OutputFormat::Table, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("no rows matched"));
    }

    #[test]
    fn csv_output_has_a_header_and_one_line_per_row() {
        let rows = vec![ohlcv_stub(), ohlcv_stub()];
        let mut out = Vec::new();
        write_rows(&rows, OutputFormat::Csv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn output_format_rejects_unknown_strings() {
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    }
}
