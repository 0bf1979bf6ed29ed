//! CSV store for enriched series.
//!
//! One file per token and interval (`{token}_{interval}.csv`), one row per
//! bar: timestamp first, then the raw kline fields, then the derived
//! columns in enrichment order. Exports never overwrite rows that are
//! already on disk; overlapping data is merged incrementally.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use coinlens_core::{
    EnrichError, EnrichedBar, EnrichedSeries, Interval, RawBar, Token, UtcDateTime,
    ValidationError,
};

/// Column order of the persisted file.
const COLUMNS: [&str; 18] = [
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "quote_volume",
    "trades",
    "taker_base_volume",
    "taker_quote_volume",
    "net_profit",
    "max_profit",
    "buy_volume",
    "sell_volume",
    "volume_diff",
    "volume_diff_ma",
    "obv",
    "obv_ma",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),
}

/// Store location settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: resolve_data_dir(),
        }
    }
}

fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("COINLENS_HOME") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return Path::new(&home).join(".coinlens");
        }
    }
    PathBuf::from(".coinlens")
}

/// File name for a persisted series, keyed by token and interval.
pub fn series_file_name(token: &Token, interval: Interval) -> String {
    format!("{token}_{interval}.csv")
}

/// Outcome of an export, for callers that want to report what happened.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
    pub merged: bool,
}

/// Persist a series to `dir`, excluding its most recent (in-progress) bar.
///
/// Creates the directory if absent. If the file already exists its rows are
/// read back and the fresh rows are merged in incrementally; rows already
/// on disk are never modified.
pub fn export_series(series: &EnrichedSeries, dir: &Path) -> Result<ExportReport, StoreError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(series_file_name(series.token(), series.interval()));

    let fresh = series.without_last_bar();
    let (resolved, merged) = if path.exists() {
        let existing = read_series(&path, series.token().clone(), series.interval())?;
        (
            EnrichedSeries::merge_incremental(&existing, &fresh)?,
            true,
        )
    } else {
        (fresh, false)
    };

    write_series(&resolved, &path)?;
    info!(path = %path.display(), rows = resolved.len(), merged, "exported series");

    Ok(ExportReport {
        path,
        rows: resolved.len(),
        merged,
    })
}

/// Read a previously exported series back from disk.
pub fn read_series(
    path: &Path,
    token: Token,
    interval: Interval,
) -> Result<EnrichedSeries, StoreError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();

    for (index, record) in reader.records().enumerate() {
        // Line 1 is the header.
        let line = index + 2;
        let record = record?;
        rows.push(decode_record(&record, line)?);
    }

    Ok(EnrichedSeries::from_rows(token, interval, rows)?)
}

fn write_series(series: &EnrichedSeries, path: &Path) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(COLUMNS)?;

    for row in series.rows() {
        writer.write_record(encode_record(row))?;
    }

    writer.flush()?;
    Ok(())
}

fn encode_record(row: &EnrichedBar) -> [String; 18] {
    [
        row.raw.ts.format_rfc3339(),
        row.raw.open.to_string(),
        row.raw.high.to_string(),
        row.raw.low.to_string(),
        row.raw.close.to_string(),
        row.raw.volume.to_string(),
        row.raw.quote_volume.to_string(),
        row.raw.trades.to_string(),
        row.raw.taker_base_volume.to_string(),
        row.raw.taker_quote_volume.to_string(),
        row.net_profit.to_string(),
        row.max_profit.to_string(),
        row.buy_volume.to_string(),
        row.sell_volume.to_string(),
        row.volume_diff.to_string(),
        row.volume_diff_ma.to_string(),
        row.obv.to_string(),
        row.obv_ma.to_string(),
    ]
}

fn decode_record(record: &csv::StringRecord, line: usize) -> Result<EnrichedBar, StoreError> {
    if record.len() < COLUMNS.len() {
        return Err(StoreError::MalformedRecord {
            line,
            reason: format!("{} columns, expected {}", record.len(), COLUMNS.len()),
        });
    }

    let ts = UtcDateTime::parse(field(record, 0, line)?).map_err(|error| {
        StoreError::MalformedRecord {
            line,
            reason: error.to_string(),
        }
    })?;

    let raw = RawBar::new(
        ts,
        parse_f64(record, 1, line)?,
        parse_f64(record, 2, line)?,
        parse_f64(record, 3, line)?,
        parse_f64(record, 4, line)?,
        parse_f64(record, 5, line)?,
        parse_f64(record, 6, line)?,
        parse_u64(record, 7, line)?,
        parse_f64(record, 8, line)?,
        parse_f64(record, 9, line)?,
    )
    .map_err(|error| StoreError::MalformedRecord {
        line,
        reason: error.to_string(),
    })?;

    Ok(EnrichedBar {
        raw,
        net_profit: parse_f64(record, 10, line)?,
        max_profit: parse_f64(record, 11, line)?,
        buy_volume: parse_f64(record, 12, line)?,
        sell_volume: parse_f64(record, 13, line)?,
        volume_diff: parse_f64(record, 14, line)?,
        volume_diff_ma: parse_f64(record, 15, line)?,
        obv: parse_f64(record, 16, line)?,
        obv_ma: parse_f64(record, 17, line)?,
    })
}

fn field<'a>(
    record: &'a csv::StringRecord,
    index: usize,
    line: usize,
) -> Result<&'a str, StoreError> {
    record.get(index).ok_or_else(|| StoreError::MalformedRecord {
        line,
        reason: format!("missing column {index}"),
    })
}

// "NaN" cells round-trip through the standard float parser.
fn parse_f64(record: &csv::StringRecord, index: usize, line: usize) -> Result<f64, StoreError> {
    let text = field(record, index, line)?;
    text.parse::<f64>().map_err(|_| StoreError::MalformedRecord {
        line,
        reason: format!("column '{}' is not a number: '{text}'", COLUMNS[index]),
    })
}

fn parse_u64(record: &csv::StringRecord, index: usize, line: usize) -> Result<u64, StoreError> {
    let text = field(record, index, line)?;
    text.parse::<u64>().map_err(|_| StoreError::MalformedRecord {
        line,
        reason: format!("column '{}' is not a count: '{text}'", COLUMNS[index]),
    })
}
