//! OHLCV loading from CSV into a validated `TimeSeries`.
//!
//! Headers are matched case-insensitively and a few common aliases are
//! accepted (`date`/`time`/`datetime` for the timestamp, `vol` for volume).
//! Optional columns:
//! - `near_support` / `near_resistance`: boolean zone flags
//! - `regime`: per-bar regime label, normalized at ingestion
//!
//! Timestamps may be RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, or unix
//! epoch seconds (milliseconds when the value is too large to be seconds).

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;
use wfolab_core::{Bar, RegimeContext, SeriesError, TimeSeries, ZoneFlags};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: cannot parse {column} from '{value}'")]
    Parse {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("invalid series: {0}")]
    Series(#[from] SeriesError),
}

/// A loaded series plus the optional per-bar inputs that rode along with it.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: TimeSeries,
    /// Present only when the file carried a regime column.
    pub regimes: Option<RegimeContext>,
    /// BLAKE3 over every bar, for provenance in exported runs.
    pub dataset_hash: String,
}

/// Load a CSV file.
pub fn load_csv(path: &Path) -> Result<LoadedSeries, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = read_csv(file)?;
    tracing::info!(
        path = %path.display(),
        bars = loaded.series.len(),
        gaps = loaded.series.gap_count(),
        zones = loaded.series.zones().is_some(),
        regimes = loaded.regimes.is_some(),
        "loaded series"
    );
    Ok(loaded)
}

// ─── Column resolution ──────────────────────────────────────────────

const TIMESTAMP: &[&str] = &["timestamp", "time", "date", "datetime", "open_time"];
const OPEN: &[&str] = &["open", "o"];
const HIGH: &[&str] = &["high", "h"];
const LOW: &[&str] = &["low", "l"];
const CLOSE: &[&str] = &["close", "c"];
const VOLUME: &[&str] = &["volume", "vol", "v"];
const NEAR_SUPPORT: &[&str] = &["near_support", "support"];
const NEAR_RESISTANCE: &[&str] = &["near_resistance", "resistance"];
const REGIME: &[&str] = &["regime", "market_regime"];

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
    near_support: Option<usize>,
    near_resistance: Option<usize>,
    regime: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));
        let require = |aliases: &[&str], name: &'static str| {
            find(aliases).ok_or(LoadError::MissingColumn(name))
        };
        Ok(Self {
            timestamp: require(TIMESTAMP, "timestamp")?,
            open: require(OPEN, "open")?,
            high: require(HIGH, "high")?,
            low: require(LOW, "low")?,
            close: require(CLOSE, "close")?,
            volume: find(VOLUME),
            near_support: find(NEAR_SUPPORT),
            near_resistance: find(NEAR_RESISTANCE),
            regime: find(REGIME),
        })
    }

    fn has_zones(&self) -> bool {
        self.near_support.is_some() || self.near_resistance.is_some()
    }
}

// ─── Reader ─────────────────────────────────────────────────────────

/// Parse CSV from any reader. Rows are numbered from 1 after the header.
pub fn read_csv<R: Read>(reader: R) -> Result<LoadedSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = Columns::resolve(rdr.headers()?)?;

    let mut bars = Vec::new();
    let mut zones = ZoneFlags::default();
    let mut raw_regimes: Vec<Option<String>> = Vec::new();

    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 1;
        let cell = |idx: usize| record.get(idx).unwrap_or("");
        let number = |idx: usize, column: &'static str| parse_f64(cell(idx), row, column);

        bars.push(Bar {
            timestamp: parse_timestamp(cell(columns.timestamp))
                .ok_or_else(|| parse_error(row, "timestamp", cell(columns.timestamp)))?,
            open: number(columns.open, "open")?,
            high: number(columns.high, "high")?,
            low: number(columns.low, "low")?,
            close: number(columns.close, "close")?,
            volume: match columns.volume {
                Some(idx) if !cell(idx).is_empty() => number(idx, "volume")?,
                _ => 0.0,
            },
        });

        if columns.has_zones() {
            let flag = |idx: Option<usize>, column: &'static str| match idx {
                Some(idx) => parse_bool(cell(idx), row, column),
                None => Ok(false),
            };
            zones.near_support.push(flag(columns.near_support, "near_support")?);
            zones
                .near_resistance
                .push(flag(columns.near_resistance, "near_resistance")?);
        }
        if let Some(idx) = columns.regime {
            let raw = cell(idx);
            raw_regimes.push((!raw.is_empty()).then(|| raw.to_string()));
        }
    }

    let dataset_hash = dataset_hash(&bars);
    let mut series = TimeSeries::new(bars)?;
    if columns.has_zones() {
        series = series.with_zones(zones)?;
    }
    let regimes = columns
        .regime
        .map(|_| RegimeContext::from_raw(raw_regimes.iter().map(|r| r.as_deref())));

    Ok(LoadedSeries {
        series,
        regimes,
        dataset_hash,
    })
}

fn parse_error(row: usize, column: &'static str, value: &str) -> LoadError {
    LoadError::Parse {
        row,
        column,
        value: value.to_string(),
    }
}

fn parse_f64(value: &str, row: usize, column: &'static str) -> Result<f64, LoadError> {
    value
        .parse::<f64>()
        .map_err(|_| parse_error(row, column, value))
}

fn parse_bool(value: &str, row: usize, column: &'static str) -> Result<bool, LoadError> {
    match value.to_lowercase().as_str() {
        "" | "0" | "false" | "f" | "no" | "n" => Ok(false),
        "1" | "true" | "t" | "yes" | "y" => Ok(true),
        _ => Err(parse_error(row, column, value)),
    }
}

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_CUTOFF: i64 = 100_000_000_000;

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    let epoch: i64 = value.parse().ok()?;
    if epoch.abs() >= EPOCH_MILLIS_CUTOFF {
        Utc.timestamp_millis_opt(epoch).single()
    } else {
        Utc.timestamp_opt(epoch, 0).single()
    }
}

/// Deterministic BLAKE3 hash over timestamps and OHLCV values.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp_millis().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
