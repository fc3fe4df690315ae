//! Bar and TimeSeries — the market data a run consumes.
//!
//! A `TimeSeries` is validated once at construction (non-empty, sane bars,
//! strictly increasing timestamps) and is read-only afterwards. Windows are
//! carved out with `slice`, which keeps optional zone flags aligned.

use std::ops::Range;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLCV field is not finite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    /// Basic OHLCV sanity check: high/low bracket open and close, prices positive.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
            && self.volume >= 0.0
    }
}

/// Errors raised while building a `TimeSeries`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series is empty")]
    Empty,
    #[error("bar {index} at {timestamp} is malformed")]
    MalformedBar {
        index: usize,
        timestamp: DateTime<Utc>,
    },
    #[error("timestamps not strictly increasing at bar {index}: {previous} then {current}")]
    NonIncreasing {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
    #[error("zone flags have {got} entries but the series has {expected} bars")]
    ZoneLengthMismatch { expected: usize, got: usize },
}

/// Support/resistance proximity flags, aligned bar-for-bar with a series.
///
/// Zone detection itself happens upstream; these flags are consumed as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneFlags {
    pub near_support: Vec<bool>,
    pub near_resistance: Vec<bool>,
}

impl ZoneFlags {
    fn slice(&self, range: Range<usize>) -> Self {
        Self {
            near_support: self.near_support[range.clone()].to_vec(),
            near_resistance: self.near_resistance[range].to_vec(),
        }
    }
}

/// Validated, ordered OHLCV series.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    bars: Vec<Bar>,
    zones: Option<ZoneFlags>,
}

impl TimeSeries {
    /// Validate and wrap a bar vector.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(SeriesError::MalformedBar {
                    index,
                    timestamp: bar.timestamp,
                });
            }
        }
        if let Some(index) = bars
            .windows(2)
            .position(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            return Err(SeriesError::NonIncreasing {
                index: index + 1,
                previous: bars[index].timestamp,
                current: bars[index + 1].timestamp,
            });
        }
        Ok(Self { bars, zones: None })
    }

    /// Wrap bars that are valid by construction (synthetic generators).
    pub(crate) fn from_generated(bars: Vec<Bar>) -> Self {
        debug_assert!(Self::new(bars.clone()).is_ok() || bars.is_empty());
        Self { bars, zones: None }
    }

    /// Attach zone flags; both vectors must match the bar count.
    pub fn with_zones(mut self, zones: ZoneFlags) -> Result<Self, SeriesError> {
        let expected = self.bars.len();
        for got in [zones.near_support.len(), zones.near_resistance.len()] {
            if got != expected {
                return Err(SeriesError::ZoneLengthMismatch { expected, got });
            }
        }
        self.zones = Some(zones);
        Ok(self)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn zones(&self) -> Option<&ZoneFlags> {
        self.zones.as_ref()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.bars.get(index).map(|b| b.timestamp)
    }

    /// Smallest positive step between consecutive bars.
    ///
    /// Gaps are tolerated, so the nominal interval is reported rather than
    /// enforced. `None` for single-bar series.
    pub fn nominal_interval(&self) -> Option<Duration> {
        self.bars
            .windows(2)
            .map(|pair| pair[1].timestamp - pair[0].timestamp)
            .min()
    }

    /// Number of steps longer than the nominal interval.
    pub fn gap_count(&self) -> usize {
        let Some(nominal) = self.nominal_interval() else {
            return 0;
        };
        self.bars
            .windows(2)
            .filter(|pair| pair[1].timestamp - pair[0].timestamp > nominal)
            .count()
    }

    /// Copy out the bars in `[range.start, range.end)`, clamped to the series.
    ///
    /// The result may be empty when the clamped range is empty; it is still
    /// ordered and sane because it is a sub-range of a validated series.
    pub fn slice(&self, range: Range<usize>) -> TimeSeries {
        let end = range.end.min(self.bars.len());
        let start = range.start.min(end);
        TimeSeries {
            bars: self.bars[start..end].to_vec(),
            zones: self.zones.as_ref().map(|z| z.slice(start..end)),
        }
    }
}
