//! Data models for samples and aggregate keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{DataError, Result};

/// One raw step-count record as stored on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Start of the measurement window, Unix epoch milliseconds.
    pub timestamp_ms: i64,
    /// Steps counted in the window.
    pub steps: u64,
}

impl Sample {
    /// Create a sample from raw column values.
    ///
    /// Negative step counts are rejected.
    pub fn from_row(timestamp_ms: i64, steps: i64) -> Result<Self> {
        let steps = u64::try_from(steps).map_err(|_| DataError::InvalidSteps {
            value: steps,
            timestamp_ms,
        })?;
        Ok(Self {
            timestamp_ms,
            steps,
        })
    }

    /// Civil date and time of this sample at the given offset.
    pub fn local_time(&self, offset: UtcOffset) -> Result<PrimitiveDateTime> {
        let nanos = i128::from(self.timestamp_ms) * 1_000_000
            + i128::from(offset.whole_seconds()) * 1_000_000_000;
        let shifted = OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|e| {
            DataError::InvalidTimestamp {
                value: self.timestamp_ms,
                reason: e.to_string(),
            }
        })?;
        Ok(PrimitiveDateTime::new(shifted.date(), shifted.time()))
    }
}

/// Calendar month key, displayed as zero-padded `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    /// Four-digit year.
    pub year: i32,
    /// Month number, 1-12.
    pub month: u8,
}

impl MonthKey {
    /// Month containing `date`.
    pub fn of(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Total and non-zero average of a zero-filled series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesStats {
    /// Sum of all buckets.
    pub total: u64,
    /// Mean over buckets with a non-zero value; 0 when every bucket is zero.
    pub average: u64,
}

impl SeriesStats {
    /// Compute stats over bucket values.
    pub fn from_values<I: IntoIterator<Item = u64>>(values: I) -> Self {
        let (total, nonzero) = values
            .into_iter()
            .filter(|v| *v > 0)
            .fold((0u64, 0u64), |(sum, n), v| (sum.saturating_add(v), n + 1));
        let average = if nonzero == 0 { 0 } else { total / nonzero };
        Self { total, average }
    }
}

/// Compact description of a loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    /// Number of raw samples.
    pub samples: usize,
    /// Number of distinct local dates with data.
    pub days: usize,
    /// Earliest date with data.
    pub first_date: Option<Date>,
    /// Latest date with data.
    pub last_date: Option<Date>,
    /// Sum over every sample.
    pub total_steps: u64,
    /// Per-year totals, ascending by year.
    pub yearly: Vec<(i32, u64)>,
}
