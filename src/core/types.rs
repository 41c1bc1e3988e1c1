//! Sample and output types shared by the aggregation core.
//!
//! All timestamps are milliseconds since the Unix epoch. Output types
//! serialize to compact arrays so charts can consume them directly, and
//! integer-keyed data (histograms, series) is always an array of pairs.

use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// One wind measurement interval as persisted by the station.
///
/// The histogram for this interval lives in a separate table under the ids
/// `histogram_id .. histogram_id + bucket_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWindSample {
    /// Start of the measurement interval
    pub start_ts: Timestamp,
    /// End of the measurement interval (exclusive)
    pub end_ts: Timestamp,
    /// Average speed over the interval
    pub avg: f64,
    /// Maximum speed observed in the interval
    pub max: f64,
    /// Time at which `max` was observed
    pub max_ts: Timestamp,
    /// First histogram row id belonging to this sample
    pub histogram_id: i64,
    /// Number of histogram rows belonging to this sample
    pub bucket_count: u32,
}

impl RawWindSample {
    /// Length of the interval in milliseconds.
    pub fn duration(&self) -> i64 {
        self.end_ts.saturating_sub(self.start_ts)
    }

    /// Midpoint of the interval.
    pub fn center(&self) -> Timestamp {
        self.start_ts + self.duration() / 2
    }

    /// Last histogram row id belonging to this sample (inclusive).
    pub fn last_histogram_id(&self) -> i64 {
        self.histogram_id + i64::from(self.bucket_count) - 1
    }

    /// Check whether a histogram row id falls within this sample's range.
    pub fn owns_bucket(&self, id: i64) -> bool {
        id >= self.histogram_id && id <= self.last_histogram_id()
    }

    /// Reject records that cannot take part in aggregation.
    pub fn validate(&self) -> Result<(), SampleError> {
        if self.end_ts <= self.start_ts {
            return Err(SampleError::NonPositiveDuration {
                start_ts: self.start_ts,
                end_ts: self.end_ts,
            });
        }
        if self.bucket_count < 1 {
            return Err(SampleError::NoBuckets {
                start_ts: self.start_ts,
            });
        }
        Ok(())
    }
}

/// A single histogram row: the share of one sample's time spent in a speed bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Store-assigned, monotonically increasing row id
    pub id: i64,
    /// Speed bin (integer km/h)
    pub speed_bin: i32,
    /// Percentage of the owning sample's duration spent in this bin
    pub percentage: f64,
}

/// A timestamped scalar, serialized as `[ts, value]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub ts: Timestamp,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(ts: Timestamp, value: f64) -> Self {
        Self { ts, value }
    }
}

impl Serialize for SeriesPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.ts, self.value).serialize(serializer)
    }
}

/// The value range of one bucket, serialized as `[ts, [min, max]]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangePoint {
    pub ts: Timestamp,
    pub min: f64,
    pub max: f64,
}

impl Serialize for RangePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.ts, [self.min, self.max]).serialize(serializer)
    }
}

/// One point of the resampled wind time series, serialized as
/// `[center_ts, avg, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputWindow {
    pub center_ts: Timestamp,
    pub avg: f64,
    pub max: f64,
}

impl Serialize for OutputWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.center_ts)?;
        tuple.serialize_element(&self.avg)?;
        tuple.serialize_element(&self.max)?;
        tuple.end()
    }
}

/// Wind statistics for a query interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindStats {
    /// Time-weighted average speed over the selected samples
    pub avg: f64,
    /// Largest maximum among the selected samples
    pub max: f64,
    /// When `max` was observed
    pub max_ts: Timestamp,
    /// Time-weighted speed distribution as `[bin, percentage]` pairs, ascending by bin
    pub hist: Vec<(i32, f64)>,
    /// Start of the oldest selected sample
    pub start_ts: Timestamp,
    /// End of the newest selected sample
    pub end_ts: Timestamp,
    /// Chronological `[center_ts, avg, max]` rows
    pub time_series: Vec<OutputWindow>,
}

/// Reasons a stored wind record is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    NonPositiveDuration { start_ts: Timestamp, end_ts: Timestamp },
    NoBuckets { start_ts: Timestamp },
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::NonPositiveDuration { start_ts, end_ts } => {
                write!(f, "sample ends at {end_ts} but starts at {start_ts}")
            }
            SampleError::NoBuckets { start_ts } => {
                write!(f, "sample starting at {start_ts} declares no histogram buckets")
            }
        }
    }
}

impl std::error::Error for SampleError {}
