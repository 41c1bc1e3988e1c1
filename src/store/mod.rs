//! Storage interface consumed by the aggregation core and the readers.
//!
//! Every query returns rows already ordered as documented on the method.
//! Failures are reported as [`StoreError`] and passed through unchanged;
//! nothing in this crate retries a failed query.

pub mod memory;

use crate::core::types::{HistogramBucket, RawWindSample, Timestamp};
use serde::{Deserialize, Serialize};

pub use memory::{MemoryStore, WindUpload};

/// A CPU temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempReading {
    pub ts: Timestamp,
    pub t: f64,
}

/// An ambient temperature and relative humidity reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempHumReading {
    pub ts: Timestamp,
    pub t: f64,
    pub h: f64,
}

/// A single analog channel measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdcReading {
    pub ts: Timestamp,
    pub channel: u32,
    pub value: f64,
}

/// Uplink state reported by the station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub ts: Timestamp,
    /// Network type, e.g. "UMTS" or "LTE"
    pub nwtype: String,
    /// Signal strength (0-100)
    pub strength: i32,
    /// Cumulative bytes uploaded
    pub upload: i64,
    /// Cumulative bytes downloaded
    pub download: i64,
}

/// Metadata recorded for every upload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UploadMeta {
    /// Server receive time
    pub ts: Timestamp,
    /// End of the newest wind sample in the upload, 0 if there was none
    pub upto: Timestamp,
    /// Client clock at upload time
    pub cts: Timestamp,
    /// NTP stratum of the client clock
    pub stratum: i32,
    /// Failed upload attempts since the last success
    pub fails: u32,
}

/// Door state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorEvent {
    pub ts: Timestamp,
    pub open: bool,
}

/// Number of pilots counted at the launch site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PilotCount {
    pub ts: Timestamp,
    pub count: u32,
}

/// Ordered range queries over the station tables.
///
/// Time ranges are inclusive on both ends unless stated otherwise.
pub trait Store {
    /// Wind samples with `start_ts >= start` and `end_ts <= end`, newest first.
    fn wind_samples(&self, start: Timestamp, end: Timestamp) -> Result<Vec<RawWindSample>, StoreError>;

    /// Histogram rows with `min_id <= id <= max_id`, ordered by id descending.
    fn histogram_buckets(&self, min_id: i64, max_id: i64) -> Result<Vec<HistogramBucket>, StoreError>;

    /// CPU temperature readings, ascending.
    fn temperature(&self, start: Timestamp, end: Timestamp) -> Result<Vec<TempReading>, StoreError>;

    /// Temperature/humidity readings, ascending.
    fn temp_hum(&self, start: Timestamp, end: Timestamp) -> Result<Vec<TempHumReading>, StoreError>;

    /// ADC readings of all channels, ascending by timestamp.
    fn adc(&self, start: Timestamp, end: Timestamp) -> Result<Vec<AdcReading>, StoreError>;

    /// Link status rows, ascending.
    fn link_status(&self, start: Timestamp, end: Timestamp) -> Result<Vec<LinkStatus>, StoreError>;

    /// The newest link status row with `ts <= at`.
    fn latest_link_status(&self, at: Timestamp) -> Result<Option<LinkStatus>, StoreError>;

    /// Upload metadata rows, ascending.
    fn upload_meta(&self, start: Timestamp, end: Timestamp) -> Result<Vec<UploadMeta>, StoreError>;

    /// Door events, ascending.
    fn door_events(&self, start: Timestamp, end: Timestamp) -> Result<Vec<DoorEvent>, StoreError>;

    /// Pilot counts, ascending.
    fn pilot_counts(&self, start: Timestamp, end: Timestamp) -> Result<Vec<PilotCount>, StoreError>;

    /// The newest pilot count with `ts < before`.
    fn pilot_count_before(&self, before: Timestamp) -> Result<Option<PilotCount>, StoreError>;
}

/// Errors raised by a [`Store`].
#[derive(Debug)]
pub enum StoreError {
    /// The backing store could not answer the query
    Unavailable(String),
    /// A snapshot file could not be read or written
    Io(String),
    /// A snapshot file could not be parsed or encoded
    Format(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "Store unavailable: {e}"),
            StoreError::Io(e) => write!(f, "IO error: {e}"),
            StoreError::Format(e) => write!(f, "Format error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
