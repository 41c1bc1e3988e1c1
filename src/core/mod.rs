//! Aggregation core.
//!
//! This module contains:
//! - Best-fit selection of wind samples for a query interval
//! - Orphan-tolerant merging of per-sample histograms
//! - Overlap-weighted resampling of wind intervals
//! - Bucketed downsampling of point series
//! - The wind statistics query that combines them

pub mod histogram;
pub mod selector;
pub mod series_resample;
pub mod types;
pub mod wind;
pub mod window_resample;

// Re-export commonly used types
pub use histogram::{histogram_id_range, merge_histograms};
pub use selector::{select_window, Selection};
pub use series_resample::{downsample, downsample_average, downsample_min_max, Downsampled, Reduction};
pub use types::{
    HistogramBucket, OutputWindow, RangePoint, RawWindSample, SampleError, SeriesPoint, Timestamp,
    WindStats,
};
pub use wind::compute_wind_stats;
pub use window_resample::resample_windows;
