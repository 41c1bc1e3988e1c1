//! Anemometer Stats - bounded-size statistics for weather station data.
//!
//! A station uploads wind samples of varying duration (each with its own
//! speed histogram) plus assorted point series: temperature, humidity, ADC
//! channels, link quality, door state and pilot counts. This library turns
//! whatever the store holds for a time range into a fixed number of chart
//! points, whatever the retention window.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Anemometer Stats                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐   ┌──────────┐   ┌───────────┐                  │
//! │  │  Store  │──▶│ Selector │──▶│ Histogram │──┐               │
//! │  │ (range) │   │(best fit)│   │  (merge)  │  │  ┌─────────┐  │
//! │  └─────────┘   └──────────┘   └───────────┘  ├─▶│  Wind   │  │
//! │       │              │        ┌───────────┐  │  │  Stats  │  │
//! │       │              └───────▶│  Window   │──┘  └─────────┘  │
//! │       │                       │ Resampler │                  │
//! │       ▼                       └───────────┘                  │
//! │  ┌─────────┐   ┌───────────┐                                 │
//! │  │ Readers │──▶│  Series   │                                 │
//! │  │         │   │ Resampler │                                 │
//! │  └─────────┘   └───────────┘                                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use anemometer_stats::{compute_wind_stats, MemoryStore, WindUpload};
//!
//! let mut store = MemoryStore::new();
//! store.upsert_wind(&[WindUpload {
//!     start_ts: 0,
//!     end_ts: 60_000,
//!     avg: 12.0,
//!     max: 20.0,
//!     max_ts: 31_000,
//!     hist: [(11, 40.0), (12, 60.0)].into_iter().collect(),
//! }]);
//!
//! let stats = compute_wind_stats(&store, 0, 60_000, 100).unwrap().unwrap();
//! assert_eq!(stats.avg, 12.0);
//! assert_eq!(stats.hist, vec![(11, 40.0), (12, 60.0)]);
//! ```

pub mod config;
pub mod core;
pub mod readers;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    compute_wind_stats, downsample, Downsampled, OutputWindow, RangePoint, RawWindSample,
    Reduction, SeriesPoint, Timestamp, WindStats,
};
pub use store::{MemoryStore, Store, StoreError, WindUpload};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
