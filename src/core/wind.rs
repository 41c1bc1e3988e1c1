//! Wind statistics for a query interval.
//!
//! Ties the pieces together: select the samples that best cover the
//! interval, compute scalar stats over them, merge their histograms and
//! resample them into a bounded time series.

use crate::core::histogram::{histogram_id_range, merge_histograms};
use crate::core::selector::select_window;
use crate::core::types::{RawWindSample, Timestamp, WindStats};
use crate::core::window_resample::resample_windows;
use crate::store::{Store, StoreError};

/// Compute wind statistics for `[start, end]` with at most `output_len`
/// time series points.
///
/// Returns `Ok(None)` when the interval contains no usable samples.
pub fn compute_wind_stats<S: Store + ?Sized>(
    store: &S,
    start: Timestamp,
    end: Timestamp,
    output_len: usize,
) -> Result<Option<WindStats>, StoreError> {
    let samples: Vec<RawWindSample> = store
        .wind_samples(start, end)?
        .into_iter()
        .filter(|sample| match sample.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting malformed wind sample");
                false
            }
        })
        .collect();

    let Some(selection) = select_window(&samples, end.saturating_sub(start)) else {
        tracing::debug!(start, end, "no wind data for interval");
        return Ok(None);
    };
    let selected = &selection.samples;
    let Some(newest) = selected.first() else {
        return Ok(None);
    };
    let total_duration = selection.covered_duration;

    let weighted_sum: f64 = selected.iter().map(|s| s.avg * s.duration() as f64).sum();
    let avg = weighted_sum / total_duration as f64;

    let (max, max_ts) = selected
        .iter()
        .skip(1)
        .fold((newest.max, newest.max_ts), |(max, max_ts), s| {
            if s.max > max {
                (s.max, s.max_ts)
            } else {
                (max, max_ts)
            }
        });

    let hist = match histogram_id_range(selected) {
        Some((min_id, max_id)) => {
            let buckets = store.histogram_buckets(min_id, max_id)?;
            merge_histograms(selected, &buckets, total_duration)
        }
        None => Vec::new(),
    };

    let chronological: Vec<RawWindSample> = selected.iter().rev().cloned().collect();
    let time_series = resample_windows(&chronological, output_len);

    Ok(Some(WindStats {
        avg,
        max,
        max_ts,
        hist,
        start_ts: selection.actual_start,
        end_ts: selection.actual_end,
        time_series,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, WindUpload};
    use std::collections::BTreeMap;

    fn upload(start_ts: i64, end_ts: i64, avg: f64, max: f64, hist: &[(i32, f64)]) -> WindUpload {
        WindUpload {
            start_ts,
            end_ts,
            avg,
            max,
            max_ts: start_ts + 1,
            hist: hist.iter().copied().collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_no_data() {
        let store = MemoryStore::new();
        assert_eq!(compute_wind_stats(&store, 0, 10_000, 10).unwrap(), None);
    }

    #[test]
    fn test_scalar_stats_are_time_weighted() {
        let mut store = MemoryStore::new();
        store.upsert_wind(&[
            upload(0, 1000, 10.0, 15.0, &[(10, 100.0)]),
            upload(1000, 4000, 20.0, 25.0, &[(20, 100.0)]),
        ]);

        let stats = compute_wind_stats(&store, 0, 4000, 10).unwrap().unwrap();
        assert!((stats.avg - 17.5).abs() < 1e-9);
        assert_eq!(stats.max, 25.0);
        assert_eq!(stats.max_ts, 1001);
        assert_eq!(stats.start_ts, 0);
        assert_eq!(stats.end_ts, 4000);
        assert_eq!(stats.hist, vec![(10, 25.0), (20, 75.0)]);
        assert_eq!(stats.time_series.len(), 2);
        assert_eq!(stats.time_series[0].center_ts, 500);
        assert_eq!(stats.time_series[1].center_ts, 2500);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let mut store = MemoryStore::new();
        store.upsert_wind(&[upload(0, 1000, 10.0, 15.0, &[(10, 100.0)])]);
        store.upsert_wind_sample(RawWindSample {
            start_ts: 1000,
            end_ts: 2000,
            avg: 99.0,
            max: 99.0,
            max_ts: 1500,
            histogram_id: 500,
            bucket_count: 0,
        });

        let stats = compute_wind_stats(&store, 0, 2000, 10).unwrap().unwrap();
        assert_eq!(stats.avg, 10.0);
        assert_eq!(stats.max, 15.0);
        assert_eq!(stats.time_series.len(), 1);
    }

    #[test]
    fn test_full_timestamp_range() {
        let mut store = MemoryStore::new();
        store.upsert_wind(&[
            upload(0, 1000, 10.0, 15.0, &[(10, 100.0)]),
            upload(1000, 3000, 20.0, 25.0, &[(20, 100.0)]),
        ]);

        // The span does not fit in an i64; every sample is still selected.
        let stats = compute_wind_stats(&store, i64::MIN, i64::MAX, 10)
            .unwrap()
            .unwrap();
        assert_eq!(stats.start_ts, 0);
        assert_eq!(stats.end_ts, 3000);
        assert_eq!(stats.time_series.len(), 2);
    }

    #[test]
    fn test_selection_limits_to_requested_duration() {
        let mut store = MemoryStore::new();
        let uploads: Vec<_> = (0..10)
            .map(|i| upload(i * 1000, (i + 1) * 1000, i as f64, i as f64, &[(i as i32, 100.0)]))
            .collect();
        store.upsert_wind(&uploads);

        // Only the newest samples that fit in the interval are considered.
        let stats = compute_wind_stats(&store, 7000, 10_000, 10).unwrap().unwrap();
        assert_eq!(stats.start_ts, 7000);
        assert_eq!(stats.end_ts, 10_000);
        assert!((stats.avg - 8.0).abs() < 1e-9);
        assert_eq!(stats.hist.len(), 3);
    }
}
