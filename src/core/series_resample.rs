//! Downsampling of point series into a bounded number of buckets.
//!
//! Buckets have equal width over the series span, except that the last one
//! is open-ended so the final point can never be lost to rounding. Each
//! non-empty bucket yields one point keyed by the mean of its member
//! timestamps.

use crate::core::types::{RangePoint, SeriesPoint, Timestamp};
use serde::Serialize;
use std::collections::BTreeMap;

/// How the values within one bucket are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Mean of the member values (temperature, humidity, ADC, signal strength)
    Average,
    /// Smallest and largest member value (lag, where spikes matter)
    MinMax,
}

/// Result of [`downsample`], tagged by the reduction that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "points", rename_all = "snake_case")]
pub enum Downsampled {
    Average(Vec<SeriesPoint>),
    MinMax(Vec<RangePoint>),
}

/// Downsample `series` to at most `max_points` points using `mode`.
pub fn downsample(series: &BTreeMap<Timestamp, f64>, max_points: usize, mode: Reduction) -> Downsampled {
    match mode {
        Reduction::Average => Downsampled::Average(downsample_average(series, max_points)),
        Reduction::MinMax => Downsampled::MinMax(downsample_min_max(series, max_points)),
    }
}

/// Downsample to at most `max_points` bucket means.
pub fn downsample_average(series: &BTreeMap<Timestamp, f64>, max_points: usize) -> Vec<SeriesPoint> {
    if max_points == 0 {
        return Vec::new();
    }
    if series.len() <= max_points {
        return series.iter().map(|(&ts, &v)| SeriesPoint::new(ts, v)).collect();
    }
    let mut output = Vec::with_capacity(max_points);
    for_each_bucket(series, max_points, |timestamps, values| {
        output.push(SeriesPoint::new(mean_timestamp(timestamps), stable_mean(values)));
    });
    output
}

/// Downsample to at most `max_points` `[min, max]` ranges.
///
/// When no downsampling is needed each point becomes the range `[v, v]`.
pub fn downsample_min_max(series: &BTreeMap<Timestamp, f64>, max_points: usize) -> Vec<RangePoint> {
    if max_points == 0 {
        return Vec::new();
    }
    if series.len() <= max_points {
        return series
            .iter()
            .map(|(&ts, &v)| RangePoint { ts, min: v, max: v })
            .collect();
    }
    let mut output = Vec::with_capacity(max_points);
    for_each_bucket(series, max_points, |timestamps, values| {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        output.push(RangePoint {
            ts: mean_timestamp(timestamps),
            min,
            max,
        });
    });
    output
}

/// Walk `series` in order and hand every non-empty bucket to `flush`.
fn for_each_bucket<F>(series: &BTreeMap<Timestamp, f64>, buckets: usize, mut flush: F)
where
    F: FnMut(&[Timestamp], &[f64]),
{
    let (Some((&first_ts, _)), Some((&last_ts, _))) = (series.first_key_value(), series.last_key_value())
    else {
        return;
    };
    let width = (last_ts - first_ts) as f64 / buckets as f64;
    let bucket_end = |index: usize| {
        if index + 1 >= buckets {
            f64::INFINITY
        } else {
            first_ts as f64 + width * (index + 1) as f64
        }
    };

    let mut index = 0;
    let mut end = bucket_end(index);
    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    for (&ts, &value) in series {
        if ts as f64 >= end {
            if !values.is_empty() {
                flush(&timestamps, &values);
                timestamps.clear();
                values.clear();
            }
            // Skip over empty buckets.
            while ts as f64 >= end {
                index += 1;
                end = bucket_end(index);
            }
        }
        timestamps.push(ts);
        values.push(value);
    }
    if !values.is_empty() {
        flush(&timestamps, &values);
    }
}

/// Mean computed as a sum of `v / n` to limit precision loss on large sums.
fn stable_mean(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    values.iter().map(|v| v / n).sum()
}

fn mean_timestamp(timestamps: &[Timestamp]) -> Timestamp {
    let n = timestamps.len() as f64;
    let mean: f64 = timestamps.iter().map(|&ts| ts as f64 / n).sum();
    let lo = timestamps.iter().copied().min().unwrap_or_default();
    let hi = timestamps.iter().copied().max().unwrap_or_default();
    (mean.round() as Timestamp).clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(i64, f64)]) -> BTreeMap<Timestamp, f64> {
        points.iter().copied().collect()
    }

    #[test]
    fn test_average_single_bucket() {
        let input = series(&[(0, 10.0), (100, 20.0), (200, 30.0)]);
        assert_eq!(downsample_average(&input, 1), vec![SeriesPoint::new(100, 20.0)]);
    }

    #[test]
    fn test_min_max_single_bucket() {
        let input = series(&[(0, 5.0), (100, 50.0), (200, 5.0)]);
        assert_eq!(
            downsample_min_max(&input, 1),
            vec![RangePoint {
                ts: 100,
                min: 5.0,
                max: 50.0
            }]
        );
    }

    #[test]
    fn test_passthrough() {
        let input = series(&[(0, 1.0), (10, 2.0), (25, 3.0)]);
        assert_eq!(
            downsample_average(&input, 3),
            vec![
                SeriesPoint::new(0, 1.0),
                SeriesPoint::new(10, 2.0),
                SeriesPoint::new(25, 3.0)
            ]
        );
        let ranges = downsample_min_max(&input, 5);
        assert_eq!(ranges.len(), 3);
        assert!(ranges.iter().all(|r| r.min == r.max));
        assert!(downsample_average(&BTreeMap::new(), 4).is_empty());
    }

    #[test]
    fn test_zero_points_yields_nothing() {
        let input = series(&[(0, 1.0), (100, 2.0), (200, 3.0)]);
        assert!(downsample_average(&input, 0).is_empty());
        assert!(downsample_min_max(&input, 0).is_empty());
        assert_eq!(
            downsample(&input, 0, Reduction::Average),
            Downsampled::Average(Vec::new())
        );
    }

    #[test]
    fn test_two_buckets() {
        // Bucket edge at 100: the point at 100 opens the second bucket.
        let input = series(&[(0, 10.0), (100, 20.0), (200, 30.0)]);
        assert_eq!(
            downsample_average(&input, 2),
            vec![SeriesPoint::new(0, 10.0), SeriesPoint::new(150, 25.0)]
        );
    }

    #[test]
    fn test_empty_buckets_are_skipped() {
        let input = series(&[(0, 1.0), (1, 1.0), (2, 1.0), (1000, 4.0)]);
        let output = downsample_average(&input, 3);
        assert_eq!(
            output,
            vec![SeriesPoint::new(1, 1.0), SeriesPoint::new(1000, 4.0)]
        );
    }

    #[test]
    fn test_final_point_is_always_kept() {
        // The final point alone opens the last bucket.
        for buckets in 1..12 {
            let mut input: BTreeMap<_, _> = (0..30).map(|i| (i * 7, i as f64)).collect();
            input.insert(10_000_003, -1.0);
            let output = downsample_min_max(&input, buckets);
            assert!(output.len() <= buckets);
            assert!(
                output.iter().any(|r| r.min == -1.0),
                "final point lost with {buckets} buckets"
            );
        }
    }

    #[test]
    fn test_min_max_bounds_members() {
        let input: BTreeMap<_, _> = (0..200)
            .map(|i| (i * 13, ((i * 37) % 101) as f64 - 50.0))
            .collect();
        let output = downsample_min_max(&input, 9);
        assert!(output.len() <= 9);

        let first = *input.keys().next().unwrap();
        let last = *input.keys().last().unwrap();
        for range in &output {
            assert!(range.min <= range.max);
            assert!(range.ts >= first && range.ts <= last);
        }
        // Every input value is bounded by some output range.
        for value in input.values() {
            assert!(output.iter().any(|r| r.min <= *value && *value <= r.max));
        }
    }

    #[test]
    fn test_stable_mean_of_large_values() {
        let values = vec![f64::MAX / 2.0, f64::MAX / 2.0, f64::MAX / 2.0];
        let mean = stable_mean(&values);
        assert!(mean.is_finite());
        assert!((mean / (f64::MAX / 2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tagged_result() {
        let input = series(&[(0, 5.0), (100, 50.0), (200, 5.0)]);
        let json = serde_json::to_value(downsample(&input, 1, Reduction::MinMax)).unwrap();
        assert_eq!(json["mode"], "min_max");
        assert_eq!(json["points"], serde_json::json!([[100, [5.0, 50.0]]]));
    }
}
