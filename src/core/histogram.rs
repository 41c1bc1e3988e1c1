//! Merging of per-sample histogram fragments.
//!
//! Histogram rows are written separately from the wind rows that reference
//! them, so the id range we read may contain rows no known sample owns
//! (e.g. after a retransmitted upload). Such orphans are skipped.

use crate::core::types::{HistogramBucket, RawWindSample};
use std::collections::BTreeMap;

/// Inclusive histogram id range covering all of `samples`.
///
/// Returns `None` when `samples` is empty.
pub fn histogram_id_range(samples: &[RawWindSample]) -> Option<(i64, i64)> {
    let min_id = samples.iter().map(|s| s.histogram_id).min()?;
    let max_id = samples.iter().map(|s| s.last_histogram_id()).max()?;
    Some((min_id, max_id))
}

/// Merge histogram rows into one time-weighted distribution.
///
/// `buckets` must be ordered by id descending. Each bucket contributes
/// `percentage * duration` of the sample owning it; the sums are divided by
/// `total_duration`. The result is sorted ascending by speed bin.
pub fn merge_histograms(
    samples: &[RawWindSample],
    buckets: &[HistogramBucket],
    total_duration: i64,
) -> Vec<(i32, f64)> {
    if total_duration <= 0 {
        return Vec::new();
    }

    // Walk owners in the same direction as the buckets.
    let mut owners: Vec<&RawWindSample> = samples.iter().collect();
    owners.sort_by(|a, b| b.histogram_id.cmp(&a.histogram_id));

    let mut weighted: BTreeMap<i32, f64> = BTreeMap::new();
    let mut orphans = 0usize;
    let mut i = 0;
    for bucket in buckets {
        while i < owners.len() && bucket.id < owners[i].histogram_id {
            i += 1;
        }
        let Some(owner) = owners.get(i) else {
            orphans += 1;
            continue;
        };
        if !owner.owns_bucket(bucket.id) {
            orphans += 1;
            continue;
        }
        *weighted.entry(bucket.speed_bin).or_insert(0.0) +=
            bucket.percentage * owner.duration() as f64;
    }

    if orphans > 0 {
        tracing::debug!(orphans, "skipped histogram rows without an owning sample");
    }

    let total = total_duration as f64;
    weighted
        .into_iter()
        .map(|(bin, sum)| (bin, sum / total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(start_ts: i64, end_ts: i64, histogram_id: i64, bucket_count: u32) -> RawWindSample {
        RawWindSample {
            start_ts,
            end_ts,
            avg: 0.0,
            max: 0.0,
            max_ts: start_ts,
            histogram_id,
            bucket_count,
        }
    }

    fn bucket(id: i64, speed_bin: i32, percentage: f64) -> HistogramBucket {
        HistogramBucket {
            id,
            speed_bin,
            percentage,
        }
    }

    #[test]
    fn test_id_range() {
        let samples = vec![sample(1000, 2000, 20, 3), sample(0, 1000, 10, 2)];
        assert_eq!(histogram_id_range(&samples), Some((10, 22)));
        assert_eq!(histogram_id_range(&[]), None);
    }

    #[test]
    fn test_time_weighted_merge() {
        // Newer sample lasts three times as long as the older one.
        let samples = vec![sample(1000, 4000, 20, 2), sample(0, 1000, 10, 2)];
        let buckets = vec![
            bucket(21, 6, 50.0),
            bucket(20, 5, 50.0),
            bucket(11, 6, 100.0),
            bucket(10, 4, 0.0),
        ];
        let hist = merge_histograms(&samples, &buckets, 4000);
        assert_eq!(hist.len(), 3);
        assert_eq!(hist[0], (4, 0.0));
        assert!((hist[1].1 - 37.5).abs() < 1e-9);
        assert!((hist[2].1 - 62.5).abs() < 1e-9);

        let total: f64 = hist.iter().map(|(_, p)| p).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_orphan_above_range_is_dropped() {
        // Valid ids are 10 and 11; 12 is left over from a failed write.
        let samples = vec![sample(0, 1000, 10, 2)];
        let buckets = vec![bucket(12, 30, 100.0), bucket(11, 3, 40.0), bucket(10, 2, 60.0)];
        let hist = merge_histograms(&samples, &buckets, 1000);
        assert_eq!(hist, vec![(2, 60.0), (3, 40.0)]);
    }

    #[test]
    fn test_orphans_between_and_below_samples_are_dropped() {
        let samples = vec![sample(1000, 2000, 20, 1), sample(0, 1000, 10, 1)];
        let buckets = vec![
            bucket(20, 5, 100.0),
            bucket(15, 99, 100.0),
            bucket(10, 7, 100.0),
            bucket(9, 98, 100.0),
        ];
        let hist = merge_histograms(&samples, &buckets, 2000);
        assert_eq!(hist, vec![(5, 50.0), (7, 50.0)]);
    }

    #[test]
    fn test_zero_duration_yields_empty() {
        let samples = vec![sample(0, 1000, 10, 1)];
        let buckets = vec![bucket(10, 5, 100.0)];
        assert!(merge_histograms(&samples, &buckets, 0).is_empty());
    }
}
