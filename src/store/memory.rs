//! In-memory reference store.
//!
//! Tables are keyed by timestamp and written with replace semantics, so a
//! retransmitted upload overwrites rows instead of duplicating them. The
//! histogram table is the exception: its ids come from a counter, and every
//! write appends new rows. A retransmitted wind upload therefore leaves the
//! previous histogram rows behind as orphans, just like a non-transactional
//! SQL backend would.

use crate::core::types::{HistogramBucket, RawWindSample, Timestamp};
use crate::store::{
    AdcReading, DoorEvent, LinkStatus, PilotCount, Store, StoreError, TempHumReading, TempReading,
    UploadMeta,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One wind sample as uploaded by the station, histogram included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindUpload {
    pub start_ts: Timestamp,
    pub end_ts: Timestamp,
    pub avg: f64,
    pub max: f64,
    pub max_ts: Timestamp,
    /// Speed bin -> percentage of the sample duration
    pub hist: BTreeMap<i32, f64>,
}

/// Station tables held in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Snapshot", into = "Snapshot")]
pub struct MemoryStore {
    wind: BTreeMap<Timestamp, RawWindSample>,
    histogram: BTreeMap<i64, HistogramBucket>,
    next_histogram_id: i64,
    temperature: BTreeMap<Timestamp, TempReading>,
    temp_hum: BTreeMap<Timestamp, TempHumReading>,
    adc: BTreeMap<(Timestamp, u32), AdcReading>,
    link: BTreeMap<Timestamp, LinkStatus>,
    meta: BTreeMap<Timestamp, UploadMeta>,
    door: BTreeMap<Timestamp, DoorEvent>,
    pilots: BTreeMap<Timestamp, PilotCount>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::from(Snapshot::default())
    }

    /// Load a store from a JSON snapshot file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
        let store: MemoryStore =
            serde_json::from_str(&content).map_err(|e| StoreError::Format(e.to_string()))?;
        tracing::info!(
            path = %path.display(),
            wind_samples = store.wind.len(),
            "loaded store snapshot"
        );
        Ok(store)
    }

    /// Write the store to a JSON snapshot file.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| StoreError::Format(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Store wind samples, writing each histogram before its wind row.
    /// Samples without a histogram are skipped.
    ///
    /// Returns the end timestamp of the last sample, or 0 if there was none.
    pub fn upsert_wind(&mut self, uploads: &[WindUpload]) -> Timestamp {
        if warn_if_empty(uploads, "wind") {
            return 0;
        }
        for upload in uploads {
            if upload.hist.is_empty() {
                tracing::warn!(start_ts = upload.start_ts, "skipping wind sample without histogram");
                continue;
            }
            let histogram_id = self.insert_histogram(&upload.hist);
            let sample = RawWindSample {
                start_ts: upload.start_ts,
                end_ts: upload.end_ts,
                avg: upload.avg,
                max: upload.max,
                max_ts: upload.max_ts,
                histogram_id,
                bucket_count: upload.hist.len() as u32,
            };
            self.wind.insert(sample.start_ts, sample);
        }
        uploads.last().map_or(0, |u| u.end_ts)
    }

    /// Append histogram rows and return the first id assigned.
    pub fn insert_histogram(&mut self, hist: &BTreeMap<i32, f64>) -> i64 {
        let first_id = self.next_histogram_id;
        for (&speed_bin, &percentage) in hist {
            let id = self.next_histogram_id;
            self.histogram.insert(
                id,
                HistogramBucket {
                    id,
                    speed_bin,
                    percentage,
                },
            );
            self.next_histogram_id += 1;
        }
        first_id
    }

    /// Replace a wind row as-is, keeping its declared histogram range.
    pub fn upsert_wind_sample(&mut self, sample: RawWindSample) {
        self.wind.insert(sample.start_ts, sample);
    }

    pub fn upsert_temperature(&mut self, readings: &[TempReading]) {
        if warn_if_empty(readings, "temperature") {
            return;
        }
        for r in readings {
            self.temperature.insert(r.ts, *r);
        }
    }

    /// Store temperature/humidity readings. Readings where the sensor
    /// returned no value are skipped.
    pub fn upsert_temp_hum(&mut self, readings: &[TempHumReading]) {
        if warn_if_empty(readings, "temp_hum") {
            return;
        }
        for r in readings.iter().filter(|r| r.t.is_finite() && r.h.is_finite()) {
            self.temp_hum.insert(r.ts, *r);
        }
    }

    pub fn upsert_adc(&mut self, readings: &[AdcReading]) {
        if warn_if_empty(readings, "adc") {
            return;
        }
        for r in readings {
            self.adc.insert((r.ts, r.channel), *r);
        }
    }

    pub fn upsert_link_status(&mut self, rows: &[LinkStatus]) {
        if warn_if_empty(rows, "link status") {
            return;
        }
        for r in rows {
            self.link.insert(r.ts, r.clone());
        }
    }

    pub fn upsert_upload_meta(&mut self, meta: UploadMeta) {
        self.meta.insert(meta.ts, meta);
    }

    pub fn upsert_door(&mut self, events: &[DoorEvent]) {
        if warn_if_empty(events, "door") {
            return;
        }
        for e in events {
            self.door.insert(e.ts, *e);
        }
    }

    pub fn upsert_pilots(&mut self, counts: &[PilotCount]) {
        if warn_if_empty(counts, "pilots") {
            return;
        }
        for c in counts {
            self.pilots.insert(c.ts, *c);
        }
    }

    /// Delete everything recorded before `before`.
    ///
    /// Histogram rows below the smallest histogram id still referenced by a
    /// wind sample are removed; with no wind samples left, all of them are.
    pub fn prune(&mut self, before: Timestamp) {
        self.wind = self.wind.split_off(&before);
        match self.wind.values().map(|s| s.histogram_id).min() {
            Some(oldest_id) => self.histogram = self.histogram.split_off(&oldest_id),
            None => self.histogram.clear(),
        }
        self.temperature = self.temperature.split_off(&before);
        self.temp_hum = self.temp_hum.split_off(&before);
        self.adc = self.adc.split_off(&(before, 0));
        self.link = self.link.split_off(&before);
        self.meta = self.meta.split_off(&before);
        self.door = self.door.split_off(&before);
        self.pilots = self.pilots.split_off(&before);
        tracing::info!(before, remaining_wind = self.wind.len(), "pruned store");
    }

    /// Number of stored wind samples.
    pub fn wind_len(&self) -> usize {
        self.wind.len()
    }

    /// Number of stored histogram rows, orphans included.
    pub fn histogram_len(&self) -> usize {
        self.histogram.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn warn_if_empty<T>(rows: &[T], table: &str) -> bool {
    if rows.is_empty() {
        tracing::warn!(table, "received empty upload");
        return true;
    }
    false
}

fn range_values<K: Ord + Copy, V: Clone>(
    table: &BTreeMap<K, V>,
    start: K,
    end: K,
) -> Vec<V> {
    if start > end {
        return Vec::new();
    }
    table.range(start..=end).map(|(_, v)| v.clone()).collect()
}

impl Store for MemoryStore {
    fn wind_samples(&self, start: Timestamp, end: Timestamp) -> Result<Vec<RawWindSample>, StoreError> {
        Ok(range_values(&self.wind, start, end)
            .into_iter()
            .rev()
            .filter(|s| s.end_ts <= end)
            .collect())
    }

    fn histogram_buckets(&self, min_id: i64, max_id: i64) -> Result<Vec<HistogramBucket>, StoreError> {
        Ok(range_values(&self.histogram, min_id, max_id).into_iter().rev().collect())
    }

    fn temperature(&self, start: Timestamp, end: Timestamp) -> Result<Vec<TempReading>, StoreError> {
        Ok(range_values(&self.temperature, start, end))
    }

    fn temp_hum(&self, start: Timestamp, end: Timestamp) -> Result<Vec<TempHumReading>, StoreError> {
        Ok(range_values(&self.temp_hum, start, end))
    }

    fn adc(&self, start: Timestamp, end: Timestamp) -> Result<Vec<AdcReading>, StoreError> {
        Ok(range_values(&self.adc, (start, 0), (end, u32::MAX)))
    }

    fn link_status(&self, start: Timestamp, end: Timestamp) -> Result<Vec<LinkStatus>, StoreError> {
        Ok(range_values(&self.link, start, end))
    }

    fn latest_link_status(&self, at: Timestamp) -> Result<Option<LinkStatus>, StoreError> {
        Ok(self.link.range(..=at).next_back().map(|(_, v)| v.clone()))
    }

    fn upload_meta(&self, start: Timestamp, end: Timestamp) -> Result<Vec<UploadMeta>, StoreError> {
        Ok(range_values(&self.meta, start, end))
    }

    fn door_events(&self, start: Timestamp, end: Timestamp) -> Result<Vec<DoorEvent>, StoreError> {
        Ok(range_values(&self.door, start, end))
    }

    fn pilot_counts(&self, start: Timestamp, end: Timestamp) -> Result<Vec<PilotCount>, StoreError> {
        Ok(range_values(&self.pilots, start, end))
    }

    fn pilot_count_before(&self, before: Timestamp) -> Result<Option<PilotCount>, StoreError> {
        Ok(self.pilots.range(..before).next_back().map(|(_, v)| *v))
    }
}

/// On-disk layout: one list of rows per table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Snapshot {
    wind: Vec<RawWindSample>,
    histogram: Vec<HistogramBucket>,
    temperature: Vec<TempReading>,
    temp_hum: Vec<TempHumReading>,
    adc: Vec<AdcReading>,
    link: Vec<LinkStatus>,
    meta: Vec<UploadMeta>,
    door: Vec<DoorEvent>,
    pilots: Vec<PilotCount>,
}

impl From<Snapshot> for MemoryStore {
    fn from(s: Snapshot) -> Self {
        let next_histogram_id = s.histogram.iter().map(|b| b.id + 1).max().unwrap_or(1);
        Self {
            wind: s.wind.into_iter().map(|r| (r.start_ts, r)).collect(),
            histogram: s.histogram.into_iter().map(|r| (r.id, r)).collect(),
            next_histogram_id,
            temperature: s.temperature.into_iter().map(|r| (r.ts, r)).collect(),
            temp_hum: s.temp_hum.into_iter().map(|r| (r.ts, r)).collect(),
            adc: s.adc.into_iter().map(|r| ((r.ts, r.channel), r)).collect(),
            link: s.link.into_iter().map(|r| (r.ts, r)).collect(),
            meta: s.meta.into_iter().map(|r| (r.ts, r)).collect(),
            door: s.door.into_iter().map(|r| (r.ts, r)).collect(),
            pilots: s.pilots.into_iter().map(|r| (r.ts, r)).collect(),
        }
    }
}

impl From<MemoryStore> for Snapshot {
    fn from(m: MemoryStore) -> Self {
        Self {
            wind: m.wind.into_values().collect(),
            histogram: m.histogram.into_values().collect(),
            temperature: m.temperature.into_values().collect(),
            temp_hum: m.temp_hum.into_values().collect(),
            adc: m.adc.into_values().collect(),
            link: m.link.into_values().collect(),
            meta: m.meta.into_values().collect(),
            door: m.door.into_values().collect(),
            pilots: m.pilots.into_values().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(start_ts: i64, end_ts: i64, hist: &[(i32, f64)]) -> WindUpload {
        WindUpload {
            start_ts,
            end_ts,
            avg: 10.0,
            max: 20.0,
            max_ts: start_ts,
            hist: hist.iter().copied().collect(),
        }
    }

    #[test]
    fn test_wind_query_order_and_bounds() {
        let mut store = MemoryStore::new();
        store.upsert_wind(&[
            upload(0, 1000, &[(1, 100.0)]),
            upload(1000, 2000, &[(2, 100.0)]),
            upload(2000, 3000, &[(3, 100.0)]),
        ]);

        let rows = store.wind_samples(0, 2999).unwrap();
        let starts: Vec<_> = rows.iter().map(|s| s.start_ts).collect();
        assert_eq!(starts, vec![1000, 0]);

        let rows = store.wind_samples(500, 3000).unwrap();
        let starts: Vec<_> = rows.iter().map(|s| s.start_ts).collect();
        assert_eq!(starts, vec![2000, 1000]);
    }

    #[test]
    fn test_retransmission_replaces_wind_but_orphans_histogram() {
        let mut store = MemoryStore::new();
        let batch = vec![upload(0, 1000, &[(1, 40.0), (2, 60.0)])];
        assert_eq!(store.upsert_wind(&batch), 1000);
        assert_eq!(store.upsert_wind(&batch), 1000);

        assert_eq!(store.wind_len(), 1);
        assert_eq!(store.histogram_len(), 4);

        let sample = &store.wind_samples(0, 1000).unwrap()[0];
        assert_eq!(sample.histogram_id, 3);
        assert_eq!(sample.bucket_count, 2);

        let ids: Vec<_> = store
            .histogram_buckets(1, 4)
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_empty_upload_returns_zero() {
        let mut store = MemoryStore::new();
        assert_eq!(store.upsert_wind(&[]), 0);
        assert_eq!(store.wind_len(), 0);
    }

    #[test]
    fn test_sample_without_histogram_is_skipped() {
        let mut store = MemoryStore::new();
        let end = store.upsert_wind(&[upload(0, 1000, &[]), upload(1000, 2000, &[(4, 100.0)])]);
        assert_eq!(end, 2000);
        assert_eq!(store.wind_len(), 1);
        assert_eq!(store.histogram_len(), 1);

        let rows = store.wind_samples(0, 2000).unwrap();
        assert_eq!(rows[0].start_ts, 1000);
        assert_eq!(rows[0].histogram_id, 1);
        assert_eq!(rows[0].bucket_count, 1);
    }

    #[test]
    fn test_prune() {
        let mut store = MemoryStore::new();
        store.upsert_wind(&[
            upload(0, 1000, &[(1, 100.0)]),
            upload(1000, 2000, &[(2, 50.0), (3, 50.0)]),
        ]);
        store.upsert_temperature(&[TempReading { ts: 10, t: 40.0 }, TempReading { ts: 1500, t: 41.0 }]);
        store.upsert_adc(&[
            AdcReading { ts: 10, channel: 0, value: 1.0 },
            AdcReading { ts: 1500, channel: 1, value: 2.0 },
        ]);

        store.prune(1000);
        assert_eq!(store.wind_len(), 1);
        assert_eq!(store.histogram_len(), 2);
        assert_eq!(store.temperature(0, 5000).unwrap().len(), 1);
        assert_eq!(store.adc(0, 5000).unwrap().len(), 1);

        store.prune(5000);
        assert_eq!(store.wind_len(), 0);
        assert_eq!(store.histogram_len(), 0);
    }

    #[test]
    fn test_temp_hum_skips_missing_values() {
        let mut store = MemoryStore::new();
        store.upsert_temp_hum(&[
            TempHumReading { ts: 1, t: 20.0, h: 50.0 },
            TempHumReading { ts: 2, t: f64::NAN, h: 50.0 },
        ]);
        assert_eq!(store.temp_hum(0, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_lookups_before() {
        let mut store = MemoryStore::new();
        store.upsert_pilots(&[PilotCount { ts: 100, count: 3 }, PilotCount { ts: 200, count: 5 }]);
        assert_eq!(store.pilot_count_before(200).unwrap(), Some(PilotCount { ts: 100, count: 3 }));
        assert_eq!(store.pilot_count_before(100).unwrap(), None);
    }

    #[test]
    fn test_snapshot_file_keeps_histogram_counter() {
        let path = std::env::temp_dir().join(format!(
            "anemometer-stats-store-test-{}.json",
            std::process::id()
        ));
        let mut store = MemoryStore::new();
        store.upsert_wind(&[upload(0, 1000, &[(1, 100.0), (2, 0.0)])]);
        store.save(&path).unwrap();

        let mut loaded = MemoryStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.insert_histogram(&[(5, 1.0)].into_iter().collect()), 3);
        let _ = std::fs::remove_file(&path);
    }
}
