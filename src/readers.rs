//! Readers for the simple station series.
//!
//! These do not need sample selection or histogram merging: they read a
//! time range from the store and, where the series can grow long, bound it
//! with the series downsampler.

use crate::core::series_resample::{downsample_average, downsample_min_max};
use crate::core::types::{RangePoint, SeriesPoint, Timestamp};
use crate::store::{Store, StoreError};
use serde::Serialize;
use std::collections::BTreeMap;

/// Temperature and humidity series for the same interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempHumSeries {
    pub temperature: Vec<SeriesPoint>,
    pub humidity: Vec<SeriesPoint>,
}

/// Data volume transferred over the uplink within an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Traffic {
    pub start_ts: Timestamp,
    pub end_ts: Timestamp,
    pub upload: i64,
    pub download: i64,
}

/// CPU temperature, averaged down to `points`.
pub fn read_temperature<S: Store + ?Sized>(
    store: &S,
    start: Timestamp,
    end: Timestamp,
    points: usize,
) -> Result<Vec<SeriesPoint>, StoreError> {
    let series: BTreeMap<_, _> = store
        .temperature(start, end)?
        .into_iter()
        .map(|r| (r.ts, r.t))
        .collect();
    Ok(downsample_average(&series, points))
}

/// Ambient temperature and humidity, each averaged down to `points`.
pub fn read_temp_hum<S: Store + ?Sized>(
    store: &S,
    start: Timestamp,
    end: Timestamp,
    points: usize,
) -> Result<TempHumSeries, StoreError> {
    let rows = store.temp_hum(start, end)?;
    let temperature: BTreeMap<_, _> = rows.iter().map(|r| (r.ts, r.t)).collect();
    let humidity: BTreeMap<_, _> = rows.iter().map(|r| (r.ts, r.h)).collect();
    Ok(TempHumSeries {
        temperature: downsample_average(&temperature, points),
        humidity: downsample_average(&humidity, points),
    })
}

/// ADC values per channel, each channel averaged down to `points`
/// independently. Channels are returned in ascending order.
pub fn read_adc<S: Store + ?Sized>(
    store: &S,
    start: Timestamp,
    end: Timestamp,
    points: usize,
) -> Result<Vec<(u32, Vec<SeriesPoint>)>, StoreError> {
    let mut channels: BTreeMap<u32, BTreeMap<Timestamp, f64>> = BTreeMap::new();
    for reading in store.adc(start, end)? {
        channels
            .entry(reading.channel)
            .or_default()
            .insert(reading.ts, reading.value);
    }
    Ok(channels
        .into_iter()
        .map(|(channel, series)| (channel, downsample_average(&series, points)))
        .collect())
}

/// Uplink signal strength, averaged down to `points`.
pub fn read_signal_strength<S: Store + ?Sized>(
    store: &S,
    start: Timestamp,
    end: Timestamp,
    points: usize,
) -> Result<Vec<SeriesPoint>, StoreError> {
    let series: BTreeMap<_, _> = store
        .link_status(start, end)?
        .into_iter()
        .map(|r| (r.ts, f64::from(r.strength)))
        .collect();
    Ok(downsample_average(&series, points))
}

/// How far the newest uploaded wind data lags behind the server clock.
///
/// Right before each upload the lag has grown to its largest value, so a
/// point is synthesized 1ms earlier carrying that value. The series is
/// closed at `end` with the lag accumulated since the last upload. Ranges
/// are kept per bucket so spikes survive downsampling.
pub fn read_lag<S: Store + ?Sized>(
    store: &S,
    start: Timestamp,
    end: Timestamp,
    points: usize,
) -> Result<Vec<RangePoint>, StoreError> {
    let mut lag: BTreeMap<Timestamp, f64> = BTreeMap::new();
    let mut previous_upto: Option<Timestamp> = None;
    // Uploads without wind samples report upto = 0; they say nothing about lag.
    for meta in store.upload_meta(start, end)?.into_iter().filter(|m| m.upto != 0) {
        if let Some(upto) = previous_upto {
            lag.insert(meta.ts - 1, (meta.ts - upto) as f64);
        }
        lag.insert(meta.ts, (meta.ts - meta.upto) as f64);
        previous_upto = Some(meta.upto);
    }
    if let Some(upto) = previous_upto {
        lag.insert(end, (end - upto) as f64);
    }
    Ok(downsample_min_max(&lag, points))
}

/// Door state changes, assuming the door was closed before `start`.
///
/// The first point is at `start` and the last at `end`, repeating the final
/// state so the series spans the whole interval.
pub fn read_door<S: Store + ?Sized>(
    store: &S,
    start: Timestamp,
    end: Timestamp,
) -> Result<Vec<(Timestamp, bool)>, StoreError> {
    let mut door = BTreeMap::new();
    door.insert(start, false);
    let mut previous = false;
    for event in store.door_events(start, end)? {
        if event.open == previous {
            continue;
        }
        door.insert(event.ts, event.open);
        previous = event.open;
    }
    door.insert(end, previous);
    Ok(door.into_iter().collect())
}

/// Pilot count over time as a step series from `start` to `end`.
///
/// The value at `start` is the last count recorded before the interval,
/// or 0 if there is none.
pub fn read_pilots<S: Store + ?Sized>(
    store: &S,
    start: Timestamp,
    end: Timestamp,
) -> Result<Vec<(Timestamp, u32)>, StoreError> {
    let mut count = store.pilot_count_before(start)?.map_or(0, |p| p.count);
    let mut pilots = BTreeMap::new();
    pilots.insert(start, count);
    for row in store.pilot_counts(start, end)? {
        count = row.count;
        pilots.insert(row.ts.max(start), count);
    }
    pilots.insert(end, count);
    Ok(pilots.into_iter().collect())
}

/// Number of link status reports per network type.
pub fn read_network_types<S: Store + ?Sized>(
    store: &S,
    start: Timestamp,
    end: Timestamp,
) -> Result<BTreeMap<String, u64>, StoreError> {
    let mut counts = BTreeMap::new();
    for row in store.link_status(start, end)? {
        *counts.entry(row.nwtype).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Upload and download volume between the reports closest to the interval
/// bounds.
pub fn read_traffic<S: Store + ?Sized>(
    store: &S,
    start: Timestamp,
    end: Timestamp,
) -> Result<Traffic, StoreError> {
    let Some(last) = store.latest_link_status(end)? else {
        return Ok(Traffic {
            start_ts: start,
            end_ts: end,
            upload: 0,
            download: 0,
        });
    };
    let mut traffic = Traffic {
        start_ts: start,
        end_ts: last.ts,
        upload: last.upload,
        download: last.download,
    };
    if let Some(first) = store.latest_link_status(start)? {
        traffic.start_ts = first.ts;
        traffic.upload -= first.upload;
        traffic.download -= first.download;
    }
    Ok(traffic)
}
