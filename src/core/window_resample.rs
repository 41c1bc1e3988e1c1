//! Resampling of variable-duration wind samples into equal-width windows.
//!
//! Averages are weighted by how much of each sample overlaps a window.
//! Maxima are attributed to the window containing the sample's midpoint,
//! since a sample's maximum could have occurred anywhere inside it.

use crate::core::types::{OutputWindow, RawWindSample};

#[derive(Debug, Default)]
struct WindowAccumulator {
    weighted_sum: f64,
    overlap: f64,
    max: Option<f64>,
}

impl WindowAccumulator {
    fn add(&mut self, sample: &RawWindSample, start: f64, end: f64) {
        let overlap = end.min(sample.end_ts as f64) - start.max(sample.start_ts as f64);
        if overlap <= 0.0 {
            return;
        }
        self.overlap += overlap;
        self.weighted_sum += sample.avg * overlap;

        let center = (sample.start_ts as f64 + sample.end_ts as f64) / 2.0;
        if start <= center && center < end {
            self.max = Some(self.max.map_or(sample.max, |m| m.max(sample.max)));
        }
    }

    /// Close the window. Windows without any overlap produce no output.
    fn finish(self, start: f64, end: f64) -> Option<OutputWindow> {
        if self.overlap <= 0.0 {
            return None;
        }
        let avg = self.weighted_sum / self.overlap;
        Some(OutputWindow {
            center_ts: ((start + end) / 2.0).round() as i64,
            avg,
            // No midpoint fell in this window; the average stands in for the max.
            max: self.max.unwrap_or(avg),
        })
    }
}

/// Resample chronologically ordered samples into at most `output_len`
/// equal-width windows spanning the first start to the last end.
///
/// With no more samples than `output_len`, every sample is returned as
/// `(midpoint, avg, max)` unchanged.
pub fn resample_windows(samples: &[RawWindSample], output_len: usize) -> Vec<OutputWindow> {
    if output_len == 0 {
        return Vec::new();
    }
    if samples.len() <= output_len {
        return samples
            .iter()
            .map(|s| OutputWindow {
                center_ts: s.center(),
                avg: s.avg,
                max: s.max,
            })
            .collect();
    }

    let output: Vec<OutputWindow> = accumulate_windows(samples, output_len)
        .into_iter()
        .filter_map(|(start, end, acc)| acc.finish(start, end))
        .collect();

    tracing::debug!(
        input = samples.len(),
        output = output.len(),
        "resampled wind time series"
    );
    output
}

/// Split the span of `samples` into `output_len` windows and accumulate
/// every sample into the windows it overlaps.
fn accumulate_windows(
    samples: &[RawWindSample],
    output_len: usize,
) -> Vec<(f64, f64, WindowAccumulator)> {
    let Some(first) = samples.first() else {
        return Vec::new();
    };
    let first_ts = first.start_ts as f64;
    let last_ts = samples.iter().map(|s| s.end_ts).max().unwrap_or(first.end_ts) as f64;
    let width = (last_ts - first_ts) / output_len as f64;

    let mut windows = Vec::with_capacity(output_len);
    let mut cursor = 0;
    let mut start = first_ts;
    for k in 0..output_len {
        // Pin the last edge so rounding never cuts off the newest sample.
        let end = if k + 1 == output_len {
            last_ts
        } else {
            first_ts + width * (k + 1) as f64
        };
        while cursor < samples.len() && samples[cursor].end_ts as f64 <= start {
            cursor += 1;
        }

        let mut acc = WindowAccumulator::default();
        for sample in samples[cursor..]
            .iter()
            .take_while(|s| (s.start_ts as f64) < end)
        {
            acc.add(sample, start, end);
        }
        windows.push((start, end, acc));
        start = end;
    }
    windows
}
