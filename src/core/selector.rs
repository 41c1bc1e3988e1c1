//! Best-fit selection of variable-duration wind samples.
//!
//! Samples arrive newest first. We keep taking older samples as long as
//! doing so does not move the covered duration further away from the
//! requested one.

use crate::core::types::{RawWindSample, Timestamp};

/// The samples chosen to represent a query interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Selected samples, newest first
    pub samples: Vec<RawWindSample>,
    /// Start of the oldest selected sample
    pub actual_start: Timestamp,
    /// End of the newest selected sample
    pub actual_end: Timestamp,
    /// Sum of the selected sample durations
    pub covered_duration: i64,
}

/// Select the newest-first prefix of `samples` whose summed duration best
/// approximates `target_duration`.
///
/// Returns `None` when `samples` is empty. Otherwise at least the newest
/// sample is selected.
pub fn select_window(samples: &[RawWindSample], target_duration: i64) -> Option<Selection> {
    let newest = samples.first()?;

    let mut covered = newest.duration();
    let mut count = 1;
    for sample in &samples[1..] {
        let extended = covered.saturating_add(sample.duration());
        let current_error = covered.abs_diff(target_duration);
        let extended_error = extended.abs_diff(target_duration);
        if current_error < extended_error {
            break;
        }
        covered = extended;
        count += 1;
    }

    let selected = samples[..count].to_vec();
    let actual_start = selected[count - 1].start_ts;
    tracing::debug!(
        selected = count,
        available = samples.len(),
        covered,
        target_duration,
        "selected wind samples"
    );

    Some(Selection {
        actual_start,
        actual_end: newest.end_ts,
        covered_duration: covered,
        samples: selected,
    })
}
