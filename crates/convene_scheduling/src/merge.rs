// --- File: crates/convene_scheduling/src/merge.rs ---
use chrono::{DateTime, Utc};
use convene_common::models::BusyInterval;

/// Collapse busy intervals into a sorted, non-overlapping set covering the
/// same time. Touching intervals are joined; zero-length and inverted ones
/// are dropped.
pub fn merge_intervals(intervals: impl IntoIterator<Item = BusyInterval>) -> Vec<BusyInterval> {
    let mut sorted: Vec<BusyInterval> = intervals
        .into_iter()
        .filter(|interval| interval.end > interval.start)
        .collect();
    sorted.sort_by_key(|interval| interval.start);

    let mut merged: Vec<BusyInterval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match merged.last_mut() {
            Some(current) if interval.start <= current.end => {
                if interval.end > current.end {
                    current.end = interval.end;
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Merged busy time of a group, searchable by binary search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedBusy(Vec<BusyInterval>);

impl MergedBusy {
    pub fn new(intervals: impl IntoIterator<Item = BusyInterval>) -> Self {
        Self(merge_intervals(intervals))
    }

    pub fn as_slice(&self) -> &[BusyInterval] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `[start, end)` overlaps any busy interval. Back-to-back
    /// meetings do not overlap.
    pub fn overlaps_any(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        // First interval that ends after `start`; sorted ends make this monotone.
        let idx = self.0.partition_point(|interval| interval.end <= start);
        self.0
            .get(idx)
            .map(|interval| interval.start < end)
            .unwrap_or(false)
    }
}

impl From<Vec<BusyInterval>> for MergedBusy {
    fn from(intervals: Vec<BusyInterval>) -> Self {
        Self::new(intervals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0).unwrap()
    }

    fn iv(from: (u32, u32), to: (u32, u32)) -> BusyInterval {
        BusyInterval::new(at(from.0, from.1), at(to.0, to.1))
    }

    #[test]
    fn overlapping_and_touching_intervals_are_joined() {
        let merged = merge_intervals(vec![
            iv((13, 0), (14, 0)),
            iv((9, 0), (10, 0)),
            iv((9, 30), (11, 0)),
            iv((11, 0), (11, 30)),
        ]);
        assert_eq!(merged, vec![iv((9, 0), (11, 30)), iv((13, 0), (14, 0))]);
    }

    #[test]
    fn contained_interval_does_not_shrink_the_outer_one() {
        let merged = merge_intervals(vec![iv((9, 0), (12, 0)), iv((10, 0), (10, 30))]);
        assert_eq!(merged, vec![iv((9, 0), (12, 0))]);
    }

    #[test]
    fn empty_and_inverted_intervals_are_dropped() {
        let merged = merge_intervals(vec![
            BusyInterval::new(at(9, 0), at(9, 0)),
            BusyInterval::new(at(11, 0), at(10, 0)),
        ]);
        assert!(merged.is_empty());
        assert!(merge_intervals(Vec::new()).is_empty());
    }

    #[test]
    fn overlap_lookup_is_half_open() {
        let busy = MergedBusy::new(vec![iv((9, 0), (10, 0)), iv((14, 0), (15, 0))]);

        assert!(!busy.overlaps_any(at(8, 0), at(9, 0)));
        assert!(!busy.overlaps_any(at(10, 0), at(11, 0)));
        assert!(busy.overlaps_any(at(9, 30), at(10, 30)));
        assert!(busy.overlaps_any(at(8, 0), at(16, 0)));
        assert!(busy.overlaps_any(at(14, 15), at(14, 45)));
        assert!(!busy.overlaps_any(at(15, 0), at(16, 0)));
        assert!(!MergedBusy::default().overlaps_any(at(0, 0), at(23, 0)));
    }
}
