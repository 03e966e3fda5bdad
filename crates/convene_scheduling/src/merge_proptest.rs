use chrono::{DateTime, Duration, TimeZone, Utc};
use convene_common::models::BusyInterval;
use proptest::prelude::*;

use crate::merge::{merge_intervals, MergedBusy};

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap()
}

fn interval_strategy() -> impl Strategy<Value = BusyInterval> {
    (0i64..2_000, 0i64..240).prop_map(|(offset, len)| {
        let start = base() + Duration::minutes(offset);
        BusyInterval::new(start, start + Duration::minutes(len))
    })
}

fn covered(intervals: &[BusyInterval], minute: i64) -> bool {
    let t = base() + Duration::minutes(minute);
    intervals.iter().any(|i| i.start <= t && t < i.end)
}

proptest! {
    #[test]
    fn merged_output_is_sorted_and_disjoint(input in prop::collection::vec(interval_strategy(), 0..40)) {
        let merged = merge_intervals(input);
        for pair in merged.windows(2) {
            prop_assert!(pair[0].end < pair[1].start);
        }
        for interval in &merged {
            prop_assert!(interval.start < interval.end);
        }
    }

    #[test]
    fn merging_preserves_covered_time(input in prop::collection::vec(interval_strategy(), 0..40)) {
        let merged = merge_intervals(input.clone());
        for minute in (0..2_300).step_by(7) {
            prop_assert_eq!(covered(&input, minute), covered(&merged, minute));
        }
    }

    #[test]
    fn merging_is_idempotent(input in prop::collection::vec(interval_strategy(), 0..40)) {
        let once = merge_intervals(input);
        let twice = merge_intervals(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn overlap_lookup_agrees_with_linear_scan(
        input in prop::collection::vec(interval_strategy(), 0..30),
        query_offset in 0i64..2_300,
        query_len in 1i64..180,
    ) {
        let start = base() + Duration::minutes(query_offset);
        let end = start + Duration::minutes(query_len);
        let expected = input.iter().any(|i| i.start < i.end && i.overlaps(start, end));
        prop_assert_eq!(MergedBusy::new(input).overlaps_any(start, end), expected);
    }
}
