// --- File: crates/convene_scheduling/src/candidates.rs ---
//! Candidate slot enumeration on a fixed grid in a reference timezone.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::models::CandidateSlot;

pub const SLOT_GRID_MINUTES: i64 = 30;

/// Local `[start_hour, end_hour)` window in which slots may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

pub const BUSINESS_HOURS: DayWindow = DayWindow {
    start_hour: 8,
    end_hour: 18,
};

pub const EXTENDED_HOURS: DayWindow = DayWindow {
    start_hour: 6,
    end_hour: 23,
};

impl DayWindow {
    pub fn for_business_hours(business_hours_only: bool) -> Self {
        if business_hours_only {
            BUSINESS_HOURS
        } else {
            EXTENDED_HOURS
        }
    }

    fn start_minute(&self) -> i64 {
        i64::from(self.start_hour) * 60
    }

    fn end_minute(&self) -> i64 {
        i64::from(self.end_hour) * 60
    }

    /// Longest meeting that fits inside the window.
    pub fn length_minutes(&self) -> i64 {
        self.end_minute() - self.start_minute()
    }
}

pub fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Enumerate candidate slots for `days_ahead` calendar days starting at the
/// local date of `start_from` in `tz`. Weekends are skipped, and slots that
/// start before `start_from` or end after the window closes are not emitted.
///
/// The sequence is lazy and a pure function of its arguments; calling this
/// again with the same inputs yields the same slots.
pub fn generate(
    start_from: DateTime<Utc>,
    days_ahead: i64,
    duration_minutes: i64,
    business_hours_only: bool,
    tz: Tz,
) -> CandidateSlots {
    let first_day = start_from.with_timezone(&tz).date_naive();
    let end_day = if duration_minutes <= 0 || days_ahead <= 0 {
        first_day
    } else {
        first_day
            .checked_add_signed(Duration::days(days_ahead))
            .unwrap_or(NaiveDate::MAX)
    };

    CandidateSlots {
        tz,
        start_from,
        window: DayWindow::for_business_hours(business_hours_only),
        duration_minutes,
        day: first_day,
        end_day,
        offset_minutes: 0,
    }
}

#[derive(Debug, Clone)]
pub struct CandidateSlots {
    tz: Tz,
    start_from: DateTime<Utc>,
    window: DayWindow,
    duration_minutes: i64,
    day: NaiveDate,
    end_day: NaiveDate,
    offset_minutes: i64,
}

impl CandidateSlots {
    fn next_day(&mut self) -> bool {
        self.offset_minutes = 0;
        match self.day.succ_opt() {
            Some(next) => {
                self.day = next;
                true
            }
            None => false,
        }
    }
}

impl Iterator for CandidateSlots {
    type Item = CandidateSlot;

    fn next(&mut self) -> Option<CandidateSlot> {
        while self.day < self.end_day {
            if is_weekend(self.day) {
                if !self.next_day() {
                    return None;
                }
                continue;
            }

            let start_minute = self.window.start_minute() + self.offset_minutes;
            let fits = start_minute
                .checked_add(self.duration_minutes)
                .is_some_and(|end_minute| end_minute <= self.window.end_minute());
            if !fits {
                if !self.next_day() {
                    return None;
                }
                continue;
            }
            self.offset_minutes += SLOT_GRID_MINUTES;

            let Some(local_start) = u32::try_from(start_minute)
                .ok()
                .and_then(|m| self.day.and_hms_opt(m / 60, m % 60, 0))
            else {
                continue;
            };
            // Wall-clock times skipped by a DST jump have no instant.
            let Some(start) = self.tz.from_local_datetime(&local_start).earliest() else {
                continue;
            };
            let start = start.with_timezone(&Utc);
            if start < self.start_from {
                continue;
            }

            let Some(end) = Duration::try_minutes(self.duration_minutes)
                .and_then(|duration| start.checked_add_signed(duration))
            else {
                continue;
            };
            return Some(CandidateSlot { start, end });
        }
        None
    }
}
