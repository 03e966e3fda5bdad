// --- File: crates/convene_scheduling/src/scoring.rs ---
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use std::cmp::Reverse;

use crate::merge::MergedBusy;
use crate::models::{CandidateSlot, ScoredSlot, TimePreference};

const BASE_SCORE: i32 = 50;
const PREFERENCE_BONUS: i32 = 30;
const CONVENTIONAL_HOUR_BONUS: i32 = 20;
const CONVENTIONAL_HOURS: [u32; 4] = [9, 10, 14, 15];

/// Whether a local start hour falls in the band used to narrow results.
pub fn in_preference_band(preference: TimePreference, hour: u32) -> bool {
    match preference {
        TimePreference::Morning => (6..12).contains(&hour),
        TimePreference::Afternoon => (12..18).contains(&hour),
        TimePreference::Evening => (18..23).contains(&hour),
    }
}

/// The narrower band that earns the score bonus. Evening earns none.
fn in_bonus_band(preference: TimePreference, hour: u32) -> bool {
    match preference {
        TimePreference::Morning => (8..12).contains(&hour),
        TimePreference::Afternoon => (13..18).contains(&hour),
        TimePreference::Evening => false,
    }
}

fn weekday_bonus(day: Weekday) -> i32 {
    match day {
        Weekday::Mon | Weekday::Tue | Weekday::Wed => 15,
        Weekday::Thu | Weekday::Fri => 10,
        Weekday::Sat | Weekday::Sun => 0,
    }
}

fn proximity_bonus(now: DateTime<Utc>, start: DateTime<Utc>) -> i32 {
    match (start - now).num_days() {
        d if d <= 3 => 10,
        d if d <= 7 => 5,
        _ => 0,
    }
}

/// Parameters for filtering and ranking one search's candidates.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub now: DateTime<Utc>,
    pub timezone: Tz,
    pub preference: Option<TimePreference>,
    pub available_count: usize,
    pub total_participants: usize,
    pub limit: usize,
}

impl Ranking {
    pub fn score(&self, slot: &CandidateSlot) -> i32 {
        let local = slot.start.with_timezone(&self.timezone);
        let hour = local.hour();

        let mut score = BASE_SCORE;
        if self.preference.is_some_and(|p| in_bonus_band(p, hour)) {
            score += PREFERENCE_BONUS;
        }
        if CONVENTIONAL_HOURS.contains(&hour) {
            score += CONVENTIONAL_HOUR_BONUS;
        }
        score += weekday_bonus(local.weekday());
        score += proximity_bonus(self.now, slot.start);
        score
    }

    fn matches_preference(&self, slot: &ScoredSlot) -> bool {
        self.preference.map_or(true, |p| {
            in_preference_band(p, slot.start.with_timezone(&self.timezone).hour())
        })
    }

    /// Drop candidates overlapping `busy`, score the rest, narrow to the
    /// preferred band when that leaves anything, and return the best `limit`
    /// by score with ties going to the earlier start.
    pub fn rank(
        &self,
        candidates: impl IntoIterator<Item = CandidateSlot>,
        busy: &MergedBusy,
    ) -> Vec<ScoredSlot> {
        let free: Vec<ScoredSlot> = candidates
            .into_iter()
            .filter(|slot| !busy.overlaps_any(slot.start, slot.end))
            .map(|slot| ScoredSlot {
                start: slot.start,
                end: slot.end,
                score: self.score(&slot),
                available_count: self.available_count,
                total_participants: self.total_participants,
            })
            .collect();

        let mut ranked = if self.preference.is_some() && free.iter().any(|s| self.matches_preference(s)) {
            free.into_iter()
                .filter(|s| self.matches_preference(s))
                .collect()
        } else {
            free
        };

        ranked.sort_by_key(|s| (Reverse(s.score), s.start));
        ranked.truncate(self.limit);
        ranked
    }
}
