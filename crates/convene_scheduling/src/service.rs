// --- File: crates/convene_scheduling/src/service.rs ---
use chrono::{DateTime, Duration, DurationRound, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use convene_common::services::{CalendarProvider, CredentialStore};
use convene_config::SchedulingConfig;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::candidates;
use crate::credentials::CredentialResolver;
use crate::error::SchedulingError;
use crate::merge::MergedBusy;
use crate::models::{
    CalendarConnection, FindSlotsRequest, FindSlotsResponse, FreeBusyOverview, OwnerBusy,
};
use crate::scoring::Ranking;

/// Entry point for availability search and free/busy lookups.
#[derive(Clone)]
pub struct SchedulingService {
    aggregator: Aggregator,
    resolver: Arc<CredentialResolver>,
    config: SchedulingConfig,
}

impl SchedulingService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn CalendarProvider>,
        config: SchedulingConfig,
    ) -> Self {
        let resolver = Arc::new(CredentialResolver::new(store, provider.clone(), &config));
        let aggregator = Aggregator::new(
            resolver.clone(),
            provider,
            config.max_parallel_fetches,
            std::time::Duration::from_secs(config.fetch_timeout_secs),
        );
        Self {
            aggregator,
            resolver,
            config,
        }
    }

    pub fn resolver(&self) -> Arc<CredentialResolver> {
        self.resolver.clone()
    }

    pub async fn find_available_slots(
        &self,
        request: &FindSlotsRequest,
    ) -> Result<FindSlotsResponse, SchedulingError> {
        self.find_available_slots_at(request, Utc::now()).await
    }

    /// Search for common free slots as seen from `now`.
    #[instrument(skip(self, request), fields(participants = request.participant_ids.len()))]
    pub async fn find_available_slots_at(
        &self,
        request: &FindSlotsRequest,
        now: DateTime<Utc>,
    ) -> Result<FindSlotsResponse, SchedulingError> {
        if request.participant_ids.is_empty() {
            return Err(SchedulingError::MalformedInput(
                "at least one participant is required".to_string(),
            ));
        }
        let duration_minutes = request
            .duration_minutes
            .unwrap_or(self.config.default_duration_minutes);
        if duration_minutes <= 0 {
            return Err(SchedulingError::MalformedInput(format!(
                "duration must be positive, got {} minutes",
                duration_minutes
            )));
        }
        let window = candidates::DayWindow::for_business_hours(
            request.preferences.business_hours_only,
        );
        if duration_minutes > window.length_minutes() {
            return Err(SchedulingError::MalformedInput(format!(
                "duration of {} minutes does not fit the {}:00-{}:00 window",
                duration_minutes, window.start_hour, window.end_hour
            )));
        }
        let days_ahead = request.days_ahead.unwrap_or(self.config.default_days_ahead);
        if days_ahead <= 0 || days_ahead > self.config.max_days_ahead {
            return Err(SchedulingError::MalformedInput(format!(
                "days ahead must be between 1 and {}, got {}",
                self.config.max_days_ahead, days_ahead
            )));
        }
        let tz = parse_timezone(
            request
                .preferences
                .timezone
                .as_deref()
                .unwrap_or(&self.config.default_timezone),
        )?;

        let search_start = search_start(now, request.start_date, tz);
        let search_end = search_start + Duration::days(days_ahead + 1);

        let mut seen = HashSet::new();
        let participants: Vec<Uuid> = request
            .participant_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        let total_participants = participants.len();

        let aggregation = self
            .aggregator
            .fetch_all(&participants, search_start, search_end)
            .await;

        let warning = (aggregation.disconnected_count() > 0).then(|| {
            format!(
                "{} participant(s) have not connected their calendar and were not included",
                aggregation.disconnected_count()
            )
        });

        let slots = if aggregation.connected.is_empty() {
            warn!("No participant calendar could be queried; returning no slots");
            Vec::new()
        } else {
            let busy = MergedBusy::new(
                aggregation
                    .connected
                    .iter()
                    .flat_map(|owner| owner.busy.iter().copied()),
            );
            let ranking = Ranking {
                now,
                timezone: tz,
                preference: request.preferences.time_preference,
                available_count: aggregation.connected_count(),
                total_participants,
                limit: self.config.max_results,
            };
            let candidates = candidates::generate(
                search_start,
                days_ahead,
                duration_minutes,
                request.preferences.business_hours_only,
                tz,
            );
            ranking.rank(candidates, &busy)
        };

        info!(
            "Found {} slots for {} participants ({} connected)",
            slots.len(),
            total_participants,
            aggregation.connected_count()
        );

        Ok(FindSlotsResponse {
            slots,
            connected_count: aggregation.connected_count(),
            disconnected_count: aggregation.disconnected_count(),
            total_participants,
            disconnected_owners: aggregation.disconnected,
            warning,
            search_start,
            search_end,
        })
    }

    /// Busy intervals of a single owner. Credential and provider failures are
    /// returned to the caller.
    #[instrument(skip(self))]
    pub async fn get_free_busy(
        &self,
        owner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<OwnerBusy, SchedulingError> {
        validate_window(start, end)?;
        self.aggregator.fetch_one(owner_id, start, end).await
    }

    /// Calendars connected by `owner_id`.
    pub async fn list_connections(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<CalendarConnection>, SchedulingError> {
        Ok(self.resolver.connected_accounts(owner_id).await?)
    }

    /// Busy intervals of several owners; owners that cannot be queried are
    /// listed instead of failing the call.
    #[instrument(skip(self, owner_ids), fields(owners = owner_ids.len()))]
    pub async fn get_free_busy_many(
        &self,
        owner_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FreeBusyOverview, SchedulingError> {
        validate_window(start, end)?;
        if owner_ids.is_empty() {
            return Err(SchedulingError::MalformedInput(
                "at least one owner is required".to_string(),
            ));
        }
        let aggregation = self.aggregator.fetch_all(owner_ids, start, end).await;
        Ok(FreeBusyOverview {
            owners: aggregation.connected,
            disconnected_owners: aggregation.disconnected,
        })
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, SchedulingError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| SchedulingError::MalformedInput(format!("unknown timezone '{}'", name)))
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), SchedulingError> {
    if end <= start {
        return Err(SchedulingError::MalformedInput(format!(
            "window end {} is not after start {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        )));
    }
    Ok(())
}

/// The next full hour after `now`, or midnight of `start_date` in `tz` when
/// that is later.
fn search_start(now: DateTime<Utc>, start_date: Option<chrono::NaiveDate>, tz: Tz) -> DateTime<Utc> {
    let next_hour = now
        .duration_trunc(Duration::hours(1))
        .unwrap_or(now)
        + Duration::hours(1);

    start_date
        .and_then(|date| tz.from_local_datetime(&date.and_time(NaiveTime::MIN)).earliest())
        .map(|midnight| midnight.with_timezone(&Utc).max(next_hour))
        .unwrap_or(next_hour)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn utc(d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, h, mi, 0).unwrap()
    }

    #[test]
    fn search_starts_at_the_next_full_hour() {
        assert_eq!(search_start(utc(10, 9, 17), None, Tz::UTC), utc(10, 10, 0));
        assert_eq!(search_start(utc(10, 9, 0), None, Tz::UTC), utc(10, 10, 0));
    }

    #[test]
    fn start_date_is_clamped_to_the_next_hour() {
        let later = NaiveDate::from_ymd_opt(2025, 3, 12);
        assert_eq!(search_start(utc(10, 9, 17), later, Tz::UTC), utc(12, 0, 0));

        let past = NaiveDate::from_ymd_opt(2025, 3, 1);
        assert_eq!(search_start(utc(10, 9, 17), past, Tz::UTC), utc(10, 10, 0));

        let berlin: Tz = "Europe/Berlin".parse().unwrap();
        assert_eq!(search_start(utc(10, 9, 17), later, berlin), utc(11, 23, 0));
    }

    #[test]
    fn timezone_names_are_validated() {
        assert!(parse_timezone("Europe/Berlin").is_ok());
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(SchedulingError::MalformedInput(_))
        ));
    }
}
