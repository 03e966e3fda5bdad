//! In-process calendar provider for tests.
//!
//! Busy data, refresh results and event results are scripted per account, and
//! every call is recorded so tests can assert on what was sent.

use chrono::{DateTime, Utc};
use convene_common::models::{BusyInterval, CreatedEvent, NewCalendarEvent, TokenGrant};
use convene_common::services::{BoxFuture, CalendarProvider};
use convene_common::ProviderError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::GOOGLE_PROVIDER;

pub const REFRESHED_TOKEN: &str = "refreshed-access-token";

#[derive(Debug, Default)]
pub struct ScriptedCalendarProvider {
    busy: Mutex<HashMap<String, Result<Vec<BusyInterval>, ProviderError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    refresh_result: Mutex<Option<Result<TokenGrant, ProviderError>>>,
    event_result: Mutex<Option<Result<CreatedEvent, ProviderError>>>,
    refresh_calls: AtomicUsize,
    busy_calls: Mutex<Vec<(String, String)>>,
    created_events: Mutex<Vec<NewCalendarEvent>>,
}

impl ScriptedCalendarProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_busy(self, account: &str, busy: Vec<BusyInterval>) -> Self {
        if let Ok(mut map) = self.busy.lock() {
            map.insert(account.to_string(), Ok(busy));
        }
        self
    }

    pub fn with_busy_error(self, account: &str, error: ProviderError) -> Self {
        if let Ok(mut map) = self.busy.lock() {
            map.insert(account.to_string(), Err(error));
        }
        self
    }

    /// Delay free/busy answers for `account`.
    pub fn with_delay(self, account: &str, delay: Duration) -> Self {
        if let Ok(mut map) = self.delays.lock() {
            map.insert(account.to_string(), delay);
        }
        self
    }

    pub fn with_refresh_result(self, result: Result<TokenGrant, ProviderError>) -> Self {
        if let Ok(mut slot) = self.refresh_result.lock() {
            *slot = Some(result);
        }
        self
    }

    pub fn with_event_result(self, result: Result<CreatedEvent, ProviderError>) -> Self {
        if let Ok(mut slot) = self.event_result.lock() {
            *slot = Some(result);
        }
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// `(access_token, account)` for every free/busy call.
    pub fn busy_calls(&self) -> Vec<(String, String)> {
        self.busy_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn created_events(&self) -> Vec<NewCalendarEvent> {
        self.created_events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl CalendarProvider for ScriptedCalendarProvider {
    fn provider_name(&self) -> &'static str {
        GOOGLE_PROVIDER
    }

    fn refresh_access_token(&self, _refresh_token: &str) -> BoxFuture<'_, TokenGrant, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .refresh_result
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .unwrap_or_else(|| {
                Ok(TokenGrant {
                    access_token: REFRESHED_TOKEN.to_string(),
                    expires_in_secs: 3600,
                    refresh_token: None,
                })
            });
        Box::pin(async move { result })
    }

    fn get_busy_times(
        &self,
        access_token: &str,
        account: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<BusyInterval>, ProviderError> {
        if let Ok(mut calls) = self.busy_calls.lock() {
            calls.push((access_token.to_string(), account.to_string()));
        }
        let delay = self.delays.lock().ok().and_then(|d| d.get(account).copied());
        let result = self
            .busy
            .lock()
            .ok()
            .and_then(|map| map.get(account).cloned())
            .unwrap_or_else(|| Ok(Vec::new()));
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }

    fn create_event(
        &self,
        _access_token: &str,
        event: &NewCalendarEvent,
    ) -> BoxFuture<'_, CreatedEvent, ProviderError> {
        if let Ok(mut events) = self.created_events.lock() {
            events.push(event.clone());
        }
        let result = self
            .event_result
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .unwrap_or_else(|| {
                Ok(CreatedEvent {
                    event_id: "evt-1".to_string(),
                    meeting_link: Some("https://meet.google.com/abc-defg-hij".to_string()),
                })
            });
        Box::pin(async move { result })
    }
}
