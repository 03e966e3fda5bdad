// --- File: crates/convene_gcal/src/lib.rs ---
//! Google Calendar implementation of [`convene_common::services::CalendarProvider`].
//!
//! Talks to the REST endpoints directly with `reqwest`, using per-user OAuth
//! access tokens supplied by the caller. Request and response bodies are
//! modelled in [`payloads`] and validated before they leave this crate.

pub mod auth;
pub mod payloads;
pub mod provider;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use provider::{GoogleCalendarProvider, GOOGLE_PROVIDER};
