// --- File: crates/convene_scheduling/src/lib.rs ---
//! Finding meeting times across participants' external calendars.
//!
//! Data flows through the modules in this order: [`credentials`] resolves a
//! usable access token per participant, [`aggregator`] fetches busy time for
//! all participants concurrently, [`merge`] collapses it into one busy set,
//! [`candidates`] enumerates slots on a 30-minute grid, and [`scoring`] drops
//! busy slots and ranks the rest. [`service`] ties them together.

pub mod aggregator;
pub mod candidates;
pub mod credentials;
pub mod error;
pub mod merge;
#[cfg(test)]
mod merge_proptest;
pub mod models;
pub mod scoring;
pub mod service;

pub use aggregator::{Aggregation, Aggregator};
pub use credentials::{AccessCredential, CredentialResolver};
pub use error::{CredentialError, SchedulingError};
pub use merge::{merge_intervals, MergedBusy};
pub use models::*;
pub use service::SchedulingService;
