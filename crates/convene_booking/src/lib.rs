//! Booking requests: a guest proposes a window, the host accepts or declines
//! it through a signed link, and an accepted request becomes a calendar event.

pub mod approval;
pub mod error;
pub mod models;
pub mod notifications;
pub mod service;

pub use approval::{ApprovalClaims, ApprovalTokens, APPROVAL_PURPOSE};
pub use error::BookingError;
pub use models::{ApprovalLinks, Decision, ProposeBooking};
pub use notifications::{spawn_notification_worker, BookingNotification, NotificationDispatcher};
pub use service::BookingService;
