// --- File: crates/convene_booking/src/notifications.rs ---
//! Booking notifications, queued after a state change and delivered by a
//! background worker so delivery never blocks or undoes a transition.

use chrono::{DateTime, Utc};
use convene_common::models::BookingRequest;
use convene_common::log_error;
use convene_common::services::NotificationService;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::ApprovalLinks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingNotification {
    /// To the host: a guest proposed a meeting.
    BookingRequested {
        host_email: String,
        request: BookingRequest,
        links: ApprovalLinks,
    },
    /// To the guest: the host accepted.
    BookingConfirmed { request: BookingRequest },
    /// To the guest: the host declined.
    BookingDeclined { request: BookingRequest },
}

fn format_window(request: &BookingRequest) -> String {
    match request.timezone.parse::<chrono_tz::Tz>() {
        Ok(tz) => format!(
            "{} - {} ({})",
            request.proposed_start.with_timezone(&tz).format("%A, %d %B %Y %H:%M"),
            request.proposed_end.with_timezone(&tz).format("%H:%M"),
            request.timezone
        ),
        Err(_) => format!(
            "{} - {} (UTC)",
            request.proposed_start.format("%A, %d %B %Y %H:%M"),
            request.proposed_end.format("%H:%M")
        ),
    }
}

fn format_expiry(expires_at: DateTime<Utc>) -> String {
    expires_at.format("%Y-%m-%d %H:%M UTC").to_string()
}

impl BookingNotification {
    pub fn recipient(&self) -> &str {
        match self {
            BookingNotification::BookingRequested { host_email, .. } => host_email,
            BookingNotification::BookingConfirmed { request }
            | BookingNotification::BookingDeclined { request } => &request.guest_email,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            BookingNotification::BookingRequested { request, .. } => {
                format!("New booking request from {}", request.guest_name)
            }
            BookingNotification::BookingConfirmed { request } => {
                format!("Confirmed: {}", request.title)
            }
            BookingNotification::BookingDeclined { request } => {
                format!("Declined: {}", request.title)
            }
        }
    }

    pub fn body(&self) -> String {
        match self {
            BookingNotification::BookingRequested { request, links, .. } => format!(
                "{} <{}> would like to meet.\n\n{}\n{}\n\nAccept: {}\nDecline: {}\n\nThese links expire at {}.",
                request.guest_name,
                request.guest_email,
                request.title,
                format_window(request),
                links.accept_url,
                links.decline_url,
                format_expiry(links.expires_at)
            ),
            BookingNotification::BookingConfirmed { request } => {
                let mut body = format!(
                    "Hello {},\n\nyour booking has been confirmed.\n\n{}\n{}",
                    request.guest_name,
                    request.title,
                    format_window(request)
                );
                if let Some(link) = &request.meeting_link {
                    body.push_str(&format!("\n\nJoin: {}", link));
                }
                body
            }
            BookingNotification::BookingDeclined { request } => format!(
                "Hello {},\n\nunfortunately your booking request could not be accepted.\n\n{}\n{}",
                request.guest_name,
                request.title,
                format_window(request)
            ),
        }
    }
}

/// Sending half of the notification queue.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<BookingNotification>,
}

impl NotificationDispatcher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BookingNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a notification. Never fails the caller; a closed queue is logged.
    pub fn dispatch(&self, notification: BookingNotification) {
        debug!("Queueing notification: {}", notification.subject());
        if self.tx.send(notification).is_err() {
            warn!("Notification worker is gone, dropping notification");
        }
    }
}

/// Deliver queued notifications until every dispatcher is dropped.
pub fn spawn_notification_worker(
    mut rx: mpsc::UnboundedReceiver<BookingNotification>,
    service: Arc<dyn NotificationService>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Notification worker started");
        while let Some(notification) = rx.recv().await {
            let subject = notification.subject();
            match service
                .send_email(notification.recipient(), &subject, &notification.body())
                .await
            {
                Ok(()) => debug!("Delivered notification '{}'", subject),
                Err(e) => log_error(e, &format!("Failed to deliver notification '{}'", subject)),
            }
        }
        info!("Notification worker stopped");
    })
}
