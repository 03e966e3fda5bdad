use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A host's answer to a booking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Decline,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Decline => "decline",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Decision::Accept),
            "decline" => Ok(Decision::Decline),
            other => Err(format!("unknown decision '{}'", other)),
        }
    }
}

/// A guest's proposal as received from the booking page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeBooking {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    /// IANA timezone the guest proposed in.
    #[serde(default)]
    pub timezone: Option<String>,
    pub guest_name: String,
    pub guest_email: String,
}

/// Links handed to the host for deciding a request without logging in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalLinks {
    pub accept_url: String,
    pub decline_url: String,
    pub expires_at: DateTime<Utc>,
}
