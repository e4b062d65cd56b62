//! Reminder dispatch results

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::Error;

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" | "mail" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            other => Err(Error::validation(format!("Unknown channel: {}", other))),
        }
    }
}

/// Outcome of one send attempt on one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub success: bool,
    pub message: String,
}

impl DeliveryStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Result of processing one record
///
/// A channel status is `None` when the channel was not requested or the
/// record has no address for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowOutcome {
    pub row_index: usize,
    pub kontrahent: String,
    pub nr_faktury: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<DeliveryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms: Option<DeliveryStatus>,
}

impl RowOutcome {
    pub fn status(&self, channel: Channel) -> Option<&DeliveryStatus> {
        match channel {
            Channel::Email => self.email.as_ref(),
            Channel::Sms => self.sms.as_ref(),
        }
    }

    /// Whether any attempted channel failed
    pub fn has_failure(&self) -> bool {
        [&self.email, &self.sms]
            .iter()
            .any(|s| s.as_ref().map_or(false, |s| !s.success))
    }
}

/// Summary of one dispatch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReport {
    pub run_id: Uuid,
    pub test_mode: bool,
    pub started_at: DateTime<Utc>,
    pub results: Vec<RowOutcome>,
}

impl DispatchReport {
    pub fn new(test_mode: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            test_mode,
            started_at: Utc::now(),
            results: Vec::new(),
        }
    }

    pub fn sent(&self, channel: Channel) -> usize {
        self.count(channel, true)
    }

    pub fn failed(&self, channel: Channel) -> usize {
        self.count(channel, false)
    }

    fn count(&self, channel: Channel, success: bool) -> usize {
        self.results
            .iter()
            .filter_map(|r| r.status(channel))
            .filter(|s| s.success == success)
            .count()
    }
}
