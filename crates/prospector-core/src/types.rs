//! Data model for the outreach campaign.
//!
//! Records mirror the store schema one-to-one. Status enums carry their
//! wire/database string form via `as_str()` and `parse()`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single outreach relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Request sent, awaiting peer acceptance.
    Pending,
    /// Attempt in progress.
    Connecting,
    /// Terminal success; messaging enabled.
    Connected,
    /// Terminal but eligible for operator-gated retry.
    Failed,
    /// Terminal; not retried by the engine.
    Rejected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Failed => "failed",
            ConnectionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ConnectionStatus::Pending),
            "connecting" => Some(ConnectionStatus::Connecting),
            "connected" => Some(ConnectionStatus::Connected),
            "failed" => Some(ConnectionStatus::Failed),
            "rejected" => Some(ConnectionStatus::Rejected),
            _ => None,
        }
    }
}

/// Kind of message sent for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Initial,
    Followup,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Initial => "initial",
            MessageType::Followup => "followup",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initial" => Some(MessageType::Initial),
            "followup" => Some(MessageType::Followup),
            _ => None,
        }
    }
}

/// Lifecycle of a scheduled follow-up. Never resurrected once terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl FollowUpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpStatus::Pending => "pending",
            FollowUpStatus::Sent => "sent",
            FollowUpStatus::Failed => "failed",
            FollowUpStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(FollowUpStatus::Pending),
            "sent" => Some(FollowUpStatus::Sent),
            "failed" => Some(FollowUpStatus::Failed),
            "cancelled" => Some(FollowUpStatus::Cancelled),
            _ => None,
        }
    }
}

/// A prospection target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: i64,
    pub name: String,
    /// Canonical outreach URL, unique across all profiles.
    pub profile_url: String,
    pub company: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    /// Free-text, comma-separated tags.
    pub tags: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One outreach attempt/relationship for a profile. One row per profile;
/// re-processing reuses the existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: i64,
    pub profile_id: i64,
    pub status: ConnectionStatus,
    pub connected_at: Option<DateTime<Utc>>,
    /// The initial message, once sent.
    pub connection_message_id: Option<i64>,
    /// Operator-facing reason; cleared on each new successful attempt.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A unit of communication sent for a connection. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub connection_id: i64,
    pub content: String,
    pub message_type: MessageType,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A scheduled second-touch message tied to an initial message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpRecord {
    pub id: i64,
    pub message_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub status: FollowUpStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Extended profile details returned by the channel's enrichment scrape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub headline: Option<String>,
    pub current_company: Option<String>,
    pub about: Option<String>,
}

/// Singleton company context consumed by the message composer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyContext {
    pub company_name: Option<String>,
    pub company_description: Option<String>,
    pub value_proposition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            ConnectionStatus::Pending,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Failed,
            ConnectionStatus::Rejected,
        ] {
            assert_eq!(ConnectionStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ConnectionStatus::parse("bogus"), None);
    }

    #[test]
    fn followup_status_round_trips() {
        for s in [
            FollowUpStatus::Pending,
            FollowUpStatus::Sent,
            FollowUpStatus::Failed,
            FollowUpStatus::Cancelled,
        ] {
            assert_eq!(FollowUpStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn message_type_round_trips() {
        assert_eq!(MessageType::parse("initial"), Some(MessageType::Initial));
        assert_eq!(MessageType::parse("followup"), Some(MessageType::Followup));
        assert_eq!(MessageType::parse("reply"), None);
    }
}
