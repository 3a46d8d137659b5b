//! Billable session data models.
//!
//! Voice and video coaching sessions share one entity and one state
//! machine; the `kind` discriminator replaces the per-kind tables of
//! earlier schema revisions.

use crate::wallet::models::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Voice,
    Video,
}

impl SessionKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "voice" => Some(SessionKind::Voice),
            "video" => Some(SessionKind::Video),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKind::Voice => write!(f, "voice"),
            SessionKind::Video => write!(f, "video"),
        }
    }
}

/// Voice coaching delivery mode, priced differently per minute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceMode {
    Standard,
    Realtime,
}

impl VoiceMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(VoiceMode::Standard),
            "realtime" => Some(VoiceMode::Realtime),
            _ => None,
        }
    }
}

impl std::fmt::Display for VoiceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceMode::Standard => write!(f, "standard"),
            VoiceMode::Realtime => write!(f, "realtime"),
        }
    }
}

/// Session status
///
/// Permitted transitions: `Reserved -> Active -> Completed`,
/// `Reserved | Active -> Cancelled`, `Completed -> Refunded`.
/// `Cancelled` and `Refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Reserved,
    Active,
    Completed,
    Cancelled,
    Refunded,
}

impl SessionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reserved" => Some(SessionStatus::Reserved),
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            "cancelled" => Some(SessionStatus::Cancelled),
            "refunded" => Some(SessionStatus::Refunded),
            _ => None,
        }
    }

    /// Whether the state machine permits moving to `next` from here.
    pub fn permits(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Reserved, SessionStatus::Active)
                | (SessionStatus::Active, SessionStatus::Completed)
                | (SessionStatus::Reserved, SessionStatus::Cancelled)
                | (SessionStatus::Active, SessionStatus::Cancelled)
                | (SessionStatus::Completed, SessionStatus::Refunded)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Cancelled | SessionStatus::Refunded)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Reserved => write!(f, "reserved"),
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
            SessionStatus::Refunded => write!(f, "refunded"),
        }
    }
}

/// Billable session model: funds held against a coaching session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillableSession {
    pub session_id: Uuid,
    pub user_id: UserId,
    pub kind: SessionKind,
    pub mode: Option<VoiceMode>,
    pub duration_minutes: i32,
    /// Amount reserved for the session
    pub cost: Decimal,
    pub status: SessionStatus,
    /// Amount actually charged, set when the session completes
    pub charged_amount: Option<Decimal>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// Transaction that created the reservation
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Reservation request consumed by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub user_id: UserId,
    pub session_id: Uuid,
    pub kind: SessionKind,
    pub mode: Option<VoiceMode>,
    pub duration_minutes: i32,
    pub cost: Decimal,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [SessionStatus; 5] = [
        SessionStatus::Reserved,
        SessionStatus::Active,
        SessionStatus::Completed,
        SessionStatus::Cancelled,
        SessionStatus::Refunded,
    ];

    #[test]
    fn status_roundtrip() {
        for status in ALL {
            assert_eq!(SessionStatus::parse(&status.to_string()), Some(status));
        }
        assert_eq!(SessionStatus::parse("pending"), None);
    }

    #[test]
    fn completed_only_via_active() {
        assert!(SessionStatus::Reserved.permits(SessionStatus::Active));
        assert!(SessionStatus::Active.permits(SessionStatus::Completed));
        assert!(!SessionStatus::Reserved.permits(SessionStatus::Completed));
        assert!(!SessionStatus::Reserved.permits(SessionStatus::Refunded));
        assert!(!SessionStatus::Active.permits(SessionStatus::Refunded));
    }

    #[test]
    fn cancel_from_reserved_or_active_only() {
        assert!(SessionStatus::Reserved.permits(SessionStatus::Cancelled));
        assert!(SessionStatus::Active.permits(SessionStatus::Cancelled));
        assert!(!SessionStatus::Completed.permits(SessionStatus::Cancelled));
    }

    proptest! {
        // Terminal states permit no outgoing transitions.
        #[test]
        fn terminal_states_are_sinks(from in 0usize..5, to in 0usize..5) {
            let (from, to) = (ALL[from], ALL[to]);
            if from.is_terminal() {
                prop_assert!(!from.permits(to));
            }
        }

        // No state transitions to itself.
        #[test]
        fn no_self_transitions(idx in 0usize..5) {
            let status = ALL[idx];
            prop_assert!(!status.permits(status));
        }
    }
}
