//! Wire protocol: the `{event, data}` envelope used in both directions.
//!
//! Inbound event names have a short form and a legacy long form
//! (`MARK` / `ATTENDANCE_MARKED` and so on). Replies and broadcasts reuse
//! whichever name the client sent, plus `ERROR` and `CONNECTED`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attendance::{AttendanceStatus, Tally};
use crate::errors::CoordinatorError;
use crate::identity::Role;
use crate::ids::{ClassId, ConnectionId, RecordId, UserId};

/// Event name for error replies.
pub const ERROR_EVENT: &str = "ERROR";
/// Event name for the greeting sent after a successful handshake.
pub const CONNECTED_EVENT: &str = "CONNECTED";
/// QUERY_SELF answer for a student not yet marked in the open session.
pub const NOT_YET_RECORDED: &str = "not yet recorded";
/// `message` field of the FINISH broadcast.
pub const PERSISTED_MESSAGE: &str = "Attendance persisted";

// ── Inbound ─────────────────────────────────────────────────────────

/// A decoded inbound frame. `data` is decoded lazily per event.
#[derive(Clone, Debug, Deserialize)]
pub struct InboundEnvelope {
    /// Event name as sent by the client.
    pub event: String,
    /// Event payload; absent is treated as `null`.
    #[serde(default)]
    pub data: Value,
}

impl InboundEnvelope {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, CoordinatorError> {
        serde_json::from_str(text).map_err(|_| CoordinatorError::MalformedMessage)
    }

    /// Decode `data` into a typed payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, CoordinatorError> {
        T::deserialize(&self.data).map_err(|_| CoordinatorError::MalformedMessage)
    }
}

/// Recognized inbound events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Open a session for a class.
    Start,
    /// Record one student's status.
    Mark,
    /// A student asks for their own status.
    QuerySelf,
    /// Broadcast the live tally.
    Summary,
    /// Finalize and persist the session.
    Finish,
}

impl EventKind {
    /// Resolve an event name, accepting both naming schemes.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "START" => Some(Self::Start),
            "MARK" | "ATTENDANCE_MARKED" => Some(Self::Mark),
            "QUERY_SELF" | "MY_ATTENDANCE" => Some(Self::QuerySelf),
            "SUMMARY" | "TODAY_SUMMARY" => Some(Self::Summary),
            "FINISH" | "DONE" => Some(Self::Finish),
            _ => None,
        }
    }

    /// The only role allowed to send this event.
    pub fn required_role(self) -> Role {
        match self {
            Self::QuerySelf => Role::Student,
            Self::Start | Self::Mark | Self::Summary | Self::Finish => Role::Teacher,
        }
    }

    /// Whether an open session must exist.
    pub fn requires_session(self) -> bool {
        !matches!(self, Self::Start)
    }
}

/// `START` payload.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    /// Class to take attendance for.
    pub class_id: ClassId,
}

/// `MARK` payload.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPayload {
    /// Student being marked.
    pub student_id: UserId,
    /// New status.
    pub status: AttendanceStatus,
}

// ── Outbound ────────────────────────────────────────────────────────

/// A frame sent to one or more connections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    /// Event name.
    pub event: String,
    /// Event payload.
    pub data: Value,
}

impl OutboundEvent {
    /// Build an event from any serializable payload.
    pub fn new(event: impl Into<String>, data: &impl Serialize) -> Self {
        Self {
            event: event.into(),
            data: serde_json::to_value(data).unwrap_or_default(),
        }
    }

    /// An `ERROR {message}` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(
            ERROR_EVENT,
            &ErrorPayload {
                message: message.into(),
            },
        )
    }

    /// Serialize to a text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// `ERROR` data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable reason.
    pub message: String,
}

/// `CONNECTED` data.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    /// Server-assigned connection id.
    pub connection_id: ConnectionId,
    /// Verified user id.
    pub user_id: UserId,
    /// Verified role.
    pub role: Role,
}

/// Echo of an open session, sent to the teacher on START.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Class under attendance.
    pub class_id: ClassId,
    /// When the session was opened.
    pub started_at: DateTime<Utc>,
    /// Statuses recorded so far.
    pub attendance: BTreeMap<UserId, AttendanceStatus>,
}

/// MARK echo to the teacher.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEcho {
    /// Student marked.
    pub student_id: UserId,
    /// Status recorded.
    pub status: AttendanceStatus,
}

/// Status pushed to a student, or returned for QUERY_SELF.
///
/// QUERY_SELF may carry [`NOT_YET_RECORDED`] instead of a status, so the
/// field is a plain string on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusPayload {
    /// `present`, `absent`, or the not-yet-recorded sentinel.
    pub status: String,
}

impl StatusPayload {
    /// Payload for a recorded status, or the sentinel when none.
    pub fn from_status(status: Option<AttendanceStatus>) -> Self {
        Self {
            status: status.map_or_else(|| NOT_YET_RECORDED.to_string(), |s| s.to_string()),
        }
    }
}

/// FINISH broadcast after the record has been written.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSummary {
    /// Always [`PERSISTED_MESSAGE`].
    pub message: String,
    /// Id of the written record.
    pub record_id: RecordId,
    /// Class the session was for.
    pub class_id: ClassId,
    /// Counts over the reconciled roster.
    #[serde(flatten)]
    pub tally: Tally,
}
