//! Client-facing error taxonomy.
//!
//! Every variant is local and recoverable: it becomes one `ERROR` event to
//! the requester. Only [`CoordinatorError::Unauthorized`] also ends the
//! connection.

use crate::protocol::OutboundEvent;

/// Failure kinds surfaced to a connected participant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    /// Bad, missing or expired credential at handshake.
    #[error("unauthorized or invalid token")]
    Unauthorized,
    /// Sender's role may not issue this event, or the teacher does not own
    /// the class.
    #[error("forbidden")]
    Forbidden,
    /// The event needs a session and none is open.
    #[error("no active session")]
    NoActiveSession,
    /// START while a session is already open.
    #[error("session already active")]
    SessionConflict,
    /// Unparseable frame or payload missing required fields.
    #[error("invalid message format")]
    MalformedMessage,
    /// Event name not recognized.
    #[error("unknown event")]
    UnknownEvent,
    /// START named a class the directory does not know.
    #[error("class not found")]
    ClassNotFound,
    /// MARK named a student outside the session's roster.
    #[error("student not in class roster")]
    StudentNotEnrolled,
    /// The directory failed to read or write. The detail is for logs only.
    #[error("attendance store unavailable")]
    PersistenceFailure {
        /// Underlying cause, never sent to clients.
        detail: String,
    },
}

impl CoordinatorError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NoActiveSession => "no_active_session",
            Self::SessionConflict => "session_conflict",
            Self::MalformedMessage => "malformed_message",
            Self::UnknownEvent => "unknown_event",
            Self::ClassNotFound => "class_not_found",
            Self::StudentNotEnrolled => "student_not_enrolled",
            Self::PersistenceFailure { .. } => "persistence_failure",
        }
    }

    /// Whether the connection must be closed after reporting this error.
    pub fn closes_connection(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// The `ERROR` event sent to the requester.
    pub fn to_event(&self) -> OutboundEvent {
        OutboundEvent::error(self.to_string())
    }
}
