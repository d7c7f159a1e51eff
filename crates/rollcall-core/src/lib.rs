//! # rollcall-core
//!
//! Foundation types shared by every rollcall crate.
//!
//! - Branded ids ([`UserId`], [`ClassId`], [`RecordId`], [`ConnectionId`])
//! - Participant identity and roles
//! - Attendance statuses, roster and record shapes, tallies
//! - The `{event, data}` wire envelope and typed event payloads
//! - The coordinator error taxonomy surfaced to clients as `ERROR` events
//! - The [`DirectoryStore`] contract consumed by the coordinator
//! - Tracing subscriber bootstrap

#![deny(unsafe_code)]

pub mod attendance;
pub mod directory;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod logging;
pub mod protocol;

pub use attendance::{
    AttendanceEntry, AttendanceRecord, AttendanceStatus, ClassRoster, NewAttendanceRecord, Tally,
};
pub use directory::{DirectoryError, DirectoryStore, UserRecord};
pub use errors::CoordinatorError;
pub use identity::{Identity, Role};
pub use ids::{ClassId, ConnectionId, RecordId, UserId};
pub use protocol::{EventKind, InboundEnvelope, OutboundEvent};
