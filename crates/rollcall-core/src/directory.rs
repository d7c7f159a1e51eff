//! Contract for the Directory Store collaborator.
//!
//! The coordinator reads users and rosters and writes finished attendance
//! records through this trait. Implementations translate their own storage
//! errors into [`DirectoryError`]; the coordinator then maps those onto the
//! client-facing taxonomy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::attendance::{AttendanceRecord, ClassRoster, NewAttendanceRecord};
use crate::identity::Role;
use crate::ids::{ClassId, UserId};

/// A registered account, without credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Unique email.
    pub email: String,
    /// Role the account was registered with.
    pub role: Role,
}

/// Failure reported by a directory implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The store could not be reached or the operation failed.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Read/write access to accounts, rosters and attendance records.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Look up a class roster.
    async fn find_class(&self, id: &ClassId) -> Result<ClassRoster, DirectoryError>;

    /// Look up a user.
    async fn find_user(&self, id: &UserId) -> Result<UserRecord, DirectoryError>;

    /// Durably write one attendance record as a single operation.
    async fn create_attendance_record(
        &self,
        record: NewAttendanceRecord,
    ) -> Result<AttendanceRecord, DirectoryError>;
}
