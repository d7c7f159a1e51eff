//! Store error type.

use rollcall_core::DirectoryError;

/// Errors raised by the `SQLite` directory store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite reported an error.
    #[error("database error: {0}")]
    Database(String),

    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness or ownership rule was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// JSON encoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem error while opening the database.
    #[error("IO error: {0}")]
    Io(String),

    /// A stored value could not be decoded.
    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        /// Table name.
        table: &'static str,
        /// Column name.
        column: &'static str,
        /// What went wrong.
        detail: String,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref err, _) = e {
            if err.code == rusqlite::ErrorCode::ConstraintViolation {
                return StoreError::Conflict(e.to_string());
            }
        }
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for DirectoryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => DirectoryError::NotFound(what),
            other => DirectoryError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_directory_not_found() {
        let e: DirectoryError = StoreError::NotFound("class cls_1".into()).into();
        assert_eq!(e, DirectoryError::NotFound("class cls_1".into()));
    }

    #[test]
    fn other_errors_map_to_unavailable() {
        let e: DirectoryError = StoreError::Database("locked".into()).into();
        assert!(matches!(e, DirectoryError::Unavailable(msg) if msg.contains("locked")));
    }

    #[test]
    fn corrupt_row_display() {
        let e = StoreError::CorruptRow {
            table: "users",
            column: "role",
            detail: "unknown variant: admin".into(),
        };
        assert_eq!(e.to_string(), "corrupt row in users.role: unknown variant: admin");
    }
}
