//! The shared `SQLite` handle and schema bootstrap.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::schema;

/// Cloneable handle to the directory database.
///
/// All clones share one connection behind a `parking_lot::Mutex`, so
/// writes are serialized. Async callers go through `spawn_blocking` (see
/// [`crate::SqliteDirectory`]).
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    file: Option<PathBuf>,
}

impl Database {
    /// Open the database file at `path`, creating it and any missing
    /// parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| StoreError::Io(format!("{}: {e}", dir.display())))?;
        }
        let conn = Connection::open(path)?;
        let version = bootstrap(&conn)?;
        info!(path = %path.display(), version, "directory database opened");
        Ok(Self::wrap(conn, Some(path.to_owned())))
    }

    /// A private database that disappears with the last clone.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let _ = bootstrap(&conn)?;
        Ok(Self::wrap(conn, None))
    }

    fn wrap(conn: Connection, file: Option<PathBuf>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            file,
        }
    }

    /// Run `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        f(&self.conn.lock())
    }

    /// Run `f` inside a transaction, committing only if it returns `Ok`.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }

    /// The backing file, or `None` for [`Self::in_memory`].
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

/// Apply pragmas and tables; return the schema version on disk.
fn bootstrap(conn: &Connection) -> Result<u32, StoreError> {
    conn.execute_batch(schema::PRAGMAS)?;
    conn.execute_batch(schema::CREATE_TABLES)?;

    let stored: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    match stored {
        Some(v) if v > schema::SCHEMA_VERSION => Err(StoreError::Database(format!(
            "schema version {v} is newer than this build understands ({})",
            schema::SCHEMA_VERSION
        ))),
        Some(v) => Ok(v),
        None => {
            let _ = conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [schema::SCHEMA_VERSION],
            )?;
            debug!(version = schema::SCHEMA_VERSION, "schema initialized");
            Ok(schema::SCHEMA_VERSION)
        }
    }
}
