//! Registered accounts.

use chrono::Utc;
use rollcall_core::{Role, UserId, UserRecord};
use tracing::instrument;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Repository for the `users` table.
pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    /// Create a repository over a shared database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a user. Emails are unique.
    #[instrument(skip(self), fields(role = %role))]
    pub fn create(&self, name: &str, email: &str, role: Role) -> Result<UserRecord, StoreError> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() || !looks_like_email(&email) {
            return Err(StoreError::Conflict(format!("invalid user: {name} <{email}>")));
        }

        let id = UserId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            let _ = conn
                .execute(
                    "INSERT INTO users (id, name, email, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![id.as_str(), name, email, role.to_string(), now],
                )
                .map_err(|e| match StoreError::from(e) {
                    StoreError::Conflict(_) => {
                        StoreError::Conflict(format!("email already exists: {email}"))
                    }
                    other => other,
                })?;

            Ok(UserRecord {
                id,
                name: name.to_string(),
                email: email.clone(),
                role,
            })
        })
    }

    /// Get a user by id.
    #[instrument(skip(self), fields(user_id = %id))]
    pub fn get(&self, id: &UserId) -> Result<UserRecord, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, email, role FROM users WHERE id = ?1")?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound(format!("user {id}"))),
            }
        })
    }

    /// All users with a role, oldest first.
    #[instrument(skip(self))]
    pub fn list_by_role(&self, role: Role) -> Result<Vec<UserRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, role FROM users WHERE role = ?1 ORDER BY created_at, id",
            )?;
            let mut rows = stmt.query([role.to_string()])?;
            let mut users = Vec::new();
            while let Some(row) = rows.next()? {
                users.push(row_to_user(row)?);
            }
            Ok(users)
        })
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<UserRecord, StoreError> {
    let role: String = row_helpers::get(row, 3, "users", "role")?;
    Ok(UserRecord {
        id: UserId::from_raw(row_helpers::get::<String>(row, 0, "users", "id")?),
        name: row_helpers::get(row, 1, "users", "name")?,
        email: row_helpers::get(row, 2, "users", "email")?,
        role: row_helpers::parse_enum(&role, "users", "role")?,
    })
}
