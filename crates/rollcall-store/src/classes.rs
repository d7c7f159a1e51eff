//! Classes and their rosters.

use chrono::Utc;
use rollcall_core::{ClassId, ClassRoster, Role, UserId};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Repository for `classes` and `class_students`.
pub struct ClassRepo {
    db: Database,
}

impl ClassRepo {
    /// Create a repository over a shared database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an empty class owned by a teacher.
    #[instrument(skip(self), fields(teacher_id = %teacher_id))]
    pub fn create(&self, class_name: &str, teacher_id: &UserId) -> Result<ClassRoster, StoreError> {
        let class_name = class_name.trim();
        if class_name.is_empty() {
            return Err(StoreError::Conflict("class name is empty".into()));
        }
        let id = ClassId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            require_role(conn, teacher_id, Role::Teacher)?;
            let _ = conn.execute(
                "INSERT INTO classes (id, class_name, teacher_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.as_str(), class_name, teacher_id.as_str(), now],
            )?;
            Ok(ClassRoster {
                class_id: id,
                class_name: class_name.to_string(),
                teacher_id: teacher_id.clone(),
                student_ids: Vec::new(),
            })
        })
    }

    /// Enroll a student. Enrolling twice is a no-op; order of first
    /// enrollment is kept.
    #[instrument(skip(self), fields(class_id = %class_id, student_id = %student_id))]
    pub fn add_student(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> Result<ClassRoster, StoreError> {
        self.db.with_conn(|conn| {
            let _ = load_roster(conn, class_id)?;
            require_role(conn, student_id, Role::Student)?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO class_students (class_id, student_id, position)
                 VALUES (?1, ?2, (SELECT COALESCE(MAX(position) + 1, 0)
                                  FROM class_students WHERE class_id = ?1))",
                rusqlite::params![class_id.as_str(), student_id.as_str()],
            )?;
            if inserted == 0 {
                debug!("student already enrolled");
            }
            load_roster(conn, class_id)
        })
    }

    /// Get a class roster.
    #[instrument(skip(self), fields(class_id = %class_id))]
    pub fn get(&self, class_id: &ClassId) -> Result<ClassRoster, StoreError> {
        self.db.with_conn(|conn| load_roster(conn, class_id))
    }
}

fn require_role(conn: &Connection, user_id: &UserId, role: Role) -> Result<(), StoreError> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT role FROM users WHERE id = ?1",
            [user_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    match stored {
        None => Err(StoreError::NotFound(format!("{role} {user_id}"))),
        Some(raw) => {
            let actual: Role = row_helpers::parse_enum(&raw, "users", "role")?;
            if actual == role {
                Ok(())
            } else {
                Err(StoreError::Conflict(format!("user {user_id} is a {actual}, not a {role}")))
            }
        }
    }
}

pub(crate) fn load_roster(conn: &Connection, class_id: &ClassId) -> Result<ClassRoster, StoreError> {
    let header = conn
        .query_row(
            "SELECT class_name, teacher_id FROM classes WHERE id = ?1",
            [class_id.as_str()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    let Some((class_name, teacher_id)) = header else {
        return Err(StoreError::NotFound(format!("class {class_id}")));
    };

    let mut stmt = conn.prepare(
        "SELECT student_id FROM class_students WHERE class_id = ?1 ORDER BY position",
    )?;
    let mut rows = stmt.query([class_id.as_str()])?;
    let mut student_ids = Vec::new();
    while let Some(row) = rows.next()? {
        student_ids.push(UserId::from_raw(row_helpers::get::<String>(
            row,
            0,
            "class_students",
            "student_id",
        )?));
    }

    Ok(ClassRoster {
        class_id: class_id.clone(),
        class_name,
        teacher_id: UserId::from_raw(teacher_id),
        student_ids,
    })
}
