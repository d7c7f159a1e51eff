//! [`DirectoryStore`] backed by the `SQLite` repositories.

use async_trait::async_trait;
use rollcall_core::{
    AttendanceRecord, ClassId, ClassRoster, DirectoryError, DirectoryStore, NewAttendanceRecord,
    UserId, UserRecord,
};
use tokio::task;
use tracing::warn;

use crate::attendance::AttendanceRepo;
use crate::classes::ClassRepo;
use crate::database::Database;
use crate::error::StoreError;
use crate::users::UserRepo;

/// Async directory over a shared [`Database`]. Every call runs on the
/// blocking pool so the connection mutex never parks a runtime worker.
#[derive(Clone)]
pub struct SqliteDirectory {
    db: Database,
}

impl SqliteDirectory {
    /// Wrap an open database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn run<F, T>(&self, op: &'static str, f: F) -> Result<T, DirectoryError>
    where
        F: FnOnce(Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let result = task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("{op} task failed: {e}")))?;
        result.map_err(|e| {
            if !matches!(e, StoreError::NotFound(_)) {
                warn!(op, error = %e, "directory operation failed");
            }
            DirectoryError::from(e)
        })
    }
}

#[async_trait]
impl DirectoryStore for SqliteDirectory {
    async fn find_class(&self, id: &ClassId) -> Result<ClassRoster, DirectoryError> {
        let id = id.clone();
        self.run("find_class", move |db| ClassRepo::new(db).get(&id))
            .await
    }

    async fn find_user(&self, id: &UserId) -> Result<UserRecord, DirectoryError> {
        let id = id.clone();
        self.run("find_user", move |db| UserRepo::new(db).get(&id)).await
    }

    async fn create_attendance_record(
        &self,
        record: NewAttendanceRecord,
    ) -> Result<AttendanceRecord, DirectoryError> {
        self.run("create_attendance_record", move |db| {
            AttendanceRepo::new(db).create(record)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rollcall_core::{AttendanceEntry, AttendanceStatus, Role};

    use super::*;

    fn seeded() -> (SqliteDirectory, UserId, UserId, ClassId) {
        let db = Database::in_memory().unwrap();
        let users = UserRepo::new(db.clone());
        let teacher = users.create("T", "t@example.com", Role::Teacher).unwrap().id;
        let student = users.create("S", "s@example.com", Role::Student).unwrap().id;
        let classes = ClassRepo::new(db.clone());
        let class_id = classes.create("Biology", &teacher).unwrap().class_id;
        let _ = classes.add_student(&class_id, &student).unwrap();
        (SqliteDirectory::new(db), teacher, student, class_id)
    }

    #[tokio::test]
    async fn find_class_and_user() {
        let (dir, teacher, student, class_id) = seeded();
        let roster = dir.find_class(&class_id).await.unwrap();
        assert_eq!(roster.teacher_id, teacher);
        assert!(roster.contains(&student));

        let user = dir.find_user(&student).await.unwrap();
        assert_eq!(user.role, Role::Student);
    }

    #[tokio::test]
    async fn missing_entities_are_not_found() {
        let (dir, ..) = seeded();
        let err = dir.find_class(&ClassId::from_raw("cls_x")).await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(_)));
        let err = dir.find_user(&UserId::from_raw("usr_x")).await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_record_round_trips_through_repo() {
        let (dir, _, student, class_id) = seeded();
        let record = dir
            .create_attendance_record(NewAttendanceRecord {
                class_id: class_id.clone(),
                date: Utc::now(),
                records: vec![AttendanceEntry {
                    student_id: student.clone(),
                    status: AttendanceStatus::Present,
                }],
            })
            .await
            .unwrap();

        let stored = AttendanceRepo::new(dir.database().clone())
            .get(&record.id)
            .unwrap();
        assert_eq!(stored.status_of(&student), Some(AttendanceStatus::Present));
    }

    #[tokio::test]
    async fn write_failure_is_unavailable() {
        let (dir, _, student, _) = seeded();
        let err = dir
            .create_attendance_record(NewAttendanceRecord {
                class_id: ClassId::from_raw("cls_gone"),
                date: Utc::now(),
                records: vec![AttendanceEntry {
                    student_id: student,
                    status: AttendanceStatus::Absent,
                }],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(_)));
    }
}
