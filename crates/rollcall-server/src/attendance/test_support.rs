//! In-memory directory for router and finalizer tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rollcall_core::{
    AttendanceRecord, ClassId, ClassRoster, DirectoryError, DirectoryStore, NewAttendanceRecord,
    RecordId, Role, UserId, UserRecord,
};

/// One teacher owning one class with two students. Reads and writes can
/// be made to fail independently, and either can be slowed down.
pub struct MemoryDirectory {
    classes: Vec<ClassRoster>,
    users: Vec<UserRecord>,
    records: Mutex<Vec<AttendanceRecord>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub read_delay_ms: AtomicU64,
    pub write_delay_ms: AtomicU64,
}

impl MemoryDirectory {
    pub const TEACHER: &'static str = "usr_teacher";
    pub const S1: &'static str = "usr_s1";
    pub const S2: &'static str = "usr_s2";
    pub const CLASS: &'static str = "cls_math";

    pub fn seeded() -> Self {
        let user = |id: &str, role| UserRecord {
            id: UserId::from_raw(id),
            name: id.to_string(),
            email: format!("{id}@example.com"),
            role,
        };
        Self {
            classes: vec![ClassRoster {
                class_id: ClassId::from_raw(Self::CLASS),
                class_name: "Math".into(),
                teacher_id: UserId::from_raw(Self::TEACHER),
                student_ids: vec![UserId::from_raw(Self::S1), UserId::from_raw(Self::S2)],
            }],
            users: vec![
                user(Self::TEACHER, Role::Teacher),
                user(Self::S1, Role::Student),
                user(Self::S2, Role::Student),
            ],
            records: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            read_delay_ms: AtomicU64::new(0),
            write_delay_ms: AtomicU64::new(0),
        }
    }

    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.records.lock().clone()
    }

    fn check_reads(&self) -> Result<(), DirectoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(DirectoryError::Unavailable("reads disabled".into()))
        } else {
            Ok(())
        }
    }
}

async fn pause(delay_ms: &AtomicU64) {
    let ms = delay_ms.load(Ordering::SeqCst);
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn find_class(&self, id: &ClassId) -> Result<ClassRoster, DirectoryError> {
        pause(&self.read_delay_ms).await;
        self.check_reads()?;
        self.classes
            .iter()
            .find(|c| &c.class_id == id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(format!("class {id}")))
    }

    async fn find_user(&self, id: &UserId) -> Result<UserRecord, DirectoryError> {
        self.check_reads()?;
        self.users
            .iter()
            .find(|u| &u.id == id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(format!("user {id}")))
    }

    async fn create_attendance_record(
        &self,
        record: NewAttendanceRecord,
    ) -> Result<AttendanceRecord, DirectoryError> {
        pause(&self.write_delay_ms).await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("disk full".into()));
        }
        let stored = AttendanceRecord {
            id: RecordId::new(),
            class_id: record.class_id,
            date: record.date,
            records: record.records,
        };
        self.records.lock().push(stored.clone());
        Ok(stored)
    }
}
