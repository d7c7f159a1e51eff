//! Finalized attendance records.
//!
//! A record is one header row in `attendance_records` plus one row per
//! student in `attendance_entries`. Both are written in a single
//! transaction so a record is either fully present or absent.

use rollcall_core::{
    AttendanceEntry, AttendanceRecord, AttendanceStatus, ClassId, NewAttendanceRecord, RecordId,
    UserId,
};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Repository for attendance records.
pub struct AttendanceRepo {
    db: Database,
}

impl AttendanceRepo {
    /// Create a repository over a shared database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Write a record and all of its entries atomically.
    #[instrument(skip(self, record), fields(class_id = %record.class_id, entries = record.records.len()))]
    pub fn create(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        let id = RecordId::new();

        self.db.transaction(|tx| {
            let _ = tx.execute(
                "INSERT INTO attendance_records (id, class_id, date) VALUES (?1, ?2, ?3)",
                rusqlite::params![id.as_str(), record.class_id.as_str(), record.date.to_rfc3339()],
            )?;
            let mut stmt = tx.prepare(
                "INSERT INTO attendance_entries (record_id, position, student_id, status)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, entry) in record.records.iter().enumerate() {
                let _ = stmt.execute(rusqlite::params![
                    id.as_str(),
                    i64::try_from(position).unwrap_or(i64::MAX),
                    entry.student_id.as_str(),
                    entry.status.to_string(),
                ])?;
            }
            Ok(())
        })?;
        debug!(record_id = %id, "attendance record written");

        Ok(AttendanceRecord {
            id,
            class_id: record.class_id,
            date: record.date,
            records: record.records,
        })
    }

    /// Get a record by id.
    #[instrument(skip(self), fields(record_id = %id))]
    pub fn get(&self, id: &RecordId) -> Result<AttendanceRecord, StoreError> {
        self.db.with_conn(|conn| {
            let header = conn
                .query_row(
                    "SELECT class_id, date FROM attendance_records WHERE id = ?1",
                    [id.as_str()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;
            let Some((class_id, date)) = header else {
                return Err(StoreError::NotFound(format!("attendance record {id}")));
            };
            load_record(conn, id.clone(), ClassId::from_raw(class_id), &date)
        })
    }

    /// Most recent record for a class, by session start.
    #[instrument(skip(self), fields(class_id = %class_id))]
    pub fn latest_for_class(&self, class_id: &ClassId) -> Result<Option<AttendanceRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let header = conn
                .query_row(
                    "SELECT id, date FROM attendance_records
                     WHERE class_id = ?1 ORDER BY date DESC, rowid DESC LIMIT 1",
                    [class_id.as_str()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;
            match header {
                Some((id, date)) => {
                    load_record(conn, RecordId::from_raw(id), class_id.clone(), &date).map(Some)
                }
                None => Ok(None),
            }
        })
    }

    /// A student's status in the most recent record of a class.
    ///
    /// `None` when the class has no records yet or the student is absent
    /// from the latest one.
    #[instrument(skip(self), fields(class_id = %class_id, student_id = %student_id))]
    pub fn latest_status_for_student(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> Result<Option<AttendanceStatus>, StoreError> {
        Ok(self
            .latest_for_class(class_id)?
            .and_then(|record| record.status_of(student_id)))
    }
}

fn load_record(
    conn: &Connection,
    id: RecordId,
    class_id: ClassId,
    date: &str,
) -> Result<AttendanceRecord, StoreError> {
    let date = row_helpers::parse_timestamp(date, "attendance_records", "date")?;
    let mut stmt = conn.prepare(
        "SELECT student_id, status FROM attendance_entries
         WHERE record_id = ?1 ORDER BY position",
    )?;
    let mut rows = stmt.query([id.as_str()])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let status: String = row_helpers::get(row, 1, "attendance_entries", "status")?;
        records.push(AttendanceEntry {
            student_id: UserId::from_raw(row_helpers::get::<String>(
                row,
                0,
                "attendance_entries",
                "student_id",
            )?),
            status: row_helpers::parse_enum(&status, "attendance_entries", "status")?,
        });
    }
    Ok(AttendanceRecord {
        id,
        class_id,
        date,
        records,
    })
}
