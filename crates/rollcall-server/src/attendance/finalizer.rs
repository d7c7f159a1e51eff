//! Turning an open session into a durable record.

use std::sync::Arc;

use chrono::Utc;
use rollcall_core::protocol::{PERSISTED_MESSAGE, PersistedSummary};
use rollcall_core::{
    AttendanceEntry, AttendanceStatus, CoordinatorError, DirectoryError, DirectoryStore,
    NewAttendanceRecord, OutboundEvent, UserId,
};
use tracing::{error, info, instrument, warn};

use super::state::{ActiveSession, SessionSlot};
use crate::websocket::registry::ConnectionRegistry;

/// One entry per roster member, in roster order. Students never marked
/// are absent. Marks for students no longer on the roster are dropped.
pub fn reconcile(session: &ActiveSession, roster: &[UserId]) -> Vec<AttendanceEntry> {
    let mut seen = std::collections::HashSet::with_capacity(roster.len());
    roster
        .iter()
        .filter(|id| seen.insert(*id))
        .map(|student_id| AttendanceEntry {
            student_id: student_id.clone(),
            status: session
                .status_of(student_id)
                .unwrap_or(AttendanceStatus::Absent),
        })
        .collect()
}

/// Persists the open session, announces it, and closes it.
pub struct Finalizer {
    directory: Arc<dyn DirectoryStore>,
    registry: Arc<ConnectionRegistry>,
}

impl Finalizer {
    /// Create a finalizer writing to `directory` and announcing through
    /// `registry`.
    pub fn new(directory: Arc<dyn DirectoryStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            directory,
            registry,
        }
    }

    /// Finish the session held in `slot`.
    ///
    /// The caller keeps the session lock for the whole call. On a failed
    /// write the session is left as it was and nothing is broadcast.
    #[instrument(skip_all, fields(event = event_name))]
    pub async fn finish(
        &self,
        slot: &mut SessionSlot<'_>,
        event_name: &str,
    ) -> Result<PersistedSummary, CoordinatorError> {
        let session = slot.require()?;
        let roster = self.current_roster(session).await?;
        let records = reconcile(session, &roster);
        let class_id = session.class_id.clone();

        let record = self
            .directory
            .create_attendance_record(NewAttendanceRecord {
                class_id: class_id.clone(),
                date: session.started_at,
                records,
            })
            .await
            .map_err(|e| {
                error!(class_id = %class_id, error = %e, "attendance write failed, session kept");
                CoordinatorError::PersistenceFailure {
                    detail: e.to_string(),
                }
            })?;

        let summary = PersistedSummary {
            message: PERSISTED_MESSAGE.to_string(),
            record_id: record.id.clone(),
            class_id,
            tally: record.tally(),
        };
        let delivered = self
            .registry
            .broadcast_all(&OutboundEvent::new(event_name, &summary))
            .await;
        let _ = slot.clear();

        info!(
            class_id = %summary.class_id,
            record_id = %summary.record_id,
            present = summary.tally.present,
            absent = summary.tally.absent,
            delivered,
            open_secs = (Utc::now() - record.date).num_seconds(),
            "session finished"
        );
        Ok(summary)
    }

    /// The roster as the directory has it now; the START snapshot if the
    /// class has since disappeared.
    async fn current_roster(&self, session: &ActiveSession) -> Result<Vec<UserId>, CoordinatorError> {
        match self.directory.find_class(&session.class_id).await {
            Ok(roster) => Ok(roster.student_ids),
            Err(DirectoryError::NotFound(_)) => {
                warn!(class_id = %session.class_id, "class vanished, using roster from START");
                Ok(session.roster.clone())
            }
            Err(DirectoryError::Unavailable(detail)) => {
                error!(class_id = %session.class_id, %detail, "roster lookup failed, session kept");
                Err(CoordinatorError::PersistenceFailure { detail })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rollcall_core::{ClassId, ClassRoster, Tally};

    use super::*;

    fn session(marks: &[(&str, AttendanceStatus)]) -> ActiveSession {
        let mut s = ActiveSession::new(&ClassRoster {
            class_id: ClassId::from_raw("cls_1"),
            class_name: "Art".into(),
            teacher_id: UserId::from_raw("usr_t"),
            student_ids: vec![],
        });
        for (id, status) in marks {
            let _ = s.attendance.insert(UserId::from_raw(*id), *status);
        }
        s
    }

    fn ids(raw: &[&str]) -> Vec<UserId> {
        raw.iter().map(|s| UserId::from_raw(*s)).collect()
    }

    #[test]
    fn unmarked_default_to_absent() {
        let s = session(&[("usr_1", AttendanceStatus::Present)]);
        let entries = reconcile(&s, &ids(&["usr_1", "usr_2"]));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, AttendanceStatus::Present);
        assert_eq!(entries[1].status, AttendanceStatus::Absent);
        let tally = Tally::from_statuses(entries.iter().map(|e| e.status));
        assert_eq!((tally.present, tally.absent, tally.total), (1, 1, 2));
    }

    #[test]
    fn marks_outside_roster_are_dropped() {
        let s = session(&[
            ("usr_1", AttendanceStatus::Absent),
            ("usr_gone", AttendanceStatus::Present),
        ]);
        let entries = reconcile(&s, &ids(&["usr_1"]));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].student_id.as_str(), "usr_1");
    }

    #[test]
    fn roster_order_kept_and_duplicates_collapsed() {
        let s = session(&[]);
        let entries = reconcile(&s, &ids(&["usr_b", "usr_a", "usr_b"]));
        let order: Vec<_> = entries.iter().map(|e| e.student_id.as_str()).collect();
        assert_eq!(order, vec!["usr_b", "usr_a"]);
    }

    #[test]
    fn empty_roster_gives_empty_record() {
        let s = session(&[("usr_1", AttendanceStatus::Present)]);
        assert!(reconcile(&s, &[]).is_empty());
    }
}
