//! The single open attendance session.
//!
//! One `tokio::sync::Mutex` guards the whole session, existence included.
//! Handlers take the lock once per event and hold it until the event is
//! fully applied, so START, MARK, SUMMARY, QUERY_SELF and FINISH never
//! interleave. FINISH keeps the lock across two directory calls: the
//! roster re-read and the durable write. A slow store delays every other
//! event until both return. START reads the class before taking the lock.
//!
//! Sessions never expire. A session stays open until a teacher finishes it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rollcall_core::protocol::SessionSnapshot;
use rollcall_core::{AttendanceStatus, ClassId, ClassRoster, CoordinatorError, Tally, UserId};
use tokio::sync::{Mutex, MutexGuard};

/// An open attendance round for one class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveSession {
    /// Class under attendance.
    pub class_id: ClassId,
    /// Owner of the class when the session opened.
    pub teacher_id: UserId,
    /// When START was accepted.
    pub started_at: DateTime<Utc>,
    /// Statuses recorded so far, keyed by student.
    pub attendance: BTreeMap<UserId, AttendanceStatus>,
    /// Students enrolled when the session opened.
    pub roster: Vec<UserId>,
}

impl ActiveSession {
    /// A fresh session with nothing marked.
    pub fn new(roster: &ClassRoster) -> Self {
        Self {
            class_id: roster.class_id.clone(),
            teacher_id: roster.teacher_id.clone(),
            started_at: Utc::now(),
            attendance: BTreeMap::new(),
            roster: roster.student_ids.clone(),
        }
    }

    /// Whether `student_id` was enrolled at START.
    pub fn is_enrolled(&self, student_id: &UserId) -> bool {
        self.roster.contains(student_id)
    }

    /// Recorded status for one student.
    pub fn status_of(&self, student_id: &UserId) -> Option<AttendanceStatus> {
        self.attendance.get(student_id).copied()
    }

    /// Live progress count over marked students only.
    pub fn live_tally(&self) -> Tally {
        Tally::from_statuses(self.attendance.values().copied())
    }

    /// Wire echo of this session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            class_id: self.class_id.clone(),
            started_at: self.started_at,
            attendance: self.attendance.clone(),
        }
    }
}

/// Owner of the at-most-one [`ActiveSession`].
#[derive(Default)]
pub struct SessionState {
    inner: Mutex<Option<ActiveSession>>,
}

impl SessionState {
    /// No session open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the critical section.
    pub async fn lock(&self) -> SessionSlot<'_> {
        SessionSlot {
            guard: self.inner.lock().await,
        }
    }

    /// Copy of the open session, if any.
    pub async fn current(&self) -> Option<ActiveSession> {
        self.lock().await.current().cloned()
    }

    /// Class of the open session, if any.
    pub async fn active_class(&self) -> Option<ClassId> {
        self.lock().await.current().map(|s| s.class_id.clone())
    }
}

/// Exclusive access to the session for the span of one event.
pub struct SessionSlot<'a> {
    guard: MutexGuard<'a, Option<ActiveSession>>,
}

impl SessionSlot<'_> {
    /// Open a session. Fails if one is already open; the open one is left
    /// untouched.
    pub fn start(&mut self, roster: &ClassRoster) -> Result<&ActiveSession, CoordinatorError> {
        if self.guard.is_some() {
            return Err(CoordinatorError::SessionConflict);
        }
        Ok(self.guard.insert(ActiveSession::new(roster)))
    }

    /// Record `status` for `student_id`, replacing any earlier status.
    pub fn mark(
        &mut self,
        student_id: UserId,
        status: AttendanceStatus,
    ) -> Result<(), CoordinatorError> {
        let session = self.guard.as_mut().ok_or(CoordinatorError::NoActiveSession)?;
        if !session.is_enrolled(&student_id) {
            return Err(CoordinatorError::StudentNotEnrolled);
        }
        let _ = session.attendance.insert(student_id, status);
        Ok(())
    }

    /// The open session, if any.
    pub fn current(&self) -> Option<&ActiveSession> {
        self.guard.as_ref()
    }

    /// The open session, or `NoActiveSession`.
    pub fn require(&self) -> Result<&ActiveSession, CoordinatorError> {
        self.current().ok_or(CoordinatorError::NoActiveSession)
    }

    /// Remove the session entirely.
    pub fn clear(&mut self) -> Option<ActiveSession> {
        self.guard.take()
    }
}
