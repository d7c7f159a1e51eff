//! Attendance statuses, rosters, durable records and tallies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ClassId, RecordId, UserId};

/// A student's attendance for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    /// Marked present.
    Present,
    /// Marked absent, or never marked before the session finished.
    Absent,
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

/// A class and the students enrolled in it, in enrollment order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRoster {
    /// Class id.
    pub class_id: ClassId,
    /// Human-readable class name.
    pub class_name: String,
    /// The owning teacher.
    pub teacher_id: UserId,
    /// Enrolled students. The roster size is the source of truth for a
    /// finished session's total.
    pub student_ids: Vec<UserId>,
}

impl ClassRoster {
    /// Whether a student is enrolled.
    pub fn contains(&self, student_id: &UserId) -> bool {
        self.student_ids.iter().any(|s| s == student_id)
    }

    /// Number of enrolled students.
    pub fn len(&self) -> usize {
        self.student_ids.len()
    }

    /// Whether nobody is enrolled.
    pub fn is_empty(&self) -> bool {
        self.student_ids.is_empty()
    }
}

/// One line of an attendance record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    /// The student.
    pub student_id: UserId,
    /// Final status.
    pub status: AttendanceStatus,
}

/// A record ready to be written, before the store assigns an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAttendanceRecord {
    /// Class the session was for.
    pub class_id: ClassId,
    /// When the session was finalized.
    pub date: DateTime<Utc>,
    /// One entry per roster member, in roster order.
    pub records: Vec<AttendanceEntry>,
}

/// A durable attendance record. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// Record id.
    pub id: RecordId,
    /// Class the session was for.
    pub class_id: ClassId,
    /// When the session was finalized.
    pub date: DateTime<Utc>,
    /// One entry per roster member, in roster order.
    pub records: Vec<AttendanceEntry>,
}

impl AttendanceRecord {
    /// Status recorded for one student, if they appear in the record.
    pub fn status_of(&self, student_id: &UserId) -> Option<AttendanceStatus> {
        self.records
            .iter()
            .find(|e| &e.student_id == student_id)
            .map(|e| e.status)
    }

    /// Present/absent counts over the record's entries.
    pub fn tally(&self) -> Tally {
        Tally::from_statuses(self.records.iter().map(|e| e.status))
    }
}

/// Present/absent counts. `total` is always `present + absent`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Students counted present.
    pub present: usize,
    /// Students counted absent.
    pub absent: usize,
    /// `present + absent`.
    pub total: usize,
}

impl Tally {
    /// Count statuses.
    pub fn from_statuses(statuses: impl IntoIterator<Item = AttendanceStatus>) -> Self {
        let mut tally = Self::default();
        for status in statuses {
            match status {
                AttendanceStatus::Present => tally.present += 1,
                AttendanceStatus::Absent => tally.absent += 1,
            }
        }
        tally.total = tally.present + tally.absent;
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, status: AttendanceStatus) -> AttendanceEntry {
        AttendanceEntry {
            student_id: UserId::from_raw(id),
            status,
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [AttendanceStatus::Present, AttendanceStatus::Absent] {
            assert_eq!(s.to_string().parse::<AttendanceStatus>().unwrap(), s);
        }
        assert!("late".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn status_rejects_unknown_in_json() {
        let r: Result<AttendanceStatus, _> = serde_json::from_str(r#""excused""#);
        assert!(r.is_err());
    }

    #[test]
    fn tally_counts() {
        let t = Tally::from_statuses([
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
            AttendanceStatus::Present,
        ]);
        assert_eq!(t, Tally { present: 2, absent: 1, total: 3 });
    }

    #[test]
    fn tally_empty() {
        assert_eq!(Tally::from_statuses([]), Tally::default());
    }

    #[test]
    fn roster_contains() {
        let roster = ClassRoster {
            class_id: ClassId::from_raw("cls_1"),
            class_name: "Physics".into(),
            teacher_id: UserId::from_raw("usr_t"),
            student_ids: vec![UserId::from_raw("usr_a"), UserId::from_raw("usr_b")],
        };
        assert!(roster.contains(&UserId::from_raw("usr_a")));
        assert!(!roster.contains(&UserId::from_raw("usr_t")));
        assert_eq!(roster.len(), 2);
        assert!(!roster.is_empty());
    }

    #[test]
    fn record_status_and_tally() {
        let record = AttendanceRecord {
            id: RecordId::from_raw("att_1"),
            class_id: ClassId::from_raw("cls_1"),
            date: Utc::now(),
            records: vec![
                entry("usr_a", AttendanceStatus::Present),
                entry("usr_b", AttendanceStatus::Absent),
            ],
        };
        assert_eq!(
            record.status_of(&UserId::from_raw("usr_b")),
            Some(AttendanceStatus::Absent)
        );
        assert_eq!(record.status_of(&UserId::from_raw("usr_z")), None);
        assert_eq!(record.tally(), Tally { present: 1, absent: 1, total: 2 });
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = AttendanceRecord {
            id: RecordId::from_raw("att_1"),
            class_id: ClassId::from_raw("cls_1"),
            date: Utc::now(),
            records: vec![entry("usr_a", AttendanceStatus::Present)],
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["classId"], "cls_1");
        assert_eq!(v["records"][0]["studentId"], "usr_a");
        assert_eq!(v["records"][0]["status"], "present");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn total_is_sum(flags in proptest::collection::vec(any::<bool>(), 0..64)) {
                let statuses = flags.iter().map(|p| {
                    if *p { AttendanceStatus::Present } else { AttendanceStatus::Absent }
                });
                let t = Tally::from_statuses(statuses);
                prop_assert_eq!(t.total, t.present + t.absent);
                prop_assert_eq!(t.total, flags.len());
            }
        }
    }
}
