//! Attendance record, draft, and request types.

use serde::{Deserialize, Serialize};

use crate::types::{
    AttendanceStatus, AttendanceType, CalendarDay, EventKind, RecordId, Timestamp, UserId, day_of,
    start_of_day,
};

/// Fully materialized, authoritative attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Store-assigned identifier.
    pub record_id: RecordId,
    /// Owning user.
    pub user_id: UserId,
    /// Day this record covers. Check-in moment for work, midnight for leave.
    pub record_date: Timestamp,
    /// Check-in moment, work records only.
    pub check_in_time: Option<Timestamp>,
    /// Check-out moment, completed work records only.
    pub check_out_time: Option<Timestamp>,
    /// Record kind.
    pub attendance_type: AttendanceType,
    /// Lifecycle status derived from kind and check-out.
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    /// Calendar day this record is keyed under.
    pub fn day(&self) -> CalendarDay {
        day_of(self.record_date)
    }

    /// Status implied by the type and time fields.
    pub fn derived_status(&self) -> AttendanceStatus {
        match self.attendance_type {
            AttendanceType::AnnualLeave => AttendanceStatus::AnnualLeave,
            AttendanceType::Work if self.check_out_time.is_some() => AttendanceStatus::Completed,
            AttendanceType::Work => AttendanceStatus::InProgress,
        }
    }

    /// True when the record is an open work day.
    pub fn is_open(&self) -> bool {
        self.status == AttendanceStatus::InProgress
    }

    /// Checks time ordering and type/field consistency.
    pub fn is_consistent(&self) -> bool {
        if self.status != self.derived_status() {
            return false;
        }
        match self.attendance_type {
            AttendanceType::AnnualLeave => {
                self.check_in_time.is_none() && self.check_out_time.is_none()
            }
            AttendanceType::Work => match (self.check_in_time, self.check_out_time) {
                (Some(_), None) => true,
                (Some(check_in), Some(check_out)) => check_out > check_in,
                (None, _) => false,
            },
        }
    }
}

/// Insert payload used to create a new [`AttendanceRecord`].
///
/// Only the two legal shapes can be expressed, so drafts always satisfy the
/// type/field consistency rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDraft {
    /// Work day starting at the check-in moment.
    Work {
        /// Owning user.
        user_id: UserId,
        /// Check-in moment, also the record date.
        check_in_time: Timestamp,
    },
    /// Annual leave for a whole day.
    AnnualLeave {
        /// Owning user.
        user_id: UserId,
        /// Day of leave.
        day: CalendarDay,
    },
}

impl RecordDraft {
    /// Draft for a work day starting at `at`.
    pub fn work(user_id: UserId, at: Timestamp) -> Self {
        Self::Work {
            user_id,
            check_in_time: at,
        }
    }

    /// Draft for an annual leave day.
    pub fn leave(user_id: UserId, day: CalendarDay) -> Self {
        Self::AnnualLeave { user_id, day }
    }

    /// Owning user.
    pub fn user_id(&self) -> UserId {
        match self {
            Self::Work { user_id, .. } | Self::AnnualLeave { user_id, .. } => *user_id,
        }
    }

    /// Calendar day this draft would be keyed under.
    pub fn day(&self) -> CalendarDay {
        match self {
            Self::Work { check_in_time, .. } => day_of(*check_in_time),
            Self::AnnualLeave { day, .. } => *day,
        }
    }

    /// Materializes the record under `record_id`.
    pub fn into_record(self, record_id: RecordId) -> AttendanceRecord {
        match self {
            Self::Work {
                user_id,
                check_in_time,
            } => AttendanceRecord {
                record_id,
                user_id,
                record_date: check_in_time,
                check_in_time: Some(check_in_time),
                check_out_time: None,
                attendance_type: AttendanceType::Work,
                status: AttendanceStatus::InProgress,
            },
            Self::AnnualLeave { user_id, day } => AttendanceRecord {
                record_id,
                user_id,
                record_date: start_of_day(day),
                check_in_time: None,
                check_out_time: None,
                attendance_type: AttendanceType::AnnualLeave,
                status: AttendanceStatus::AnnualLeave,
            },
        }
    }
}

/// Single entry point payload for all attendance events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRequest {
    /// Acting user.
    pub user_id: UserId,
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Target day; honoured by annual leave, defaults to today.
    #[serde(default)]
    pub target_date: Option<CalendarDay>,
}

impl AttendanceRequest {
    /// Check-in request for today.
    pub fn check_in(user_id: UserId) -> Self {
        Self {
            user_id,
            kind: EventKind::CheckIn,
            target_date: None,
        }
    }

    /// Check-out request for today.
    pub fn check_out(user_id: UserId) -> Self {
        Self {
            user_id,
            kind: EventKind::CheckOut,
            target_date: None,
        }
    }

    /// Annual leave request, `None` meaning today.
    pub fn annual_leave(user_id: UserId, target_date: Option<CalendarDay>) -> Self {
        Self {
            user_id,
            kind: EventKind::AnnualLeave,
            target_date,
        }
    }
}
