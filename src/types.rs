//! Shared primitive IDs, calendar helpers, and attendance enums.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// User identifier issued by the external user directory.
pub type UserId = u64;
/// Store-assigned attendance record identifier.
pub type RecordId = u64;
/// Monotonic operation sequence number.
pub type OpSeq = u64;

/// Calendar day with no time-of-day component.
pub type CalendarDay = NaiveDate;
/// Wall-clock timestamp in the single local calendar used by the ledger.
pub type Timestamp = NaiveDateTime;

/// Returns the calendar day a timestamp falls on.
///
/// Every same-day comparison in the crate goes through this function.
pub fn day_of(ts: Timestamp) -> CalendarDay {
    ts.date()
}

/// Returns midnight at the start of `day`.
pub fn start_of_day(day: CalendarDay) -> Timestamp {
    day.and_time(NaiveTime::MIN)
}

/// Kind of record stored for a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceType {
    /// Regular working day with check-in/check-out times.
    Work,
    /// Full-day annual leave.
    AnnualLeave,
}

/// Derived lifecycle status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    /// Checked in, not yet checked out.
    InProgress,
    /// Checked in and out.
    Completed,
    /// Annual leave day.
    AnnualLeave,
}

/// Attendance event submitted by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Start of a working day.
    CheckIn,
    /// End of a working day.
    CheckOut,
    /// Declare annual leave for a target day.
    AnnualLeave,
}
