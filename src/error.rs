//! Typed failures reported by the store and the engine.

use thiserror::Error;

use crate::types::{CalendarDay, RecordId, Timestamp, UserId};

/// Expected, recoverable attendance failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttendanceError {
    /// A record already exists for the (user, day) key being created.
    #[error("record already exists for user {user_id} on {day}")]
    Conflict {
        /// User of the contested key.
        user_id: UserId,
        /// Day of the contested key.
        day: CalendarDay,
    },
    /// The engine rejected a duplicate event for a day that is already recorded.
    #[error("attendance already recorded for user {user_id} on {day}")]
    AlreadyRecorded {
        /// Acting user.
        user_id: UserId,
        /// Day that already has a record.
        day: CalendarDay,
    },
    /// Check-out with no open check-in.
    #[error("no open check-in for user {user_id}")]
    NoCheckIn {
        /// Acting user.
        user_id: UserId,
    },
    /// The record was already checked out.
    #[error("record {0} is already completed")]
    AlreadyCompleted(RecordId),
    /// Check-out time not strictly after check-in time.
    #[error("check-out {check_out} is not after check-in {check_in} for record {record_id}")]
    InvalidOrdering {
        /// Record being completed.
        record_id: RecordId,
        /// Stored check-in time.
        check_in: Timestamp,
        /// Rejected check-out time.
        check_out: Timestamp,
    },
    /// No record with this identifier.
    #[error("record {0} not found")]
    NotFound(RecordId),
    /// Query end precedes its start.
    #[error("range end {end} precedes start {start}")]
    InvalidRange {
        /// Requested start.
        start: Timestamp,
        /// Requested end.
        end: Timestamp,
    },
    /// The underlying persistence refused or failed the operation.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl AttendanceError {
    /// True for failures a caller may retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

/// Result alias for store and engine operations.
pub type AttendanceResult<T> = Result<T, AttendanceError>;
