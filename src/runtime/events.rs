//! Runtime event stream payloads.

use crate::types::{CalendarDay, OpSeq, RecordId, UserId};

/// Events broadcast by [`crate::runtime::handle::AttendanceHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceEvent {
    /// A work record was opened.
    CheckedIn {
        /// Created record.
        record_id: RecordId,
        /// Acting user.
        user_id: UserId,
    },
    /// A work record was completed.
    CheckedOut {
        /// Completed record.
        record_id: RecordId,
        /// Acting user.
        user_id: UserId,
    },
    /// An annual leave record was created.
    LeaveRecorded {
        /// Created record.
        record_id: RecordId,
        /// Acting user.
        user_id: UserId,
        /// Day of leave.
        day: CalendarDay,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
