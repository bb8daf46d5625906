use std::sync::Arc;

use crate::{
    error::AttendanceResult,
    record::{AttendanceRecord, RecordDraft},
    types::{CalendarDay, RecordId, Timestamp, UserId},
};

/// Holder of the attendance record set.
///
/// `create_if_absent` and `complete_check_out` are each indivisible with
/// respect to other operations on the same (user, day) key. Reads never
/// observe a partially written record.
pub trait RecordStore: Send + Sync {
    /// Record for `user_id` on `day`, compared by calendar day.
    fn find_by_user_and_day(
        &self,
        user_id: UserId,
        day: CalendarDay,
    ) -> AttendanceResult<Option<AttendanceRecord>>;

    /// Record by identifier.
    fn get(&self, record_id: RecordId) -> AttendanceResult<Option<AttendanceRecord>>;

    /// Inserts the draft unless its key is taken, failing `Conflict` without mutation.
    fn create_if_absent(&self, draft: RecordDraft) -> AttendanceResult<AttendanceRecord>;

    /// Fills the check-out time of an open work record.
    fn complete_check_out(
        &self,
        record_id: RecordId,
        check_out_time: Timestamp,
    ) -> AttendanceResult<AttendanceRecord>;

    /// Records whose day lies in `[day(start), day(end)]`, by user, date, id.
    fn query_range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> AttendanceResult<Vec<AttendanceRecord>>;

    /// All records of a user, newest first.
    fn query_by_user(&self, user_id: UserId) -> AttendanceResult<Vec<AttendanceRecord>>;
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn find_by_user_and_day(
        &self,
        user_id: UserId,
        day: CalendarDay,
    ) -> AttendanceResult<Option<AttendanceRecord>> {
        (**self).find_by_user_and_day(user_id, day)
    }

    fn get(&self, record_id: RecordId) -> AttendanceResult<Option<AttendanceRecord>> {
        (**self).get(record_id)
    }

    fn create_if_absent(&self, draft: RecordDraft) -> AttendanceResult<AttendanceRecord> {
        (**self).create_if_absent(draft)
    }

    fn complete_check_out(
        &self,
        record_id: RecordId,
        check_out_time: Timestamp,
    ) -> AttendanceResult<AttendanceRecord> {
        (**self).complete_check_out(record_id, check_out_time)
    }

    fn query_range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> AttendanceResult<Vec<AttendanceRecord>> {
        (**self).query_range(start, end)
    }

    fn query_by_user(&self, user_id: UserId) -> AttendanceResult<Vec<AttendanceRecord>> {
        (**self).query_by_user(user_id)
    }
}
