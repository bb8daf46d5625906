use crate::{
    core::traits::RecordStore,
    error::{AttendanceError, AttendanceResult},
    record::{AttendanceRecord, AttendanceRequest, RecordDraft},
    types::{EventKind, Timestamp, UserId, day_of},
};

use super::{
    clock::Clock,
    machine::{Action, DayState, decide},
};

/// Turns [`AttendanceRequest`]s into validated record store transitions.
///
/// The engine holds no state of its own; every decision is re-derived from
/// the store, and the store's atomic primitives settle races between
/// concurrent requests for the same key.
pub struct AttendanceEngine<S: RecordStore, C: Clock> {
    store: S,
    clock: C,
}

impl<S: RecordStore, C: Clock> AttendanceEngine<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Single entry point for check-in, check-out and annual leave.
    ///
    /// Check-in and check-out always act on today; annual leave acts on
    /// `target_date` when given, which may be any past or future day. A
    /// check-in left open past midnight is never touched implicitly: a
    /// check-out on the next day finds no record for that day and fails.
    pub fn record_attendance(
        &self,
        request: &AttendanceRequest,
    ) -> AttendanceResult<AttendanceRecord> {
        let now = self.clock.now();
        let user_id = request.user_id;
        let day = match request.kind {
            EventKind::AnnualLeave => request.target_date.unwrap_or_else(|| day_of(now)),
            EventKind::CheckIn | EventKind::CheckOut => day_of(now),
        };

        let current = self.store.find_by_user_and_day(user_id, day)?;
        match decide(DayState::of(current.as_ref()), request.kind, user_id, day)? {
            Action::CreateWork => self
                .store
                .create_if_absent(RecordDraft::work(user_id, now))
                .map_err(conflict_as_recorded),
            Action::CreateLeave => self
                .store
                .create_if_absent(RecordDraft::leave(user_id, day))
                .map_err(conflict_as_recorded),
            Action::Complete(record_id) => self.store.complete_check_out(record_id, now),
        }
    }

    pub fn get_today_attendance(
        &self,
        user_id: UserId,
    ) -> AttendanceResult<Option<AttendanceRecord>> {
        self.store.find_by_user_and_day(user_id, self.clock.today())
    }

    pub fn get_user_attendance_records(
        &self,
        user_id: UserId,
    ) -> AttendanceResult<Vec<AttendanceRecord>> {
        self.store.query_by_user(user_id)
    }

    pub fn get_attendance_by_date_range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> AttendanceResult<Vec<AttendanceRecord>> {
        self.store.query_range(start, end)
    }
}

// A lost create race is the same duplicate event from the caller's view.
fn conflict_as_recorded(err: AttendanceError) -> AttendanceError {
    match err {
        AttendanceError::Conflict { user_id, day } => {
            AttendanceError::AlreadyRecorded { user_id, day }
        }
        other => other,
    }
}
