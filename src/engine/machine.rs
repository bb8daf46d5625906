use crate::{
    error::{AttendanceError, AttendanceResult},
    record::AttendanceRecord,
    types::{AttendanceStatus, CalendarDay, EventKind, RecordId, UserId},
};

/// State of one (user, day) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    None,
    InProgress(RecordId),
    Completed(RecordId),
    OnLeave(RecordId),
}

impl DayState {
    pub fn of(record: Option<&AttendanceRecord>) -> Self {
        match record {
            None => Self::None,
            Some(rec) => match rec.status {
                AttendanceStatus::InProgress => Self::InProgress(rec.record_id),
                AttendanceStatus::Completed => Self::Completed(rec.record_id),
                AttendanceStatus::AnnualLeave => Self::OnLeave(rec.record_id),
            },
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed(_) | Self::OnLeave(_))
    }
}

/// Store operation chosen for an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateWork,
    CreateLeave,
    Complete(RecordId),
}

/// Decides whether `kind` is legal from `state` for `user_id` on `day`.
pub fn decide(
    state: DayState,
    kind: EventKind,
    user_id: UserId,
    day: CalendarDay,
) -> AttendanceResult<Action> {
    match (kind, state) {
        (EventKind::CheckIn, DayState::None) => Ok(Action::CreateWork),
        (EventKind::AnnualLeave, DayState::None) => Ok(Action::CreateLeave),
        (EventKind::CheckIn | EventKind::AnnualLeave, _) => {
            Err(AttendanceError::AlreadyRecorded { user_id, day })
        }
        (EventKind::CheckOut, DayState::InProgress(id)) => Ok(Action::Complete(id)),
        (EventKind::CheckOut, DayState::Completed(id)) => {
            Err(AttendanceError::AlreadyCompleted(id))
        }
        (EventKind::CheckOut, DayState::None | DayState::OnLeave(_)) => {
            Err(AttendanceError::NoCheckIn { user_id })
        }
    }
}
