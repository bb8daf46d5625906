use std::ops::RangeInclusive;

use hashbrown::HashMap;

use crate::{
    error::{AttendanceError, AttendanceResult},
    op::{Op, StoredOp},
    record::{AttendanceRecord, RecordDraft},
    types::{AttendanceStatus, CalendarDay, RecordId, Timestamp, UserId},
};

use super::indices::{DayIndex, RecordKey};

/// Single-owner indexed record set: primary by id, unique (user, day) key,
/// and an ordered day index.
///
/// Mutations are split into a side-effect free `plan_*` step that validates
/// and materializes an [`Op`], and [`AttendanceStore::apply`] which commits
/// it. Callers that journal ops put the journal write between the two.
///
/// Identifiers are allocated as `offset + 1 + n * stride`, so several stores
/// can share one id space without coordination.
#[derive(Debug)]
pub struct AttendanceStore {
    records: HashMap<RecordId, AttendanceRecord>,
    by_key: HashMap<RecordKey, RecordId>,
    by_day: DayIndex,
    next_local: u64,
    offset: u64,
    stride: u64,
}

impl Default for AttendanceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AttendanceStore {
    pub fn new() -> Self {
        Self::with_id_stride(0, 1)
    }

    pub fn with_id_stride(offset: u64, stride: u64) -> Self {
        let stride = stride.max(1);
        Self {
            records: HashMap::new(),
            by_key: HashMap::new(),
            by_day: DayIndex::new(),
            next_local: 0,
            offset: offset % stride,
            stride,
        }
    }

    /// True when `id` belongs to this store's id space.
    pub fn owns_id(&self, id: RecordId) -> bool {
        id > 0 && (id - 1) % self.stride == self.offset
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&AttendanceRecord> {
        self.records.get(&id)
    }

    pub fn find_by_user_and_day(
        &self,
        user_id: UserId,
        day: CalendarDay,
    ) -> Option<&AttendanceRecord> {
        self.by_key
            .get(&RecordKey::new(user_id, day))
            .and_then(|id| self.records.get(id))
    }

    pub fn in_days(
        &self,
        days: RangeInclusive<CalendarDay>,
    ) -> impl Iterator<Item = &AttendanceRecord> {
        self.by_day
            .range(days)
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| self.records.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttendanceRecord> {
        self.records.values()
    }

    /// Validates `draft` and materializes the record it would create.
    pub fn plan_create(&self, draft: RecordDraft) -> AttendanceResult<Op> {
        let user_id = draft.user_id();
        let day = draft.day();
        if self.by_key.contains_key(&RecordKey::new(user_id, day)) {
            return Err(AttendanceError::Conflict { user_id, day });
        }

        let record = draft.into_record(self.id_for_local(self.next_local));
        Ok(Op::Create { record })
    }

    /// Validates a check-out of `id` at `at`.
    pub fn plan_check_out(&self, id: RecordId, at: Timestamp) -> AttendanceResult<Op> {
        let rec = self.records.get(&id).ok_or(AttendanceError::NotFound(id))?;
        let Some(check_in) = rec.check_in_time else {
            return Err(AttendanceError::NoCheckIn {
                user_id: rec.user_id,
            });
        };
        if rec.check_out_time.is_some() {
            return Err(AttendanceError::AlreadyCompleted(id));
        }
        if at <= check_in {
            return Err(AttendanceError::InvalidOrdering {
                record_id: id,
                check_in,
                check_out: at,
            });
        }
        Ok(Op::CheckOut {
            record_id: id,
            check_out_time: at,
        })
    }

    /// Commits a planned or replayed op and returns the resulting record.
    ///
    /// Ops are re-validated so a corrupt journal cannot break the invariants.
    pub fn apply(&mut self, stored: &StoredOp) -> AttendanceResult<AttendanceRecord> {
        match &stored.op {
            Op::Create { record } => self.apply_create(record.clone()),
            Op::CheckOut {
                record_id,
                check_out_time,
            } => self.apply_check_out(*record_id, *check_out_time),
        }
    }

    /// Inserts a record restored from a snapshot.
    pub fn restore(&mut self, record: AttendanceRecord) -> AttendanceResult<()> {
        self.apply_create(record).map(|_| ())
    }

    fn apply_create(&mut self, record: AttendanceRecord) -> AttendanceResult<AttendanceRecord> {
        let key = RecordKey::new(record.user_id, record.day());
        if self.by_key.contains_key(&key) {
            return Err(AttendanceError::Conflict {
                user_id: key.user_id,
                day: key.day,
            });
        }
        if self.records.contains_key(&record.record_id) || !self.owns_id(record.record_id) {
            return Err(AttendanceError::StorageUnavailable(format!(
                "record id {} cannot be placed in this store",
                record.record_id
            )));
        }
        if !record.is_consistent() {
            return Err(AttendanceError::StorageUnavailable(format!(
                "record {} violates field consistency",
                record.record_id
            )));
        }

        let id = record.record_id;
        let local = (id - 1) / self.stride;
        self.next_local = self.next_local.max(local.saturating_add(1));
        self.by_key.insert(key, id);
        self.by_day.entry(key.day).or_default().push(id);
        self.records.insert(id, record.clone());
        Ok(record)
    }

    fn apply_check_out(
        &mut self,
        id: RecordId,
        at: Timestamp,
    ) -> AttendanceResult<AttendanceRecord> {
        // Re-run validation against current state; replay may feed stale ops.
        self.plan_check_out(id, at)?;
        let rec = self.records.get_mut(&id).ok_or(AttendanceError::NotFound(id))?;
        rec.check_out_time = Some(at);
        rec.status = AttendanceStatus::Completed;
        Ok(rec.clone())
    }

    fn id_for_local(&self, local: u64) -> RecordId {
        local * self.stride + self.offset + 1
    }
}
