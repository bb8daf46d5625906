use std::{
    sync::{
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AttendanceError, AttendanceResult},
    op::{Op, StoredOp},
    persist::OpJournal,
    record::{AttendanceRecord, RecordDraft},
    types::{CalendarDay, OpSeq, RecordId, Timestamp, UserId, day_of},
};

use super::{indices::VecIndex, store::AttendanceStore, traits::RecordStore};

/// Number of independently locked shards.
///
/// Record ids encode their shard, so this value is part of the persisted
/// format and is checked when restoring a snapshot.
pub const SHARD_COUNT: usize = 64;

/// Point-in-time copy of the whole record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshotV1 {
    pub shard_count: usize,
    pub next_op_seq: OpSeq,
    pub records: Vec<AttendanceRecord>,
}

/// Concurrent in-memory [`RecordStore`].
///
/// Keys are spread over [`SHARD_COUNT`] shards, each behind its own lock.
/// Writers only ever hold the lock of the shard owning their key, so two
/// keys contend only when they hash to the same shard. Range queries take
/// every shard's read lock in index order to read one consistent snapshot.
///
/// Per-user lookups go through a separate user index, sharded by user, so
/// they never lock more than one record shard at a time.
pub struct ShardedStore {
    shards: Box<[RwLock<AttendanceStore>]>,
    users: Box<[RwLock<VecIndex<UserId>>]>,
    next_op_seq: AtomicU64,
    journal: Option<Arc<dyn OpJournal>>,
}

impl Default for ShardedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardedStore {
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|idx| {
                RwLock::new(AttendanceStore::with_id_stride(idx as u64, SHARD_COUNT as u64))
            })
            .collect();
        let users = (0..SHARD_COUNT).map(|_| RwLock::new(VecIndex::new())).collect();
        Self {
            shards,
            users,
            next_op_seq: AtomicU64::new(1),
            journal: None,
        }
    }

    /// Routes every accepted mutation through `journal` before applying it.
    pub fn with_journal(mut self, journal: Arc<dyn OpJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> AttendanceResult<Self> {
        if snapshot.shard_count != SHARD_COUNT {
            return Err(AttendanceError::StorageUnavailable(format!(
                "snapshot was taken with {} shards, expected {SHARD_COUNT}",
                snapshot.shard_count
            )));
        }

        let store = Self::new();
        store
            .next_op_seq
            .store(snapshot.next_op_seq.max(1), Ordering::SeqCst);
        for rec in snapshot.records {
            let idx = shard_for_key(rec.user_id, rec.day());
            let (user_id, record_id) = (rec.user_id, rec.record_id);
            store.write_shard(idx)?.restore(rec)?;
            store.index_user(user_id, record_id);
        }
        Ok(store)
    }

    /// Consistent copy of every record, ordered by id.
    pub fn snapshot(&self) -> AttendanceResult<StoreSnapshotV1> {
        let guards = self.read_all()?;
        let mut records: Vec<AttendanceRecord> =
            guards.iter().flat_map(|s| s.iter().cloned()).collect();
        records.sort_by_key(|r| r.record_id);
        Ok(StoreSnapshotV1 {
            shard_count: SHARD_COUNT,
            next_op_seq: self.next_op_seq.load(Ordering::SeqCst),
            records,
        })
    }

    /// Re-applies a journaled op without journaling it again.
    pub fn apply_replayed_op(&self, stored: &StoredOp) -> AttendanceResult<AttendanceRecord> {
        let idx = match &stored.op {
            Op::Create { record } => shard_for_key(record.user_id, record.day()),
            Op::CheckOut { record_id, .. } => {
                shard_for_id(*record_id).ok_or(AttendanceError::NotFound(*record_id))?
            }
        };
        let mut shard = self.write_shard(idx)?;
        let rec = shard.apply(stored)?;
        if matches!(stored.op, Op::Create { .. }) {
            self.index_user(rec.user_id, rec.record_id);
        }
        drop(shard);
        self.next_op_seq
            .fetch_max(stored.seq.saturating_add(1), Ordering::SeqCst);
        Ok(rec)
    }

    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.load(Ordering::SeqCst).saturating_sub(1)
    }

    pub fn len(&self) -> AttendanceResult<usize> {
        Ok(self.read_all()?.iter().map(|s| s.len()).sum())
    }

    pub fn is_empty(&self) -> AttendanceResult<bool> {
        self.len().map(|n| n == 0)
    }

    /// Journals then applies `op` while the caller holds the owning shard's lock.
    fn commit(&self, shard: &mut AttendanceStore, op: Op) -> AttendanceResult<AttendanceRecord> {
        let stored = StoredOp {
            seq: self.next_op_seq.fetch_add(1, Ordering::SeqCst),
            ts_ms: now_ms(),
            op,
        };
        if let Some(journal) = &self.journal {
            journal.record(&stored)?;
        }
        shard.apply(&stored)
    }

    // Called with the record's shard lock held, so a record visible by key
    // is always visible by user too.
    fn index_user(&self, user_id: UserId, record_id: RecordId) {
        let mut users = self.users[shard_for_user(user_id)]
            .write()
            .unwrap_or_else(|p| p.into_inner());
        users.entry(user_id).or_default().push(record_id);
    }

    fn user_record_ids(&self, user_id: UserId) -> Vec<RecordId> {
        let users = self.users[shard_for_user(user_id)]
            .read()
            .unwrap_or_else(|p| p.into_inner());
        users.get(&user_id).cloned().unwrap_or_default()
    }

    fn read_shard(&self, idx: usize) -> AttendanceResult<RwLockReadGuard<'_, AttendanceStore>> {
        self.shards[idx].read().map_err(|_| poisoned(idx))
    }

    fn write_shard(&self, idx: usize) -> AttendanceResult<RwLockWriteGuard<'_, AttendanceStore>> {
        self.shards[idx].write().map_err(|_| poisoned(idx))
    }

    fn read_all(&self) -> AttendanceResult<Vec<RwLockReadGuard<'_, AttendanceStore>>> {
        (0..self.shards.len()).map(|idx| self.read_shard(idx)).collect()
    }
}

impl RecordStore for ShardedStore {
    fn find_by_user_and_day(
        &self,
        user_id: UserId,
        day: CalendarDay,
    ) -> AttendanceResult<Option<AttendanceRecord>> {
        let shard = self.read_shard(shard_for_key(user_id, day))?;
        Ok(shard.find_by_user_and_day(user_id, day).cloned())
    }

    fn get(&self, record_id: RecordId) -> AttendanceResult<Option<AttendanceRecord>> {
        let Some(idx) = shard_for_id(record_id) else {
            return Ok(None);
        };
        Ok(self.read_shard(idx)?.get(record_id).cloned())
    }

    fn create_if_absent(&self, draft: RecordDraft) -> AttendanceResult<AttendanceRecord> {
        let mut shard = self.write_shard(shard_for_key(draft.user_id(), draft.day()))?;
        let op = shard.plan_create(draft)?;
        let rec = self.commit(&mut shard, op)?;
        self.index_user(rec.user_id, rec.record_id);
        Ok(rec)
    }

    fn complete_check_out(
        &self,
        record_id: RecordId,
        check_out_time: Timestamp,
    ) -> AttendanceResult<AttendanceRecord> {
        let idx = shard_for_id(record_id).ok_or(AttendanceError::NotFound(record_id))?;
        let mut shard = self.write_shard(idx)?;
        let op = shard.plan_check_out(record_id, check_out_time)?;
        self.commit(&mut shard, op)
    }

    fn query_range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> AttendanceResult<Vec<AttendanceRecord>> {
        if end < start {
            return Err(AttendanceError::InvalidRange { start, end });
        }
        let days = day_of(start)..=day_of(end);
        let guards = self.read_all()?;
        let mut out: Vec<AttendanceRecord> = guards
            .iter()
            .flat_map(|s| s.in_days(days.clone()).cloned())
            .collect();
        drop(guards);

        out.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then(a.record_date.cmp(&b.record_date))
                .then(a.record_id.cmp(&b.record_id))
        });
        Ok(out)
    }

    fn query_by_user(&self, user_id: UserId) -> AttendanceResult<Vec<AttendanceRecord>> {
        let ids = self.user_record_ids(user_id);
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(rec) = self.get(id)? {
                out.push(rec);
            }
        }

        out.sort_by(|a, b| {
            b.record_date
                .cmp(&a.record_date)
                .then(b.record_id.cmp(&a.record_id))
        });
        Ok(out)
    }
}

/// Deterministic shard for a (user, day) key.
///
/// Must stay stable across restarts since record ids encode it.
pub fn shard_for_key(user_id: UserId, day: CalendarDay) -> usize {
    let days = i64::from(day.num_days_from_ce()) as u64;
    let mut h = user_id.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h ^= days.wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    h ^= h >> 29;
    (h % SHARD_COUNT as u64) as usize
}

/// Shard owning `record_id`, `None` for the never-issued id 0.
pub fn shard_for_id(record_id: RecordId) -> Option<usize> {
    record_id
        .checked_sub(1)
        .map(|v| (v % SHARD_COUNT as u64) as usize)
}

fn shard_for_user(user_id: UserId) -> usize {
    let h = user_id.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    ((h ^ (h >> 31)) % SHARD_COUNT as u64) as usize
}

fn poisoned(idx: usize) -> AttendanceError {
    AttendanceError::StorageUnavailable(format!("shard {idx} lock poisoned"))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
