use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};

use attendlog::{
    core::{
        sharded::{ShardedStore, shard_for_id, shard_for_key},
        store::AttendanceStore,
        traits::RecordStore,
    },
    error::AttendanceError,
    record::RecordDraft,
    types::{AttendanceStatus, AttendanceType},
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
}

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    day(d).and_hms_opt(h, m, 0).unwrap()
}

#[test]
fn single_store_ids_are_monotonic() {
    let mut store = AttendanceStore::new();
    let mut ids = Vec::new();
    for (seq, user) in (1u64..=3).enumerate() {
        let op = store.plan_create(RecordDraft::work(user, at(1, 9, 0))).unwrap();
        let stored = attendlog::op::StoredOp { seq: seq as u64 + 1, ts_ms: 0, op };
        ids.push(store.apply(&stored).unwrap().record_id);
    }
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn create_if_absent_rejects_second_record_for_same_day_without_mutation() {
    let store = ShardedStore::new();
    let first = store.create_if_absent(RecordDraft::work(1, at(1, 9, 0))).unwrap();
    assert_eq!(first.status, AttendanceStatus::InProgress);
    assert_eq!(first.check_in_time, Some(at(1, 9, 0)));

    let err = store
        .create_if_absent(RecordDraft::leave(1, day(1)))
        .unwrap_err();
    assert_eq!(err, AttendanceError::Conflict { user_id: 1, day: day(1) });

    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(store.find_by_user_and_day(1, day(1)).unwrap(), Some(first));
}

#[test]
fn lookup_uses_calendar_day_not_timestamp() {
    let store = ShardedStore::new();
    let rec = store.create_if_absent(RecordDraft::work(4, at(2, 23, 59))).unwrap();

    assert_eq!(store.find_by_user_and_day(4, day(2)).unwrap(), Some(rec));
    assert_eq!(store.find_by_user_and_day(4, day(3)).unwrap(), None);
    assert_eq!(store.find_by_user_and_day(5, day(2)).unwrap(), None);
}

#[test]
fn leave_records_are_normalized_to_midnight_without_times() {
    let store = ShardedStore::new();
    let rec = store.create_if_absent(RecordDraft::leave(2, day(6))).unwrap();
    assert_eq!(rec.record_date, at(6, 0, 0));
    assert_eq!(rec.attendance_type, AttendanceType::AnnualLeave);
    assert_eq!(rec.status, AttendanceStatus::AnnualLeave);
    assert_eq!((rec.check_in_time, rec.check_out_time), (None, None));
    assert!(rec.is_consistent());
}

#[test]
fn complete_check_out_enforces_ordering_and_single_completion() {
    let store = ShardedStore::new();
    let rec = store.create_if_absent(RecordDraft::work(1, at(1, 9, 0))).unwrap();

    let err = store.complete_check_out(rec.record_id, at(1, 9, 0)).unwrap_err();
    assert!(matches!(
        err,
        AttendanceError::InvalidOrdering { record_id, .. } if record_id == rec.record_id
    ));
    let err = store.complete_check_out(rec.record_id, at(1, 8, 0)).unwrap_err();
    assert!(matches!(err, AttendanceError::InvalidOrdering { .. }));
    assert_eq!(store.get(rec.record_id).unwrap().unwrap().status, AttendanceStatus::InProgress);

    let done = store.complete_check_out(rec.record_id, at(1, 18, 0)).unwrap();
    assert_eq!(done.check_out_time, Some(at(1, 18, 0)));
    assert_eq!(done.status, AttendanceStatus::Completed);
    assert!(done.is_consistent());

    assert_eq!(
        store.complete_check_out(rec.record_id, at(1, 19, 0)).unwrap_err(),
        AttendanceError::AlreadyCompleted(rec.record_id)
    );
    assert_eq!(store.get(rec.record_id).unwrap(), Some(done));
}

#[test]
fn complete_check_out_of_unknown_or_leave_record_fails() {
    let store = ShardedStore::new();
    assert_eq!(
        store.complete_check_out(999, at(1, 18, 0)).unwrap_err(),
        AttendanceError::NotFound(999)
    );
    assert_eq!(
        store.complete_check_out(0, at(1, 18, 0)).unwrap_err(),
        AttendanceError::NotFound(0)
    );

    let leave = store.create_if_absent(RecordDraft::leave(3, day(1))).unwrap();
    assert_eq!(
        store.complete_check_out(leave.record_id, at(1, 18, 0)).unwrap_err(),
        AttendanceError::NoCheckIn { user_id: 3 }
    );
}

#[test]
fn record_ids_route_to_the_shard_of_their_key() {
    let store = ShardedStore::new();
    for user in 1..=40u64 {
        for d in 1..=5 {
            let rec = store.create_if_absent(RecordDraft::work(user, at(d, 9, 0))).unwrap();
            assert_eq!(shard_for_id(rec.record_id), Some(shard_for_key(user, day(d))));
        }
    }
    assert_eq!(store.len().unwrap(), 200);
}

#[test]
fn range_query_is_day_inclusive_and_sorted() {
    let store = ShardedStore::new();
    store.create_if_absent(RecordDraft::work(2, at(3, 9, 30))).unwrap();
    store.create_if_absent(RecordDraft::work(1, at(5, 10, 0))).unwrap();
    store.create_if_absent(RecordDraft::work(1, at(3, 8, 0))).unwrap();
    store.create_if_absent(RecordDraft::leave(2, day(4))).unwrap();
    store.create_if_absent(RecordDraft::work(3, at(6, 9, 0))).unwrap();
    store.create_if_absent(RecordDraft::work(3, at(2, 9, 0))).unwrap();

    // End at midnight still covers the whole end day.
    let out = store.query_range(at(3, 0, 0), at(5, 0, 0)).unwrap();
    let keys: Vec<_> = out.iter().map(|r| (r.user_id, r.day())).collect();
    assert_eq!(
        keys,
        vec![(1, day(3)), (1, day(5)), (2, day(3)), (2, day(4))]
    );

    // Start late in the day still covers the whole start day.
    let out = store.query_range(at(3, 23, 0), at(3, 23, 30)).unwrap();
    assert_eq!(out.len(), 2);

    assert!(store.query_range(at(10, 0, 0), at(12, 0, 0)).unwrap().is_empty());
}

#[test]
fn inverted_range_fails() {
    let store = ShardedStore::new();
    let err = store.query_range(at(5, 0, 0), at(4, 0, 0)).unwrap_err();
    assert_eq!(
        err,
        AttendanceError::InvalidRange {
            start: at(5, 0, 0),
            end: at(4, 0, 0)
        }
    );
}

#[test]
fn user_query_is_newest_first() {
    let store = ShardedStore::new();
    for d in [4, 1, 7, 2] {
        store.create_if_absent(RecordDraft::work(9, at(d, 9, 0))).unwrap();
    }
    store.create_if_absent(RecordDraft::work(8, at(3, 9, 0))).unwrap();

    let days: Vec<_> = store
        .query_by_user(9)
        .unwrap()
        .iter()
        .map(|r| r.day())
        .collect();
    assert_eq!(days, vec![day(7), day(4), day(2), day(1)]);
    assert!(store.query_by_user(77).unwrap().is_empty());
}

#[test]
fn user_query_sees_records_across_shards_and_after_check_out() {
    let store = ShardedStore::new();
    let mut ids = Vec::new();
    for d in 1..=20 {
        ids.push(store.create_if_absent(RecordDraft::work(5, at(d, 9, 0))).unwrap().record_id);
    }
    let shards: BTreeSet<_> = ids.iter().filter_map(|id| shard_for_id(*id)).collect();
    assert!(shards.len() > 1);

    store.complete_check_out(ids[3], at(4, 17, 0)).unwrap();
    let records = store.query_by_user(5).unwrap();
    assert_eq!(records.len(), 20);
    assert_eq!(records[0].day(), day(20));
    let fourth = records.iter().find(|r| r.record_id == ids[3]).unwrap();
    assert_eq!(fourth.status, AttendanceStatus::Completed);
}

#[test]
fn snapshot_restores_identical_state() {
    let store = ShardedStore::new();
    let a = store.create_if_absent(RecordDraft::work(1, at(1, 9, 0))).unwrap();
    store.create_if_absent(RecordDraft::leave(2, day(8))).unwrap();
    store.complete_check_out(a.record_id, at(1, 17, 0)).unwrap();

    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.next_op_seq, 4);
    let restored = ShardedStore::from_snapshot(snapshot.clone()).unwrap();
    assert_eq!(restored.snapshot().unwrap(), snapshot);
    assert_eq!(restored.latest_op_seq(), 3);

    // New ids never collide with restored ones.
    let fresh = restored.create_if_absent(RecordDraft::work(1, at(2, 9, 0))).unwrap();
    assert!(snapshot.records.iter().all(|r| r.record_id != fresh.record_id));
}
