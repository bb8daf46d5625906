use std::{collections::BTreeSet, sync::Arc};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use attendlog::{
    core::{sharded::ShardedStore, traits::RecordStore},
    engine::{
        attendance::AttendanceEngine,
        clock::{Clock, ManualClock},
    },
    record::{AttendanceRecord, AttendanceRequest},
    types::{UserId, day_of},
};

#[derive(Debug, Clone)]
enum Step {
    CheckIn { user: u8 },
    CheckOut { user: u8 },
    Leave { user: u8, offset: Option<i8> },
    Advance { minutes: u16 },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0u8..6).prop_map(|user| Step::CheckIn { user }),
        (0u8..6).prop_map(|user| Step::CheckOut { user }),
        (0u8..6, prop::option::of(-3i8..4)).prop_map(|(user, offset)| Step::Leave { user, offset }),
        (1u16..900).prop_map(|minutes| Step::Advance { minutes }),
    ]
}

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, 27)
        .unwrap()
        .and_hms_opt(7, 0, 0)
        .unwrap()
}

fn full_scan(records: &[AttendanceRecord], lo: NaiveDate, hi: NaiveDate) -> Vec<AttendanceRecord> {
    let mut out: Vec<_> = records
        .iter()
        .filter(|r| (lo..=hi).contains(&r.day()))
        .cloned()
        .collect();
    out.sort_by_key(|r| (r.user_id, r.record_date, r.record_id));
    out
}

proptest! {
    #[test]
    fn random_event_streams_keep_one_consistent_record_per_key(
        steps in prop::collection::vec(step_strategy(), 1..150),
        lo_offset in 0i64..6,
        span in 0i64..6,
    ) {
        let clock = Arc::new(ManualClock::new(start()));
        let engine = AttendanceEngine::new(ShardedStore::new(), Arc::clone(&clock));
        let mut users = BTreeSet::<UserId>::new();

        for step in steps {
            let now = clock.now();
            let req = match step {
                Step::CheckIn { user } => AttendanceRequest::check_in(u64::from(user) + 1),
                Step::CheckOut { user } => AttendanceRequest::check_out(u64::from(user) + 1),
                Step::Leave { user, offset } => AttendanceRequest::annual_leave(
                    u64::from(user) + 1,
                    offset.map(|o| day_of(now) + Duration::days(i64::from(o))),
                ),
                Step::Advance { minutes } => {
                    clock.advance(Duration::minutes(i64::from(minutes)));
                    continue;
                }
            };
            users.insert(req.user_id);

            let before = engine.store().query_by_user(req.user_id).unwrap();
            match engine.record_attendance(&req) {
                Ok(rec) => {
                    prop_assert!(rec.is_consistent(), "inconsistent {rec:?}");
                    prop_assert_eq!(rec.user_id, req.user_id);
                }
                Err(_) => {
                    let after = engine.store().query_by_user(req.user_id).unwrap();
                    prop_assert_eq!(before, after);
                }
            }
        }

        let mut all = Vec::new();
        for user in &users {
            let records = engine.get_user_attendance_records(*user).unwrap();
            let days: BTreeSet<_> = records.iter().map(|r| r.day()).collect();
            prop_assert_eq!(days.len(), records.len(), "duplicate day for user {}", user);
            for pair in records.windows(2) {
                prop_assert!(pair[0].record_date >= pair[1].record_date);
            }
            for rec in &records {
                prop_assert!(rec.is_consistent(), "inconsistent {rec:?}");
            }
            all.extend(records);
        }
        prop_assert_eq!(engine.store().len().unwrap(), all.len());

        let lo = start().date() - Duration::days(3) + Duration::days(lo_offset);
        let hi = lo + Duration::days(span);
        let ranged = engine
            .get_attendance_by_date_range(
                lo.and_hms_opt(0, 0, 0).unwrap(),
                hi.and_hms_opt(0, 0, 0).unwrap(),
            )
            .unwrap();
        prop_assert_eq!(ranged, full_scan(&all, lo, hi));
    }
}
