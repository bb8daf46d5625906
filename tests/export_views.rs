use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use attendlog::{
    config::RuntimeConfig,
    core::sharded::ShardedStore,
    directory::{AttendanceView, InMemoryDirectory, Role, User, UserDirectory, UNKNOWN_USER},
    engine::clock::ManualClock,
    export::{Exporter, HEADERS, TsvExporter, build_rows, export_file_name},
    record::AttendanceRequest,
    runtime::handle::spawn_attendance,
};

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn directory() -> InMemoryDirectory {
    InMemoryDirectory::with_users([
        User {
            user_id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role: Role::Employee,
        },
        User {
            user_id: 2,
            username: "bob\tthe admin".to_string(),
            email: "bob@example.com".to_string(),
            role: Role::Admin,
        },
    ])
}

#[test]
fn directory_lookup_falls_back_to_unknown() {
    let dir = directory();
    assert_eq!(dir.display_name(1), "alice");
    assert_eq!(dir.display_name(77), UNKNOWN_USER);
    assert!(dir.get(2).is_some_and(|u| u.role.is_admin()));

    dir.remove(1);
    assert_eq!(dir.display_name(1), UNKNOWN_USER);
}

#[tokio::test]
async fn range_export_renders_work_and_leave_rows() {
    let clock = Arc::new(ManualClock::new(at(11, 9, 5)));
    let handle = spawn_attendance(
        ShardedStore::new(),
        None,
        Arc::clone(&clock),
        RuntimeConfig::default(),
    );
    handle.record_attendance(&AttendanceRequest::check_in(1)).expect("in");
    clock.set(at(11, 17, 50));
    handle.record_attendance(&AttendanceRequest::check_out(1)).expect("out");
    handle
        .record_attendance(&AttendanceRequest::annual_leave(2, Some(at(12, 0, 0).date())))
        .expect("leave");
    handle.record_attendance(&AttendanceRequest::check_in(3)).expect("in 3");

    let dir = directory();
    let bytes = handle
        .export_range(at(11, 0, 0), at(12, 0, 0), &dir, &TsvExporter)
        .expect("export");
    let text = String::from_utf8(bytes).expect("utf8");
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], HEADERS.join("\t"));
    assert_eq!(lines[1], "1\talice\t2024/03/11\twork\t09:05\t17:50\t8h45m");
    assert_eq!(lines[2], "2\tbob the admin\t2024/03/12\tannual_leave\t-\t-\tleave");
    assert_eq!(lines[3], format!("3\t{UNKNOWN_USER}\t2024/03/11\twork\t17:50\t\t"));
    assert_eq!(lines.len(), 4);

    let views = handle
        .views_by_date_range(at(11, 0, 0), at(11, 0, 0), &dir)
        .expect("views");
    let names: Vec<_> = views.iter().map(|v: &AttendanceView| v.username.as_str()).collect();
    assert_eq!(names, vec!["alice", UNKNOWN_USER]);
}

#[test]
fn empty_range_exports_header_only() {
    let rows = build_rows(&[], &directory());
    let bytes = TsvExporter.render(&rows).expect("render");
    assert_eq!(String::from_utf8(bytes).expect("utf8"), format!("{}\n", HEADERS.join("\t")));
}

#[test]
fn export_file_name_uses_compact_dates() {
    assert_eq!(
        export_file_name(at(1, 0, 0), at(31, 23, 59)),
        "attendance_20240301_to_20240331.tsv"
    );
}
