//! Workplace attendance ledger: per-day attendance records with atomic
//! check-in, check-out and annual leave transitions, range queries, and
//! optional append-only SQLite journaling.
//!
//! # Examples
//!
//! Engine over the in-memory [`core::sharded::ShardedStore`]:
//! ```
//! use chrono::NaiveDate;
//! use attendlog::{
//!     core::sharded::ShardedStore,
//!     engine::{attendance::AttendanceEngine, clock::ManualClock},
//!     record::AttendanceRequest,
//!     types::AttendanceStatus,
//! };
//!
//! let nine = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
//! let engine = AttendanceEngine::new(ShardedStore::new(), ManualClock::new(nine));
//!
//! let rec = engine.record_attendance(&AttendanceRequest::check_in(1)).expect("check in");
//! assert_eq!(rec.status, AttendanceStatus::InProgress);
//! assert!(engine.record_attendance(&AttendanceRequest::check_in(1)).is_err());
//! ```
//!
//! Runtime usage with SQLite sink:
//! ```no_run
//! use attendlog::{
//!     config::RuntimeConfig,
//!     core::sharded::ShardedStore,
//!     engine::clock::SystemClock,
//!     persist::sqlite::SqliteOpSink,
//!     record::AttendanceRequest,
//!     runtime::handle::spawn_attendance,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteOpSink::open("attendance.db").expect("open sqlite");
//! let store = sink.load_store().expect("replay");
//! let handle = spawn_attendance(store, Some(Box::new(sink)), SystemClock, RuntimeConfig::default());
//! let _rec = handle.record_attendance(&AttendanceRequest::check_in(1)).expect("check in");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Environment-driven configuration.
pub mod config;
/// Record store: indexed shards and the concurrent front.
pub mod core;
/// User directory and display enrichment.
pub mod directory;
/// Attendance engine, clock, and per-day state machine.
pub mod engine;
/// Typed attendance failures.
pub mod error;
/// Tabular export of range queries.
pub mod export;
/// Mutation op model and persistence wrapper types.
pub mod op;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Attendance records, drafts and requests.
pub mod record;
/// Async handle, persistence worker and events.
pub mod runtime;
/// Shared primitive types, enums and calendar helpers.
pub mod types;
