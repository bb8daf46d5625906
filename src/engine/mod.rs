//! Attendance event validation and state transitions.

/// Top-level engine applying requests to a record store.
pub mod attendance;
/// Injectable wall-clock sources.
pub mod clock;
/// Per-day state machine.
pub mod machine;
