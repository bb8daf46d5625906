//! Async service handle, persistence worker, and event stream.

/// Event stream types emitted by the runtime.
pub mod events;
/// Handle and persistence worker implementation.
pub mod handle;
