//! In-memory record store, its indices, and the concurrent sharded front.

/// Key and index aliases.
pub mod indices;
/// Concurrent store partitioned by record key.
pub mod sharded;
/// Single-owner indexed store used as one shard.
pub mod store;
/// Record store interface consumed by the engine.
pub mod traits;
