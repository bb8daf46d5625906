pub mod sqlite;

use thiserror::Error;

use crate::{
    core::sharded::StoreSnapshotV1,
    error::AttendanceError,
    op::StoredOp,
    types::OpSeq,
};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

impl From<AttendanceError> for PersistError {
    fn from(value: AttendanceError) -> Self {
        Self::Message(format!("store error: {value}"))
    }
}

impl From<PersistError> for AttendanceError {
    fn from(value: PersistError) -> Self {
        Self::StorageUnavailable(value.to_string())
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Write-ahead hook invoked with each accepted op before it is applied.
///
/// Returning an error aborts the mutation, which then surfaces to the caller
/// as [`AttendanceError::StorageUnavailable`].
pub trait OpJournal: Send + Sync {
    fn record(&self, stored: &StoredOp) -> PersistResult<()>;
}

/// Durable destination for batches of journaled ops.
pub trait OpSink: Send {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
    fn write_snapshot(
        &mut self,
        _snapshot: &StoreSnapshotV1,
        _last_seq: OpSeq,
    ) -> PersistResult<()> {
        Ok(())
    }
    fn compact_through(&mut self, _seq: OpSeq) -> PersistResult<usize> {
        Ok(0)
    }
}
