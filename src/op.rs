//! Mutation operation model and persistence wrappers.

use serde::{Deserialize, Serialize};

use crate::{
    record::AttendanceRecord,
    types::{OpSeq, RecordId, Timestamp},
};

/// Version number for serialized [`StoredOpEnvelope`] payloads.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Immutable operation appended to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Insert a fully materialized record.
    Create {
        /// Created record.
        record: AttendanceRecord,
    },
    /// Fill the check-out time of an open work record.
    CheckOut {
        /// Record to complete.
        record_id: RecordId,
        /// Check-out moment.
        check_out_time: Timestamp,
    },
}

impl Op {
    /// Identifier of the record this op touches.
    pub fn record_id(&self) -> RecordId {
        match self {
            Op::Create { record } => record.record_id,
            Op::CheckOut { record_id, .. } => *record_id,
        }
    }
}

/// Journal row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Monotonic operation sequence.
    pub seq: OpSeq,
    /// Operation timestamp in milliseconds.
    pub ts_ms: u64,
    /// Operation body.
    pub op: Op,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOpEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped operation.
    pub stored: StoredOp,
}

impl StoredOpEnvelope {
    /// Constructs an envelope using [`OP_FORMAT_VERSION`].
    pub fn new(stored: StoredOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            stored,
        }
    }
}
