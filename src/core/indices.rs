use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::types::{CalendarDay, RecordId, UserId};

/// The (user, calendar day) pair daily uniqueness is enforced over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub user_id: UserId,
    pub day: CalendarDay,
}

impl RecordKey {
    pub fn new(user_id: UserId, day: CalendarDay) -> Self {
        Self { user_id, day }
    }
}

pub type VecIndex<K> = HashMap<K, Vec<RecordId>>;

/// Ordered day index backing range queries.
pub type DayIndex = BTreeMap<CalendarDay, Vec<RecordId>>;
