//! User directory used for display enrichment only.

use std::sync::RwLock;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    record::AttendanceRecord,
    types::{AttendanceStatus, AttendanceType, RecordId, Timestamp, UserId},
};

/// Name shown when a record's user is not in the directory.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Caller role, used by callers for feature gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Regular employee.
    Employee,
    /// Administrator with access to range queries and export.
    Admin,
}

impl Role {
    /// True for [`Role::Admin`].
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user id.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Role.
    pub role: Role,
}

/// Lookup of users by id, never consulted for validation.
pub trait UserDirectory: Send + Sync {
    /// User by id.
    fn get(&self, user_id: UserId) -> Option<User>;

    /// Display name, falling back to [`UNKNOWN_USER`].
    fn display_name(&self, user_id: UserId) -> String {
        self.get(user_id)
            .map(|u| u.username)
            .unwrap_or_else(|| UNKNOWN_USER.to_string())
    }
}

/// Thread-safe in-memory directory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory pre-filled with `users`.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let dir = Self::new();
        for user in users {
            dir.upsert(user);
        }
        dir
    }

    /// Inserts or replaces a user, returning the previous entry.
    pub fn upsert(&self, user: User) -> Option<User> {
        let mut users = self.users.write().unwrap_or_else(|p| p.into_inner());
        users.insert(user.user_id, user)
    }

    /// Removes a user.
    pub fn remove(&self, user_id: UserId) -> Option<User> {
        let mut users = self.users.write().unwrap_or_else(|p| p.into_inner());
        users.remove(&user_id)
    }
}

impl UserDirectory for InMemoryDirectory {
    fn get(&self, user_id: UserId) -> Option<User> {
        let users = self.users.read().unwrap_or_else(|p| p.into_inner());
        users.get(&user_id).cloned()
    }
}

/// Record enriched with the user's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceView {
    pub record_id: RecordId,
    pub user_id: UserId,
    pub username: String,
    pub record_date: Timestamp,
    pub check_in_time: Option<Timestamp>,
    pub check_out_time: Option<Timestamp>,
    pub attendance_type: AttendanceType,
    pub status: AttendanceStatus,
}

impl AttendanceView {
    /// Attaches the directory's display name to `record`.
    pub fn enrich(record: &AttendanceRecord, directory: &dyn UserDirectory) -> Self {
        Self {
            record_id: record.record_id,
            user_id: record.user_id,
            username: directory.display_name(record.user_id),
            record_date: record.record_date,
            check_in_time: record.check_in_time,
            check_out_time: record.check_out_time,
            attendance_type: record.attendance_type,
            status: record.status,
        }
    }
}
