//! Runtime tuning and environment-driven service configuration.

use std::{path::PathBuf, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Persistence worker tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub flush_on_create: bool,
    pub batch_max_ops: usize,
    pub batch_max_latency_ms: u64,
    pub persist_queue_bound: usize,
    pub snapshot_every_ops: usize,
    pub compact_after_snapshot: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_create: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            snapshot_every_ops: 2000,
            compact_after_snapshot: false,
        }
    }
}

/// Everything needed to start the attendance service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceConfig {
    /// SQLite journal path; `None` keeps the ledger in memory only.
    pub db_path: Option<PathBuf>,
    pub runtime: RuntimeConfig,
}

impl ServiceConfig {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    ///
    /// Unset keys keep their defaults; set but unparsable keys are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = RuntimeConfig::default();
        let runtime = RuntimeConfig {
            flush_on_create: parse(
                &lookup,
                "ATTENDANCE_FLUSH_ON_CREATE",
                defaults.flush_on_create,
            )?,
            batch_max_ops: parse(&lookup, "ATTENDANCE_BATCH_MAX_OPS", defaults.batch_max_ops)?,
            batch_max_latency_ms: parse(
                &lookup,
                "ATTENDANCE_BATCH_MAX_LATENCY_MS",
                defaults.batch_max_latency_ms,
            )?,
            persist_queue_bound: parse(
                &lookup,
                "ATTENDANCE_PERSIST_QUEUE_BOUND",
                defaults.persist_queue_bound,
            )?
            .max(1),
            snapshot_every_ops: parse(
                &lookup,
                "ATTENDANCE_SNAPSHOT_EVERY_OPS",
                defaults.snapshot_every_ops,
            )?,
            compact_after_snapshot: parse(
                &lookup,
                "ATTENDANCE_COMPACT_AFTER_SNAPSHOT",
                defaults.compact_after_snapshot,
            )?,
        };

        let db_path = lookup("ATTENDANCE_DB_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self { db_path, runtime })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
