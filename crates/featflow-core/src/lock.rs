//! Cooperative per-feature lock stored as `<feature dir>/.lock`.
//!
//! The lock is advisory: every mutator is expected to go through
//! [`LockManager::check_lock`] or hold the lock via [`LockManager::acquire`].
//! A lock older than the configured timeout is stale and may be cleared by
//! any acquirer.

use crate::error::{FlowError, Result};
use crate::feature::Feature;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Retries after clearing a stale lock before giving up.
const MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub locked_at: DateTime<Utc>,
    pub locked_by: String,
    pub pid: u32,
}

impl LockInfo {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.locked_at
    }
}

#[derive(Debug, Clone)]
pub struct LockManager {
    timeout: Duration,
    pid: u32,
    identity: String,
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

impl LockManager {
    /// A manager acting for the current process and user.
    pub fn new(timeout: Duration) -> Self {
        Self::with_identity(timeout, std::process::id(), current_user())
    }

    /// A manager acting as an arbitrary process.
    pub fn with_identity(timeout: Duration, pid: u32, identity: impl Into<String>) -> Self {
        Self {
            timeout,
            pid,
            identity: identity.into(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_stale(&self, info: &LockInfo, now: DateTime<Utc>) -> bool {
        info.age(now) > self.timeout
    }

    /// Current lock record, if the feature is locked.
    pub fn read(&self, feature: &Feature) -> Result<Option<LockInfo>> {
        match std::fs::read_to_string(feature.lock_path()) {
            Ok(data) => Ok(Some(serde_yaml::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_held_by_self(&self, feature: &Feature) -> bool {
        matches!(self.read(feature), Ok(Some(info)) if info.pid == self.pid)
    }

    pub fn acquire(&self, feature: &Feature) -> Result<()> {
        self.acquire_with_retry(feature, 0)
    }

    fn acquire_with_retry(&self, feature: &Feature, retry_count: u32) -> Result<()> {
        let lock_path = feature.lock_path();
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                let info = LockInfo {
                    locked_at: Utc::now(),
                    locked_by: self.identity.clone(),
                    pid: self.pid,
                };
                file.write_all(serde_yaml::to_string(&info)?.as_bytes())?;
                file.sync_all()?;
                tracing::debug!(feature = %feature.name, pid = self.pid, "lock acquired");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                self.handle_existing_lock(feature, &lock_path, retry_count)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn handle_existing_lock(
        &self,
        feature: &Feature,
        lock_path: &Path,
        retry_count: u32,
    ) -> Result<()> {
        let data = match std::fs::read_to_string(lock_path) {
            Ok(data) => data,
            // Released between our create attempt and this read.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return self.retry(feature, retry_count, None);
            }
            Err(e) => return Err(e.into()),
        };

        let info: LockInfo = match serde_yaml::from_str(&data) {
            Ok(info) => info,
            // An empty or partial record may belong to a holder that has not
            // finished writing it; only its age makes it reclaimable.
            Err(e) => {
                if !self.file_is_stale(lock_path)? {
                    return Err(FlowError::FeatureLocked {
                        feature: feature.name.clone(),
                        locked_by: "unknown".to_string(),
                    });
                }
                tracing::warn!(
                    feature = %feature.name,
                    error = %e,
                    "stale unreadable lock file, clearing"
                );
                remove_lock_file(lock_path)?;
                return self.retry(feature, retry_count, None);
            }
        };

        if info.pid == self.pid {
            tracing::debug!(feature = %feature.name, pid = self.pid, "lock already held");
            return Ok(());
        }

        let now = Utc::now();
        if !self.is_stale(&info, now) {
            return Err(FlowError::FeatureLocked {
                feature: feature.name.clone(),
                locked_by: info.locked_by,
            });
        }

        tracing::warn!(
            feature = %feature.name,
            pid = info.pid,
            locked_by = %info.locked_by,
            age_minutes = info.age(now).num_minutes(),
            "clearing stale lock"
        );
        remove_lock_file(lock_path)?;
        self.retry(feature, retry_count, Some(info))
    }

    /// Age of the lock file itself, for records that cannot be parsed. A file
    /// that vanished counts as stale.
    fn file_is_stale(&self, lock_path: &Path) -> Result<bool> {
        let modified = match std::fs::metadata(lock_path).and_then(|m| m.modified()) {
            Ok(t) => DateTime::<Utc>::from(t),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        };
        Ok(Utc::now() - modified > self.timeout)
    }

    fn retry(&self, feature: &Feature, retry_count: u32, last: Option<LockInfo>) -> Result<()> {
        if retry_count >= MAX_RETRIES {
            return Err(FlowError::FeatureLocked {
                feature: feature.name.clone(),
                locked_by: last
                    .map(|i| i.locked_by)
                    .unwrap_or_else(|| "another process".to_string()),
            });
        }
        self.acquire_with_retry(feature, retry_count + 1)
    }

    /// Delete the lock file. Releasing an unlocked feature is a no-op.
    pub fn release(&self, feature: &Feature) -> Result<()> {
        remove_lock_file(&feature.lock_path())?;
        tracing::debug!(feature = %feature.name, "lock released");
        Ok(())
    }

    /// Gate for mutating operations: takes the lock when free or stale,
    /// passes when already held by this process, and fails with
    /// `FeatureLocked` when another live holder has it.
    pub fn check_lock(&self, feature: &Feature) -> Result<()> {
        self.acquire(feature)
    }
}

fn remove_lock_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
