//! Durable subscription store: one JSON file, rewritten atomically on
//! every mutation, mirrored in memory behind a mutex.
//!
//! Mutations are serialized through the mutex; a failed write rolls the
//! mirror back so it always matches the file.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

use crate::model::{IdentityKey, Subscription};

/// Result of an `add`: adding an existing identity is a no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Duplicate,
}

/// Result of a `remove`: removing a missing identity is a no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

#[derive(Debug)]
pub struct SubscriptionStore {
    path: PathBuf,
    subs: Mutex<Vec<Subscription>>,
}

impl SubscriptionStore {
    /// Open the store at `path`, reading existing records if the file
    /// exists. Parent directories are created as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create store directory: {}", parent.display())
            })?;
        }

        let subs = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read subscription store: {}", path.display()))?;
            serde_json::from_str(&contents).with_context(|| {
                format!("Failed to parse subscription store: {}", path.display())
            })?
        } else {
            Vec::new()
        };

        Ok(Self { path, subs: Mutex::new(subs) })
    }

    /// Add a subscription. Idempotent on the identity key.
    pub fn add(&self, sub: Subscription) -> Result<AddOutcome> {
        let key = sub.identity();
        let mut subs = self.subs.lock();

        if subs.iter().any(|s| s.identity() == key) {
            return Ok(AddOutcome::Duplicate);
        }

        subs.push(sub);
        if let Err(err) = persist(&self.path, &subs) {
            // Keep the mirror consistent with the file.
            subs.pop();
            return Err(err);
        }

        Ok(AddOutcome::Added)
    }

    /// Remove the subscription with the given identity, if present.
    pub fn remove(&self, key: &IdentityKey) -> Result<RemoveOutcome> {
        let mut subs = self.subs.lock();

        let Some(pos) = subs.iter().position(|s| s.identity() == *key) else {
            return Ok(RemoveOutcome::NotFound);
        };

        let removed = subs.remove(pos);
        if let Err(err) = persist(&self.path, &subs) {
            subs.insert(pos, removed);
            return Err(err);
        }

        Ok(RemoveOutcome::Removed)
    }

    /// Subscriptions for one chat, or all of them, in insertion order.
    pub fn list(&self, chat_id: Option<i64>) -> Vec<Subscription> {
        let subs = self.subs.lock();
        match chat_id {
            Some(id) => subs.iter().filter(|s| s.chat_id == id).cloned().collect(),
            None => subs.clone(),
        }
    }

    /// Every record, in insertion order. Used once at process start to
    /// rehydrate the scheduler.
    pub fn load_all(&self) -> Vec<Subscription> {
        self.list(None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write-to-temp then rename, so a crash mid-write never leaves a
/// truncated store behind.
fn persist(path: &Path, subs: &[Subscription]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;

    let json = serde_json::to_vec_pretty(subs)
        .context("Failed to serialize subscriptions to JSON")?;
    tmp.write_all(&json)
        .context("Failed to write subscription store temp file")?;

    tmp.persist(path)
        .with_context(|| format!("Failed to replace subscription store: {}", path.display()))?;

    Ok(())
}
