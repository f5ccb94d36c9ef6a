use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sha2::{Digest as _, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{PusherError, Result};

/// Persisted mapping from a period key (a calendar date) to the last content
/// recorded for it.
pub trait ArchiveStore {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn store(&mut self, key: &str, content: &str) -> Result<()>;
}

/// Outcome of comparing new content with the archived content for a period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Identical to what is already recorded. Nothing was written.
    Unchanged { fingerprint: String },
    /// New or different content.
    Updated {
        fingerprint: String,
        previous: Option<String>,
    },
}

impl GateDecision {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, GateDecision::Unchanged { .. })
    }
}

/// Compare `content` with the recorded content for `key` without writing.
pub fn check(store: &dyn ArchiveStore, key: &str, content: &str) -> Result<GateDecision> {
    let current = fingerprint(content);
    let existing = store.load(key)?;

    if existing.as_deref() == Some(content) {
        debug!(key, fingerprint = %current, "archived content unchanged");
        return Ok(GateDecision::Unchanged {
            fingerprint: current,
        });
    }

    Ok(GateDecision::Updated {
        fingerprint: current,
        previous: existing.as_deref().map(fingerprint),
    })
}

/// [`check`], then record `content` for `key` when it differs.
pub fn evaluate(store: &mut dyn ArchiveStore, key: &str, content: &str) -> Result<GateDecision> {
    let decision = check(store, key, content)?;
    if !decision.is_unchanged() {
        store.store(key, content)?;
    }
    Ok(decision)
}

/// Calendar date of `now` in `tz`, e.g. "2024-03-02".
pub fn period_key(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format("%Y-%m-%d").to_string()
}

/// Short SHA-256 hex fingerprint, for log lines.
pub fn fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..6])
}

// ---------------------------------------------------------------------------
// File-backed archive: one <key>.md per period
// ---------------------------------------------------------------------------

pub struct FileArchive {
    dir: PathBuf,
}

impl FileArchive {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PusherError::Archive(format!("invalid archive key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.md")))
    }
}

impl ArchiveStore for FileArchive {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| PusherError::Archive(format!("failed to read {}: {e}", path.display())))
    }

    fn store(&mut self, key: &str, content: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            PusherError::Archive(format!(
                "failed to create archive dir {}: {e}",
                self.dir.display()
            ))
        })?;
        std::fs::write(&path, content)
            .map_err(|e| PusherError::Archive(format!("failed to write {}: {e}", path.display())))
    }
}

// ---------------------------------------------------------------------------
// In-memory archive
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryArchive {
    entries: HashMap<String, String>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl ArchiveStore for MemoryArchive {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn store(&mut self, key: &str, content: &str) -> Result<()> {
        self.entries.insert(key.to_string(), content.to_string());
        Ok(())
    }
}
