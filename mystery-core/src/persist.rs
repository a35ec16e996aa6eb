//! Progress persistence.
//!
//! The whole game is saved as one versioned JSON record after every
//! mutation. There is exactly one record; saving overwrites it. A record
//! that cannot be parsed is treated as absent so the player starts fresh.

use crate::accusation::AccusationSheet;
use crate::character::{Actor, ActorId};
use crate::evidence::EvidenceRegistry;
use crate::notes::Notebook;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Current save format version.
pub const SAVE_VERSION: u32 = 1;

/// Everything needed to resume a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// Seconds since the Unix epoch when the save was made.
    pub saved_at: String,

    /// Session id reported to the endpoint.
    pub session_id: String,

    pub global_story: String,

    pub actors: BTreeMap<ActorId, Actor>,

    pub current_actor: ActorId,

    pub evidence: EvidenceRegistry,

    pub action_countdown: u32,

    #[serde(default)]
    pub countdown_ended: bool,

    #[serde(default)]
    pub end_game: bool,

    #[serde(default)]
    pub post_game: bool,

    #[serde(default)]
    pub background: Option<String>,

    #[serde(default)]
    pub map_page: Option<String>,

    /// Actors whose dialogue box was moved past their last reply.
    #[serde(default)]
    pub continued: BTreeSet<ActorId>,

    #[serde(default)]
    pub notes: Notebook,

    #[serde(default)]
    pub accusation: AccusationSheet,
}

impl ProgressSnapshot {
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a stored record.
    ///
    /// Corrupt data yields `None`. A version mismatch is logged and the
    /// record is used as is.
    pub fn decode(raw: &str) -> Option<Self> {
        let snapshot: Self = match serde_json::from_str(raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable save");
                return None;
            }
        };
        if snapshot.version != SAVE_VERSION {
            tracing::warn!(
                expected = SAVE_VERSION,
                found = snapshot.version,
                "save version mismatch; loading without migration"
            );
        }
        Some(snapshot)
    }
}

/// A single-record store for the serialized snapshot.
pub trait ProgressStore: Send + Sync {
    /// Overwrite the record.
    fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), PersistError>;

    /// The stored snapshot, or `None` if absent or unreadable.
    fn load(&self) -> Option<ProgressSnapshot>;

    fn clear(&self) -> Result<(), PersistError>;

    fn exists(&self) -> bool;
}

impl<T: ProgressStore + ?Sized> ProgressStore for Arc<T> {
    fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), PersistError> {
        (**self).save(snapshot)
    }

    fn load(&self) -> Option<ProgressSnapshot> {
        (**self).load()
    }

    fn clear(&self) -> Result<(), PersistError> {
        (**self).clear()
    }

    fn exists(&self) -> bool {
        (**self).exists()
    }
}

/// Stores the record as a JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ProgressStore for FileStore {
    fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), PersistError> {
        let content = snapshot.to_json()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        // Write then rename so a crash never leaves a half-written save.
        let temp = self.temp_path();
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Option<ProgressSnapshot> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => ProgressSnapshot::decode(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read save");
                None
            }
        }
    }

    fn clear(&self) -> Result<(), PersistError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Keeps the serialized record in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw stored text.
    pub fn raw(&self) -> Option<String> {
        self.lock().clone()
    }

    /// Replace the raw stored text.
    pub fn put_raw(&self, raw: impl Into<String>) {
        *self.lock() = Some(raw.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned lock still holds a consistent string.
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgressStore for MemoryStore {
    fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), PersistError> {
        let content = snapshot.to_json()?;
        *self.lock() = Some(content);
        Ok(())
    }

    fn load(&self) -> Option<ProgressSnapshot> {
        self.lock().as_deref().and_then(ProgressSnapshot::decode)
    }

    fn clear(&self) -> Result<(), PersistError> {
        *self.lock() = None;
        Ok(())
    }

    fn exists(&self) -> bool {
        self.lock().is_some()
    }
}

/// Seconds since the Unix epoch, as text.
pub(crate) fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{secs}")
}
