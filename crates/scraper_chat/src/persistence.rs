//! Durable storage for the chat state blob.
//!
//! The whole `ChatState` is stored as one JSON record under a fixed key.
//! File-backed stores keep it at:
//! ```text
//! <data_dir>/
//! └── webscraper-chat-state.json
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ChatError, ChatResult};
use crate::types::ChatState;

/// Fixed key the chat state is stored under
pub const STORAGE_KEY: &str = "webscraper-chat-state";

/// Key/value persistence of the serialized chat state
pub trait PersistentStore: Send + Sync {
    /// Read the stored payload, `None` when nothing was written yet
    fn load(&self) -> ChatResult<Option<String>>;

    /// Replace the stored payload
    fn save(&self, payload: &str) -> ChatResult<()>;

    /// Remove the stored payload
    fn clear(&self) -> ChatResult<()>;
}

/// Serialize the state into its persisted layout
pub fn encode_state(state: &ChatState) -> ChatResult<String> {
    Ok(serde_json::to_string(state)?)
}

/// Parse a persisted payload
pub fn decode_state(payload: &str) -> ChatResult<ChatState> {
    serde_json::from_str(payload).map_err(|e| ChatError::PersistenceCorruption(e.to_string()))
}

/// JSON file store in a data directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the state file
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", STORAGE_KEY))
    }
}

impl PersistentStore for FileStore {
    fn load(&self) -> ChatResult<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn save(&self, payload: &str) -> ChatResult<()> {
        fs::create_dir_all(&self.dir)?;

        // Write next to the target so the rename stays on one filesystem
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(payload.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.path()).map_err(|e| ChatError::Io(e.error))?;

        debug!(path = %self.path().display(), bytes = payload.len(), "Chat state written");
        Ok(())
    }

    fn clear(&self) -> ChatResult<()> {
        let path = self.path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// In-process store, used for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    payload: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a raw payload
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: Mutex::new(Some(payload.into())),
            writes: Mutex::new(0),
        }
    }

    /// Number of saves performed
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }

    /// Current raw payload
    pub fn payload(&self) -> Option<String> {
        self.payload.lock().clone()
    }
}

impl PersistentStore for MemoryStore {
    fn load(&self) -> ChatResult<Option<String>> {
        Ok(self.payload.lock().clone())
    }

    fn save(&self, payload: &str) -> ChatResult<()> {
        *self.payload.lock() = Some(payload.to_string());
        *self.writes.lock() += 1;
        Ok(())
    }

    fn clear(&self) -> ChatResult<()> {
        *self.payload.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatSession;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_round_trip() {
        let temp = tempdir().unwrap();
        let store = FileStore::new(temp.path().join("data"));

        assert!(store.load().unwrap().is_none());

        let session = ChatSession::new(Utc::now());
        let state = ChatState {
            current_session: Some(session.id.clone()),
            sessions: vec![session],
        };
        store.save(&encode_state(&state).unwrap()).unwrap();

        let loaded = decode_state(&store.load().unwrap().unwrap()).unwrap();
        assert_eq!(loaded, state);
        assert!(store.path().ends_with("webscraper-chat-state.json"));
    }

    #[test]
    fn test_file_store_clear() {
        let temp = tempdir().unwrap();
        let store = FileStore::new(temp.path());
        store.save("{}").unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let err = decode_state("{not json").unwrap_err();
        assert!(matches!(err, ChatError::PersistenceCorruption(_)));
    }

    #[test]
    fn test_memory_store_counts_writes() {
        let store = MemoryStore::new();
        store.save("a").unwrap();
        store.save("b").unwrap();
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.payload().as_deref(), Some("b"));
    }
}
