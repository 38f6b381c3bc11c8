use std::path::{Path, PathBuf};
use std::sync::Mutex;

use indexmap::IndexMap;
use tracing::{info, warn};

use outreach_tool_runtime::{validate_session_id, StateRecord, StateStore, StoreError};

const INDEX_FILE: &str = "outbound-index.json";
const SESSIONS_DIR: &str = "sessions";

/// File-based state store: one JSON file per session under `sessions/`,
/// plus a thread index beside that directory.
///
/// Every write goes to a temporary sibling first and is renamed into place,
/// so a crash mid-write leaves the previous record intact.
pub struct FileStateStore {
    dir: PathBuf,
    /// Serializes read-modify-write of the thread index.
    index_lock: Mutex<()>,
}

impl FileStateStore {
    /// Open the store under `dir`, creating the directory if needed.
    pub fn new(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir.join(SESSIONS_DIR))?;
        info!(path = %dir.display(), "state store initialized");
        Ok(Self {
            dir: dir.to_path_buf(),
            index_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding one `{id}.json` per session.
    pub fn sessions_dir(&self) -> PathBuf {
        self.dir.join(SESSIONS_DIR)
    }

    fn record_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{}.json", session_id))
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn read_index(&self) -> Result<IndexMap<String, String>, StoreError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(IndexMap::new());
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn lock_index(&self) -> Result<std::sync::MutexGuard<'_, ()>, StoreError> {
        self.index_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("thread index lock poisoned".into()))
    }
}

/// Write `data` next to `path` and rename it over the target.
fn write_atomic(path: &Path, data: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

impl StateStore for FileStateStore {
    fn load(&self, session_id: &str) -> Result<Option<StateRecord>, StoreError> {
        validate_session_id(session_id)?;
        let path = self.record_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    fn save(&self, session_id: &str, record: &StateRecord) -> Result<(), StoreError> {
        validate_session_id(session_id)?;
        let data = serde_json::to_string_pretty(record)?;
        write_atomic(&self.record_path(session_id), &data)
    }

    /// Session ids with a saved record, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(self.sessions_dir())? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_session_id(stem).is_ok() {
                ids.push(stem.to_string());
            } else {
                warn!(path = %path.display(), "skipping file with invalid session id");
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        validate_session_id(session_id)?;
        let path = self.record_path(session_id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        info!(session_id, "session state deleted");
        Ok(true)
    }

    fn index_outbound(&self, thread_id: &str, session_id: &str) -> Result<(), StoreError> {
        let _guard = self.lock_index()?;
        let mut index = self.read_index()?;
        if index.get(thread_id).map(String::as_str) == Some(session_id) {
            return Ok(());
        }
        if let Some(previous) = index.insert(thread_id.to_string(), session_id.to_string()) {
            warn!(thread_id, previous = %previous, session_id, "thread re-indexed to a different session");
        }
        let data = serde_json::to_string_pretty(&index)?;
        write_atomic(&self.index_path(), &data)
    }

    fn session_for_thread(&self, thread_id: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock_index()?;
        Ok(self.read_index()?.get(thread_id).cloned())
    }
}
