use crate::state::StateRecord;

/// Durable storage of session state records.
///
/// Implementations must make whatever was last saved loadable after a
/// process restart. The thread index maps outbound message threads back to
/// the session that sent them.
pub trait StateStore: Send + Sync {
    /// Load a session. `Ok(None)` when it was never saved.
    fn load(&self, session_id: &str) -> Result<Option<StateRecord>, StoreError>;

    fn save(&self, session_id: &str, record: &StateRecord) -> Result<(), StoreError>;

    /// Session ids with a saved record.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Remove a session's record. Returns whether it existed.
    fn delete(&self, session_id: &str) -> Result<bool, StoreError>;

    fn index_outbound(&self, thread_id: &str, session_id: &str) -> Result<(), StoreError>;

    fn session_for_thread(&self, thread_id: &str) -> Result<Option<String>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),
    #[error("State store unavailable: {0}")]
    Unavailable(String),
}

/// Session ids double as file names, so only `[A-Za-z0-9_-]` is allowed.
pub fn validate_session_id(session_id: &str) -> Result<(), StoreError> {
    let ok = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidSessionId(session_id.to_string()))
    }
}

/// In-memory store for tests, with switchable save failures.
#[cfg(any(test, feature = "test-utils"))]
pub mod memory {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryStateStore {
        records: Mutex<BTreeMap<String, String>>,
        threads: Mutex<BTreeMap<String, String>>,
        fail_saves: AtomicBool,
        fail_index: AtomicBool,
        saves: AtomicUsize,
    }

    impl MemoryStateStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent `save` fail with `Unavailable`.
        pub fn fail_saves(&self, fail: bool) {
            self.fail_saves.store(fail, Ordering::SeqCst);
        }

        /// Make every subsequent `index_outbound` fail with `Unavailable`.
        pub fn fail_index(&self, fail: bool) {
            self.fail_index.store(fail, Ordering::SeqCst);
        }

        /// Number of successful saves so far.
        pub fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    impl StateStore for MemoryStateStore {
        fn load(&self, session_id: &str) -> Result<Option<StateRecord>, StoreError> {
            let records = self.records.lock().unwrap();
            match records.get(session_id) {
                Some(json) => Ok(Some(serde_json::from_str(json)?)),
                None => Ok(None),
            }
        }

        fn save(&self, session_id: &str, record: &StateRecord) -> Result<(), StoreError> {
            validate_session_id(session_id)?;
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected save failure".into()));
            }
            let json = serde_json::to_string(record)?;
            self.records.lock().unwrap().insert(session_id.to_string(), json);
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn list(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.records.lock().unwrap().keys().cloned().collect())
        }

        fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
            Ok(self.records.lock().unwrap().remove(session_id).is_some())
        }

        fn index_outbound(&self, thread_id: &str, session_id: &str) -> Result<(), StoreError> {
            if self.fail_index.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected index failure".into()));
            }
            self.threads
                .lock()
                .unwrap()
                .insert(thread_id.to_string(), session_id.to_string());
            Ok(())
        }

        fn session_for_thread(&self, thread_id: &str) -> Result<Option<String>, StoreError> {
            Ok(self.threads.lock().unwrap().get(thread_id).cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStateStore;
    use super::*;
    use crate::state::Turn;

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("abc-123_X").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("../etc").is_err());
        assert!(validate_session_id("a b").is_err());
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStateStore::new();
        let mut record = StateRecord::new("s1");
        record.push_turn(Turn::user_text("hello"));
        store.save("s1", &record).unwrap();
        assert_eq!(store.load("s1").unwrap(), Some(record));
        assert_eq!(store.list().unwrap(), vec!["s1".to_string()]);
        assert!(store.delete("s1").unwrap());
        assert!(store.load("s1").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_failure_injection() {
        let store = MemoryStateStore::new();
        store.fail_saves(true);
        let err = store.save("s1", &StateRecord::new("s1")).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_memory_thread_index() {
        let store = MemoryStateStore::new();
        store.index_outbound("t1", "s1").unwrap();
        assert_eq!(store.session_for_thread("t1").unwrap(), Some("s1".into()));
        assert_eq!(store.session_for_thread("t2").unwrap(), None);
    }
}
