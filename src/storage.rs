#[cfg(test)]
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{Calendar, Task};

/// Store keys, matching the record names the original browser app used.
pub const SESSION_KEY: &str = "focus-session";
pub const TASKS_KEY: &str = "focus-tasks";
pub const CALENDAR_KEY: &str = "focus-calendar";

#[derive(Debug)]
pub enum StorageError {
    Io(io::Error),
    JsonEncode(serde_json::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "storage i/o error: {err}"),
            StorageError::JsonEncode(err) => write!(f, "could not encode record: {err}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            StorageError::JsonEncode(err) => Some(err),
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

/// Flat string-to-string persistence seam. The session manager and the typed
/// helpers below are written against this trait so the core runs unchanged on
/// disk or in memory.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        fs::write(self.key_path(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

/// In-memory store, used by tests.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

pub fn load_tasks<S: KeyValueStore>(store: &mut S) -> Result<Vec<Task>, StorageError> {
    load_or_default(store, TASKS_KEY, "task list")
}

pub fn save_tasks<S: KeyValueStore>(store: &mut S, tasks: &[Task]) -> Result<(), StorageError> {
    save(store, TASKS_KEY, &tasks)
}

pub fn load_calendar<S: KeyValueStore>(store: &mut S) -> Result<Calendar, StorageError> {
    load_or_default(store, CALENDAR_KEY, "focus calendar")
}

pub fn save_calendar<S: KeyValueStore>(
    store: &mut S,
    calendar: &Calendar,
) -> Result<(), StorageError> {
    save(store, CALENDAR_KEY, calendar)
}

/// A record that fails to decode is discarded rather than wedging the app:
/// the key is cleared and the default value returned.
fn load_or_default<S, T>(store: &mut S, key: &str, what: &str) -> Result<T, StorageError>
where
    S: KeyValueStore,
    T: DeserializeOwned + Default,
{
    let Some(raw) = store.get(key)? else {
        return Ok(T::default());
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(err) => {
            eprintln!("warning: discarding malformed {what}: {err}");
            store.remove(key)?;
            Ok(T::default())
        }
    }
}

fn save<S, T>(store: &mut S, key: &str, value: &T) -> Result<(), StorageError>
where
    S: KeyValueStore,
    T: Serialize,
{
    let raw = serde_json::to_string(value).map_err(StorageError::JsonEncode)?;
    store.set(key, raw)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::TaskKind;

    fn temp_store(tag: &str) -> FileStore {
        let dir = std::env::temp_dir().join(format!("lockin-{tag}-{}", std::process::id()));
        FileStore::open(dir).expect("create temp store")
    }

    #[test]
    fn file_store_round_trips_and_removes() {
        let mut store = temp_store("roundtrip");
        assert_eq!(store.get("focus-session").expect("get"), None);

        store
            .set("focus-session", "{\"id\":\"abc\"}".to_string())
            .expect("set");
        assert_eq!(
            store.get("focus-session").expect("get"),
            Some("{\"id\":\"abc\"}".to_string())
        );

        store.remove("focus-session").expect("remove");
        assert_eq!(store.get("focus-session").expect("get"), None);
        // Removing a missing key is not an error.
        store.remove("focus-session").expect("remove again");
    }

    #[test]
    fn missing_keys_load_as_defaults() {
        let mut store = MemoryStore::new();
        assert!(load_tasks(&mut store).expect("load tasks").is_empty());
        let calendar = load_calendar(&mut store).expect("load calendar");
        assert_eq!(calendar.active_days(), 0);
    }

    #[test]
    fn malformed_tasks_record_is_cleared_and_defaulted() {
        let mut store = MemoryStore::new();
        store
            .set(TASKS_KEY, "not json at all {{".to_string())
            .expect("set");
        let tasks = load_tasks(&mut store).expect("load tasks");
        assert!(tasks.is_empty());
        assert_eq!(store.get(TASKS_KEY).expect("get"), None);
    }

    #[test]
    fn malformed_calendar_record_is_cleared_and_defaulted() {
        let mut store = MemoryStore::new();
        store
            .set(CALENDAR_KEY, "[1, 2, 3]".to_string())
            .expect("set");
        let calendar = load_calendar(&mut store).expect("load calendar");
        assert_eq!(calendar.total_hours(), 0.0);
        assert_eq!(store.get(CALENDAR_KEY).expect("get"), None);
    }

    #[test]
    fn tasks_persist_through_the_typed_helpers() {
        let mut store = MemoryStore::new();
        let tasks = vec![
            Task::new("write docs", TaskKind::Study, Utc::now()),
            Task::new("fix layout", TaskKind::Design, Utc::now()),
        ];
        save_tasks(&mut store, &tasks).expect("save");
        let restored = load_tasks(&mut store).expect("load");
        assert_eq!(restored, tasks);
    }
}
