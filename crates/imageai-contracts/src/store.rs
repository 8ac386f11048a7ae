use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::Context;
use serde_json::{Map, Value};

pub const HISTORY_KEY: &str = "imageai_history";
pub const SETTINGS_KEY: &str = "imageai_settings";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage access failed: {0:#}")]
    Storage(#[from] anyhow::Error),
    #[error("failed to serialize '{key}': {source}")]
    Serialize {
        key: &'static str,
        source: serde_json::Error,
    },
    #[error("failed to deserialize '{key}': {source}")]
    Deserialize {
        key: &'static str,
        source: serde_json::Error,
    },
}

/// String key/value storage that survives restarts.
///
/// Values are serialized documents; callers own their encoding. A single
/// `set` is atomic, nothing more. Writers are last-writer-wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Single JSON object on disk, one string member per key.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    /// A store file that exists but cannot be read or parsed is an error,
    /// not an empty store.
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let payload = read_json_object(&self.path)?.unwrap_or_default();
        Ok(payload.get(key).and_then(Value::as_str).map(str::to_string))
    }

    /// An unparseable store file is moved to `<file>.corrupt` before the
    /// fresh object is written.
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut on_disk = match read_json_object(&self.path) {
            Ok(payload) => payload.unwrap_or_default(),
            Err(StoreFileError::Unreadable(err)) => return Err(err),
            Err(StoreFileError::Corrupt { .. }) => {
                let aside = corrupt_path(&self.path);
                fs::rename(&self.path, &aside).with_context(|| {
                    format!("failed moving corrupt store to {}", aside.display())
                })?;
                Map::new()
            }
        };
        on_disk.insert(key.to_string(), Value::String(value.to_string()));
        write_json_object(&self.path, &on_disk)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum StoreFileError {
    #[error("{0:#}")]
    Unreadable(anyhow::Error),
    #[error("store file {} is not a JSON object: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

/// `Ok(None)` only when the file does not exist yet.
fn read_json_object(path: &Path) -> Result<Option<Map<String, Value>>, StoreFileError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(StoreFileError::Unreadable(
                anyhow::Error::new(err).context(format!("failed reading {}", path.display())),
            ))
        }
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(payload)) => Ok(Some(payload)),
        Ok(_) => Err(StoreFileError::Corrupt {
            path: path.to_path_buf(),
            reason: "top-level value is not an object".to_string(),
        }),
        Err(err) => Err(StoreFileError::Corrupt {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }),
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension("json.tmp");
    fs::write(
        &staging,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    fs::rename(&staging, path)?;
    Ok(())
}
