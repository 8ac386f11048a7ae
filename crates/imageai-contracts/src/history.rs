use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::sizes::SizeCategory;
use crate::store::{KeyValueStore, PersistenceError, HISTORY_KEY};

/// One successful generation. Never created for a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub id: i64,
    pub prompt: String,
    pub image_url: String,
    pub size: SizeCategory,
    #[serde(default)]
    pub model: String,
    pub timestamp: String,
}

/// Outcome of reading the persisted history at startup.
#[derive(Debug)]
pub enum HistoryLoad {
    Loaded(usize),
    Empty,
    Reset(PersistenceError),
}

/// Counts over the current history. Records saved before models were
/// tracked are counted under `"unknown"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total: usize,
    pub by_model: IndexMap<String, usize>,
    pub by_size: IndexMap<String, usize>,
}

/// Most-recent-first gallery, written back whole on every mutation.
pub struct HistoryManager {
    store: Arc<dyn KeyValueStore>,
    records: Vec<GenerationRecord>,
}

impl HistoryManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            records: Vec::new(),
        }
    }

    /// Replaces the in-memory list with the persisted one. Unreadable data
    /// resets the list to empty; the reason is handed back for logging.
    pub fn load_all(&mut self) -> HistoryLoad {
        let raw = match self.store.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.records.clear();
                return HistoryLoad::Empty;
            }
            Err(err) => {
                self.records.clear();
                return HistoryLoad::Reset(PersistenceError::Storage(err));
            }
        };
        match serde_json::from_str::<Vec<GenerationRecord>>(&raw) {
            Ok(records) => {
                self.records = records;
                if self.records.is_empty() {
                    HistoryLoad::Empty
                } else {
                    HistoryLoad::Loaded(self.records.len())
                }
            }
            Err(source) => {
                self.records.clear();
                HistoryLoad::Reset(PersistenceError::Deserialize {
                    key: HISTORY_KEY,
                    source,
                })
            }
        }
    }

    pub fn records(&self) -> &[GenerationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&GenerationRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Millisecond timestamp, bumped past the newest id so ids stay unique
    /// and increasing even for two commits in the same millisecond.
    pub fn next_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let newest = self.records.iter().map(|record| record.id).max();
        match newest {
            Some(newest) if newest >= now => newest + 1,
            _ => now,
        }
    }

    /// Builds a record stamped with a fresh id and the current time.
    pub fn new_record(
        &self,
        prompt: &str,
        image_url: &str,
        size: SizeCategory,
        model: &str,
    ) -> GenerationRecord {
        GenerationRecord {
            id: self.next_id(),
            prompt: prompt.to_string(),
            image_url: image_url.to_string(),
            size,
            model: model.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Inserts at the front, then persists. The in-memory insert stands even
    /// when the write fails.
    pub fn append(&mut self, record: GenerationRecord) -> Result<(), PersistenceError> {
        self.records.insert(0, record);
        self.persist()
    }

    /// Drops the record with `id`; an unknown id leaves the list untouched.
    pub fn remove(&mut self, id: i64) -> Result<bool, PersistenceError> {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        if self.records.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub fn stats(&self) -> HistoryStats {
        let mut stats = HistoryStats {
            total: self.records.len(),
            ..HistoryStats::default()
        };
        for size in SizeCategory::ALL {
            stats.by_size.insert(size.as_str().to_string(), 0);
        }
        for record in &self.records {
            let model = if record.model.is_empty() {
                "unknown"
            } else {
                record.model.as_str()
            };
            *stats.by_model.entry(model.to_string()).or_insert(0) += 1;
            *stats
                .by_size
                .entry(record.size.as_str().to_string())
                .or_insert(0) += 1;
        }
        stats
    }

    pub fn clear(&mut self) -> Result<(), PersistenceError> {
        self.records.clear();
        self.persist()
    }

    fn persist(&self) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(&self.records).map_err(|source| {
            PersistenceError::Serialize {
                key: HISTORY_KEY,
                source,
            }
        })?;
        self.store.set(HISTORY_KEY, &raw)?;
        Ok(())
    }
}
