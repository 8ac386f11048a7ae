use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sizes::SizeCategory;
use crate::store::{KeyValueStore, PersistenceError, SETTINGS_KEY};

pub const DEFAULT_MODEL: &str = "flux";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, alias = "size")]
    pub selected_size: SizeCategory,
    #[serde(default = "default_model", alias = "model")]
    pub selected_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_size: SizeCategory::default(),
            selected_model: default_model(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

pub struct SettingsManager {
    store: Arc<dyn KeyValueStore>,
    current: Settings,
}

impl SettingsManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            current: Settings::default(),
        }
    }

    /// Reads persisted settings. Missing or unreadable data leaves defaults
    /// in place; a parse failure is returned for logging only.
    pub fn load(&mut self) -> Option<PersistenceError> {
        let raw = match self.store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => return Some(PersistenceError::Storage(err)),
        };
        match serde_json::from_str::<Settings>(&raw) {
            Ok(settings) => {
                self.current = settings;
                None
            }
            Err(source) => {
                self.current = Settings::default();
                Some(PersistenceError::Deserialize {
                    key: SETTINGS_KEY,
                    source,
                })
            }
        }
    }

    pub fn current(&self) -> &Settings {
        &self.current
    }

    pub fn set_size(&mut self, size: SizeCategory) -> Result<(), PersistenceError> {
        self.current.selected_size = size;
        self.save()
    }

    pub fn set_model(&mut self, model: &str) -> Result<(), PersistenceError> {
        self.current.selected_model = model.to_string();
        self.save()
    }

    fn save(&self) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(&self.current).map_err(|source| {
            PersistenceError::Serialize {
                key: SETTINGS_KEY,
                source,
            }
        })?;
        self.store.set(SETTINGS_KEY, &raw)?;
        Ok(())
    }
}
