use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use imageai_contracts::models::ModelRegistry;
use imageai_contracts::sizes::DimensionTable;
use serde_json::Value;

pub const DEFAULT_IMAGE_API_BASE: &str = "https://image.pollinations.ai/prompt/";
pub const DEFAULT_TRANSLATE_API_BASE: &str = "https://api.mymemory.translated.net/get";
pub const DEFAULT_LANGPAIR: &str = "fr|en";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub image_api_base: String,
    pub translate_api_base: String,
    pub langpair: String,
    pub no_logo: bool,
    pub load_timeout: Option<Duration>,
    pub profile_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            image_api_base: DEFAULT_IMAGE_API_BASE.to_string(),
            translate_api_base: DEFAULT_TRANSLATE_API_BASE.to_string(),
            langpair: DEFAULT_LANGPAIR.to_string(),
            no_logo: true,
            load_timeout: None,
            profile_path: default_home_dir().map(|dir| dir.join("profile.json")),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            image_api_base: lookup("IMAGEAI_IMAGE_API_BASE").unwrap_or(defaults.image_api_base),
            translate_api_base: lookup("IMAGEAI_TRANSLATE_API_BASE")
                .unwrap_or(defaults.translate_api_base),
            langpair: lookup("IMAGEAI_TRANSLATE_LANGPAIR").unwrap_or(defaults.langpair),
            no_logo: lookup("IMAGEAI_NO_LOGO")
                .and_then(|value| parse_bool(&value))
                .unwrap_or(defaults.no_logo),
            load_timeout: lookup("IMAGEAI_LOAD_TIMEOUT_SECS")
                .and_then(|value| value.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(Duration::from_secs_f64),
            profile_path: lookup("IMAGEAI_PROFILE")
                .map(PathBuf::from)
                .or(defaults.profile_path),
        }
    }

    pub fn load_profile(&self) -> Profile {
        let mut profile = Profile::default();
        if let Some(path) = &self.profile_path {
            profile.merge_file(path);
        }
        profile
    }
}

#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub models: ModelRegistry,
    pub dimensions: DimensionTable,
}

impl Profile {
    pub fn merge_file(&mut self, path: &Path) {
        if let Ok(raw) = fs::read_to_string(path) {
            self.merge_str(&raw);
        }
    }

    pub fn merge_str(&mut self, raw: &str) {
        let Ok(payload) = serde_json::from_str::<Value>(raw) else {
            return;
        };
        if let Some(dimensions) = payload.get("dimensions") {
            self.dimensions.merge_overrides(dimensions);
        }
        if let Some(models) = payload.get("models") {
            self.models.merge_overrides(models);
        }
    }

    pub fn enhance_models(&self) -> Vec<String> {
        self.models
            .list()
            .filter(|model| model.enhance)
            .map(|model| model.name.clone())
            .collect()
    }
}

pub fn default_home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(".imageai"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
