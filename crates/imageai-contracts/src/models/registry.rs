use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub label: String,
    pub prompt_prefix: Option<String>,
    pub prompt_suffix: Option<String>,
    pub enhance: bool,
}

impl ModelSpec {
    pub fn augment(&self, prompt: &str) -> String {
        let mut out = String::new();
        if let Some(prefix) = non_empty(self.prompt_prefix.as_deref()) {
            out.push_str(prefix);
            out.push_str(", ");
        }
        out.push_str(prompt.trim());
        if let Some(suffix) = non_empty(self.prompt_suffix.as_deref()) {
            out.push_str(", ");
            out.push_str(suffix);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn default_model(&self) -> Option<&ModelSpec> {
        self.models.values().next()
    }

    /// Prompt augmentation for `model`; unknown ids pass the prompt through.
    pub fn augment(&self, model: &str, prompt: &str) -> String {
        match self.get(model) {
            Some(spec) => spec.augment(prompt),
            None => prompt.trim().to_string(),
        }
    }

    /// Merges `{"<model>": {"label", "prefix", "suffix", "enhance"}}` rows.
    /// Existing models keep any field the row leaves out; new ids are added.
    pub fn merge_overrides(&mut self, overrides: &Value) {
        let Some(table) = overrides.as_object() else {
            return;
        };
        for (name, row_value) in table {
            let Some(row) = row_value.as_object() else {
                continue;
            };
            let entry = self
                .models
                .entry(name.to_string())
                .or_insert_with(|| ModelSpec {
                    name: name.to_string(),
                    label: name.to_string(),
                    prompt_prefix: None,
                    prompt_suffix: None,
                    enhance: false,
                });
            if let Some(label) = row.get("label").and_then(Value::as_str) {
                entry.label = label.to_string();
            }
            if let Some(prefix) = row.get("prefix") {
                entry.prompt_prefix = prefix.as_str().map(str::to_string);
            }
            if let Some(suffix) = row.get("suffix") {
                entry.prompt_suffix = suffix.as_str().map(str::to_string);
            }
            if let Some(enhance) = row.get("enhance").and_then(Value::as_bool) {
                entry.enhance = enhance;
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, label: &str, suffix: Option<&str>| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                label: label.to_string(),
                prompt_prefix: None,
                prompt_suffix: suffix.map(str::to_string),
                enhance: false,
            },
        );
    };

    insert("flux", "Flux", Some("high quality, detailed"));
    insert(
        "flux-realism",
        "Flux Realism",
        Some("ultra realistic, 8k, photography"),
    );
    insert("any-v4-5", "Anime", Some("anime style, high quality"));
    insert("turbo", "Turbo", None);

    map
}
