use imageai_contracts::models::ModelRegistry;
use imageai_contracts::sizes::{DimensionTable, SizeCategory};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub text: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PromptComposer {
    models: ModelRegistry,
    dimensions: DimensionTable,
}

impl PromptComposer {
    pub fn new(models: ModelRegistry, dimensions: DimensionTable) -> Self {
        Self { models, dimensions }
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn dimensions(&self) -> &DimensionTable {
        &self.dimensions
    }

    pub fn compose(&self, prompt: &str, model: &str, size: SizeCategory) -> ComposedPrompt {
        let dims = self.dimensions.get(size);
        ComposedPrompt {
            text: self.models.augment(model, prompt),
            width: dims.width,
            height: dims.height,
        }
    }
}
