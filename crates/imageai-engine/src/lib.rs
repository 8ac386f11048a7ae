pub mod actions;
pub mod app;
pub mod compose;
pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod presenter;
pub mod request;
pub mod share;
pub mod translate;

#[cfg(test)]
mod test_support;

use imageai_contracts::events::EventWriter;
use serde_json::{Map, Value};

pub use actions::{ActionOutcome, ActionTable};
pub use app::{AppContext, AppParts};
pub use config::EngineConfig;
pub use error::{GenerationError, LoadError, RequestBuildError, ShareError, TranslationError};
pub use pipeline::{GenerationPipeline, GenerationRequest, PipelineState};
pub use presenter::{Notification, NotificationLevel, Presenter, SilentPresenter};

pub(crate) fn emit(events: &EventWriter, event_type: &str, payload: Value) {
    let _ = events.emit(event_type, map_object(payload));
}

fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
