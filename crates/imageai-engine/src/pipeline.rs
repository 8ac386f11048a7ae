use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use imageai_contracts::events::EventWriter;
use imageai_contracts::history::{GenerationRecord, HistoryManager};
use imageai_contracts::sizes::SizeCategory;
use serde_json::json;

use crate::compose::PromptComposer;
use crate::emit;
use crate::error::GenerationError;
use crate::loader::ImageLoader;
use crate::presenter::{Notification, NotificationLevel, Presenter};
use crate::request::{seed_of, ImageRequestBuilder};
use crate::translate::{TranslationSource, Translator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Translating,
    Composing,
    Requesting,
    Loading,
    Committing,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Translating => "translating",
            PipelineState::Composing => "composing",
            PipelineState::Requesting => "requesting",
            PipelineState::Loading => "loading",
            PipelineState::Committing => "committing",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub size: SizeCategory,
    pub model: String,
}

/// One run at a time: a trigger that arrives while a run is in flight is
/// rejected with `GenerationError::Busy`, never queued. Runs cannot be
/// cancelled once started.
pub struct GenerationPipeline {
    translator: Arc<dyn Translator>,
    composer: PromptComposer,
    builder: ImageRequestBuilder,
    loader: Arc<dyn ImageLoader>,
    events: EventWriter,
    busy: AtomicBool,
    state: Mutex<PipelineState>,
}

impl GenerationPipeline {
    pub fn new(
        translator: Arc<dyn Translator>,
        composer: PromptComposer,
        builder: ImageRequestBuilder,
        loader: Arc<dyn ImageLoader>,
        events: EventWriter,
    ) -> Self {
        Self {
            translator,
            composer,
            builder,
            loader,
            events,
            busy: AtomicBool::new(false),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_generating(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn composer(&self) -> &PromptComposer {
        &self.composer
    }

    pub fn run(
        &self,
        request: &GenerationRequest,
        history: &Mutex<HistoryManager>,
        presenter: &dyn Presenter,
    ) -> Result<GenerationRecord, GenerationError> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            emit(
                &self.events,
                "generation_rejected",
                json!({"reason": "empty_prompt"}),
            );
            presenter.notify(Notification::new(
                NotificationLevel::Warning,
                "Écris quelque chose d'abord !",
            ));
            return Err(GenerationError::EmptyPrompt);
        }

        let Some(_guard) = BusyGuard::acquire(self, presenter) else {
            emit(
                &self.events,
                "generation_rejected",
                json!({"reason": "busy", "prompt": prompt}),
            );
            return Err(GenerationError::Busy);
        };

        emit(
            &self.events,
            "generation_started",
            json!({
                "prompt": prompt,
                "size": request.size.as_str(),
                "model": request.model,
            }),
        );

        match self.run_stages(prompt, request, history, presenter) {
            Ok(record) => {
                presenter.show_result(&record);
                presenter.notify(Notification::new(
                    NotificationLevel::Success,
                    "Image créée ! ✨",
                ));
                Ok(record)
            }
            Err((stage, err)) => {
                self.transition(PipelineState::Failed, presenter);
                emit(
                    &self.events,
                    "generation_failed",
                    json!({
                        "stage": stage.as_str(),
                        "error": err.to_string(),
                    }),
                );
                presenter.notify(Notification::new(
                    NotificationLevel::Error,
                    "Erreur de génération...",
                ));
                Err(err)
            }
        }
    }

    fn run_stages(
        &self,
        prompt: &str,
        request: &GenerationRequest,
        history: &Mutex<HistoryManager>,
        presenter: &dyn Presenter,
    ) -> Result<GenerationRecord, (PipelineState, GenerationError)> {
        self.transition(PipelineState::Translating, presenter);
        let translation = self.translator.translate_detailed(prompt);
        match &translation.source {
            TranslationSource::Translated => emit(
                &self.events,
                "translation_applied",
                json!({"text": translation.text}),
            ),
            TranslationSource::Skipped => {
                emit(&self.events, "translation_skipped", json!({}))
            }
            TranslationSource::Fallback(reason) => emit(
                &self.events,
                "translation_fallback",
                json!({"reason": reason}),
            ),
        }

        self.transition(PipelineState::Composing, presenter);
        let composed = self
            .composer
            .compose(&translation.text, &request.model, request.size);

        self.transition(PipelineState::Requesting, presenter);
        let url = self
            .builder
            .build_url(&composed.text, composed.width, composed.height, &request.model)
            .map_err(|err| (PipelineState::Requesting, err.into()))?;
        emit(
            &self.events,
            "request_built",
            json!({
                "url": url.as_str(),
                "seed": seed_of(&url),
                "prompt": composed.text,
            }),
        );

        self.transition(PipelineState::Loading, presenter);
        let loaded = self
            .loader
            .preload(url.as_str())
            .map_err(|err| (PipelineState::Loading, err.into()))?;
        emit(
            &self.events,
            "image_loaded",
            json!({
                "width": loaded.width,
                "height": loaded.height,
                "format": loaded.format,
                "bytes": loaded.byte_len,
            }),
        );

        self.transition(PipelineState::Committing, presenter);
        let mut history = history.lock().unwrap_or_else(PoisonError::into_inner);
        let record = history.new_record(prompt, url.as_str(), request.size, &request.model);
        if let Err(err) = history.append(record.clone()) {
            emit(
                &self.events,
                "history_persist_failed",
                json!({"error": err.to_string()}),
            );
        }
        emit(
            &self.events,
            "generation_committed",
            json!({"id": record.id, "image_url": record.image_url}),
        );
        presenter.history_changed(history.records());
        Ok(record)
    }

    fn transition(&self, next: PipelineState, presenter: &dyn Presenter) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        presenter.state_changed(next);
    }
}

struct BusyGuard<'a> {
    pipeline: &'a GenerationPipeline,
    presenter: &'a dyn Presenter,
}

impl<'a> BusyGuard<'a> {
    fn acquire(pipeline: &'a GenerationPipeline, presenter: &'a dyn Presenter) -> Option<Self> {
        pipeline
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self {
            pipeline,
            presenter,
        })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.pipeline.transition(PipelineState::Idle, self.presenter);
        self.pipeline.busy.store(false, Ordering::Release);
    }
}
