use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use imageai_contracts::events::{new_session_id, EventWriter};
use imageai_contracts::history::{GenerationRecord, HistoryLoad, HistoryManager, HistoryStats};
use imageai_contracts::models::{ModelSelector, ModelSpec};
use imageai_contracts::prompts::SURPRISE_PROMPTS;
use imageai_contracts::settings::{Settings, SettingsManager};
use imageai_contracts::sizes::SizeCategory;
use imageai_contracts::store::{JsonFileStore, KeyValueStore};
use rand::seq::SliceRandom;
use serde_json::json;

use crate::compose::PromptComposer;
use crate::config::EngineConfig;
use crate::emit;
use crate::error::{GenerationError, ShareError};
use crate::loader::{HttpImageLoader, ImageLoader};
use crate::pipeline::{GenerationPipeline, GenerationRequest, PipelineState};
use crate::presenter::{Notification, NotificationLevel, Presenter};
use crate::request::ImageRequestBuilder;
use crate::share::{DirectoryShareTarget, ShareClient, ShareTarget};
use crate::translate::{MyMemoryTranslator, Translator};

pub struct AppContext {
    settings: Mutex<SettingsManager>,
    history: Mutex<HistoryManager>,
    pipeline: GenerationPipeline,
    selector: ModelSelector,
    share: ShareClient,
    presenter: Arc<dyn Presenter>,
    events: EventWriter,
}

pub struct AppParts {
    pub store: Arc<dyn KeyValueStore>,
    pub translator: Arc<dyn Translator>,
    pub loader: Arc<dyn ImageLoader>,
    pub builder: ImageRequestBuilder,
    pub composer: PromptComposer,
    pub share_target: Box<dyn ShareTarget>,
    pub presenter: Arc<dyn Presenter>,
    pub events: EventWriter,
}

impl AppContext {
    pub fn open(
        config: &EngineConfig,
        data_dir: &Path,
        deliver_dir: &Path,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed creating {}", data_dir.display()))?;
        let profile = config.load_profile();
        let builder = ImageRequestBuilder::new(&config.image_api_base)?
            .with_no_logo(config.no_logo)
            .with_enhance_models(profile.enhance_models());
        let loader = HttpImageLoader::new(config.load_timeout)?;

        Self::assemble(AppParts {
            store: Arc::new(JsonFileStore::new(data_dir.join("store.json"))),
            translator: Arc::new(MyMemoryTranslator::new(
                config.translate_api_base.clone(),
                config.langpair.clone(),
            )),
            loader: Arc::new(loader),
            builder,
            composer: PromptComposer::new(profile.models, profile.dimensions),
            share_target: Box::new(DirectoryShareTarget::new(deliver_dir)),
            presenter,
            events: EventWriter::new(data_dir.join("events.jsonl"), new_session_id()),
        })
    }

    pub fn assemble(parts: AppParts) -> Result<Self> {
        let AppParts {
            store,
            translator,
            loader,
            builder,
            composer,
            share_target,
            presenter,
            events,
        } = parts;

        emit(&events, "session_started", json!({}));

        let selector = ModelSelector::new(Some(composer.models().clone()));

        let mut settings = SettingsManager::new(store.clone());
        if let Some(err) = settings.load() {
            emit(&events, "settings_reset", json!({"error": err.to_string()}));
        }
        let persisted_model = settings.current().selected_model.clone();
        let selection = selector
            .select(Some(&persisted_model))
            .map_err(anyhow::Error::msg)?;
        if let Some(reason) = &selection.fallback_reason {
            emit(&events, "settings_reset", json!({"error": reason}));
            if let Err(err) = settings.set_model(&selection.model.name) {
                emit(
                    &events,
                    "settings_persist_failed",
                    json!({"error": err.to_string()}),
                );
            }
        }

        let mut history = HistoryManager::new(store);
        if let HistoryLoad::Reset(err) = history.load_all() {
            emit(&events, "history_reset", json!({"error": err.to_string()}));
        }

        let pipeline = GenerationPipeline::new(translator, composer, builder, loader, events.clone());

        Ok(Self {
            settings: Mutex::new(settings),
            history: Mutex::new(history),
            pipeline,
            selector,
            share: ShareClient::new(share_target),
            presenter,
            events,
        })
    }

    pub fn presenter(&self) -> &dyn Presenter {
        self.presenter.as_ref()
    }

    pub fn events(&self) -> &EventWriter {
        &self.events
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline.state()
    }

    pub fn is_generating(&self) -> bool {
        self.pipeline.is_generating()
    }

    pub fn generate(&self, prompt: &str) -> Result<GenerationRecord, GenerationError> {
        let settings = self.settings();
        let request = GenerationRequest {
            prompt: prompt.to_string(),
            size: settings.selected_size,
            model: settings.selected_model,
        };
        self.pipeline
            .run(&request, &self.history, self.presenter.as_ref())
    }

    pub fn surprise(&self) -> Result<GenerationRecord, GenerationError> {
        let prompt = SURPRISE_PROMPTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("Un chat");
        self.generate(prompt)
    }

    pub fn settings(&self) -> Settings {
        self.lock_settings().current().clone()
    }

    pub fn models(&self) -> Vec<ModelSpec> {
        self.selector.registry.list().cloned().collect()
    }

    pub fn select_size(&self, size: SizeCategory) {
        let mut settings = self.lock_settings();
        let result = settings.set_size(size);
        self.after_settings_change(result, json!({"selected_size": size.as_str()}));
    }

    pub fn select_model(&self, model: &str) -> Result<ModelSpec> {
        let spec = self.selector.require(model).map_err(anyhow::Error::msg)?;
        let mut settings = self.lock_settings();
        let result = settings.set_model(&spec.name);
        self.after_settings_change(result, json!({"selected_model": spec.name}));
        Ok(spec)
    }

    pub fn history(&self) -> Vec<GenerationRecord> {
        self.lock_history().records().to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.lock_history().len()
    }

    pub fn stats(&self) -> HistoryStats {
        self.lock_history().stats()
    }

    pub fn record(&self, id: i64) -> Option<GenerationRecord> {
        self.lock_history().get(id).cloned()
    }

    pub fn delete_record(&self, id: i64) -> bool {
        let mut history = self.lock_history();
        let removed = match history.remove(id) {
            Ok(removed) => removed,
            Err(err) => {
                emit(
                    &self.events,
                    "history_persist_failed",
                    json!({"error": err.to_string()}),
                );
                history.get(id).is_none()
            }
        };
        if removed {
            emit(&self.events, "history_removed", json!({"id": id}));
            self.presenter.history_changed(history.records());
        }
        removed
    }

    pub fn clear_history(&self) {
        let mut history = self.lock_history();
        if let Err(err) = history.clear() {
            emit(
                &self.events,
                "history_persist_failed",
                json!({"error": err.to_string()}),
            );
        }
        emit(&self.events, "history_cleared", json!({}));
        self.presenter.history_changed(history.records());
    }

    pub fn download(&self, id: i64, filename: Option<&str>) -> Result<PathBuf> {
        let record = self.require_record(id)?;
        let delivered = self.share.download(&record.image_url, filename);
        self.after_delivery("download", id, delivered)
    }

    pub fn share(&self, id: i64) -> Result<PathBuf> {
        let record = self.require_record(id)?;
        let delivered = self.share.share(&record.image_url);
        self.after_delivery("share", id, delivered)
    }

    fn require_record(&self, id: i64) -> Result<GenerationRecord> {
        self.record(id)
            .with_context(|| format!("no image with id {id} in history"))
    }

    fn after_delivery(
        &self,
        kind: &str,
        id: i64,
        delivered: Result<PathBuf, ShareError>,
    ) -> Result<PathBuf> {
        match delivered {
            Ok(path) => {
                emit(
                    &self.events,
                    "image_delivered",
                    json!({"kind": kind, "id": id, "path": path.to_string_lossy()}),
                );
                Ok(path)
            }
            Err(err) => {
                emit(
                    &self.events,
                    "delivery_failed",
                    json!({"kind": kind, "id": id, "error": err.to_string()}),
                );
                let message = match err {
                    ShareError::Download(_) => "Téléchargement impossible...",
                    ShareError::Share(_) => "Partage impossible...",
                };
                self.presenter
                    .notify(Notification::new(NotificationLevel::Error, message));
                Err(err.into())
            }
        }
    }

    fn after_settings_change(
        &self,
        result: Result<(), imageai_contracts::store::PersistenceError>,
        change: serde_json::Value,
    ) {
        match result {
            Ok(()) => emit(&self.events, "settings_changed", change),
            Err(err) => {
                emit(
                    &self.events,
                    "settings_persist_failed",
                    json!({"error": err.to_string()}),
                );
                self.presenter.notify(Notification::new(
                    NotificationLevel::Warning,
                    "Réglages non sauvegardés.",
                ));
            }
        }
    }

    fn lock_settings(&self) -> MutexGuard<'_, SettingsManager> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_history(&self) -> MutexGuard<'_, HistoryManager> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use imageai_contracts::events::event_types;
    use imageai_contracts::store::{MemoryStore, HISTORY_KEY, SETTINGS_KEY};
    use serde_json::Value;

    use super::*;
    use crate::error::{LoadError, TranslationError};
    use crate::loader::LoadedImage;
    use crate::request::seed_of;
    use crate::share::SharePayload;
    use crate::test_support::closed_port_url;

    pub(crate) struct DictionaryTranslator;

    impl Translator for DictionaryTranslator {
        fn request_translation(&self, text: &str) -> Result<String, TranslationError> {
            match text {
                "Un chat" => Ok("A cat".to_string()),
                "Un chien" => Ok("A dog".to_string()),
                other => Err(TranslationError::Malformed(format!("no entry for {other}"))),
            }
        }
    }

    #[derive(Default)]
    pub(crate) struct OkLoader {
        pub(crate) calls: AtomicUsize,
    }

    impl ImageLoader for OkLoader {
        fn preload(&self, _url: &str) -> Result<LoadedImage, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LoadedImage {
                width: 1024,
                height: 1024,
                format: Some("jpg".to_string()),
                byte_len: 10,
            })
        }
    }

    struct FailingLoader;

    impl ImageLoader for FailingLoader {
        fn preload(&self, _url: &str) -> Result<LoadedImage, LoadError> {
            Err(LoadError::Status(502))
        }
    }

    /// Signals when a preload starts and holds it until released.
    struct GatedLoader {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl ImageLoader for GatedLoader {
        fn preload(&self, _url: &str) -> Result<LoadedImage, LoadError> {
            let _ = self
                .entered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .send(());
            let _ = self
                .release
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .recv_timeout(Duration::from_secs(10));
            Ok(LoadedImage {
                width: 1024,
                height: 1024,
                format: None,
                byte_len: 1,
            })
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingPresenter {
        pub(crate) notifications: Mutex<Vec<Notification>>,
        pub(crate) results: Mutex<Vec<GenerationRecord>>,
    }

    impl RecordingPresenter {
        pub(crate) fn levels(&self) -> Vec<NotificationLevel> {
            self.notifications
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|note| note.level)
                .collect()
        }
    }

    impl Presenter for RecordingPresenter {
        fn notify(&self, notification: Notification) {
            self.notifications
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(notification);
        }

        fn show_result(&self, record: &GenerationRecord) {
            self.results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record.clone());
        }
    }

    struct MemoryShareTarget {
        saved: Arc<Mutex<Vec<String>>>,
    }

    impl ShareTarget for MemoryShareTarget {
        fn save(&self, _bytes: &[u8], filename: &str) -> anyhow::Result<PathBuf> {
            self.saved
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(filename.to_string());
            Ok(PathBuf::from(filename))
        }

        fn share(&self, _bytes: &[u8], payload: &SharePayload) -> anyhow::Result<PathBuf> {
            self.save(&[], &payload.filename)
        }
    }

    pub(crate) fn context_with(
        store: Arc<dyn KeyValueStore>,
        loader: Arc<dyn ImageLoader>,
        presenter: Arc<dyn Presenter>,
        dir: &Path,
    ) -> anyhow::Result<AppContext> {
        AppContext::assemble(AppParts {
            store,
            translator: Arc::new(DictionaryTranslator),
            loader,
            builder: ImageRequestBuilder::new("https://image.pollinations.ai/prompt/")?,
            composer: PromptComposer::default(),
            share_target: Box::new(MemoryShareTarget {
                saved: Arc::new(Mutex::new(Vec::new())),
            }),
            presenter,
            events: EventWriter::new(dir.join("events.jsonl"), "test"),
        })
    }

    #[test]
    fn un_chat_square_flux_end_to_end() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let presenter = Arc::new(RecordingPresenter::default());
        let ctx = context_with(
            Arc::new(MemoryStore::new()),
            Arc::new(OkLoader::default()),
            presenter.clone(),
            temp.path(),
        )?;
        ctx.select_size(SizeCategory::Square);
        ctx.select_model("flux")?;

        let record = ctx.generate("Un chat")?;

        assert!(record
            .image_url
            .starts_with("https://image.pollinations.ai/prompt/A%20cat%2C%20high%20quality%2C%20detailed?"));
        assert!(record.image_url.contains("width=1024&height=1024&model=flux"));
        let url = url::Url::parse(&record.image_url)?;
        assert!(seed_of(&url).is_some());
        assert_eq!(record.prompt, "Un chat");
        assert_eq!(record.model, "flux");
        assert_eq!(record.size, SizeCategory::Square);

        let history = ctx.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], record);
        assert_eq!(
            presenter.results.lock().unwrap_or_else(PoisonError::into_inner).len(),
            1
        );
        assert_eq!(presenter.levels(), vec![NotificationLevel::Success]);
        Ok(())
    }

    #[test]
    fn forced_load_failure_adds_no_record() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = Arc::new(MemoryStore::new());
        let presenter = Arc::new(RecordingPresenter::default());
        let ctx = context_with(store.clone(), Arc::new(FailingLoader), presenter.clone(), temp.path())?;

        let before = ctx.history_len();
        let err = ctx.generate("Un chat").err();

        assert!(matches!(err, Some(GenerationError::Load(LoadError::Status(502)))));
        assert_eq!(ctx.history_len(), before);
        assert_eq!(store.get(HISTORY_KEY)?, None);
        assert_eq!(presenter.levels(), vec![NotificationLevel::Error]);
        assert_eq!(ctx.pipeline_state(), PipelineState::Idle);
        assert!(!ctx.is_generating());
        Ok(())
    }

    #[test]
    fn second_trigger_during_a_run_is_rejected() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let loader = Arc::new(GatedLoader {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let ctx = Arc::new(context_with(
            Arc::new(MemoryStore::new()),
            loader,
            Arc::new(RecordingPresenter::default()),
            temp.path(),
        )?);

        let first = {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || ctx.generate("Un chat"))
        };
        entered_rx.recv_timeout(Duration::from_secs(10))?;
        assert!(ctx.is_generating());
        assert_eq!(ctx.pipeline_state(), PipelineState::Loading);

        let second = ctx.generate("Un chien");
        assert!(matches!(second, Err(GenerationError::Busy)));

        release_tx.send(())?;
        let first = first
            .join()
            .map_err(|_| anyhow::anyhow!("generation thread panicked"))??;

        let history = ctx.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, first.id);
        assert_eq!(history[0].prompt, "Un chat");
        assert!(!ctx.is_generating());
        Ok(())
    }

    #[test]
    fn history_survives_restart_and_clear_persists() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(temp.path().join("store.json")));
        let ctx = context_with(
            store.clone(),
            Arc::new(OkLoader::default()),
            Arc::new(RecordingPresenter::default()),
            temp.path(),
        )?;
        let first = ctx.generate("Un chat")?;
        let second = ctx.generate("Un chien")?;
        assert!(second.id > first.id);
        drop(ctx);

        let reopened = context_with(
            store.clone(),
            Arc::new(OkLoader::default()),
            Arc::new(RecordingPresenter::default()),
            temp.path(),
        )?;
        let ids: Vec<i64> = reopened.history().iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        assert!(!reopened.delete_record(12345));
        assert_eq!(reopened.history_len(), 2);
        assert!(reopened.delete_record(first.id));
        reopened.clear_history();
        drop(reopened);

        let again = context_with(
            store,
            Arc::new(OkLoader::default()),
            Arc::new(RecordingPresenter::default()),
            temp.path(),
        )?;
        assert_eq!(again.history_len(), 0);
        Ok(())
    }

    #[test]
    fn settings_changes_persist_and_unknown_models_are_refused() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = Arc::new(MemoryStore::new());
        let ctx = context_with(
            store.clone(),
            Arc::new(OkLoader::default()),
            Arc::new(RecordingPresenter::default()),
            temp.path(),
        )?;

        ctx.select_size(SizeCategory::Portrait);
        ctx.select_model("any-v4-5")?;
        assert!(ctx.select_model("dall-e").is_err());

        let persisted: Value = serde_json::from_str(&store.get(SETTINGS_KEY)?.unwrap_or_default())?;
        assert_eq!(persisted["selectedSize"], Value::from("portrait"));
        assert_eq!(persisted["selectedModel"], Value::from("any-v4-5"));

        let record = ctx.generate("Un chien")?;
        assert!(record.image_url.contains("width=720&height=1280&model=any-v4-5"));
        assert!(record.image_url.contains("A%20dog%2C%20anime%20style%2C%20high%20quality"));
        Ok(())
    }

    #[test]
    fn unsupported_persisted_model_falls_back_to_default() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = Arc::new(MemoryStore::new());
        store.set(SETTINGS_KEY, r#"{"selectedSize":"landscape","selectedModel":"retired"}"#)?;
        let ctx = context_with(
            store.clone(),
            Arc::new(OkLoader::default()),
            Arc::new(RecordingPresenter::default()),
            temp.path(),
        )?;
        let settings = ctx.settings();
        assert_eq!(settings.selected_model, "flux");
        assert_eq!(settings.selected_size, SizeCategory::Landscape);
        Ok(())
    }

    #[test]
    fn corrupt_history_starts_empty_and_is_logged() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = Arc::new(MemoryStore::new());
        store.set(HISTORY_KEY, "not json")?;
        let ctx = context_with(
            store,
            Arc::new(OkLoader::default()),
            Arc::new(RecordingPresenter::default()),
            temp.path(),
        )?;
        assert_eq!(ctx.history_len(), 0);

        let types = event_types(&temp.path().join("events.jsonl"))?;
        assert_eq!(types[..2], ["session_started", "history_reset"]);
        Ok(())
    }

    #[test]
    fn garbage_store_file_resets_both_documents_and_is_logged() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("store.json");
        std::fs::write(&path, "{ garbage")?;
        let ctx = context_with(
            Arc::new(JsonFileStore::new(&path)),
            Arc::new(OkLoader::default()),
            Arc::new(RecordingPresenter::default()),
            temp.path(),
        )?;
        assert_eq!(ctx.history_len(), 0);
        assert_eq!(ctx.settings(), Settings::default());

        let types = event_types(&temp.path().join("events.jsonl"))?;
        assert!(types.iter().any(|t| t == "settings_reset"), "{types:?}");
        assert!(types.iter().any(|t| t == "history_reset"), "{types:?}");

        ctx.generate("Un chat")?;
        assert!(temp.path().join("store.json.corrupt").exists());
        assert_eq!(ctx.history_len(), 1);
        Ok(())
    }

    #[test]
    fn download_of_unknown_record_fails_without_touching_history() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let ctx = context_with(
            Arc::new(MemoryStore::new()),
            Arc::new(OkLoader::default()),
            Arc::new(RecordingPresenter::default()),
            temp.path(),
        )?;
        ctx.generate("Un chat")?;
        assert!(ctx.download(1, None).is_err());
        assert_eq!(ctx.history_len(), 1);
        Ok(())
    }

    #[test]
    fn failed_download_notifies_and_keeps_history() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let presenter = Arc::new(RecordingPresenter::default());
        let ctx = AppContext::assemble(AppParts {
            store: Arc::new(MemoryStore::new()),
            translator: Arc::new(DictionaryTranslator),
            loader: Arc::new(OkLoader::default()),
            builder: ImageRequestBuilder::new(&format!("{}/prompt/", closed_port_url()?))?,
            composer: PromptComposer::default(),
            share_target: Box::new(MemoryShareTarget {
                saved: Arc::new(Mutex::new(Vec::new())),
            }),
            presenter: presenter.clone(),
            events: EventWriter::new(temp.path().join("events.jsonl"), "test"),
        })?;
        let record = ctx.generate("Un chat")?;

        assert!(ctx.download(record.id, Some("chat.png")).is_err());
        assert!(ctx.share(record.id).is_err());

        assert_eq!(ctx.history(), vec![record]);
        assert_eq!(
            presenter.levels(),
            vec![
                NotificationLevel::Success,
                NotificationLevel::Error,
                NotificationLevel::Error
            ]
        );
        let types = event_types(&temp.path().join("events.jsonl"))?;
        assert_eq!(
            types.iter().filter(|kind| *kind == "delivery_failed").count(),
            2
        );
        Ok(())
    }

    #[test]
    fn surprise_generates_a_curated_prompt() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let loader = Arc::new(OkLoader::default());
        let ctx = context_with(
            Arc::new(MemoryStore::new()),
            loader.clone(),
            Arc::new(RecordingPresenter::default()),
            temp.path(),
        )?;
        let record = ctx.surprise()?;
        assert!(SURPRISE_PROMPTS.contains(&record.prompt.as_str()));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
