use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use imageai_contracts::chat::{Intent, CHAT_HELP_COMMANDS};
use imageai_contracts::history::{GenerationRecord, HistoryStats};
use imageai_contracts::models::ModelSpec;
use imageai_contracts::settings::Settings;
use imageai_contracts::sizes::SizeCategory;
use indexmap::IndexMap;

use crate::app::AppContext;
use crate::error::GenerationError;
use crate::presenter::{Notification, NotificationLevel};

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Generated(GenerationRecord),
    GenerationFailed(String),
    History(Vec<GenerationRecord>),
    Record(GenerationRecord),
    Deleted { id: i64, removed: bool },
    Cleared,
    Delivered(PathBuf),
    Settings(Settings),
    Models(Vec<ModelSpec>),
    Stats(HistoryStats),
    Help(&'static [&'static str]),
    Failed(String),
    Quit,
    Noop,
}

pub type ActionHandler = fn(&AppContext, &Intent) -> Result<ActionOutcome>;

pub struct ActionTable {
    handlers: IndexMap<&'static str, ActionHandler>,
}

impl ActionTable {
    pub fn standard() -> Self {
        let mut handlers: IndexMap<&'static str, ActionHandler> = IndexMap::new();
        handlers.insert("generate", generate);
        handlers.insert("surprise", surprise);
        handlers.insert("set_size", set_size);
        handlers.insert("set_model", set_model);
        handlers.insert("list_history", list_history);
        handlers.insert("show_record", show_record);
        handlers.insert("delete_record", delete_record);
        handlers.insert("clear_history", clear_history);
        handlers.insert("download_record", download_record);
        handlers.insert("share_record", share_record);
        handlers.insert("stats", stats);
        handlers.insert("list_models", list_models);
        handlers.insert("show_settings", show_settings);
        handlers.insert("help", help);
        handlers.insert("quit", quit);
        handlers.insert("noop", noop);
        Self { handlers }
    }

    pub fn actions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    pub fn dispatch(&self, ctx: &AppContext, intent: &Intent) -> ActionOutcome {
        let result = match self.handlers.get(intent.action.as_str()) {
            Some(handler) => handler(ctx, intent),
            None => Err(unknown_command(intent)),
        };
        result.unwrap_or_else(|err| {
            let message = format!("{err:#}");
            ctx.presenter()
                .notify(Notification::new(NotificationLevel::Warning, message.clone()));
            ActionOutcome::Failed(message)
        })
    }
}

fn unknown_command(intent: &Intent) -> anyhow::Error {
    match intent.arg_str("command") {
        Some(command) => anyhow!("Unknown command /{command}. Type /help for commands."),
        None => anyhow!("Unsupported action '{}'.", intent.action),
    }
}

fn record_id(intent: &Intent) -> Result<i64> {
    let raw = intent
        .arg_str("id")
        .ok_or_else(|| anyhow!("/{} requires an image id", command_name(intent)))?;
    raw.parse::<i64>()
        .with_context(|| format!("'{raw}' is not an image id"))
}

fn command_name(intent: &Intent) -> &str {
    intent
        .raw
        .trim()
        .trim_start_matches('/')
        .split_whitespace()
        .next()
        .unwrap_or(intent.action.as_str())
}

fn generation_outcome(result: Result<GenerationRecord, GenerationError>) -> Result<ActionOutcome> {
    match result {
        Ok(record) => Ok(ActionOutcome::Generated(record)),
        Err(GenerationError::Busy) => Err(anyhow!(GenerationError::Busy)),
        Err(err) => Ok(ActionOutcome::GenerationFailed(err.to_string())),
    }
}

fn generate(ctx: &AppContext, intent: &Intent) -> Result<ActionOutcome> {
    let prompt = intent.prompt.as_deref().unwrap_or_default();
    generation_outcome(ctx.generate(prompt))
}

fn surprise(ctx: &AppContext, _intent: &Intent) -> Result<ActionOutcome> {
    generation_outcome(ctx.surprise())
}

fn set_size(ctx: &AppContext, intent: &Intent) -> Result<ActionOutcome> {
    let raw = intent
        .setting_str("selected_size")
        .ok_or_else(|| anyhow!("/size requires one of: square, landscape, portrait"))?;
    let size = raw.parse::<SizeCategory>().map_err(anyhow::Error::msg)?;
    ctx.select_size(size);
    Ok(ActionOutcome::Settings(ctx.settings()))
}

fn set_model(ctx: &AppContext, intent: &Intent) -> Result<ActionOutcome> {
    let raw = intent
        .setting_str("selected_model")
        .ok_or_else(|| anyhow!("/model requires a model id (see /models)"))?;
    ctx.select_model(raw)?;
    Ok(ActionOutcome::Settings(ctx.settings()))
}

fn list_history(ctx: &AppContext, _intent: &Intent) -> Result<ActionOutcome> {
    Ok(ActionOutcome::History(ctx.history()))
}

fn show_record(ctx: &AppContext, intent: &Intent) -> Result<ActionOutcome> {
    let id = record_id(intent)?;
    ctx.record(id)
        .map(ActionOutcome::Record)
        .with_context(|| format!("no image with id {id} in history"))
}

fn delete_record(ctx: &AppContext, intent: &Intent) -> Result<ActionOutcome> {
    let id = record_id(intent)?;
    let removed = ctx.delete_record(id);
    Ok(ActionOutcome::Deleted { id, removed })
}

fn clear_history(ctx: &AppContext, _intent: &Intent) -> Result<ActionOutcome> {
    ctx.clear_history();
    Ok(ActionOutcome::Cleared)
}

fn download_record(ctx: &AppContext, intent: &Intent) -> Result<ActionOutcome> {
    let id = record_id(intent)?;
    ctx.record(id)
        .with_context(|| format!("no image with id {id} in history"))?;
    Ok(delivery_outcome(ctx.download(id, intent.arg_str("filename"))))
}

fn share_record(ctx: &AppContext, intent: &Intent) -> Result<ActionOutcome> {
    let id = record_id(intent)?;
    ctx.record(id)
        .with_context(|| format!("no image with id {id} in history"))?;
    Ok(delivery_outcome(ctx.share(id)))
}

fn delivery_outcome(result: Result<PathBuf>) -> ActionOutcome {
    match result {
        Ok(path) => ActionOutcome::Delivered(path),
        Err(err) => ActionOutcome::Failed(format!("{err:#}")),
    }
}

fn stats(ctx: &AppContext, _intent: &Intent) -> Result<ActionOutcome> {
    Ok(ActionOutcome::Stats(ctx.stats()))
}

fn list_models(ctx: &AppContext, _intent: &Intent) -> Result<ActionOutcome> {
    Ok(ActionOutcome::Models(ctx.models()))
}

fn show_settings(ctx: &AppContext, _intent: &Intent) -> Result<ActionOutcome> {
    Ok(ActionOutcome::Settings(ctx.settings()))
}

fn help(_ctx: &AppContext, _intent: &Intent) -> Result<ActionOutcome> {
    Ok(ActionOutcome::Help(CHAT_HELP_COMMANDS))
}

fn quit(_ctx: &AppContext, _intent: &Intent) -> Result<ActionOutcome> {
    Ok(ActionOutcome::Quit)
}

fn noop(_ctx: &AppContext, _intent: &Intent) -> Result<ActionOutcome> {
    Ok(ActionOutcome::Noop)
}
