use imageai_contracts::history::GenerationRecord;

use crate::pipeline::PipelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

pub trait Presenter: Send + Sync {
    fn notify(&self, notification: Notification);

    fn state_changed(&self, _state: PipelineState) {}

    fn show_result(&self, _record: &GenerationRecord) {}

    fn history_changed(&self, _records: &[GenerationRecord]) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPresenter;

impl Presenter for SilentPresenter {
    fn notify(&self, _notification: Notification) {}
}
