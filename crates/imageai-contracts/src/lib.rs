pub mod chat;
pub mod events;
pub mod history;
pub mod models;
pub mod prompts;
pub mod settings;
pub mod sizes;
pub mod store;
