use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Session-scoped `events.jsonl` log shared by every component of one run
/// of the app. Each line carries `type`, `session_id` and `ts`; payload keys
/// are merged over those.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<SessionLog>,
}

#[derive(Debug)]
struct SessionLog {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    /// Nothing touches the disk until the first event.
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionLog {
                path: path.into(),
                session_id: session_id.into(),
                file: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::from(event_type));
        event.insert("session_id".to_string(), Value::from(self.session_id()));
        event.insert(
            "ts".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        event.extend(payload);

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let mut slot = self
            .inner
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(self.open_append()?);
        }
        if let Some(file) = slot.as_mut() {
            if let Err(err) = file.write_all(line.as_bytes()) {
                // Dropped so the next event reopens the file.
                *slot = None;
                return Err(err).with_context(|| {
                    format!("failed appending to {}", self.inner.path.display())
                });
            }
        }
        Ok(Value::Object(event))
    }

    fn open_append(&self) -> anyhow::Result<File> {
        if let Some(parent) = self.inner.path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .with_context(|| format!("failed opening {}", self.inner.path.display()))
    }
}

/// `session-<unix millis>`.
pub fn new_session_id() -> String {
    format!("session-{}", Utc::now().timestamp_millis())
}

/// Reads an event log back, skipping lines that are not JSON objects.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<Map<String, Value>>> {
    let file = File::open(path).with_context(|| format!("failed opening {}", path.display()))?;
    let mut events = Vec::new();
    for line in BufReader::new(file).lines() {
        if let Ok(Value::Object(event)) = serde_json::from_str::<Value>(&line?) {
            events.push(event);
        }
    }
    Ok(events)
}

/// The `type` field of every event in the log, in order.
pub fn event_types(path: &Path) -> anyhow::Result<Vec<String>> {
    Ok(read_events(path)?
        .iter()
        .filter_map(|event| event.get("type").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::json;

    use super::*;

    fn payload(value: Value) -> EventPayload {
        match value {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        }
    }

    #[test]
    fn writer_is_lazy_until_first_event() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");
        assert!(!path.exists());

        writer.emit("session_started", EventPayload::new())?;
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn lines_carry_session_and_timestamp() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        let emitted = writer.emit("generation_started", payload(json!({"prompt": "Un chat"})))?;
        let events = read_events(&path)?;

        assert_eq!(events.len(), 1);
        assert_eq!(Value::Object(events[0].clone()), emitted);
        assert_eq!(events[0]["session_id"], json!("session-1"));
        assert_eq!(events[0]["prompt"], json!("Un chat"));
        DateTime::parse_from_rfc3339(events[0]["ts"].as_str().unwrap_or_default())?;
        Ok(())
    }

    #[test]
    fn payload_keys_win_over_defaults() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-1");
        let emitted = writer.emit("generation_started", payload(json!({"type": "override"})))?;
        assert_eq!(emitted["type"], json!("override"));
        assert_eq!(emitted["session_id"], json!("session-1"));
        Ok(())
    }

    #[test]
    fn clones_share_one_log() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");
        let clone = writer.clone();

        writer.emit("generation_started", EventPayload::new())?;
        clone.emit("generation_committed", EventPayload::new())?;

        assert_eq!(
            event_types(&path)?,
            vec!["generation_started", "generation_committed"]
        );
        Ok(())
    }

    #[test]
    fn reader_skips_garbage_lines() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        std::fs::write(&path, "{\"type\":\"a\"}\nnot json\n[1]\n{\"type\":\"b\"}\n")?;
        assert_eq!(event_types(&path)?, vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn session_ids_are_prefixed() {
        assert!(new_session_id().starts_with("session-"));
    }
}
