use reqwest::blocking::Client as HttpClient;
use serde_json::Value;

use crate::error::TranslationError;

/// Inputs shorter than this many characters are never sent for translation.
pub const MIN_TRANSLATION_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationSource {
    Skipped,
    Translated,
    Fallback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub source: TranslationSource,
}

pub trait Translator: Send + Sync {
    fn request_translation(&self, text: &str) -> Result<String, TranslationError>;

    fn translate_detailed(&self, text: &str) -> Translation {
        let trimmed = text.trim();
        if trimmed.chars().count() < MIN_TRANSLATION_CHARS {
            return Translation {
                text: text.to_string(),
                source: TranslationSource::Skipped,
            };
        }
        match self.request_translation(trimmed) {
            Ok(translated) => Translation {
                text: translated,
                source: TranslationSource::Translated,
            },
            Err(err) => Translation {
                text: text.to_string(),
                source: TranslationSource::Fallback(err.to_string()),
            },
        }
    }

    fn translate(&self, text: &str) -> String {
        self.translate_detailed(text).text
    }
}

pub struct MyMemoryTranslator {
    endpoint: String,
    langpair: String,
    http: HttpClient,
}

impl MyMemoryTranslator {
    pub fn new(endpoint: impl Into<String>, langpair: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            langpair: langpair.into(),
            http: HttpClient::new(),
        }
    }
}

impl Translator for MyMemoryTranslator {
    fn request_translation(&self, text: &str) -> Result<String, TranslationError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("q", text), ("langpair", self.langpair.as_str())])
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::Status(status.as_u16()));
        }
        let body = response.text()?;
        let payload: Value = serde_json::from_str(&body)
            .map_err(|err| TranslationError::Malformed(format!("invalid JSON: {err}")))?;
        extract_translated_text(&payload)
    }
}

fn extract_translated_text(payload: &Value) -> Result<String, TranslationError> {
    payload
        .get("responseData")
        .and_then(|data| data.get("translatedText"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            TranslationError::Malformed("missing responseData.translatedText".to_string())
        })
}
