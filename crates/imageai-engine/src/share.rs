use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use serde_json::json;

use crate::error::ShareError;
use crate::loader::format_label;

pub const SHARE_TITLE: &str = "Ma création ImageAI";
pub const SHARE_TEXT: &str = "Regarde cette image !";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub filename: String,
    pub title: String,
    pub text: String,
}

pub trait ShareTarget: Send + Sync {
    fn save(&self, bytes: &[u8], filename: &str) -> Result<PathBuf>;
    fn share(&self, bytes: &[u8], payload: &SharePayload) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct DirectoryShareTarget {
    dir: PathBuf,
}

impl DirectoryShareTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write(&self, bytes: &[u8], filename: &str) -> Result<PathBuf> {
        let name = Path::new(filename)
            .file_name()
            .map(|name| name.to_owned())
            .context("filename must name a file")?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed creating {}", self.dir.display()))?;
        let path = self.dir.join(name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed writing {}", path.display()))?;
        Ok(path)
    }
}

impl ShareTarget for DirectoryShareTarget {
    fn save(&self, bytes: &[u8], filename: &str) -> Result<PathBuf> {
        self.write(bytes, filename)
    }

    fn share(&self, bytes: &[u8], payload: &SharePayload) -> Result<PathBuf> {
        let path = self.write(bytes, &payload.filename)?;
        let sidecar = path.with_extension("share.json");
        let body = json!({
            "title": payload.title,
            "text": payload.text,
            "file": path.file_name().map(|name| name.to_string_lossy().to_string()),
        });
        std::fs::write(&sidecar, serde_json::to_string_pretty(&body)?)
            .with_context(|| format!("failed writing {}", sidecar.display()))?;
        Ok(path)
    }
}

pub struct ShareClient {
    http: HttpClient,
    target: Box<dyn ShareTarget>,
}

impl ShareClient {
    pub fn new(target: Box<dyn ShareTarget>) -> Self {
        Self {
            http: HttpClient::new(),
            target,
        }
    }

    pub fn download(&self, url: &str, filename: Option<&str>) -> Result<PathBuf, ShareError> {
        let bytes = self.fetch(url).map_err(ShareError::Download)?;
        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(|| default_filename(&bytes));
        self.target
            .save(&bytes, &filename)
            .map_err(ShareError::Download)
    }

    pub fn share(&self, url: &str) -> Result<PathBuf, ShareError> {
        let bytes = self.fetch(url).map_err(ShareError::Share)?;
        let payload = SharePayload {
            filename: default_filename(&bytes),
            title: SHARE_TITLE.to_string(),
            text: SHARE_TEXT.to_string(),
        };
        self.target
            .share(&bytes, &payload)
            .map_err(ShareError::Share)
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("failed fetching image ({url})"))?;
        if !response.status().is_success() {
            bail!("image fetch failed ({})", response.status().as_u16());
        }
        let bytes = response
            .bytes()
            .context("failed reading image bytes")?
            .to_vec();
        if bytes.is_empty() {
            bail!("image fetch returned no bytes");
        }
        Ok(bytes)
    }
}

pub fn default_filename(bytes: &[u8]) -> String {
    let ext = image::guess_format(bytes)
        .map(format_label)
        .unwrap_or_else(|_| "png".to_string());
    format!("imageai-{}.{ext}", chrono::Utc::now().timestamp_millis())
}
