use std::time::Duration;

use reqwest::blocking::Client as HttpClient;

use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
    pub byte_len: usize,
}

pub trait ImageLoader: Send + Sync {
    fn preload(&self, url: &str) -> Result<LoadedImage, LoadError>;
}

pub struct HttpImageLoader {
    http: HttpClient,
}

impl HttpImageLoader {
    pub fn new(timeout: Option<Duration>) -> Result<Self, LoadError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(LoadError::Client)?;
        Ok(Self { http })
    }
}

impl ImageLoader for HttpImageLoader {
    fn preload(&self, url: &str) -> Result<LoadedImage, LoadError> {
        let response = self.http.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }
        let bytes = response.bytes()?;
        decode_image(&bytes)
    }
}

/// Full decode, not a header sniff: a truncated payload must fail here.
pub fn decode_image(bytes: &[u8]) -> Result<LoadedImage, LoadError> {
    if bytes.is_empty() {
        return Err(LoadError::Empty);
    }
    let format = image::guess_format(bytes).ok();
    let decoded = image::load_from_memory(bytes)?;
    Ok(LoadedImage {
        width: decoded.width(),
        height: decoded.height(),
        format: format.map(format_label),
        byte_len: bytes.len(),
    })
}

pub(crate) fn format_label(format: image::ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .copied()
        .unwrap_or("bin")
        .to_string()
}
