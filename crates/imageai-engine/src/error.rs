#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("translation request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("translation service answered {0}")]
    Status(u16),
    #[error("translation response unusable: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RequestBuildError {
    #[error("image endpoint '{0}' is not a usable base url")]
    InvalidBase(String),
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("prompt '{0}' cannot be sent as a url path segment")]
    DotSegment(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("image client setup failed: {0}")]
    Client(reqwest::Error),
    #[error("image request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("image endpoint answered {0}")]
    Status(u16),
    #[error("image endpoint returned an empty body")]
    Empty,
    #[error("image payload could not be decoded: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("download failed: {0:#}")]
    Download(anyhow::Error),
    #[error("share failed: {0:#}")]
    Share(anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("a generation is already in progress")]
    Busy,
    #[error(transparent)]
    Request(#[from] RequestBuildError),
    #[error(transparent)]
    Load(#[from] LoadError),
}
