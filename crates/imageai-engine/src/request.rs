use std::collections::BTreeSet;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::Rng;
use url::Url;

use crate::error::RequestBuildError;

pub const SEED_MAX: u32 = 999_999;

// Everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`, as encodeURIComponent.
const PROMPT_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone)]
pub struct ImageRequestBuilder {
    base: Url,
    no_logo: bool,
    enhance_models: BTreeSet<String>,
}

impl ImageRequestBuilder {
    pub fn new(base: &str) -> Result<Self, RequestBuildError> {
        let base = Url::parse(base.trim())
            .map_err(|_| RequestBuildError::InvalidBase(base.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(RequestBuildError::InvalidBase(base.to_string()));
        }
        Ok(Self {
            base,
            no_logo: true,
            enhance_models: BTreeSet::new(),
        })
    }

    pub fn with_no_logo(mut self, no_logo: bool) -> Self {
        self.no_logo = no_logo;
        self
    }

    pub fn with_enhance_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enhance_models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn build_url(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        model: &str,
    ) -> Result<Url, RequestBuildError> {
        let seed = rand::thread_rng().gen_range(0..=SEED_MAX);
        self.build_url_with_seed(prompt, width, height, model, seed)
    }

    pub fn build_url_with_seed(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        model: &str,
        seed: u32,
    ) -> Result<Url, RequestBuildError> {
        if prompt.trim().is_empty() {
            return Err(RequestBuildError::EmptyPrompt);
        }
        if matches!(prompt, "." | "..") {
            return Err(RequestBuildError::DotSegment(prompt.to_string()));
        }
        let segment = utf8_percent_encode(prompt, PROMPT_SEGMENT);
        let mut url = self.base.clone();
        url.set_path(&format!(
            "{}/{segment}",
            self.base.path().trim_end_matches('/')
        ));
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("width", &width.to_string())
                .append_pair("height", &height.to_string())
                .append_pair("model", model)
                .append_pair("seed", &seed.to_string());
            if self.no_logo {
                query.append_pair("nologo", "true");
            }
            if self.enhance_models.contains(model) {
                query.append_pair("enhance", "true");
            }
        }
        Ok(url)
    }
}

pub fn seed_of(url: &Url) -> Option<u32> {
    url.query_pairs()
        .find(|(key, _)| key == "seed")
        .and_then(|(_, value)| value.parse().ok())
}
