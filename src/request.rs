//! Request construction for the generation endpoint.
//!
//! Nothing in here touches the network: a [`GenerationRequest`] is turned into
//! a [`Url`] against an [`Endpoint`] and handed to the fetcher.

use url::Url;

use crate::error::{ConfigError, ItemError};
use crate::prompts::PromptItem;

/// Validated URL of the generation endpoint, without a query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Joins `path` onto `base_url`, eg `http://host:8000` + `/paint-by-text`.
    pub fn new(base_url: &str, path: &str) -> Result<Self, ConfigError> {
        let mut url = Url::parse(base_url).map_err(|err| {
            ConfigError::InvalidArgument(format!("Invalid base URL {base_url:?}: {err}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidArgument(format!(
                "Base URL must be http or https, got {base_url:?}"
            )));
        }
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ConfigError::InvalidArgument(format!("Base URL can't take a path: {base_url:?}"))
            })?;
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|segment| !segment.is_empty()));
        }
        Ok(Self { url })
    }

    /// The endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Image parameters shared by every request in a batch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageSettings {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Sampling steps; the endpoint picks when absent
    pub steps: Option<u32>,
    /// Output format token, eg `webp`
    pub format: String,
    /// Ask for the bare image rather than a wrapped response
    pub image_only: bool,
}

impl ImageSettings {
    /// Rejects settings the endpoint can't accept.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidArgument(format!(
                "Image dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.steps == Some(0) {
            return Err(ConfigError::InvalidArgument(
                "Step count must be positive".to_string(),
            ));
        }
        if self.format.is_empty() || !self.format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidArgument(format!(
                "Output format must be a short alphanumeric token, got {:?}",
                self.format
            )));
        }
        Ok(())
    }
}

/// One fully specified generation request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenerationRequest {
    /// What to draw
    pub prompt: String,
    /// What to avoid
    pub negative_prompt: Option<String>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Sampling steps
    pub steps: Option<u32>,
    /// Output format token
    pub format: String,
    /// Sends the `img_only` flag
    pub image_only: bool,
}

impl GenerationRequest {
    /// Builds the request for one prompt item.
    pub fn new(item: &PromptItem, settings: &ImageSettings) -> Result<Self, ItemError> {
        if item.prompt.is_empty() {
            return Err(ItemError::InvalidRequest(format!(
                "Prompt {} is empty",
                item.index
            )));
        }
        Ok(Self {
            prompt: item.prompt.clone(),
            negative_prompt: item.negative_prompt.clone(),
            width: settings.width,
            height: settings.height,
            steps: settings.steps,
            format: settings.format.clone(),
            image_only: settings.image_only,
        })
    }

    /// The full request URL, free text percent-encoded.
    pub fn to_url(&self, endpoint: &Endpoint) -> Url {
        let mut url = endpoint.url().clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("prompt", &self.prompt);
            if let Some(negative_prompt) = &self.negative_prompt {
                query.append_pair("neg_prompt", negative_prompt);
            }
            if self.image_only {
                query.append_key_only("img_only");
            }
            query
                .append_pair("w", &self.width.to_string())
                .append_pair("h", &self.height.to_string());
            if let Some(steps) = self.steps {
                query.append_pair("n_steps", &steps.to_string());
            }
            query.append_pair("ext", &self.format);
        }
        url
    }
}
