//! Config handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::log::LevelFilter;

use crate::cli::{CliOptions, Mode, SharedOptions};
use crate::constants::{DEFAULT_ENDPOINT_PATH, DEFAULT_EXT, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::error::ConfigError;
use crate::fetch::ClientSettings;
use crate::prompts::{PromptInput, PromptStyle};
use crate::request::{Endpoint, ImageSettings};

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Generation settings read from a JSON file, eg
/// `{"width": 512, "height": 1024, "steps": 50, "neg_prompt": "text"}`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    /// Text prepended to every prompt
    pub prefix: Option<String>,
    /// Negative prompt
    pub neg_prompt: Option<String>,
    /// Image width
    pub width: Option<u32>,
    /// Image height
    pub height: Option<u32>,
    /// Sampling steps
    pub steps: Option<u32>,
    /// Output format
    pub ext: Option<String>,
    /// Send the `img_only` flag
    pub img_only: Option<bool>,
    /// Path of the generation endpoint
    pub endpoint_path: Option<String>,
}

impl SettingsFile {
    /// Reads and parses a settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::SettingsFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|err| ConfigError::SettingsFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

/// Everything a batch run needs, fixed before it starts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchConfig {
    /// The generation endpoint
    pub endpoint: Endpoint,
    /// Where the prompts come from
    pub input: PromptInput,
    /// Prefix and negative prompt for every item
    pub style: PromptStyle,
    /// Image parameters for every item
    pub image: ImageSettings,
    /// Output directory, created if missing
    pub out_dir: PathBuf,
    /// Log progress every this many items
    pub progress_every: usize,
    /// HTTP client options
    pub client: ClientSettings,
}

impl BatchConfig {
    /// Combines flags, the optional settings file and defaults, flags first.
    pub fn from_cli(cli: &CliOptions) -> Result<Self, ConfigError> {
        let (base_url, out_dir, input) = match &cli.mode {
            Mode::Count {
                base_url,
                out_dir,
                total,
                prompt,
                ..
            } => (
                base_url,
                out_dir,
                PromptInput::Count {
                    prompt: prompt.clone(),
                    total: *total,
                },
            ),
            Mode::List {
                input_file,
                base_url,
                out_dir,
                separator,
                ..
            } => (
                base_url,
                out_dir,
                PromptInput::List {
                    path: input_file.clone(),
                    separator: *separator,
                },
            ),
        };
        let shared = cli.shared();
        let file = match &shared.settings {
            Some(path) => SettingsFile::load(path)?,
            None => SettingsFile::default(),
        };
        Self::build(base_url, out_dir.clone(), input, shared, file)
    }

    fn build(
        base_url: &str,
        out_dir: PathBuf,
        input: PromptInput,
        shared: &SharedOptions,
        file: SettingsFile,
    ) -> Result<Self, ConfigError> {
        let endpoint_path = shared
            .endpoint_path
            .clone()
            .or(file.endpoint_path)
            .unwrap_or_else(|| DEFAULT_ENDPOINT_PATH.to_string());
        let endpoint = Endpoint::new(base_url, &endpoint_path)?;

        let image = ImageSettings {
            width: shared.width.or(file.width).unwrap_or(DEFAULT_WIDTH),
            height: shared.height.or(file.height).unwrap_or(DEFAULT_HEIGHT),
            steps: shared.steps.or(file.steps),
            format: shared
                .ext
                .clone()
                .or(file.ext)
                .unwrap_or_else(|| DEFAULT_EXT.to_string()),
            image_only: !shared.no_img_only && file.img_only.unwrap_or(true),
        };
        image.validate()?;

        if shared.progress_every == 0 {
            return Err(ConfigError::InvalidArgument(
                "Progress cadence must be at least 1".to_string(),
            ));
        }
        if shared.timeout_secs == 0 {
            return Err(ConfigError::InvalidArgument(
                "Timeout must be at least 1 second".to_string(),
            ));
        }

        Ok(Self {
            endpoint,
            input,
            style: PromptStyle {
                prefix: shared.prefix.clone().or(file.prefix),
                negative_prompt: shared.neg_prompt.clone().or(file.neg_prompt),
            },
            image,
            out_dir,
            progress_every: shared.progress_every,
            client: ClientSettings {
                timeout: Duration::from_secs(shared.timeout_secs),
                accept_invalid_certs: shared.insecure,
            },
        })
    }
}
