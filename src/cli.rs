//! CLI parser
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_COUNT_PROMPT, DEFAULT_OUT_DIR, DEFAULT_PROGRESS_EVERY, DEFAULT_TIMEOUT_SECONDS,
    DEFAULT_TOTAL,
};
use crate::prompts::LineSeparator;

#[derive(Parser, Debug)]
#[command(name = "batchgen")]
#[command(about = "Generate a batch of images from an image-generation endpoint")]
/// CLI Options
pub struct CliOptions {
    #[command(subcommand)]
    /// Where the prompts come from
    pub mode: Mode,
}

impl CliOptions {
    /// Options shared by every mode.
    pub fn shared(&self) -> &SharedOptions {
        match &self.mode {
            Mode::Count { shared, .. } | Mode::List { shared, .. } => shared,
        }
    }
}

#[derive(Subcommand, Debug)]
/// Prompt source modes
pub enum Mode {
    /// Send the same prompt a fixed number of times
    Count {
        /// Base URL of the endpoint host, eg `http://localhost:8000`
        base_url: String,
        /// Directory the images are written to
        #[arg(default_value = DEFAULT_OUT_DIR)]
        out_dir: PathBuf,
        /// Number of images to generate
        #[arg(long, default_value_t = DEFAULT_TOTAL, env = "BATCHGEN_TOTAL")]
        total: usize,
        /// Prompt sent with every request
        #[arg(long, default_value = DEFAULT_COUNT_PROMPT, env = "BATCHGEN_PROMPT")]
        prompt: String,
        #[command(flatten)]
        /// Shared options
        shared: SharedOptions,
    },
    /// Send one request per record of a prompt list file
    List {
        /// Text file with one prompt per line
        input_file: PathBuf,
        /// Base URL of the endpoint host, eg `http://localhost:8000`
        base_url: String,
        /// Directory the images are written to
        #[arg(default_value = DEFAULT_OUT_DIR)]
        out_dir: PathBuf,
        /// How records in the input file are separated
        #[arg(long, value_enum, default_value_t = LineSeparator::Auto, env = "BATCHGEN_SEPARATOR")]
        separator: LineSeparator,
        #[command(flatten)]
        /// Shared options
        shared: SharedOptions,
    },
}

#[derive(Args, Debug, Clone)]
/// Options every mode accepts
pub struct SharedOptions {
    #[clap(long, help = "Enable debug logging", env = "BATCHGEN_DEBUG")]
    /// Enable debug logging. Env: BATCHGEN_DEBUG
    pub debug: bool,

    #[clap(long, env = "BATCHGEN_SETTINGS")]
    /// JSON file with generation settings; flags given here win over it.
    /// Env: BATCHGEN_SETTINGS
    pub settings: Option<PathBuf>,

    #[clap(long, env = "BATCHGEN_PREFIX")]
    /// Text prepended to every prompt
    pub prefix: Option<String>,

    #[clap(long, env = "BATCHGEN_NEG_PROMPT")]
    /// Negative prompt sent with every request
    pub neg_prompt: Option<String>,

    #[clap(long, short = 'W', env = "BATCHGEN_WIDTH")]
    /// Image width, falls back to the settings file then `512`
    pub width: Option<u32>,

    #[clap(long, short = 'H', env = "BATCHGEN_HEIGHT")]
    /// Image height, falls back to the settings file then `512`
    pub height: Option<u32>,

    #[clap(long, env = "BATCHGEN_STEPS")]
    /// Sampling steps; left to the endpoint when unset
    pub steps: Option<u32>,

    #[clap(long, env = "BATCHGEN_EXT")]
    /// Output format, eg `webp` or `png`
    pub ext: Option<String>,

    #[clap(long, env = "BATCHGEN_NO_IMG_ONLY")]
    /// Don't send the `img_only` flag
    pub no_img_only: bool,

    #[clap(long, env = "BATCHGEN_ENDPOINT_PATH")]
    /// Path of the generation endpoint, defaults to `/paint-by-text`
    pub endpoint_path: Option<String>,

    #[clap(long, default_value_t = DEFAULT_TIMEOUT_SECONDS, env = "BATCHGEN_TIMEOUT_SECS")]
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    #[clap(long, default_value_t = DEFAULT_PROGRESS_EVERY, env = "BATCHGEN_PROGRESS_EVERY")]
    /// Log progress every N items
    pub progress_every: usize,

    #[clap(long, env = "BATCHGEN_INSECURE")]
    /// Accept invalid TLS certificates from the endpoint. Env: BATCHGEN_INSECURE
    pub insecure: bool,
}
