//! Shared defaults
//!

/// Path on the endpoint host that accepts generation requests.
pub const DEFAULT_ENDPOINT_PATH: &str = "/paint-by-text";

/// Number of items generated in count mode when `--total` isn't given.
pub const DEFAULT_TOTAL: usize = 200;

/// Prompt reused for every item in count mode when `--prompt` isn't given.
pub const DEFAULT_COUNT_PROMPT: &str = "**";

/// Fallback image width, in pixels.
pub const DEFAULT_WIDTH: u32 = 512;

/// Fallback image height, in pixels.
pub const DEFAULT_HEIGHT: u32 = 512;

/// Fallback output format token.
pub const DEFAULT_EXT: &str = "webp";

/// Log progress every this many completed items.
pub const DEFAULT_PROGRESS_EVERY: usize = 10;

/// Per-request timeout (in seconds). Generation can be slow on busy hosts.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Where images land when no output directory is given.
pub const DEFAULT_OUT_DIR: &str = "./";

/// Prefix of the scratch files written while a body is being persisted.
pub const PARTIAL_FILE_PREFIX: &str = ".batchgen-";

/// Suffix of the scratch files written while a body is being persisted.
pub const PARTIAL_FILE_SUFFIX: &str = ".part";
