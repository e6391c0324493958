//! The batch driver: one prompt at a time, failures logged and skipped.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::BatchConfig;
use crate::error::{ConfigError, ItemError};
use crate::fetch::{build_client, fetch_one};
use crate::prompts::{PromptItem, PromptSource};
use crate::request::GenerationRequest;

/// Where a batch run is in its life.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchState {
    /// `run` hasn't been called
    NotStarted,
    /// Items are being processed
    Running,
    /// Every item was attempted
    Completed,
    /// The batch couldn't start; no request was sent
    FailedFast,
}

/// Items completed so far, out of how many.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatchProgress {
    /// Items attempted, successful or not
    pub completed: usize,
    /// Size of the batch, when known
    pub total: Option<usize>,
}

impl BatchProgress {
    fn new(total: Option<usize>) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    /// True when the progress line is due after the latest item.
    fn is_due(&self, every: usize) -> bool {
        self.completed % every == 0 || Some(self.completed) == self.total
    }
}

impl fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total {
            Some(total) => write!(f, "{}/{}", self.completed, total),
            None => write!(f, "{}/?", self.completed),
        }
    }
}

/// What happened to one item.
#[derive(Debug)]
pub enum ItemOutcome {
    /// The image was written
    Saved {
        /// Position in the batch
        index: usize,
        /// Where it was written
        path: PathBuf,
    },
    /// No image; the batch carried on
    Failed {
        /// Position in the batch
        index: usize,
        /// The prompt that was sent
        prompt: String,
        /// Why it failed
        error: ItemError,
    },
}

impl ItemOutcome {
    /// Position of the item in the batch.
    pub fn index(&self) -> usize {
        match self {
            Self::Saved { index, .. } | Self::Failed { index, .. } => *index,
        }
    }

    /// True if the image was written.
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Result of a batch that ran to the end.
#[derive(Debug)]
pub struct BatchReport {
    /// One outcome per item, in order
    pub outcomes: Vec<ItemOutcome>,
    /// Final progress
    pub progress: BatchProgress,
}

impl BatchReport {
    /// Number of images written.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_saved()).count()
    }

    /// Number of items that produced no image.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Paths of the images written, in batch order.
    pub fn saved_paths(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ItemOutcome::Saved { path, .. } => Some(path.as_path()),
            ItemOutcome::Failed { .. } => None,
        })
    }
}

/// Creates the output directory if it isn't there yet.
pub fn ensure_output_dir(dir: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::OutputDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Runs a batch sequentially against the generation endpoint.
pub struct BatchDriver {
    config: BatchConfig,
    client: reqwest::Client,
    state: BatchState,
}

impl BatchDriver {
    /// Sets up the HTTP client; nothing is sent until [`BatchDriver::run`].
    pub fn new(config: BatchConfig) -> Result<Self, ConfigError> {
        let client = build_client(&config.client)?;
        Ok(Self {
            config,
            client,
            state: BatchState::NotStarted,
        })
    }

    /// Current state.
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Processes every item in order.
    ///
    /// Only a prompt source that can't be loaded, or an output directory that
    /// can't be created, fails the whole run. Per-item failures are logged and
    /// show up in the report.
    pub async fn run(&mut self) -> Result<BatchReport, ConfigError> {
        let source = match self.prepare() {
            Ok(source) => source,
            Err(err) => {
                self.state = BatchState::FailedFast;
                return Err(err);
            }
        };
        self.state = BatchState::Running;

        let mut progress = BatchProgress::new(Some(source.len()));
        let mut outcomes = Vec::with_capacity(source.len());
        info!(
            "Starting batch of {} against {}",
            source.len(),
            self.config.endpoint.url()
        );

        for item in source.iter() {
            let outcome = self.process(item).await;
            if let ItemOutcome::Failed {
                index,
                prompt,
                error,
            } = &outcome
            {
                warn!("Item {index} failed ({}): {error} [prompt: {prompt:?}]", error.kind());
            }
            outcomes.push(outcome);

            progress.completed += 1;
            if progress.is_due(self.config.progress_every) {
                info!("{progress}");
            }
        }

        self.state = BatchState::Completed;
        let report = BatchReport { outcomes, progress };
        info!(
            "Batch finished: {} saved, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    fn prepare(&self) -> Result<PromptSource, ConfigError> {
        let source = self.config.input.load(&self.config.style)?;
        ensure_output_dir(&self.config.out_dir)?;
        Ok(source)
    }

    async fn process(&self, item: PromptItem) -> ItemOutcome {
        match self.fetch_item(&item).await {
            Ok(path) => ItemOutcome::Saved {
                index: item.index,
                path,
            },
            Err(error) => ItemOutcome::Failed {
                index: item.index,
                prompt: item.prompt,
                error,
            },
        }
    }

    async fn fetch_item(&self, item: &PromptItem) -> Result<PathBuf, ItemError> {
        let url = GenerationRequest::new(item, &self.config.image)?.to_url(&self.config.endpoint);
        let client = &self.client;
        let path = fetch_one(|| client.get(url).send(), &self.config.out_dir).await?;
        Ok(path)
    }
}
