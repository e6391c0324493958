//! Where the prompts for a batch come from.

use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::error::ConfigError;

/// How records in a prompt list file are separated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum LineSeparator {
    /// `\r\n` if the text contains one anywhere, otherwise `\n`
    #[default]
    Auto,
    /// `\r\n`
    Crlf,
    /// `\n`
    Lf,
}

impl LineSeparator {
    /// The separator to split `text` on.
    pub fn resolve(self, text: &str) -> &'static str {
        match self {
            Self::Crlf => "\r\n",
            Self::Lf => "\n",
            Self::Auto if text.contains("\r\n") => "\r\n",
            Self::Auto => "\n",
        }
    }
}

/// Fixed text wrapped around every prompt of a batch.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PromptStyle {
    /// Prepended verbatim to every prompt
    pub prefix: Option<String>,
    /// Sent as the negative prompt of every request
    pub negative_prompt: Option<String>,
}

/// Which kind of prompt source a batch uses, before it is loaded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PromptInput {
    /// The same prompt, `total` times
    Count {
        /// Literal prompt
        prompt: String,
        /// Number of items
        total: usize,
    },
    /// One prompt per record of a text file
    List {
        /// The prompt list file
        path: PathBuf,
        /// Record separator
        separator: LineSeparator,
    },
}

impl PromptInput {
    /// Builds the prompt source; fails if the list file can't be read.
    pub fn load(&self, style: &PromptStyle) -> Result<PromptSource, ConfigError> {
        let source = match self {
            Self::Count { prompt, total } => PromptSource::repeat(prompt, *total),
            Self::List { path, separator } => PromptSource::from_file(path, *separator)?,
        };
        Ok(source.with_style(style.clone()))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Records {
    Repeat { prompt: String, total: usize },
    List(Vec<String>),
}

/// One prompt, ready for the request builder.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PromptItem {
    /// Position in the batch, from zero
    pub index: usize,
    /// The prompt with the style prefix applied
    pub prompt: String,
    /// The negative prompt, if the batch has one
    pub negative_prompt: Option<String>,
}

/// A finite, ordered sequence of prompts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PromptSource {
    records: Records,
    style: PromptStyle,
}

impl PromptSource {
    /// Count mode: `prompt` reused for every one of `total` items.
    pub fn repeat(prompt: &str, total: usize) -> Self {
        Self {
            records: Records::Repeat {
                prompt: prompt.to_string(),
                total,
            },
            style: PromptStyle::default(),
        }
    }

    /// List mode: one prompt per record of `text`.
    ///
    /// Records are split on the separator only; no other whitespace is trimmed
    /// and an empty record after a trailing separator is kept.
    pub fn from_text(text: &str, separator: LineSeparator) -> Self {
        let separator = separator.resolve(text);
        Self {
            records: Records::List(text.split(separator).map(str::to_string).collect()),
            style: PromptStyle::default(),
        }
    }

    /// List mode, reading the records from a UTF-8 file.
    pub fn from_file(path: &Path, separator: LineSeparator) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::InputFile {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|source| ConfigError::InputDecode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(&text, separator))
    }

    /// Applies a prefix and negative prompt to every item.
    pub fn with_style(mut self, style: PromptStyle) -> Self {
        self.style = style;
        self
    }

    /// Number of items in the batch.
    pub fn len(&self) -> usize {
        match &self.records {
            Records::Repeat { total, .. } => *total,
            Records::List(prompts) => prompts.len(),
        }
    }

    /// True if the batch has no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw record at `index`, without the style applied.
    fn record(&self, index: usize) -> Option<&str> {
        match &self.records {
            Records::Repeat { prompt, total } => (index < *total).then_some(prompt.as_str()),
            Records::List(prompts) => prompts.get(index).map(String::as_str),
        }
    }

    /// Items in order, styled.
    pub fn iter(&self) -> impl Iterator<Item = PromptItem> + '_ {
        (0..self.len()).filter_map(move |index| {
            self.record(index).map(|record| PromptItem {
                index,
                prompt: match &self.style.prefix {
                    Some(prefix) => format!("{prefix}{record}"),
                    None => record.to_string(),
                },
                negative_prompt: self.style.negative_prompt.clone(),
            })
        })
    }
}
