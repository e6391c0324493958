//! Error handling

use std::fmt;
use std::path::PathBuf;

/// Fatal errors, raised before any request is sent.
#[derive(Debug)]
pub enum ConfigError {
    /// The prompt list file is missing or unreadable
    InputFile {
        /// The file we tried to read
        path: PathBuf,
        /// Why it failed
        source: std::io::Error,
    },
    /// The prompt list file isn't valid UTF-8
    InputDecode {
        /// The file we tried to decode
        path: PathBuf,
        /// Why it failed
        source: std::string::FromUtf8Error,
    },
    /// A command line argument or setting has an unusable value
    InvalidArgument(String),
    /// The output directory couldn't be created
    OutputDir {
        /// The directory we tried to create
        path: PathBuf,
        /// Why it failed
        source: std::io::Error,
    },
    /// The JSON settings file couldn't be read or parsed
    SettingsFile {
        /// The settings file
        path: PathBuf,
        /// What went wrong
        message: String,
    },
    /// The HTTP client couldn't be built
    Client(reqwest::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputFile { path, source } => {
                write!(f, "Failed to read input file {}: {source}", path.display())
            }
            Self::InputDecode { path, source } => {
                write!(f, "Input file {} is not valid UTF-8: {source}", path.display())
            }
            Self::InvalidArgument(message) => write!(f, "Invalid argument: {message}"),
            Self::OutputDir { path, source } => write!(
                f,
                "Failed to create output directory {}: {source}",
                path.display()
            ),
            Self::SettingsFile { path, message } => {
                write!(f, "Bad settings file {}: {message}", path.display())
            }
            Self::Client(err) => write!(f, "Failed to build HTTP client: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InputFile { source, .. } | Self::OutputDir { source, .. } => Some(source),
            Self::InputDecode { source, .. } => Some(source),
            Self::Client(err) => Some(err),
            Self::InvalidArgument(_) | Self::SettingsFile { .. } => None,
        }
    }
}

/// Everything that can go wrong fetching and saving a single image.
#[derive(Debug)]
pub enum FetchPersistError {
    /// The request never got a response, or the body couldn't be read
    Transport(reqwest::Error),
    /// The endpoint answered with a non-success status
    Status(reqwest::StatusCode),
    /// The response has no usable `filename="..."` disposition
    Protocol(String),
    /// Writing the image to disk failed
    Filesystem {
        /// The path being written
        path: PathBuf,
        /// Why it failed
        source: std::io::Error,
    },
}

impl FetchPersistError {
    /// Name of the error class, as used in failure logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) | Self::Status(_) => "TransportError",
            Self::Protocol(_) => "ProtocolError",
            Self::Filesystem { .. } => "FilesystemError",
        }
    }
}

impl fmt::Display for FetchPersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "Request failed: {err}"),
            Self::Status(status) => write!(f, "Endpoint returned {status}"),
            Self::Protocol(message) => write!(f, "Unexpected response: {message}"),
            Self::Filesystem { path, source } => {
                write!(f, "Failed to write {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for FetchPersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Filesystem { source, .. } => Some(source),
            Self::Status(_) | Self::Protocol(_) => None,
        }
    }
}

impl From<reqwest::Error> for FetchPersistError {
    fn from(err: reqwest::Error) -> Self {
        FetchPersistError::Transport(err)
    }
}

/// Why a single batch item produced no image.
#[derive(Debug)]
pub enum ItemError {
    /// The prompt record couldn't be turned into a request
    InvalidRequest(String),
    /// The fetch or the write failed
    FetchPersist(FetchPersistError),
}

impl ItemError {
    /// Name of the error class, as used in failure logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::FetchPersist(err) => err.kind(),
        }
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest(message) => write!(f, "Invalid request: {message}"),
            Self::FetchPersist(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ItemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidRequest(_) => None,
            Self::FetchPersist(err) => Some(err),
        }
    }
}

impl From<FetchPersistError> for ItemError {
    fn from(err: FetchPersistError) -> Self {
        ItemError::FetchPersist(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_failure_classes() {
        assert_eq!(
            FetchPersistError::Status(reqwest::StatusCode::BAD_GATEWAY).kind(),
            "TransportError"
        );
        assert_eq!(
            FetchPersistError::Protocol("no header".to_string()).kind(),
            "ProtocolError"
        );
        let fs_err = FetchPersistError::Filesystem {
            path: PathBuf::from("out/image.webp"),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(fs_err.kind(), "FilesystemError");
        assert_eq!(ItemError::from(fs_err).kind(), "FilesystemError");
        assert_eq!(
            ItemError::InvalidRequest("empty".to_string()).kind(),
            "InvalidRequest"
        );
    }

    #[test]
    fn display_names_the_path() {
        let err = ConfigError::OutputDir {
            path: PathBuf::from("/nope/out"),
            source: std::io::Error::other("denied"),
        };
        let message = err.to_string();
        assert!(message.contains("/nope/out"));
        assert!(message.contains("denied"));
    }
}
