//! Error types for linkscope.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for linkscope operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
#[derive(Error, Debug)]
pub enum Error {
    // Byte source errors
    #[error("byte source {0} does not exist")]
    SourceNotFound(PathBuf),

    #[error("byte source {path} could not be opened: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("an ingestion session is already running")]
    AlreadyRunning,

    // Parse errors
    #[error("invalid channel selector '{0}', expected SRC->DST")]
    InvalidSelector(String),

    #[error("invalid hex byte '{0}'")]
    InvalidHex(String),

    #[error("invalid whitelist entry '{0}', expected SRC:DST")]
    InvalidWhitelistEntry(String),

    #[error("at most {max} channels can be tracked, got {got}")]
    TooManyChannels { max: usize, got: usize },

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
