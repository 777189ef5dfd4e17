use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while preparing a training launch.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// A required input path does not exist.
    #[error("{flag} points to a missing path: {}", path.display())]
    MissingPath {
        /// The flag that carried the path.
        flag: &'static str,
        /// The path as given.
        path: PathBuf,
    },

    /// A path exists but could not be opened for reading.
    #[error("{flag} points to an unreadable path {}: {source}", path.display())]
    UnreadablePath {
        flag: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A path that cannot be passed to the trainer unchanged.
    #[error("{flag} path is not valid UTF-8: {}", path.display())]
    NonUtf8Path { flag: &'static str, path: PathBuf },

    /// A configuration file that is missing, unreadable or not valid JSON.
    #[error("configuration file {}: {reason}", path.display())]
    ConfigFile { path: PathBuf, reason: String },

    /// One or more configuration problems, collected in one pass.
    #[error("invalid run configuration:\n{}", .0.join("\n"))]
    InvalidConfig(Vec<String>),

    /// An unrecognised tag label in a corpus.
    #[error("invalid IOBES tag: {0:?}")]
    InvalidTag(String),

    /// A corpus line that does not follow the `token<TAB>tag` format.
    #[error("{}:{line}: {reason}", path.display())]
    Corpus {
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        reason: String,
    },

    /// The embedding file is empty or malformed.
    #[error("embedding file {}: {reason}", path.display())]
    Embedding { path: PathBuf, reason: String },

    /// The checkpoint location exists but is not a directory.
    #[error("checkpoint path is not a directory: {}", .0.display())]
    CheckpointNotDir(PathBuf),

    /// A regex pattern failed to compile (should not happen with static patterns).
    #[error("regex compilation error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for launcher operations.
pub type Result<T> = std::result::Result<T, LaunchError>;
