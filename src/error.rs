//! Global error handling for repopacker
//!
//! File-level failures (unreadable directories, unreadable files) are
//! recorded inline on nodes and in packed documents. The types here cover
//! what is left: programmer errors on the tree and failures of the
//! surrounding collaborators (history, clipboard, output).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::clipboard::ClipboardError;
use crate::history::HistoryError;
use crate::types::NodeId;

/// Global error type for repopacker operations
#[derive(Error, Debug)]
pub enum RepoPackerError {
    /// Tree misuse
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    /// Recent history could not be loaded or saved
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Clipboard copy failed
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Ignore rules could not be built
    #[error("Ignore rule error: {0}")]
    Ignore(#[from] ignore::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Output rendering errors
    #[error("Writer error: {0}")]
    Writer(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(String),
}

/// Specialized Result type for repopacker operations
pub type Result<T> = std::result::Result<T, RepoPackerError>;

/// Programmer errors when driving a [`SelectionTree`](crate::tree::SelectionTree)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The id does not belong to this tree
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// `Partial` is derived, never assigned
    #[error("partial is not a valid target state")]
    PartialTarget,

    /// The node has been replaced by a refresh of an ancestor
    #[error("node {0:?} is detached from the tree")]
    Detached(NodeId),
}

/// A directory could not be listed
///
/// Stored on the directory node; siblings are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot read directory {}: {message}", path.display())]
pub struct ScanError {
    /// Directory that failed
    pub path: PathBuf,
    /// Kind of the underlying I/O error
    pub kind: io::ErrorKind,
    /// Human-readable description
    pub message: String,
}

impl ScanError {
    pub fn new(path: impl Into<PathBuf>, err: &io::Error) -> Self {
        Self {
            path: path.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Creates a RepoPackerError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::RepoPackerError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

// The binary reports through io::Result
impl From<RepoPackerError> for io::Error {
    fn from(err: RepoPackerError) -> Self {
        match err {
            RepoPackerError::Io(e) => e,
            RepoPackerError::PathNotFound(_) => io::Error::new(io::ErrorKind::NotFound, err.to_string()),
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}
