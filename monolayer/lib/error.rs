//! `monolayer::error` holds the error type shared by every layer operation.

use std::path::PathBuf;

use thiserror::Error;

use crate::layer::{Pass, Severity};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The process exit status reserved for any condition that aborts a layer application.
pub const ABORT_EXIT_CODE: i32 = 255;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a monolayer-related operation.
pub type LayerResult<T> = Result<T, LayerError>;

/// An error that occurred while applying a layer to a root filesystem.
#[derive(pretty_error_debug::Debug, Error)]
pub enum LayerError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The root filesystem path was not configured.
    #[error("root filesystem is not configured: set {0}")]
    MissingRootfsConfig(String),

    /// The root filesystem path does not exist.
    #[error("root filesystem does not exist: {0}")]
    RootfsNotFound(PathBuf),

    /// The root filesystem path exists but is not a directory.
    #[error("root filesystem is not a directory: {0}")]
    RootfsNotDirectory(PathBuf),

    /// The layer archive does not exist.
    #[error("layer archive does not exist: {0}")]
    LayerNotFound(PathBuf),

    /// The layer archive exists but is not a regular file.
    #[error("layer archive is not a regular file: {0}")]
    LayerNotFile(PathBuf),

    /// A whiteout marker whose path cannot be decomposed around the marker token.
    #[error("malformed whiteout marker {path:?}: {reason}")]
    MalformedMarker {
        /// The path recorded in the archive.
        path: String,

        /// What is wrong with it.
        reason: &'static str,
    },

    /// A path that would resolve outside of the root filesystem.
    #[error("path escapes the root filesystem: {0}")]
    PathEscapesRoot(String),

    /// Removing a whiteout target failed for a reason other than it being absent.
    #[error("failed to remove {path}: {source}")]
    Mutation {
        /// The absolute path that could not be removed.
        path: PathBuf,

        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The layer archive could not be opened or its compression could not be read.
    #[error("failed to open layer archive {path}: {source}")]
    ArchiveOpen {
        /// The layer archive path.
        path: PathBuf,

        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The archive stream is corrupt beyond recovery.
    #[error("failed to read layer archive {path}: {source}")]
    ArchiveRead {
        /// The layer archive path.
        path: PathBuf,

        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An entry could not be written to disk and the run does not tolerate warnings.
    #[error("failed to extract {entry}: {source}")]
    Extraction {
        /// The layer-relative path of the entry.
        entry: String,

        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The working directory could not be changed or restored.
    #[error("failed to change working directory to {path}: {source}")]
    WorkdirChange {
        /// The directory that could not be entered.
        path: PathBuf,

        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// One of the two passes over the layer failed.
    #[error("{pass} pass failed: {source}")]
    PassFailed {
        /// The pass that failed.
        pass: Pass,

        /// The error that aborted the pass.
        #[source]
        source: Box<LayerError>,
    },

    /// A blocking task could not be joined.
    #[error("join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerError {
    /// Wraps the error with the pass it aborted.
    pub fn in_pass(self, pass: Pass) -> LayerError {
        LayerError::PassFailed {
            pass,
            source: Box::new(self),
        }
    }

    /// Returns the pass that failed, if the error came from one.
    pub fn failed_pass(&self) -> Option<Pass> {
        match self {
            LayerError::PassFailed { pass, .. } => Some(*pass),
            _ => None,
        }
    }

    /// Every error that reaches a caller aborts the layer application.
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }

    /// The process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        ABORT_EXIT_CODE
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
