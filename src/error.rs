//! Error types for sd-card-backup

use std::path::PathBuf;
use thiserror::Error;

use crate::classify::FileClassification;

/// Main error type for backup operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown classification: {0:?}")]
    UnknownClassification(FileClassification),

    #[error("Cannot place {} under source root {}", path.display(), root.display())]
    PathComputation { path: PathBuf, root: PathBuf },

    #[error("Heuristic encountered two files with different base names: {} vs. {}", src.display(), dst.display())]
    HeuristicMismatch { src: PathBuf, dst: PathBuf },

    #[error("Could not read metadata for {}: {source}", path.display())]
    Heuristic {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Content copy failed for {}: {reason}", src.display())]
    ContentCopy { src: PathBuf, reason: String },

    #[error("Metadata copy failed for {}: {reason}", dst.display())]
    MetadataCopy { dst: PathBuf, reason: String },

    #[error("Incompatible creation times for {}: {from_tool:?} (tool) vs. {from_stat:?} (stat)", src.display())]
    TimestampVerification {
        src: PathBuf,
        from_tool: String,
        from_stat: String,
    },

    #[error("Copy strategy `{strategy}` is not supported on {platform}")]
    UnsupportedPlatform {
        strategy: &'static str,
        platform: String,
    },

    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("Could not run `{program}`: {source}")]
    Command {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse grouping of errors, used to decide how far a failure reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad classification table or relative path; a caller bug.
    Planning,
    /// Metadata could not be read for the current file.
    Heuristic,
    /// Content, metadata or timestamp copy failed for the current file.
    Copy,
    /// The selected strategy cannot run on this platform.
    Platform,
    /// Configuration, walking, or process setup.
    Setup,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownClassification(_) | Error::PathComputation { .. } => ErrorKind::Planning,
            Error::HeuristicMismatch { .. } | Error::Heuristic { .. } => ErrorKind::Heuristic,
            Error::DirectoryCreation { .. }
            | Error::ContentCopy { .. }
            | Error::MetadataCopy { .. }
            | Error::TimestampVerification { .. } => ErrorKind::Copy,
            Error::UnsupportedPlatform { .. } => ErrorKind::Platform,
            Error::Configuration { .. }
            | Error::Command { .. }
            | Error::Walk(_)
            | Error::Io(_)
            | Error::Serialization(_) => ErrorKind::Setup,
        }
    }

    /// Whether a run may move on to the next file after this error.
    ///
    /// A timestamp verification failure never qualifies: it means the
    /// creation time source cannot be trusted for any file.
    pub fn is_per_file(&self) -> bool {
        match self {
            Error::TimestampVerification { .. } | Error::HeuristicMismatch { .. } => false,
            other => matches!(other.kind(), ErrorKind::Heuristic | ErrorKind::Copy),
        }
    }
}

/// Result type alias for backup operations
pub type Result<T> = std::result::Result<T, Error>;
