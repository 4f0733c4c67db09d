//! Error types for the preview host.

use std::path::PathBuf;

use glimpse_core::ConfigError;
use thiserror::Error;

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors that can occur while driving previews.
#[derive(Debug, Error)]
pub enum HostError {
    /// No usable extension handles the path and no fallback is registered.
    #[error("No viewer available for {path}")]
    NoViewer { path: PathBuf },

    /// Every candidate, including the fallback, failed.
    #[error("Every viewer failed for {path}: {message}")]
    AllCandidatesFailed { path: PathBuf, message: String },

    /// The host event loop is gone.
    #[error("Host event loop has stopped")]
    ChannelClosed,

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
