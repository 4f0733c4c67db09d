//! Error types for context and configuration handling.

use std::path::PathBuf;

use thiserror::Error;

use crate::context::SessionId;

/// Errors raised by the shared viewer context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The host stopped listening for this session's updates.
    #[error("Session {session} is closed")]
    Closed { session: SessionId },

    /// A size that cannot be laid out.
    #[error("Invalid size: {width}x{height}")]
    InvalidSize { width: f64, height: f64 },
}

/// Errors raised while loading the host configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::HostConfig`].
    #[error("Invalid configuration in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A value is out of range.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}
