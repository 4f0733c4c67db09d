//! Core types for glimpse.
//!
//! This crate provides the data structures shared by the plugin and host
//! crates: the per-session [`ViewerContext`] through which extensions talk to
//! the host, window geometry, and the host configuration.

mod config;
mod context;
mod error;
mod geometry;

pub use config::{HostConfig, HostConfigBuilder, bundled_plugin_dir};
pub use context::{
    ContextHandle, ContextMessage, ContextProperty, ContextUpdate, SessionId, Theme,
    ViewerContent, ViewerContext, DEFAULT_PREFERRED_SIZE,
};
pub use error::{ConfigError, ContextError};
pub use geometry::{Fit, Point, Rect, ScreenInfo, Size, fit_to_screen};
