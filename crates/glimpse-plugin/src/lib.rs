//! Viewer extension system for glimpse.
//!
//! This crate defines the contract every viewer implements and the machinery
//! that picks one for a path.
//!
//! # Architecture
//!
//! - [`Extension`] is registered once per process. It answers capability
//!   queries and creates a fresh [`Viewer`] for each preview session.
//! - [`ExtensionRegistry`] initializes extensions exactly once and keeps the
//!   usable ones ordered by descending priority.
//! - [`Resolver`] asks usable extensions in order and returns the first one
//!   that handles a path.
//! - [`LuaExtension`] loads scripted extensions from `plugin.toml`
//!   directories.
//!
//! Every call into an extension goes through [`contain`], so a panic counts
//! as an ordinary failure of that extension.
//!
//! # Example
//!
//! ```ignore
//! use glimpse_plugin::{ExtensionRegistry, Resolver, SettingsStore};
//!
//! let settings = Arc::new(SettingsStore::new(config.settings_dir()));
//! let mut registry = ExtensionRegistry::with_disabled(config.disabled_extensions);
//! for dir in &config.plugin_dirs {
//!     registry.discover(dir, &settings);
//! }
//!
//! if let Some(resolution) = Resolver::new(&registry).resolve(path) {
//!     println!("{} handles {}", resolution.extension.name(), path.display());
//! }
//! ```

mod extension;
pub mod lua;
mod registry;
mod resolver;
mod settings;
mod types;

pub use extension::{Extension, Viewer, contain};
pub use lua::{ExtensionManifest, LuaExtension, ScriptContent};
pub use registry::{ExtensionInfo, ExtensionRegistry, ExtensionStatus};
pub use resolver::{Candidates, Resolution, Resolver};
pub use settings::{ScopedSettings, SettingsStore};
pub use types::{ExtensionError, ExtensionResult, Phase, Value};
