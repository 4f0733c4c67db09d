//! `plugin.toml` parsing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{ExtensionError, ExtensionResult};

/// File name of the manifest inside a plugin directory.
pub const MANIFEST_FILE: &str = "plugin.toml";

/// Metadata about a scripted extension from its `plugin.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionManifest {
    /// Extension name (unique identifier).
    pub name: String,

    /// Extension version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: String,

    /// Resolution priority, higher is asked first.
    #[serde(default)]
    pub priority: i32,

    /// Runtime to use. Only `lua` is supported.
    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// Entry point script (relative to the plugin directory).
    #[serde(default = "default_entry")]
    pub entry: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_runtime() -> String {
    "lua".to_string()
}

fn default_entry() -> String {
    "main.lua".to_string()
}

impl ExtensionManifest {
    /// Parse a manifest document. `path` is only used in errors.
    pub fn parse(source: &str, path: &Path) -> ExtensionResult<Self> {
        let manifest: Self = toml::from_str(source).map_err(|e| ExtensionError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if manifest.name.trim().is_empty() {
            return Err(ExtensionError::Manifest {
                path: path.to_path_buf(),
                message: "name cannot be empty".to_string(),
            });
        }

        if manifest.runtime != "lua" {
            return Err(ExtensionError::RuntimeNotAvailable {
                runtime: manifest.runtime,
            });
        }

        // the entry must stay inside the plugin directory
        let entry = Path::new(&manifest.entry);
        if entry.is_absolute() || entry.components().any(|c| c.as_os_str() == "..") {
            return Err(ExtensionError::Manifest {
                path: path.to_path_buf(),
                message: format!("entry '{}' escapes the plugin directory", manifest.entry),
            });
        }

        Ok(manifest)
    }

    /// Read `plugin.toml` from a plugin directory.
    pub fn load(dir: &Path) -> ExtensionResult<Self> {
        let path = dir.join(MANIFEST_FILE);
        let source = std::fs::read_to_string(&path)?;
        Self::parse(&source, &path)
    }
}
