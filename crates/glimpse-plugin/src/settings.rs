//! Per-extension persistent settings.
//!
//! Every namespace (normally an extension name) owns one TOML file under the
//! settings directory. Reads never fail: a missing key, a missing file or a
//! corrupt file yields the caller's default.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{ExtensionError, ExtensionResult};

/// File-backed key/value settings, cached per namespace.
#[derive(Debug)]
pub struct SettingsStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, toml::Table>>,
}

impl SettingsStore {
    /// Create a store rooted at `dir`. Nothing is read until first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Directory holding the namespace files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `namespace`.
    pub fn path_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{}.toml", sanitize(namespace)))
    }

    /// Read `key` from `namespace`, or `default` when it is absent or has
    /// the wrong type.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T, namespace: &str) -> T {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let table = cache
            .entry(namespace.to_string())
            .or_insert_with(|| self.read(namespace));

        match table.get(key) {
            Some(value) => value.clone().try_into().unwrap_or_else(|e| {
                debug!(namespace, key, error = %e, "Setting has unexpected type, using default");
                default
            }),
            None => default,
        }
    }

    /// Store `value` under `key` in `namespace` and write the file.
    pub fn set<T: Serialize>(&self, key: &str, value: T, namespace: &str) -> ExtensionResult<()> {
        let value = toml::Value::try_from(value).map_err(|e| ExtensionError::Settings {
            namespace: namespace.to_string(),
            message: e.to_string(),
        })?;

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let table = cache
            .entry(namespace.to_string())
            .or_insert_with(|| self.read(namespace));
        table.insert(key.to_string(), value);

        let serialized = toml::to_string(&*table).map_err(|e| ExtensionError::Settings {
            namespace: namespace.to_string(),
            message: e.to_string(),
        })?;

        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(namespace), serialized)?;
        Ok(())
    }

    /// A view of this store restricted to one namespace.
    pub fn scoped(&self, namespace: impl Into<String>) -> ScopedSettings<'_> {
        ScopedSettings {
            store: self,
            namespace: namespace.into(),
        }
    }

    fn read(&self, namespace: &str) -> toml::Table {
        let path = self.path_for(namespace);
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return toml::Table::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read settings");
                return toml::Table::new();
            }
        };

        source.parse::<toml::Table>().unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Corrupt settings file, using defaults");
            toml::Table::new()
        })
    }
}

/// Settings of a single namespace.
#[derive(Debug)]
pub struct ScopedSettings<'a> {
    store: &'a SettingsStore,
    namespace: String,
}

impl ScopedSettings<'_> {
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.store.get(key, default, &self.namespace)
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> ExtensionResult<()> {
        self.store.set(key, value, &self.namespace)
    }
}

/// Keep namespace file names inside the settings directory.
fn sanitize(namespace: &str) -> String {
    let name: String = namespace
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match name.trim_matches('.') {
        "" => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}
