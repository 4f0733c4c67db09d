//! Registry of installed extensions.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::extension::{Extension, contain};
use crate::lua::LuaExtension;
use crate::settings::SettingsStore;
use crate::types::Phase;

/// Whether a registered extension takes part in resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionStatus {
    /// Initialized and eligible.
    Usable,
    /// `init` failed; excluded for the rest of the process.
    Failed(String),
    /// Disabled by configuration; `init` was never called.
    Disabled,
}

impl ExtensionStatus {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Usable)
    }
}

/// Summary of a registered extension.
#[derive(Debug, Clone)]
pub struct ExtensionInfo {
    pub name: String,
    pub priority: i32,
    pub status: ExtensionStatus,
}

struct Entry {
    extension: Arc<dyn Extension>,
    priority: i32,
    status: ExtensionStatus,
}

/// Holds every discovered extension for the lifetime of the process.
///
/// Registration is idempotent per name. Each extension's `init` runs exactly
/// once, during registration, and a failing extension is kept only for
/// reporting.
#[derive(Default)]
pub struct ExtensionRegistry {
    /// Entries in registration order, keyed by name.
    entries: IndexMap<String, Entry>,

    /// Indices of usable entries, by descending priority then registration order.
    usable: Vec<usize>,

    /// Names never made usable.
    disabled: HashSet<String>,

    /// Name of the always-matching last resort.
    fallback: Option<String>,
}

impl ExtensionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that refuses the named extensions.
    pub fn with_disabled(disabled: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            disabled: disabled.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Register and initialize an extension.
    ///
    /// Returns `false` when the name is already registered. A failing `init`
    /// is logged; the extension is recorded as failed and never resolved.
    pub fn register(&mut self, mut extension: Box<dyn Extension>) -> bool {
        let name = extension.name().to_string();
        if self.entries.contains_key(&name) {
            debug!(extension = %name, "Extension already registered, ignoring");
            return false;
        }

        let priority = extension.priority();

        let status = if self.disabled.contains(&name) {
            info!(extension = %name, "Extension disabled by configuration");
            ExtensionStatus::Disabled
        } else {
            match contain(&name, Phase::Init, || extension.init()) {
                Ok(()) => {
                    debug!(extension = %name, priority, "Extension registered");
                    ExtensionStatus::Usable
                }
                Err(e) => {
                    warn!(extension = %name, error = %e, "Extension failed to initialize, excluding it");
                    ExtensionStatus::Failed(e.to_string())
                }
            }
        };

        self.entries.insert(
            name,
            Entry {
                extension: Arc::from(extension),
                priority,
                status,
            },
        );
        self.rebuild_order();
        true
    }

    /// Register the last-resort extension shown when nothing else works.
    ///
    /// It should have the minimum priority and handle every path.
    pub fn register_fallback(&mut self, extension: Box<dyn Extension>) -> bool {
        let name = extension.name().to_string();
        let registered = self.register(extension);
        if registered {
            self.fallback = Some(name);
        }
        registered
    }

    /// Load every scripted extension below `dir` and register it.
    ///
    /// Broken plugin directories are logged and skipped. Returns the number of
    /// newly registered extensions.
    pub fn discover(&mut self, dir: &Path, settings: &Arc<SettingsStore>) -> usize {
        let mut count = 0;
        for extension in LuaExtension::discover(dir, settings) {
            if self.register(Box::new(extension)) {
                count += 1;
            }
        }
        info!(dir = %dir.display(), count, "Discovered scripted extensions");
        count
    }

    /// Usable extensions by descending priority, ties in registration order.
    pub fn all_usable(&self) -> impl Iterator<Item = &Arc<dyn Extension>> + Clone + '_ {
        self.usable.iter().map(move |&i| &self.entries[i].extension)
    }

    /// The registered fallback, if it initialized.
    pub fn fallback(&self) -> Option<&Arc<dyn Extension>> {
        let name = self.fallback.as_ref()?;
        self.entries
            .get(name)
            .filter(|entry| entry.status.is_usable())
            .map(|entry| &entry.extension)
    }

    /// Look up a usable extension by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Extension>> {
        self.entries
            .get(name)
            .filter(|entry| entry.status.is_usable())
            .map(|entry| &entry.extension)
    }

    /// Status of a registered extension.
    pub fn status(&self, name: &str) -> Option<&ExtensionStatus> {
        self.entries.get(name).map(|entry| &entry.status)
    }

    /// Every registered extension in resolution order, unusable ones last.
    pub fn extensions(&self) -> Vec<ExtensionInfo> {
        let unusable = (0..self.entries.len()).filter(|i| !self.usable.contains(i));
        self.usable
            .iter()
            .copied()
            .chain(unusable)
            .filter_map(|i| self.entries.get_index(i))
            .map(|(name, entry)| ExtensionInfo {
                name: name.clone(),
                priority: entry.priority,
                status: entry.status.clone(),
            })
            .collect()
    }

    /// Number of registered extensions, usable or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn rebuild_order(&mut self) {
        let mut usable: Vec<usize> = self
            .entries
            .values()
            .enumerate()
            .filter(|(_, entry)| entry.status.is_usable())
            .map(|(i, _)| i)
            .collect();
        // stable sort keeps registration order among equal priorities
        usable.sort_by(|a, b| self.entries[*b].priority.cmp(&self.entries[*a].priority));
        self.usable = usable;
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.extensions())
            .field("fallback", &self.fallback)
            .finish()
    }
}
