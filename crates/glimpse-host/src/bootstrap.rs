//! Registry setup from configuration.

use std::sync::Arc;

use glimpse_core::HostConfig;
use glimpse_plugin::{ExtensionRegistry, SettingsStore};
use tracing::info;

use crate::info_panel::InfoPanel;

/// Build the process-wide registry: the info panel fallback plus every
/// scripted extension under the configured plugin directories.
///
/// Directories are searched in order and the first extension registered
/// under a name wins, so user plugins shadow bundled ones.
pub fn load_registry(config: &HostConfig) -> ExtensionRegistry {
    let settings = Arc::new(SettingsStore::new(config.settings_dir()));

    let mut registry = ExtensionRegistry::with_disabled(config.disabled_extensions.iter().cloned());
    registry.register_fallback(Box::new(InfoPanel::new()));
    for dir in &config.plugin_dirs {
        registry.discover(dir, &settings);
    }

    info!(
        extensions = registry.len(),
        usable = registry.all_usable().count(),
        "Extension registry ready"
    );
    registry
}
