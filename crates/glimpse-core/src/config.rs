//! Host configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::geometry::Size;

/// Configuration for the preview host.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct HostConfig {
    /// Directories scanned for scripted extensions, in order. An extension
    /// found in an earlier directory shadows one of the same name later on.
    #[builder(default = "default_plugin_dirs()")]
    pub plugin_dirs: Vec<PathBuf>,

    /// Directory holding settings files.
    #[builder(default = "default_config_dir()")]
    pub config_dir: PathBuf,

    /// Largest fraction of the screen a preview window may take.
    #[builder(default = "0.9")]
    pub max_screen_ratio: f64,

    /// Smallest window size, applied after fitting.
    #[builder(default = "Size::new(240.0, 120.0)")]
    pub min_window_size: Size,

    /// Keep a window size chosen by the user for later previews.
    #[builder(default = "true")]
    pub keep_user_size: bool,

    /// Extensions that are registered but never used.
    #[builder(default)]
    pub disabled_extensions: HashSet<String>,
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glimpse")
}

/// The user's plugin directory, then the one shipped next to the executable.
fn default_plugin_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![default_config_dir().join("plugins")];
    if let Some(bundled) = bundled_plugin_dir() {
        dirs.push(bundled);
    }
    dirs
}

/// `plugins/` beside the running executable.
pub fn bundled_plugin_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    exe.parent().map(|dir| dir.join("plugins"))
}

impl HostConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ratio) = self.max_screen_ratio {
            check_ratio(ratio)?;
        }
        if let Some(size) = self.min_window_size {
            if size.width < 0.0 || size.height < 0.0 {
                return Err("Minimum window size cannot be negative".to_string());
            }
        }
        Ok(())
    }
}

fn check_ratio(ratio: f64) -> Result<(), String> {
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(format!("max_screen_ratio must be in (0, 1], got {ratio}"));
    }
    Ok(())
}

impl HostConfig {
    /// Create a new config builder.
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::default()
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Self::parse(source, Path::new("<inline>"))
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&source, path)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from `<config_dir>/config.toml` when present, defaults otherwise.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_dir().join("config.toml");
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse(source: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        check_ratio(config.max_screen_ratio).map_err(|message| ConfigError::Invalid { message })?;
        Ok(config)
    }

    /// Search `dir` before the configured plugin directories.
    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dirs.insert(0, dir.into());
        self
    }

    /// Replace the plugin directories.
    pub fn with_plugin_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.plugin_dirs = dirs.into_iter().collect();
        self
    }

    /// Use a different settings directory.
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Disable an extension by name.
    pub fn disable_extension(mut self, name: impl Into<String>) -> Self {
        self.disabled_extensions.insert(name.into());
        self
    }

    /// Check if an extension is disabled.
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled_extensions.contains(name)
    }

    /// Directory for per-namespace settings files.
    pub fn settings_dir(&self) -> PathBuf {
        self.config_dir.join("settings")
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugin_dirs: default_plugin_dirs(),
            config_dir: default_config_dir(),
            max_screen_ratio: 0.9,
            min_window_size: Size::new(240.0, 120.0),
            keep_user_size: true,
            disabled_extensions: HashSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = HostConfig::builder()
            .plugin_dirs(vec![PathBuf::from("/opt/glimpse/plugins")])
            .max_screen_ratio(0.5)
            .build()
            .unwrap();

        assert_eq!(config.plugin_dirs, vec![PathBuf::from("/opt/glimpse/plugins")]);
        assert_eq!(config.max_screen_ratio, 0.5);
        assert!(config.keep_user_size);
    }

    #[test]
    fn test_builder_rejects_bad_ratio() {
        assert!(HostConfig::builder().max_screen_ratio(0.0).build().is_err());
        assert!(HostConfig::builder().max_screen_ratio(1.5).build().is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = HostConfig::from_toml_str(
            r#"
            max_screen_ratio = 0.75
            disabled_extensions = ["video"]
            "#,
        )
        .unwrap();

        assert_eq!(config.max_screen_ratio, 0.75);
        assert!(config.is_disabled("video"));
        assert!(!config.is_disabled("text"));
        assert_eq!(config.min_window_size, Size::new(240.0, 120.0));
        assert_eq!(config.plugin_dirs, default_plugin_dirs());
    }

    #[test]
    fn test_from_toml_plugin_dirs() {
        let config = HostConfig::from_toml_str(
            r#"
            plugin_dirs = ["/home/me/plugins", "/usr/share/glimpse/plugins"]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.plugin_dirs,
            vec![
                PathBuf::from("/home/me/plugins"),
                PathBuf::from("/usr/share/glimpse/plugins"),
            ]
        );
    }

    #[test]
    fn test_from_toml_rejects_bad_ratio() {
        let err = HostConfig::from_toml_str("max_screen_ratio = 2.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = HostConfig::from_toml_str("max_screen_ratio = \"big\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "keep_user_size = false\n").unwrap();

        let config = HostConfig::load(&path).unwrap();
        assert!(!config.keep_user_size);

        let missing = HostConfig::load(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
