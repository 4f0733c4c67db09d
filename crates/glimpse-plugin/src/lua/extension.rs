//! Lua-backed [`Extension`] and [`Viewer`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glimpse_core::ViewerContext;
use mlua::{Function, Lua, RegistryKey, Table};
use tracing::{debug, warn};

use super::bindings;
use super::context::ContextTable;
use super::manifest::{ExtensionManifest, MANIFEST_FILE};
use crate::extension::{Extension, Viewer};
use crate::settings::SettingsStore;
use crate::types::{ExtensionError, ExtensionResult};

/// An extension implemented by a Lua script.
///
/// Every extension gets its own Lua state. The script returns a table whose
/// optional `init`, `can_handle`, `prepare`, `view` and `cleanup` functions
/// are called method-style.
pub struct LuaExtension {
    manifest: ExtensionManifest,
    dir: PathBuf,
    lua: Lua,
    module: Arc<RegistryKey>,
}

impl LuaExtension {
    /// Load the extension in `dir`.
    pub fn load(dir: &Path, settings: &Arc<SettingsStore>) -> ExtensionResult<Self> {
        let manifest = ExtensionManifest::load(dir)?;
        let name = manifest.name.clone();
        let load_error = |message: String| ExtensionError::LoadError {
            name: name.clone(),
            message,
        };

        let entry = dir.join(&manifest.entry);
        let source = std::fs::read_to_string(&entry)
            .map_err(|e| load_error(format!("{}: {e}", entry.display())))?;

        let lua = Lua::new();
        bindings::install(&lua, &manifest.name, dir, Arc::clone(settings))
            .map_err(|e| load_error(e.to_string()))?;

        let module: Table = lua
            .load(&source)
            .set_name(format!("@{}", entry.display()))
            .eval()
            .map_err(|e| load_error(format!("script must return a table: {e}")))?;

        let module = lua
            .create_registry_value(module)
            .map_err(|e| load_error(e.to_string()))?;

        debug!(extension = %manifest.name, dir = %dir.display(), "Loaded Lua extension");

        Ok(Self {
            manifest,
            dir: dir.to_path_buf(),
            lua,
            module: Arc::new(module),
        })
    }

    /// Load every plugin directory directly below `dir`.
    ///
    /// Directories without a `plugin.toml` are ignored. Broken plugins are
    /// logged and skipped. Results are ordered by directory name.
    pub fn discover(dir: &Path, settings: &Arc<SettingsStore>) -> Vec<Self> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "No plugin directory");
                return Vec::new();
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir() && path.join(MANIFEST_FILE).is_file())
            .collect();
        dirs.sort();

        dirs.into_iter()
            .filter_map(|path| match Self::load(&path, settings) {
                Ok(extension) => Some(extension),
                Err(e) => {
                    warn!(dir = %path.display(), error = %e, "Skipping broken plugin");
                    None
                }
            })
            .collect()
    }

    pub fn manifest(&self) -> &ExtensionManifest {
        &self.manifest
    }

    /// Directory the extension was loaded from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn module(&self) -> ExtensionResult<Table> {
        self.lua
            .registry_value(&self.module)
            .map_err(|e| script_error(&self.manifest.name, e))
    }
}

impl Extension for LuaExtension {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn priority(&self) -> i32 {
        self.manifest.priority
    }

    fn init(&mut self) -> ExtensionResult<()> {
        let module = self.module()?;
        let name = &self.manifest.name;

        match function(&module, "init", name)? {
            Some(init) => init
                .call::<()>(module)
                .map_err(|e| script_error(name, e)),
            None => Ok(()),
        }
    }

    fn can_handle(&self, path: &Path) -> ExtensionResult<bool> {
        let module = self.module()?;
        let name = &self.manifest.name;

        match function(&module, "can_handle", name)? {
            Some(can_handle) => can_handle
                .call::<bool>((module, path.to_string_lossy().to_string()))
                .map_err(|e| script_error(name, e)),
            None => Ok(false),
        }
    }

    fn create_viewer(&self) -> Box<dyn Viewer> {
        Box::new(LuaViewer {
            name: self.manifest.name.clone(),
            lua: self.lua.clone(),
            module: Arc::clone(&self.module),
            instance: None,
            cleaned: false,
        })
    }
}

impl std::fmt::Debug for LuaExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaExtension")
            .field("manifest", &self.manifest)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

/// One preview session of a [`LuaExtension`].
///
/// The session's `self` is a fresh table that inherits from the module, so
/// fields a script stores on `self` do not leak into later sessions.
struct LuaViewer {
    name: String,
    lua: Lua,
    module: Arc<RegistryKey>,
    instance: Option<RegistryKey>,
    cleaned: bool,
}

impl LuaViewer {
    fn instance(&mut self) -> ExtensionResult<Table> {
        if let Some(key) = &self.instance {
            return self
                .lua
                .registry_value(key)
                .map_err(|e| script_error(&self.name, e));
        }

        let instance = self
            .new_instance()
            .map_err(|e| script_error(&self.name, e))?;
        let key = self
            .lua
            .create_registry_value(instance.clone())
            .map_err(|e| script_error(&self.name, e))?;
        self.instance = Some(key);
        Ok(instance)
    }

    fn new_instance(&self) -> mlua::Result<Table> {
        let module: Table = self.lua.registry_value(&self.module)?;
        let meta = self.lua.create_table()?;
        meta.set("__index", module)?;

        let setmetatable: Function = self.lua.globals().get("setmetatable")?;
        setmetatable.call((self.lua.create_table()?, meta))
    }

    /// Call `method(self, path, ctx)` and copy context changes back.
    fn call(&mut self, method: &str, path: &Path, ctx: &mut ViewerContext) -> ExtensionResult<()> {
        let instance = self.instance()?;
        let Some(func) = function(&instance, method, &self.name)? else {
            return Ok(());
        };

        let mirrored = ContextTable::new(&self.lua, ctx).map_err(|e| script_error(&self.name, e))?;
        func.call::<()>((instance, path.to_string_lossy().to_string(), mirrored.table().clone()))
            .map_err(|e| script_error(&self.name, e))?;

        mirrored
            .write_back(&self.name, ctx)
            .map_err(|e| script_error(&self.name, e))
    }
}

impl Viewer for LuaViewer {
    fn prepare(&mut self, path: &Path, ctx: &mut ViewerContext) -> ExtensionResult<()> {
        self.call("prepare", path, ctx)
    }

    fn view(&mut self, path: &Path, ctx: &mut ViewerContext) -> ExtensionResult<()> {
        self.call("view", path, ctx)
    }

    fn cleanup(&mut self) -> ExtensionResult<()> {
        if std::mem::replace(&mut self.cleaned, true) {
            return Ok(());
        }
        let Some(key) = self.instance.take() else {
            return Ok(());
        };

        let instance: Table = self
            .lua
            .registry_value(&key)
            .map_err(|e| script_error(&self.name, e))?;
        let result = match function(&instance, "cleanup", &self.name)? {
            Some(cleanup) => cleanup
                .call::<()>(instance)
                .map_err(|e| script_error(&self.name, e)),
            None => Ok(()),
        };

        // the session table is dropped even when the script's cleanup failed
        if let Err(e) = self.lua.remove_registry_value(key) {
            debug!(extension = %self.name, error = %e, "Failed to release session table");
        }
        result
    }
}

/// Look up an optional function on a script table.
fn function(table: &Table, name: &str, extension: &str) -> ExtensionResult<Option<Function>> {
    table
        .get::<Option<Function>>(name)
        .map_err(|e| ExtensionError::Script {
            name: extension.to_string(),
            message: format!("'{name}' is not a function: {e}"),
        })
}

fn script_error(name: &str, e: mlua::Error) -> ExtensionError {
    ExtensionError::Script {
        name: name.to_string(),
        message: e.to_string(),
    }
}
