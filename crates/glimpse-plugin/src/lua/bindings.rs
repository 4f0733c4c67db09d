//! Rust-to-Lua bindings for the glimpse API.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mlua::{Lua, Table, Value as LuaValue};

use super::convert::{lua_to_value, value_to_lua};
use crate::settings::SettingsStore;
use crate::types::Value;

/// Bytes returned by `fs.read_header` when no limit is given.
const DEFAULT_HEADER_LEN: usize = 512;

/// Largest header a script may ask for.
const MAX_HEADER_LEN: usize = 64 * 1024;

/// Registry key of the table caching modules loaded through `require`.
const LOADED_KEY: &str = "glimpse.loaded";

/// Strip unsafe globals and install the `glimpse` and `fs` tables.
pub fn install(lua: &Lua, name: &str, dir: &Path, settings: Arc<SettingsStore>) -> mlua::Result<()> {
    let globals = lua.globals();

    // the stock loader would hand these back through package.loaded
    if let Ok(package) = globals.get::<Table>("package") {
        if let Ok(loaded) = package.get::<Table>("loaded") {
            for library in ["io", "os", "debug", "package"] {
                loaded.set(library, LuaValue::Nil)?;
            }
        }
        package.set("loadlib", LuaValue::Nil)?;
        package.set("searchpath", LuaValue::Nil)?;
    }

    for unsafe_global in ["loadfile", "dofile", "load", "io", "os", "debug", "package"] {
        globals.set(unsafe_global, LuaValue::Nil)?;
    }

    install_require(lua, dir)?;
    globals.set("glimpse", create_glimpse_api(lua, name, settings)?)?;
    globals.set("fs", create_fs_api(lua)?)?;
    Ok(())
}

/// Replace `require` with a loader that only reads `<dir>/<name>.lua`.
fn install_require(lua: &Lua, dir: &Path) -> mlua::Result<()> {
    lua.set_named_registry_value(LOADED_KEY, lua.create_table()?)?;

    let dir = dir.to_path_buf();
    let require = lua.create_function(move |lua, name: String| {
        let loaded: Table = lua.named_registry_value(LOADED_KEY)?;
        if let Some(module) = loaded.raw_get::<Option<LuaValue>>(name.as_str())? {
            return Ok(module);
        }

        let not_found = |reason: String| mlua::Error::runtime(format!("module '{name}' not found: {reason}"));
        let path = module_path(&dir, &name).ok_or_else(|| not_found("invalid module name".to_string()))?;
        let source = std::fs::read_to_string(&path).map_err(|e| not_found(e.to_string()))?;

        let module: LuaValue = lua
            .load(&source)
            .set_name(format!("@{}", path.display()))
            .eval()?;
        let module = if module.is_nil() {
            LuaValue::Boolean(true)
        } else {
            module
        };
        loaded.raw_set(name.as_str(), module.clone())?;
        Ok(module)
    })?;

    lua.globals().set("require", require)
}

/// File for a module name. Dotted names map to subdirectories; anything
/// that could leave `dir` is rejected.
fn module_path(dir: &Path, name: &str) -> Option<PathBuf> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
    if !valid {
        return None;
    }

    let mut path = dir.to_path_buf();
    path.extend(name.split('.'));
    path.set_extension("lua");
    Some(path)
}

/// Create the `glimpse` namespace.
fn create_glimpse_api(lua: &Lua, name: &str, settings: Arc<SettingsStore>) -> mlua::Result<Table> {
    let glimpse = lua.create_table()?;
    glimpse.set("version", env!("CARGO_PKG_VERSION"))?;

    let extension = name.to_string();
    glimpse.set(
        "log_info",
        lua.create_function(move |_, msg: String| {
            tracing::info!(target: "plugin", extension = %extension, "{}", msg);
            Ok(())
        })?,
    )?;

    let extension = name.to_string();
    glimpse.set(
        "log_warn",
        lua.create_function(move |_, msg: String| {
            tracing::warn!(target: "plugin", extension = %extension, "{}", msg);
            Ok(())
        })?,
    )?;

    let extension = name.to_string();
    glimpse.set(
        "log_error",
        lua.create_function(move |_, msg: String| {
            tracing::error!(target: "plugin", extension = %extension, "{}", msg);
            Ok(())
        })?,
    )?;

    // glimpse.setting(key, default?) reads this extension's own namespace
    let namespace = name.to_string();
    glimpse.set(
        "setting",
        lua.create_function(move |lua, (key, default): (String, LuaValue)| {
            let value: Value = settings.get(&key, lua_to_value(default), &namespace);
            value_to_lua(lua, &value)
        })?,
    )?;

    Ok(glimpse)
}

/// Create the read-only `fs` namespace.
fn create_fs_api(lua: &Lua) -> mlua::Result<Table> {
    let fs = lua.create_table()?;

    // fs.exists(path)
    fs.set(
        "exists",
        lua.create_function(|_, path: String| Ok(Path::new(&path).exists()))?,
    )?;

    // fs.is_dir(path)
    fs.set(
        "is_dir",
        lua.create_function(|_, path: String| Ok(Path::new(&path).is_dir()))?,
    )?;

    // fs.extension(path) - lowercase extension without the dot, or nil
    fs.set(
        "extension",
        lua.create_function(|_, path: String| {
            Ok(Path::new(&path)
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase()))
        })?,
    )?;

    // fs.read_header(path, len?) - first bytes of a file, nil when unreadable
    fs.set(
        "read_header",
        lua.create_function(|lua, (path, len): (String, Option<usize>)| {
            let len = len.unwrap_or(DEFAULT_HEADER_LEN).min(MAX_HEADER_LEN);
            let Ok(file) = std::fs::File::open(&path) else {
                return Ok(LuaValue::Nil);
            };

            let mut buf = Vec::with_capacity(len);
            if file.take(len as u64).read_to_end(&mut buf).is_err() {
                return Ok(LuaValue::Nil);
            }
            Ok(LuaValue::String(lua.create_string(&buf)?))
        })?,
    )?;

    Ok(fs)
}
