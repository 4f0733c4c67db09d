//! Lua extensions.
//!
//! A Lua extension is a directory holding a `plugin.toml` manifest and an
//! entry script. The script runs in its own sandboxed Lua 5.4 state (mlua)
//! with the `glimpse` and `fs` API tables installed.

mod bindings;
mod context;
mod convert;
mod extension;
mod manifest;

pub use convert::{lua_to_value, value_to_lua};
pub use extension::LuaExtension;
pub use manifest::{ExtensionManifest, MANIFEST_FILE};

use crate::types::Value;

/// Content published by a Lua extension through `ctx.content`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptContent {
    /// Name of the publishing extension.
    pub extension: String,
    pub value: Value,
}
