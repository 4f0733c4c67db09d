//! The `ctx` table handed to script lifecycle functions.
//!
//! Scripts cannot hold a [`ViewerContext`] directly. Each call gets a plain
//! table mirroring the context, and fields the script changed are written
//! back once the call returns.

use glimpse_core::{Size, Theme, ViewerContent, ViewerContext};
use mlua::{Lua, Table, Value as LuaValue};
use tracing::warn;

use super::ScriptContent;
use super::convert::{lua_to_value, value_to_lua};
use crate::types::Value;

/// A mirrored context table and the content it started with.
pub(super) struct ContextTable {
    table: Table,
    content: Value,
}

impl ContextTable {
    /// Mirror `ctx` into a new table.
    pub fn new(lua: &Lua, ctx: &ViewerContext) -> mlua::Result<Self> {
        let table = lua.create_table()?;
        let size = ctx.preferred_size();

        table.set("title", ctx.title())?;
        table.set("width", size.width)?;
        table.set("height", size.height)?;
        table.set("can_resize", ctx.can_resize())?;
        table.set("full_window_dragging", ctx.full_window_dragging())?;
        table.set("theme", ctx.theme().to_string())?;
        table.set("busy", ctx.is_busy())?;

        let screen = ctx.screen().size();
        table.set("screen_width", screen.width)?;
        table.set("screen_height", screen.height)?;

        let content = ctx
            .viewer_content()
            .and_then(|c| c.downcast_ref::<ScriptContent>())
            .map(|c| c.value.clone())
            .unwrap_or_default();
        table.set("content", value_to_lua(lua, &content)?)?;

        Ok(Self { table, content })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Copy the fields the script changed back into `ctx`.
    ///
    /// Fields with the wrong type or an invalid value are logged and left
    /// untouched.
    pub fn write_back(self, extension: &str, ctx: &mut ViewerContext) -> mlua::Result<()> {
        let t = &self.table;

        if let Some(title) = t.get::<Option<String>>("title")? {
            ctx.set_title(title);
        }

        let current = ctx.preferred_size();
        let size = Size::new(
            t.get::<Option<f64>>("width")?.unwrap_or(current.width),
            t.get::<Option<f64>>("height")?.unwrap_or(current.height),
        );
        if size != current {
            if size.is_degenerate() {
                warn!(extension, width = size.width, height = size.height, "Ignoring invalid preferred size");
            } else {
                ctx.set_preferred_size(size);
            }
        }

        if let Some(value) = t.get::<Option<bool>>("can_resize")? {
            ctx.set_can_resize(value);
        }
        if let Some(value) = t.get::<Option<bool>>("full_window_dragging")? {
            ctx.set_full_window_dragging(value);
        }

        if let Some(theme) = t.get::<Option<String>>("theme")? {
            match theme.parse::<Theme>() {
                Ok(theme) => ctx.set_theme(theme),
                Err(_) => warn!(extension, theme = %theme, "Ignoring unknown theme"),
            }
        }

        let content = lua_to_value(t.get::<LuaValue>("content")?);
        if content != self.content {
            if content.is_null() {
                ctx.clear_viewer_content();
            } else {
                ctx.set_viewer_content(ViewerContent::new(ScriptContent {
                    extension: extension.to_string(),
                    value: content,
                }));
            }
        }

        // busy last so content is in place when the session turns ready
        if let Some(busy) = t.get::<Option<bool>>("busy")? {
            ctx.set_busy(busy);
        }

        Ok(())
    }
}
