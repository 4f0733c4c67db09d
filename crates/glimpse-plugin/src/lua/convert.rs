//! Conversions between Lua values and [`Value`].

use std::collections::HashMap;

use mlua::{Lua, Table, Value as LuaValue};

use crate::types::Value;

/// Convert a Lua value to a [`Value`].
///
/// Tables with keys `1..=n` and nothing else become arrays, other tables
/// become objects with their string keys. Functions and userdata map to null.
pub fn lua_to_value(lua_val: LuaValue) -> Value {
    match lua_val {
        LuaValue::Nil => Value::Null,
        LuaValue::Boolean(b) => Value::Bool(b),
        LuaValue::Integer(i) => Value::Integer(i),
        LuaValue::Number(n) => Value::Float(n),
        LuaValue::String(s) => Value::String(s.to_string_lossy()),
        LuaValue::Table(t) => table_to_value(t),
        _ => Value::Null,
    }
}

fn table_to_value(t: Table) -> Value {
    let len = t.raw_len();
    let count = t.clone().pairs::<LuaValue, LuaValue>().count();

    if len > 0 && len == count {
        let arr = (1..=len)
            .map(|i| t.raw_get::<LuaValue>(i).map(lua_to_value).unwrap_or_default())
            .collect();
        return Value::Array(arr);
    }

    let mut obj = HashMap::new();
    for (k, v) in t.pairs::<LuaValue, LuaValue>().flatten() {
        let key = match k {
            LuaValue::String(s) => s.to_string_lossy(),
            LuaValue::Integer(i) => i.to_string(),
            _ => continue,
        };
        obj.insert(key, lua_to_value(v));
    }
    Value::Object(obj)
}

/// Convert a [`Value`] to a Lua value.
pub fn value_to_lua(lua: &Lua, val: &Value) -> mlua::Result<LuaValue> {
    match val {
        Value::Null => Ok(LuaValue::Nil),
        Value::Bool(b) => Ok(LuaValue::Boolean(*b)),
        Value::Integer(i) => Ok(LuaValue::Integer(*i)),
        Value::Float(f) => Ok(LuaValue::Number(*f)),
        Value::String(s) => Ok(LuaValue::String(lua.create_string(s)?)),
        Value::Array(arr) => {
            let table = lua.create_table()?;
            for (i, v) in arr.iter().enumerate() {
                table.raw_set(i + 1, value_to_lua(lua, v)?)?;
            }
            Ok(LuaValue::Table(table))
        }
        Value::Object(obj) => {
            let table = lua.create_table()?;
            for (k, v) in obj {
                table.raw_set(k.as_str(), value_to_lua(lua, v)?)?;
            }
            Ok(LuaValue::Table(table))
        }
    }
}
