//! Core types for the extension system.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

/// Result type for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// Lifecycle phase of an extension call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Init,
    CanHandle,
    Prepare,
    View,
    Cleanup,
}

/// Errors that can occur in the extension system.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// An extension reported a failure.
    #[error("{message}")]
    Other { message: String },

    /// An extension panicked.
    #[error("Extension '{name}' panicked during {phase}: {message}")]
    Panicked {
        name: String,
        phase: Phase,
        message: String,
    },

    /// Failed to load a scripted extension.
    #[error("Failed to load extension '{name}': {message}")]
    LoadError { name: String, message: String },

    /// A scripted extension raised an error.
    #[error("Extension '{name}' script error: {message}")]
    Script { name: String, message: String },

    /// Invalid `plugin.toml`.
    #[error("Invalid extension manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    /// Runtime not available.
    #[error("Runtime '{runtime}' is not available")]
    RuntimeNotAvailable { runtime: String },

    /// Settings could not be stored.
    #[error("Settings error in namespace '{namespace}': {message}")]
    Settings { namespace: String, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtensionError {
    /// Create a generic failure with a message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Whether the failure was a panic.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }
}

/// A dynamic value exchanged with scripted extensions.
///
/// Scripted extensions publish their renderable content as a `Value`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null/nil value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Integer value.
    Integer(i64),

    /// Floating point value.
    Float(f64),

    /// String value.
    String(String),

    /// Array/list value.
    Array(Vec<Value>),

    /// Object/table/map value.
    Object(HashMap<String, Value>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get this value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to get this value as an object.
    pub fn as_object(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(arr: Vec<T>) -> Self {
        Self::Array(arr.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::CanHandle.to_string(), "can_handle");
        assert_eq!(Phase::Cleanup.to_string(), "cleanup");
    }

    #[test]
    fn test_value_json_shape() {
        let value = Value::from(vec!["a", "b"]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"["a","b"]"#);
        assert_eq!(value.as_array().map(|a| a.len()), Some(2));
        assert!(Value::default().is_null());
    }

    #[test]
    fn test_panicked_message() {
        let err = ExtensionError::Panicked {
            name: "pdf".into(),
            phase: Phase::Prepare,
            message: "boom".into(),
        };
        assert!(err.is_panic());
        assert_eq!(
            err.to_string(),
            "Extension 'pdf' panicked during prepare: boom"
        );
    }
}
