//! The viewer extension contract.
//!
//! An [`Extension`] is registered once per process. It answers capability
//! queries and creates a fresh [`Viewer`] for every preview session. The
//! viewer is driven through `prepare`, `view` and `cleanup` by the host.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use glimpse_core::ViewerContext;

use crate::types::{ExtensionError, ExtensionResult, Phase};

/// Trait implemented by every viewer extension.
pub trait Extension: Send + Sync {
    /// Stable, unique name of this extension.
    fn name(&self) -> &str;

    /// Higher priorities are asked first. Read once at registration.
    ///
    /// Use `i32::MAX` to override every other extension and `i32::MIN` for a
    /// last resort.
    fn priority(&self) -> i32 {
        0
    }

    /// One-time setup when the process starts. Must not depend on any path.
    ///
    /// An extension whose `init` fails is never used.
    fn init(&mut self) -> ExtensionResult<()> {
        Ok(())
    }

    /// Whether this extension can preview `path`.
    ///
    /// Must be safe for nonexistent, locked or arbitrary paths and return
    /// quickly. Reading a file header is fine, parsing the whole file is not.
    fn can_handle(&self, path: &Path) -> ExtensionResult<bool>;

    /// Create the viewer for one preview session.
    fn create_viewer(&self) -> Box<dyn Viewer>;
}

/// Per-session half of an extension.
pub trait Viewer: Send {
    /// Publish sizing, theme and title hints before the window is shown.
    ///
    /// Must be fast: no I/O beyond trivial header reads.
    fn prepare(&mut self, path: &Path, ctx: &mut ViewerContext) -> ExtensionResult<()>;

    /// Produce the viewer content.
    ///
    /// The context is busy on entry. Clear it with
    /// [`ViewerContext::set_busy`] when done, or later from background work
    /// through [`ViewerContext::handle`].
    fn view(&mut self, path: &Path, ctx: &mut ViewerContext) -> ExtensionResult<()>;

    /// Release every resource held by this viewer.
    ///
    /// Called exactly once per session, even when `view` never completed.
    /// Implementations should tolerate repeated calls.
    fn cleanup(&mut self) -> ExtensionResult<()> {
        Ok(())
    }
}

/// Run an extension call, converting a panic into
/// [`ExtensionError::Panicked`].
pub fn contain<T>(
    name: &str,
    phase: Phase,
    call: impl FnOnce() -> ExtensionResult<T>,
) -> ExtensionResult<T> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(ExtensionError::Panicked {
            name: name.to_string(),
            phase,
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
