//! Path-to-extension resolution.
//!
//! The resolver walks usable extensions in priority order and asks each one
//! whether it can handle a path. It never opens the file itself: capability
//! queries that sniff content do their own reading.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::extension::{Extension, contain};
use crate::registry::ExtensionRegistry;
use crate::types::Phase;

/// The extension chosen to render a path.
#[derive(Clone)]
pub struct Resolution {
    pub extension: Arc<dyn Extension>,
    pub path: PathBuf,
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("extension", &self.extension.name())
            .field("path", &self.path)
            .finish()
    }
}

/// Picks the extension responsible for a path.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    registry: &'a ExtensionRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a ExtensionRegistry) -> Self {
        Self { registry }
    }

    /// The highest-priority extension that handles `path`.
    pub fn resolve(&self, path: &Path) -> Option<Resolution> {
        self.candidates(path).next().map(|extension| Resolution {
            extension,
            path: path.to_path_buf(),
        })
    }

    /// Every extension that handles `path`, best first.
    ///
    /// Capability queries run lazily as the iterator advances, so callers
    /// that only need the first match pay for one successful query.
    pub fn candidates<'p>(&self, path: &'p Path) -> Candidates<'a, 'p> {
        let empty = path.as_os_str().is_empty();
        Candidates {
            inner: Box::new(self.registry.all_usable()),
            path,
            exhausted: empty,
        }
    }
}

/// Lazy iterator over matching extensions. See [`Resolver::candidates`].
pub struct Candidates<'a, 'p> {
    inner: Box<dyn Iterator<Item = &'a Arc<dyn Extension>> + 'a>,
    path: &'p Path,
    exhausted: bool,
}

impl Iterator for Candidates<'_, '_> {
    type Item = Arc<dyn Extension>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        for extension in self.inner.by_ref() {
            if handles(extension.as_ref(), self.path) {
                return Some(Arc::clone(extension));
            }
        }

        self.exhausted = true;
        None
    }
}

/// Ask one extension, treating errors and panics as "does not handle".
fn handles(extension: &dyn Extension, path: &Path) -> bool {
    let name = extension.name();
    let started = Instant::now();

    let result = contain(name, Phase::CanHandle, || extension.can_handle(path));

    match result {
        Ok(can) => {
            debug!(
                extension = name,
                path = %path.display(),
                can,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Capability query"
            );
            can
        }
        Err(e) => {
            warn!(extension = name, path = %path.display(), error = %e, "Capability query failed, skipping");
            false
        }
    }
}
