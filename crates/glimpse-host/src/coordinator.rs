//! Preview session lifecycle.
//!
//! The [`Coordinator`] owns the active session and drives its viewer through
//! `prepare`, `view` and `cleanup`:
//!
//! ```text
//! Idle -> Prepared -> Viewing -> Ready -> CleaningUp -> Idle
//! ```
//!
//! A candidate that fails in `prepare` or `view` is cleaned up and the next
//! matching extension is tried, ending with the registry's fallback. Every
//! attempt gets a fresh [`ViewerContext`] with its own [`SessionId`], so
//! updates posted by a superseded viewer's background work are recognised
//! and dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glimpse_core::{
    ContextMessage, HostConfig, ScreenInfo, SessionId, Size, Theme, ViewerContext,
};
use glimpse_plugin::{Extension, ExtensionError, ExtensionRegistry, Phase, Resolver, Viewer, contain};
use serde::Serialize;
use strum::Display;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{HostError, HostResult};
use crate::window::{PreviewWindow, WindowController};

/// Lifecycle state of a preview session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Prepared,
    Viewing,
    Ready,
    CleaningUp,
}

/// Snapshot of the active session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub session: SessionId,
    pub path: PathBuf,
    pub extension: String,
    pub state: SessionState,
    pub title: String,
    pub busy: bool,
    pub theme: Theme,
    pub preferred_size: Size,
    /// Type label of the viewer content, if any.
    pub content: Option<String>,
}

struct Session {
    id: SessionId,
    path: PathBuf,
    extension: Arc<dyn Extension>,
    viewer: Box<dyn Viewer>,
    ctx: ViewerContext,
    state: SessionState,
}

impl Session {
    fn transition(&mut self, to: SessionState) {
        debug!(session = %self.id, from = %self.state, to = %to, "Session state");
        self.state = to;
    }

    fn report(&self) -> SessionReport {
        SessionReport {
            session: self.id,
            path: self.path.clone(),
            extension: self.extension.name().to_string(),
            state: self.state,
            title: self.ctx.title().to_string(),
            busy: self.ctx.is_busy(),
            theme: self.ctx.theme(),
            preferred_size: self.ctx.preferred_size(),
            content: self.ctx.viewer_content().map(|c| c.label().to_string()),
        }
    }

    /// Run the viewer's cleanup. Failures are logged and swallowed.
    fn cleanup(&mut self) {
        self.transition(SessionState::CleaningUp);
        let name = self.extension.name();
        if let Err(e) = contain(name, Phase::Cleanup, || self.viewer.cleanup()) {
            warn!(extension = name, session = %self.id, error = %e, "Viewer cleanup failed");
        }
        self.transition(SessionState::Idle);
    }
}

/// Drives preview sessions for one window.
pub struct Coordinator<W> {
    registry: Arc<ExtensionRegistry>,
    window: WindowController<W>,
    updates: mpsc::UnboundedSender<ContextMessage>,
    last_session: SessionId,
    session: Option<Session>,
}

impl<W: PreviewWindow> Coordinator<W> {
    /// Create a coordinator. Context handles post to `updates`.
    pub fn new(
        registry: Arc<ExtensionRegistry>,
        window: W,
        screen: ScreenInfo,
        config: &HostConfig,
        updates: mpsc::UnboundedSender<ContextMessage>,
    ) -> Self {
        Self {
            registry,
            window: WindowController::new(window, screen, config),
            updates,
            last_session: SessionId::new(0),
            session: None,
        }
    }

    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    pub fn window(&self) -> &W {
        self.window.window()
    }

    pub fn is_visible(&self) -> bool {
        self.window.is_visible()
    }

    /// Id of the active session.
    pub fn active_session(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Path of the active session.
    pub fn current_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    pub fn report(&self) -> Option<SessionReport> {
        self.session.as_ref().map(Session::report)
    }

    /// Preview `path`, superseding the active session.
    ///
    /// Empty and nonexistent paths are ignored, as is the path already
    /// shown. Returns whether a new session started.
    pub fn invoke(&mut self, path: &Path) -> HostResult<bool> {
        if path.as_os_str().is_empty() {
            return Ok(false);
        }
        if self.is_visible() && self.current_path() == Some(path) {
            debug!(path = %path.display(), "Already previewing");
            return Ok(false);
        }
        if !path.exists() {
            info!(path = %path.display(), "Ignoring preview of missing path");
            return Ok(false);
        }

        self.begin(path)?;
        Ok(true)
    }

    /// Close the preview when `path` is shown, otherwise preview it.
    pub fn toggle(&mut self, path: &Path) -> HostResult<bool> {
        if self.is_visible() && self.current_path() == Some(path) {
            self.close();
            return Ok(false);
        }
        self.invoke(path)
    }

    /// Preview `path` only when the window is already visible.
    pub fn switch(&mut self, path: &Path) -> HostResult<bool> {
        if !self.is_visible() {
            return Ok(false);
        }
        self.invoke(path)
    }

    /// End the active session and hide the window.
    pub fn close(&mut self) {
        self.end_session();
        self.window.hide();
    }

    /// The user closed the window.
    pub fn window_closed(&mut self) {
        debug!("Preview window closed by the user");
        self.close();
    }

    /// The user resized the window.
    pub fn user_resized(&mut self, size: Size) {
        self.window.user_resized(size);
    }

    /// Apply an update posted through a context handle.
    ///
    /// Updates for any session other than the active one are dropped.
    /// Returns whether the update was applied.
    pub fn apply(&mut self, message: ContextMessage) -> bool {
        let Some(session) = self.session.as_mut().filter(|s| s.id == message.session) else {
            debug!(session = %message.session, "Dropping update for inactive session");
            return false;
        };

        session.ctx.apply(message.update);
        self.window.apply_changes(&mut session.ctx);

        if session.state == SessionState::Viewing && !session.ctx.is_busy() {
            session.transition(SessionState::Ready);
            info!(session = %session.id, extension = session.extension.name(), "Preview ready");
        }
        true
    }

    /// End the active session without hiding the window.
    ///
    /// Cleanup runs exactly once; the session id is retired.
    pub fn end_session(&mut self) -> Option<SessionReport> {
        let mut session = self.session.take()?;
        session.cleanup();
        Some(session.report())
    }

    fn begin(&mut self, path: &Path) -> HostResult<()> {
        // the previous session is fully cleaned up before anything new runs
        self.end_session();

        let registry = Arc::clone(&self.registry);
        let mut tried: Vec<String> = Vec::new();
        let mut last_error: Option<ExtensionError> = None;

        // candidates are queried lazily, only after the previous one failed
        for extension in Resolver::new(&registry).candidates(path) {
            tried.push(extension.name().to_string());
            match self.attempt(&extension, path) {
                Ok(session) => {
                    self.session = Some(session);
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }

        let fallback = registry
            .fallback()
            .filter(|f| !tried.iter().any(|name| name == f.name()));
        if let Some(extension) = fallback {
            match self.attempt(extension, path) {
                Ok(session) => {
                    self.session = Some(session);
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }

        self.window.hide();
        match last_error {
            Some(e) => Err(HostError::AllCandidatesFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            None => Err(HostError::NoViewer {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Run one candidate through `prepare` and `view`.
    fn attempt(&mut self, extension: &Arc<dyn Extension>, path: &Path) -> Result<Session, ExtensionError> {
        let name = extension.name();
        self.last_session = self.last_session.next();
        let id = self.last_session;

        let ctx = ViewerContext::new(id, self.window.screen(), self.updates.clone());
        let viewer = contain(name, Phase::Prepare, || Ok(extension.create_viewer()))?;
        let mut session = Session {
            id,
            path: path.to_path_buf(),
            extension: Arc::clone(extension),
            viewer,
            ctx,
            state: SessionState::Idle,
        };
        debug!(session = %id, extension = name, path = %path.display(), "Starting session");

        let prepared = contain(name, Phase::Prepare, || {
            session.viewer.prepare(path, &mut session.ctx)
        });
        if let Err(e) = prepared {
            warn!(extension = name, path = %path.display(), error = %e, "Prepare failed, trying next viewer");
            session.cleanup();
            return Err(e);
        }
        session.transition(SessionState::Prepared);

        self.window.show(&mut session.ctx);
        session.ctx.set_busy(true);
        self.window.apply_changes(&mut session.ctx);
        session.transition(SessionState::Viewing);

        let viewed = contain(name, Phase::View, || session.viewer.view(path, &mut session.ctx));
        if let Err(e) = viewed {
            warn!(extension = name, path = %path.display(), error = %e, "View failed, trying next viewer");
            session.cleanup();
            return Err(e);
        }
        self.window.apply_changes(&mut session.ctx);

        if session.ctx.is_busy() {
            info!(session = %id, extension = name, "Preview loading");
        } else {
            session.transition(SessionState::Ready);
            info!(session = %id, extension = name, "Preview ready");
        }
        Ok(session)
    }
}

impl<W> Drop for Coordinator<W> {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.cleanup();
        }
    }
}
