//! The host event loop.
//!
//! [`Host`] runs on a single task and owns the [`Coordinator`]. Commands
//! arrive through a [`HostHandle`]; context updates from extension
//! background work arrive on a second channel. Both are drained by one
//! `tokio::select!` loop, so every lifecycle call and every window change
//! happens on the host task.

use std::path::PathBuf;
use std::sync::Arc;

use glimpse_core::{ContextMessage, HostConfig, ScreenInfo, Size};
use glimpse_plugin::ExtensionRegistry;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::{Coordinator, SessionReport, SessionState};
use crate::error::{HostError, HostResult};
use crate::window::PreviewWindow;

/// Reply channel for commands that start sessions.
type Reply = oneshot::Sender<HostResult<bool>>;

/// Commands accepted by the host.
#[derive(Debug)]
pub enum HostEvent {
    Invoke { path: PathBuf, reply: Reply },
    Toggle { path: PathBuf, reply: Reply },
    Switch { path: PathBuf, reply: Reply },
    Close,
    WindowClosed,
    UserResized(Size),
}

/// Single-task owner of the preview window and its sessions.
pub struct Host<W> {
    coordinator: Coordinator<W>,
    events: mpsc::UnboundedReceiver<HostEvent>,
    updates: mpsc::UnboundedReceiver<ContextMessage>,
    reports: watch::Sender<Option<SessionReport>>,
    cancel: CancellationToken,
}

impl<W: PreviewWindow> Host<W> {
    /// Create a host and the handle used to drive it.
    pub fn new(
        registry: Arc<ExtensionRegistry>,
        window: W,
        screen: ScreenInfo,
        config: &HostConfig,
    ) -> (Self, HostHandle) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (update_tx, updates) = mpsc::unbounded_channel();
        let (reports, report_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let host = Self {
            coordinator: Coordinator::new(registry, window, screen, config, update_tx),
            events,
            updates,
            reports,
            cancel: cancel.clone(),
        };
        let handle = HostHandle {
            events: event_tx,
            reports: report_rx,
            cancel,
        };
        (host, handle)
    }

    pub fn coordinator(&self) -> &Coordinator<W> {
        &self.coordinator
    }

    /// Run until cancelled or until every handle is dropped.
    ///
    /// The active session is cleaned up and the window hidden on exit.
    pub async fn run(mut self) {
        info!("Host event loop started");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(message) = self.updates.recv() => {
                    self.coordinator.apply(message);
                }

                event = self.events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
            self.publish();
        }

        self.coordinator.close();
        self.publish();
        info!("Host event loop stopped");
    }

    fn handle(&mut self, event: HostEvent) {
        debug!(?event, "Host event");
        let (result, reply) = match event {
            HostEvent::Invoke { path, reply } => (self.coordinator.invoke(&path), reply),
            HostEvent::Toggle { path, reply } => (self.coordinator.toggle(&path), reply),
            HostEvent::Switch { path, reply } => (self.coordinator.switch(&path), reply),
            HostEvent::Close => {
                self.coordinator.close();
                return;
            }
            HostEvent::WindowClosed => {
                self.coordinator.window_closed();
                return;
            }
            HostEvent::UserResized(size) => {
                self.coordinator.user_resized(size);
                return;
            }
        };

        // a caller woken by the reply must already see the new report
        self.publish();
        respond(reply, result);
    }

    fn publish(&self) {
        let report = self.coordinator.report();
        self.reports.send_if_modified(|current| {
            if *current == report {
                return false;
            }
            *current = report;
            true
        });
    }
}

fn respond(reply: Reply, result: HostResult<bool>) {
    if let Err(e) = &result {
        warn!(error = %e, "Preview failed");
    }
    // the caller may have stopped waiting
    let _ = reply.send(result);
}

/// Cloneable handle for sending commands to a [`Host`].
#[derive(Debug, Clone)]
pub struct HostHandle {
    events: mpsc::UnboundedSender<HostEvent>,
    reports: watch::Receiver<Option<SessionReport>>,
    cancel: CancellationToken,
}

impl HostHandle {
    /// Preview `path`. Resolves once the first viewer has been shown.
    pub async fn invoke(&self, path: impl Into<PathBuf>) -> HostResult<bool> {
        let path = path.into();
        self.request(|reply| HostEvent::Invoke { path, reply }).await
    }

    /// Close the preview of `path`, or preview it.
    pub async fn toggle(&self, path: impl Into<PathBuf>) -> HostResult<bool> {
        let path = path.into();
        self.request(|reply| HostEvent::Toggle { path, reply }).await
    }

    /// Preview `path` if a preview is already visible.
    pub async fn switch(&self, path: impl Into<PathBuf>) -> HostResult<bool> {
        let path = path.into();
        self.request(|reply| HostEvent::Switch { path, reply }).await
    }

    pub fn close(&self) -> HostResult<()> {
        self.send(HostEvent::Close)
    }

    pub fn window_closed(&self) -> HostResult<()> {
        self.send(HostEvent::WindowClosed)
    }

    pub fn user_resized(&self, size: Size) -> HostResult<()> {
        self.send(HostEvent::UserResized(size))
    }

    /// The latest published session report.
    pub fn report(&self) -> Option<SessionReport> {
        self.reports.borrow().clone()
    }

    /// Watch session reports as they change.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionReport>> {
        self.reports.clone()
    }

    /// Wait until the active session is ready.
    ///
    /// Returns `None` when the host stops first. There is no timeout: wrap
    /// the call in `tokio::time::timeout` to bound it.
    pub async fn ready(&self) -> Option<SessionReport> {
        let mut reports = self.reports.clone();
        let report = reports
            .wait_for(|r| r.as_ref().is_some_and(|r| r.state == SessionState::Ready))
            .await
            .ok()?;
        report.clone()
    }

    /// Stop the host loop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn send(&self, event: HostEvent) -> HostResult<()> {
        self.events.send(event).map_err(|_| HostError::ChannelClosed)
    }

    async fn request(&self, event: impl FnOnce(Reply) -> HostEvent) -> HostResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(event(reply))?;
        rx.await.map_err(|_| HostError::ChannelClosed)?
    }
}
