//! The shared viewer context.
//!
//! A [`ViewerContext`] is created by the host for every preview session and
//! handed to the active extension's lifecycle calls. It is the only channel an
//! extension has to publish its title, preferred size, theme, busy state and
//! renderable content.
//!
//! The context itself lives on the host's UI task. Work an extension moves to
//! a background thread reports back through a [`ContextHandle`], which posts
//! [`ContextUpdate`]s to the host's event loop instead of touching the
//! context directly.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::mpsc;

use crate::error::ContextError;
use crate::geometry::{ScreenInfo, Size};

/// Preferred size of a freshly created or reset context.
pub const DEFAULT_PREFERRED_SIZE: Size = Size::new(800.0, 600.0);

/// Identity of a preview session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a session id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id.
    pub fn get(&self) -> u64 {
        self.0
    }

    /// The id following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Colour scheme requested by an extension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Follow the host's own theme.
    #[default]
    None,
    Light,
    Dark,
}

/// Names a context property in a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ContextProperty {
    Title,
    PreferredSize,
    CanResize,
    FullWindowDragging,
    Theme,
    TitlebarOverlap,
    TitlebarAutoHide,
    TitlebarBlurVisibility,
    TitlebarColourVisibility,
    IsBusy,
    ViewerContent,
}

/// Opaque renderable surface produced by an extension.
///
/// The host embeds the content in the preview window without looking inside.
/// Only the window implementation that knows the concrete type downcasts it.
pub struct ViewerContent {
    label: &'static str,
    inner: Box<dyn Any + Send>,
}

impl ViewerContent {
    /// Wrap a renderable value.
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            label: std::any::type_name::<T>(),
            inner: Box::new(value),
        }
    }

    /// Type name of the wrapped value, for diagnostics.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Check the concrete type of the wrapped value.
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrow the wrapped value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for ViewerContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerContent")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// A change an extension wants applied to its context.
#[derive(Debug)]
pub enum ContextUpdate {
    Title(String),
    PreferredSize(Size),
    CanResize(bool),
    FullWindowDragging(bool),
    Theme(Theme),
    TitlebarOverlap(bool),
    TitlebarAutoHide(bool),
    TitlebarBlurVisibility(bool),
    TitlebarColourVisibility(bool),
    Busy(bool),
    Content(Option<ViewerContent>),
}

/// A [`ContextUpdate`] addressed to a session.
#[derive(Debug)]
pub struct ContextMessage {
    pub session: SessionId,
    pub update: ContextUpdate,
}

/// Thread-safe handle used by background work to update a context.
///
/// Updates are queued for the host's event loop. The host drops updates for
/// sessions that are no longer active, so a handle kept past its session's
/// cleanup is harmless.
#[derive(Debug, Clone)]
pub struct ContextHandle {
    session: SessionId,
    tx: mpsc::UnboundedSender<ContextMessage>,
}

impl ContextHandle {
    /// The session this handle writes to.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Whether the host has stopped listening.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue an update for the host.
    pub fn post(&self, update: ContextUpdate) -> Result<(), ContextError> {
        self.tx
            .send(ContextMessage {
                session: self.session,
                update,
            })
            .map_err(|_| ContextError::Closed {
                session: self.session,
            })
    }

    pub fn set_title(&self, title: impl Into<String>) -> Result<(), ContextError> {
        self.post(ContextUpdate::Title(title.into()))
    }

    pub fn set_busy(&self, busy: bool) -> Result<(), ContextError> {
        self.post(ContextUpdate::Busy(busy))
    }

    pub fn set_content(&self, content: ViewerContent) -> Result<(), ContextError> {
        self.post(ContextUpdate::Content(Some(content)))
    }

    pub fn set_preferred_size(&self, size: Size) -> Result<(), ContextError> {
        self.post(ContextUpdate::PreferredSize(size))
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), ContextError> {
        self.post(ContextUpdate::Theme(theme))
    }

    /// Let content draw under the titlebar.
    pub fn set_titlebar_overlap(&self, value: bool) -> Result<(), ContextError> {
        self.post(ContextUpdate::TitlebarOverlap(value))
    }

    pub fn set_titlebar_auto_hide(&self, value: bool) -> Result<(), ContextError> {
        self.post(ContextUpdate::TitlebarAutoHide(value))
    }

    pub fn set_titlebar_blur_visibility(&self, value: bool) -> Result<(), ContextError> {
        self.post(ContextUpdate::TitlebarBlurVisibility(value))
    }

    pub fn set_titlebar_colour_visibility(&self, value: bool) -> Result<(), ContextError> {
        self.post(ContextUpdate::TitlebarColourVisibility(value))
    }
}

/// Per-session state shared between the host and the active extension.
pub struct ViewerContext {
    session: SessionId,
    screen: ScreenInfo,
    updates: mpsc::UnboundedSender<ContextMessage>,

    title: String,
    preferred_size: Size,
    can_resize: bool,
    full_window_dragging: bool,
    theme: Theme,
    titlebar_overlap: bool,
    titlebar_auto_hide: bool,
    titlebar_blur_visibility: bool,
    titlebar_colour_visibility: bool,
    is_busy: bool,
    viewer_content: Option<ViewerContent>,

    /// Change notifications not yet consumed by the window.
    changes: Vec<ContextProperty>,
}

macro_rules! flag_setter {
    ($(#[$meta:meta])* $setter:ident, $field:ident, $property:ident) => {
        $(#[$meta])*
        pub fn $setter(&mut self, value: bool) {
            if self.$field != value {
                self.$field = value;
                self.notify(ContextProperty::$property);
            }
        }
    };
}

impl ViewerContext {
    /// Create a context for `session` whose handles post to `updates`.
    pub fn new(
        session: SessionId,
        screen: ScreenInfo,
        updates: mpsc::UnboundedSender<ContextMessage>,
    ) -> Self {
        Self {
            session,
            screen,
            updates,
            title: String::new(),
            preferred_size: DEFAULT_PREFERRED_SIZE,
            can_resize: true,
            full_window_dragging: false,
            theme: Theme::None,
            titlebar_overlap: false,
            titlebar_auto_hide: false,
            titlebar_blur_visibility: false,
            titlebar_colour_visibility: true,
            is_busy: false,
            viewer_content: None,
            changes: Vec::new(),
        }
    }

    /// Create a context nobody listens to. Handles report
    /// [`ContextError::Closed`]. Useful for exercising extensions in isolation.
    pub fn detached(screen: ScreenInfo) -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self::new(SessionId::new(0), screen, tx)
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn screen(&self) -> ScreenInfo {
        self.screen
    }

    /// A handle for background work belonging to this session.
    pub fn handle(&self) -> ContextHandle {
        ContextHandle {
            session: self.session,
            tx: self.updates.clone(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if self.title != title {
            self.title = title;
            self.notify(ContextProperty::Title);
        }
    }

    pub fn preferred_size(&self) -> Size {
        self.preferred_size
    }

    pub fn set_preferred_size(&mut self, size: Size) {
        if self.preferred_size != size {
            self.preferred_size = size;
            self.notify(ContextProperty::PreferredSize);
        }
    }

    /// Set the preferred size to `size`, shrunk to take at most `max_ratio`
    /// of the screen. Returns the applied ratio.
    pub fn set_preferred_size_fit(&mut self, size: Size, max_ratio: f64) -> Result<f64, ContextError> {
        if size.is_degenerate() {
            return Err(ContextError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }

        let fit = self.screen.fit(size, max_ratio);
        self.set_preferred_size(fit.size);
        Ok(fit.ratio)
    }

    pub fn can_resize(&self) -> bool {
        self.can_resize
    }

    flag_setter!(set_can_resize, can_resize, CanResize);

    pub fn full_window_dragging(&self) -> bool {
        self.full_window_dragging
    }

    flag_setter!(set_full_window_dragging, full_window_dragging, FullWindowDragging);

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if self.theme != theme {
            self.theme = theme;
            self.notify(ContextProperty::Theme);
        }
    }

    pub fn titlebar_overlap(&self) -> bool {
        self.titlebar_overlap
    }

    flag_setter!(
        /// Let the content extend under the title bar.
        set_titlebar_overlap,
        titlebar_overlap,
        TitlebarOverlap
    );

    pub fn titlebar_auto_hide(&self) -> bool {
        self.titlebar_auto_hide
    }

    flag_setter!(set_titlebar_auto_hide, titlebar_auto_hide, TitlebarAutoHide);

    pub fn titlebar_blur_visibility(&self) -> bool {
        self.titlebar_blur_visibility
    }

    flag_setter!(
        set_titlebar_blur_visibility,
        titlebar_blur_visibility,
        TitlebarBlurVisibility
    );

    pub fn titlebar_colour_visibility(&self) -> bool {
        self.titlebar_colour_visibility
    }

    flag_setter!(
        set_titlebar_colour_visibility,
        titlebar_colour_visibility,
        TitlebarColourVisibility
    );

    pub fn is_busy(&self) -> bool {
        self.is_busy
    }

    flag_setter!(
        /// Show or hide the busy indicator. Setting the current value is a no-op.
        set_busy,
        is_busy,
        IsBusy
    );

    pub fn viewer_content(&self) -> Option<&ViewerContent> {
        self.viewer_content.as_ref()
    }

    pub fn set_viewer_content(&mut self, content: ViewerContent) {
        self.viewer_content = Some(content);
        self.notify(ContextProperty::ViewerContent);
    }

    pub fn clear_viewer_content(&mut self) {
        if self.viewer_content.take().is_some() {
            self.notify(ContextProperty::ViewerContent);
        }
    }

    /// Apply an update posted through a [`ContextHandle`].
    pub fn apply(&mut self, update: ContextUpdate) {
        match update {
            ContextUpdate::Title(title) => self.set_title(title),
            ContextUpdate::PreferredSize(size) => self.set_preferred_size(size),
            ContextUpdate::CanResize(value) => self.set_can_resize(value),
            ContextUpdate::FullWindowDragging(value) => self.set_full_window_dragging(value),
            ContextUpdate::Theme(theme) => self.set_theme(theme),
            ContextUpdate::TitlebarOverlap(value) => self.set_titlebar_overlap(value),
            ContextUpdate::TitlebarAutoHide(value) => self.set_titlebar_auto_hide(value),
            ContextUpdate::TitlebarBlurVisibility(value) => self.set_titlebar_blur_visibility(value),
            ContextUpdate::TitlebarColourVisibility(value) => {
                self.set_titlebar_colour_visibility(value)
            }
            ContextUpdate::Busy(value) => self.set_busy(value),
            ContextUpdate::Content(Some(content)) => self.set_viewer_content(content),
            ContextUpdate::Content(None) => self.clear_viewer_content(),
        }
    }

    /// Restore every property to its default.
    pub fn reset(&mut self) {
        self.set_title(String::new());
        // cleared first so no busy indicator flashes for the next extension
        self.set_busy(false);
        self.set_preferred_size(DEFAULT_PREFERRED_SIZE);
        self.set_can_resize(true);
        self.set_full_window_dragging(false);
        self.set_theme(Theme::None);
        self.set_titlebar_overlap(false);
        self.set_titlebar_auto_hide(false);
        self.set_titlebar_blur_visibility(false);
        self.set_titlebar_colour_visibility(true);
        self.clear_viewer_content();
    }

    /// Whether notifications are pending.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Drain pending change notifications, oldest first.
    pub fn take_changes(&mut self) -> Vec<ContextProperty> {
        std::mem::take(&mut self.changes)
    }

    fn notify(&mut self, property: ContextProperty) {
        self.changes.push(property);
    }
}

impl fmt::Debug for ViewerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerContext")
            .field("session", &self.session)
            .field("title", &self.title)
            .field("preferred_size", &self.preferred_size)
            .field("theme", &self.theme)
            .field("is_busy", &self.is_busy)
            .field("viewer_content", &self.viewer_content)
            .finish_non_exhaustive()
    }
}
