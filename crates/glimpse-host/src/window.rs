//! Preview window control.
//!
//! [`WindowController`] is the only reader of context state. It turns the
//! active context's properties into geometry and window chrome, and pushes
//! them to a [`PreviewWindow`] implementation.

use glimpse_core::{
    ContextProperty, DEFAULT_PREFERRED_SIZE, HostConfig, Rect, ScreenInfo, Size, Theme,
    ViewerContent, ViewerContext,
};
use serde::Serialize;
use tracing::{debug, trace};

/// Title bar appearance requested by an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TitlebarChrome {
    pub overlap: bool,
    pub auto_hide: bool,
    pub blur: bool,
    pub colour: bool,
}

impl TitlebarChrome {
    fn of(ctx: &ViewerContext) -> Self {
        Self {
            overlap: ctx.titlebar_overlap(),
            auto_hide: ctx.titlebar_auto_hide(),
            blur: ctx.titlebar_blur_visibility(),
            colour: ctx.titlebar_colour_visibility(),
        }
    }
}

/// The platform window a preview is shown in.
pub trait PreviewWindow: Send {
    fn is_visible(&self) -> bool;

    /// Current outer bounds.
    fn bounds(&self) -> Rect;

    /// Show the window at `bounds`, or move it there when already visible.
    fn show(&mut self, bounds: Rect);

    fn hide(&mut self);

    fn set_title(&mut self, title: &str);

    fn set_theme(&mut self, theme: Theme);

    fn set_resizable(&mut self, resizable: bool);

    fn set_full_window_dragging(&mut self, enabled: bool);

    fn set_titlebar(&mut self, chrome: TitlebarChrome);

    fn set_busy(&mut self, busy: bool);

    /// Embed the extension's content, or clear it.
    fn set_content(&mut self, content: Option<&ViewerContent>);
}

/// Applies context state to a [`PreviewWindow`].
#[derive(Debug)]
pub struct WindowController<W> {
    window: W,
    screen: ScreenInfo,
    max_screen_ratio: f64,
    min_size: Size,
    keep_user_size: bool,
    /// Size the user resized the window to, if any.
    user_size: Option<Size>,
}

impl<W: PreviewWindow> WindowController<W> {
    pub fn new(window: W, screen: ScreenInfo, config: &HostConfig) -> Self {
        Self {
            window,
            screen,
            max_screen_ratio: config.max_screen_ratio,
            min_size: config.min_window_size,
            keep_user_size: config.keep_user_size,
            user_size: None,
        }
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    pub fn screen(&self) -> ScreenInfo {
        self.screen
    }

    pub fn is_visible(&self) -> bool {
        self.window.is_visible()
    }

    /// Window size for a preferred content size.
    ///
    /// Degenerate sizes fall back to the default, the result is fitted to
    /// the screen and then raised to the minimum window size.
    pub fn fit(&self, preferred: Size) -> Size {
        let preferred = if preferred.is_degenerate() {
            DEFAULT_PREFERRED_SIZE
        } else {
            preferred
        };
        self.screen
            .fit(preferred, self.max_screen_ratio)
            .size
            .max(self.min_size)
    }

    /// Window size for the given context, honouring a user-chosen size.
    pub fn target_size(&self, ctx: &ViewerContext) -> Size {
        match self.user_size {
            Some(size) if self.keep_user_size && ctx.can_resize() => size,
            _ => self.fit(ctx.preferred_size()),
        }
    }

    /// Show the window for a freshly prepared context.
    ///
    /// Applies every property and consumes pending change notifications.
    pub fn show(&mut self, ctx: &mut ViewerContext) {
        ctx.take_changes();

        self.window.set_title(ctx.title());
        self.window.set_theme(ctx.theme());
        self.window.set_resizable(ctx.can_resize());
        self.window.set_full_window_dragging(ctx.full_window_dragging());
        self.window.set_titlebar(TitlebarChrome::of(ctx));
        self.window.set_busy(ctx.is_busy());
        self.window.set_content(ctx.viewer_content());

        let bounds = self.place(self.target_size(ctx));
        debug!(
            x = bounds.x,
            y = bounds.y,
            width = bounds.width,
            height = bounds.height,
            "Showing preview window"
        );
        self.window.show(bounds);
    }

    /// Push pending context changes to the window.
    pub fn apply_changes(&mut self, ctx: &mut ViewerContext) {
        for property in ctx.take_changes() {
            trace!(%property, "Applying context change");
            match property {
                ContextProperty::Title => self.window.set_title(ctx.title()),
                ContextProperty::Theme => self.window.set_theme(ctx.theme()),
                ContextProperty::CanResize => self.window.set_resizable(ctx.can_resize()),
                ContextProperty::FullWindowDragging => {
                    self.window.set_full_window_dragging(ctx.full_window_dragging())
                }
                ContextProperty::TitlebarOverlap
                | ContextProperty::TitlebarAutoHide
                | ContextProperty::TitlebarBlurVisibility
                | ContextProperty::TitlebarColourVisibility => {
                    self.window.set_titlebar(TitlebarChrome::of(ctx))
                }
                ContextProperty::IsBusy => self.window.set_busy(ctx.is_busy()),
                ContextProperty::ViewerContent => self.window.set_content(ctx.viewer_content()),
                ContextProperty::PreferredSize => {
                    if self.window.is_visible() {
                        let bounds = self.place(self.target_size(ctx));
                        self.window.show(bounds);
                    }
                }
            }
        }
    }

    /// Record a resize made by the user.
    pub fn user_resized(&mut self, size: Size) {
        if !size.is_degenerate() {
            self.user_size = Some(size);
        }
    }

    pub fn hide(&mut self) {
        if self.window.is_visible() {
            self.window.set_content(None);
            self.window.hide();
        }
    }

    /// Centre a new window on the work area; keep a visible one's centre.
    fn place(&self, size: Size) -> Rect {
        let area = self.screen.work_area;
        let center = if self.window.is_visible() {
            self.window.bounds().center()
        } else {
            area.center()
        };
        Rect::centered_at(center, size).keep_within(area)
    }
}

/// An in-process window that records what it was told.
///
/// Used by the command line and by tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeadlessWindow {
    pub visible: bool,
    pub bounds: Rect,
    pub title: String,
    pub theme: Theme,
    pub resizable: bool,
    pub full_window_dragging: bool,
    pub titlebar: TitlebarChrome,
    pub busy: bool,
    /// Type label of the embedded content.
    pub content: Option<String>,
    /// Number of times the window went from hidden to visible.
    pub times_shown: usize,
}

impl HeadlessWindow {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreviewWindow for HeadlessWindow {
    fn is_visible(&self) -> bool {
        self.visible
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn show(&mut self, bounds: Rect) {
        if !self.visible {
            self.times_shown += 1;
        }
        self.visible = true;
        self.bounds = bounds;
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    fn set_resizable(&mut self, resizable: bool) {
        self.resizable = resizable;
    }

    fn set_full_window_dragging(&mut self, enabled: bool) {
        self.full_window_dragging = enabled;
    }

    fn set_titlebar(&mut self, chrome: TitlebarChrome) {
        self.titlebar = chrome;
    }

    fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    fn set_content(&mut self, content: Option<&ViewerContent>) {
        self.content = content.map(|c| c.label().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> WindowController<HeadlessWindow> {
        let config = HostConfig::default();
        WindowController::new(HeadlessWindow::new(), ScreenInfo::new(2000.0, 1000.0), &config)
    }

    #[test]
    fn test_fit_respects_ratio_and_minimum() {
        let controller = controller();

        // 0.9 of 2000x1000 is 1800x900
        assert_eq!(controller.fit(Size::new(3600.0, 900.0)), Size::new(1800.0, 450.0));
        assert_eq!(controller.fit(Size::new(400.0, 300.0)), Size::new(400.0, 300.0));
        assert_eq!(controller.fit(Size::new(100.0, 50.0)), Size::new(240.0, 120.0));
        assert_eq!(controller.fit(Size::new(0.0, 300.0)), Size::new(800.0, 600.0));
    }

    #[test]
    fn test_new_window_is_centred() {
        let mut controller = controller();
        let mut ctx = ViewerContext::detached(controller.screen());
        ctx.set_preferred_size(Size::new(400.0, 200.0));
        ctx.set_title("a.txt");

        controller.show(&mut ctx);

        let window = controller.window();
        assert!(window.visible);
        assert_eq!(window.bounds, Rect::new(800.0, 400.0, 400.0, 200.0));
        assert_eq!(window.title, "a.txt");
        assert!(!ctx.has_changes());
    }

    #[test]
    fn test_visible_window_keeps_its_centre_and_stays_on_screen() {
        let mut controller = controller();
        controller.window_mut().show(Rect::new(1700.0, 0.0, 200.0, 100.0));

        let mut ctx = ViewerContext::detached(controller.screen());
        ctx.set_preferred_size(Size::new(600.0, 300.0));
        controller.show(&mut ctx);

        // centre (1800, 50) would push it off the top right corner
        assert_eq!(controller.window().bounds, Rect::new(1400.0, 0.0, 600.0, 300.0));
        assert_eq!(controller.window().times_shown, 1);
    }

    #[test]
    fn test_user_size_is_kept_for_resizable_viewers() {
        let mut controller = controller();
        controller.user_resized(Size::new(1000.0, 700.0));

        let mut ctx = ViewerContext::detached(controller.screen());
        assert_eq!(controller.target_size(&ctx), Size::new(1000.0, 700.0));

        ctx.set_can_resize(false);
        assert_eq!(controller.target_size(&ctx), Size::new(800.0, 600.0));
    }

    #[test]
    fn test_apply_changes_updates_window() {
        let mut controller = controller();
        let mut ctx = ViewerContext::detached(controller.screen());
        controller.show(&mut ctx);

        ctx.set_busy(true);
        ctx.set_theme(Theme::Dark);
        ctx.set_viewer_content(ViewerContent::new(42u32));
        ctx.set_preferred_size(Size::new(500.0, 500.0));
        controller.apply_changes(&mut ctx);

        let window = controller.window();
        assert!(window.busy);
        assert_eq!(window.theme, Theme::Dark);
        assert_eq!(window.content.as_deref(), Some("u32"));
        assert_eq!(window.bounds.size(), Size::new(500.0, 500.0));
        assert!(!ctx.has_changes());
    }
}
