use glimpse_core::{
    ContextError, ContextProperty, ContextUpdate, DEFAULT_PREFERRED_SIZE, HostConfig, Rect,
    ScreenInfo, SessionId, Size, Theme, ViewerContent, ViewerContext, bundled_plugin_dir,
    fit_to_screen,
};
use tokio::sync::mpsc;

#[test]
fn test_session_ids_advance() {
    let first = SessionId::new(1);
    let second = first.next();

    assert!(second > first);
    assert_eq!(second.get(), 2);
    assert_eq!(second.to_string(), "#2");
}

#[test]
fn test_theme_names() {
    assert_eq!("dark".parse::<Theme>().unwrap(), Theme::Dark);
    assert_eq!("LIGHT".parse::<Theme>().unwrap(), Theme::Light);
    assert!("sepia".parse::<Theme>().is_err());
    assert_eq!(Theme::None.to_string(), "none");
    assert_eq!(Theme::default(), Theme::None);
}

#[test]
fn test_fresh_context_defaults() {
    let ctx = ViewerContext::detached(ScreenInfo::default());

    assert_eq!(ctx.title(), "");
    assert_eq!(ctx.preferred_size(), DEFAULT_PREFERRED_SIZE);
    assert!(ctx.can_resize());
    assert!(!ctx.full_window_dragging());
    assert!(!ctx.is_busy());
    assert!(ctx.titlebar_colour_visibility());
    assert!(ctx.viewer_content().is_none());
    assert!(!ctx.has_changes());
}

#[test]
fn test_preferred_size_fit() {
    let mut ctx = ViewerContext::detached(ScreenInfo::new(2000.0, 1000.0));

    let ratio = ctx.set_preferred_size_fit(Size::new(1600.0, 1200.0), 0.5).unwrap();
    assert!((ratio - 500.0 / 1200.0).abs() < 1e-9);
    assert!((ctx.preferred_size().height - 500.0).abs() < 1e-9);

    let err = ctx.set_preferred_size_fit(Size::new(0.0, 10.0), 0.5).unwrap_err();
    assert!(matches!(err, ContextError::InvalidSize { .. }));
    // a rejected size leaves the previous one in place
    assert!((ctx.preferred_size().height - 500.0).abs() < 1e-9);
}

#[test]
fn test_fit_matches_screen_helper() {
    let screen = ScreenInfo::new(2000.0, 1000.0);
    let size = Size::new(1600.0, 1200.0);

    assert_eq!(screen.fit(size, 0.5), fit_to_screen(size, screen.size(), 0.5));
    assert_eq!(screen.work_area, Rect::new(0.0, 0.0, 2000.0, 1000.0));
}

#[test]
fn test_changes_are_reported_in_order() {
    let mut ctx = ViewerContext::detached(ScreenInfo::default());

    ctx.set_title("a.txt");
    ctx.set_title("a.txt");
    ctx.set_theme(Theme::Light);
    ctx.set_full_window_dragging(true);

    assert_eq!(
        ctx.take_changes(),
        vec![
            ContextProperty::Title,
            ContextProperty::Theme,
            ContextProperty::FullWindowDragging,
        ]
    );
}

#[test]
fn test_content_replacement_always_notifies() {
    let mut ctx = ViewerContext::detached(ScreenInfo::default());

    ctx.set_viewer_content(ViewerContent::new(1u8));
    ctx.set_viewer_content(ViewerContent::new(2u8));
    ctx.clear_viewer_content();
    ctx.clear_viewer_content();

    assert_eq!(ctx.take_changes().len(), 3);
}

#[test]
fn test_viewer_content_downcast() {
    let content = ViewerContent::new(vec![1u8, 2, 3]);

    assert!(content.is::<Vec<u8>>());
    assert!(!content.is::<String>());
    assert_eq!(content.downcast_ref::<Vec<u8>>().unwrap().len(), 3);
    assert!(content.label().contains("Vec"));
}

#[test]
fn test_handle_posts_to_session() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let ctx = ViewerContext::new(SessionId::new(9), ScreenInfo::default(), tx);
    let handle = ctx.handle();

    let worker = std::thread::spawn(move || {
        handle.set_title("from worker").unwrap();
        handle.set_busy(false).unwrap();
    });
    worker.join().unwrap();

    let first = rx.try_recv().unwrap();
    assert_eq!(first.session, SessionId::new(9));
    assert!(matches!(first.update, ContextUpdate::Title(ref t) if t == "from worker"));

    let second = rx.try_recv().unwrap();
    assert!(matches!(second.update, ContextUpdate::Busy(false)));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_titlebar_updates_from_handle() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut ctx = ViewerContext::new(SessionId::new(3), ScreenInfo::default(), tx);
    let handle = ctx.handle();

    handle.set_titlebar_overlap(true).unwrap();
    handle.set_titlebar_auto_hide(true).unwrap();
    handle.set_titlebar_blur_visibility(true).unwrap();
    handle.set_titlebar_colour_visibility(false).unwrap();
    // unchanged value, no notification
    handle.post(ContextUpdate::TitlebarOverlap(true)).unwrap();

    while let Ok(message) = rx.try_recv() {
        assert_eq!(message.session, SessionId::new(3));
        ctx.apply(message.update);
    }

    assert!(ctx.titlebar_overlap());
    assert!(ctx.titlebar_auto_hide());
    assert!(ctx.titlebar_blur_visibility());
    assert!(!ctx.titlebar_colour_visibility());
    assert_eq!(
        ctx.take_changes(),
        vec![
            ContextProperty::TitlebarOverlap,
            ContextProperty::TitlebarAutoHide,
            ContextProperty::TitlebarBlurVisibility,
            ContextProperty::TitlebarColourVisibility,
        ]
    );
}

#[test]
fn test_handle_after_host_stops() {
    let ctx = ViewerContext::detached(ScreenInfo::default());
    let handle = ctx.handle();

    assert!(handle.is_closed());
    let err = handle.set_busy(false).unwrap_err();
    assert!(matches!(err, ContextError::Closed { .. }));
}

#[test]
fn test_default_config() {
    let config = HostConfig::default();

    assert_eq!(config.max_screen_ratio, 0.9);
    assert!(config.plugin_dirs[0].starts_with(&config.config_dir));
    assert!(config.plugin_dirs.iter().all(|dir| dir.ends_with("plugins")));
    if let Some(bundled) = bundled_plugin_dir() {
        assert_eq!(config.plugin_dirs.last(), Some(&bundled));
    }
    assert!(config.settings_dir().starts_with(&config.config_dir));
    assert!(config.disabled_extensions.is_empty());
}

#[test]
fn test_config_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let config = HostConfig::default()
        .with_plugin_dir(dir.path().join("plugins"))
        .with_config_dir(dir.path())
        .disable_extension("archive");

    assert_eq!(config.plugin_dirs[0], dir.path().join("plugins"));
    assert_eq!(config.plugin_dirs.len(), HostConfig::default().plugin_dirs.len() + 1);

    let only = config.clone().with_plugin_dirs([dir.path().join("mine")]);
    assert_eq!(only.plugin_dirs, vec![dir.path().join("mine")]);
    assert_eq!(config.settings_dir(), dir.path().join("settings"));
    assert!(config.is_disabled("archive"));
}
