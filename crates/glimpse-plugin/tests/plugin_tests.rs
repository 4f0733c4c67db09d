use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glimpse_core::{ScreenInfo, ViewerContext};
use glimpse_plugin::{
    Extension, ExtensionError, ExtensionRegistry, ExtensionResult, ExtensionStatus, Resolver,
    ScriptContent, SettingsStore, Viewer,
};
use tempfile::TempDir;

struct Stub {
    name: &'static str,
    priority: i32,
    handles: bool,
    init_fails: bool,
    can_handle_panics: bool,
    queries: Arc<AtomicUsize>,
}

impl Stub {
    fn new(name: &'static str, priority: i32, handles: bool) -> Self {
        Self {
            name,
            priority,
            handles,
            init_fails: false,
            can_handle_panics: false,
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct NoopViewer;

impl Viewer for NoopViewer {
    fn prepare(&mut self, _path: &Path, _ctx: &mut ViewerContext) -> ExtensionResult<()> {
        Ok(())
    }

    fn view(&mut self, _path: &Path, ctx: &mut ViewerContext) -> ExtensionResult<()> {
        ctx.set_busy(false);
        Ok(())
    }
}

impl Extension for Stub {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn init(&mut self) -> ExtensionResult<()> {
        if self.init_fails {
            return Err(ExtensionError::other("missing codec"));
        }
        Ok(())
    }

    fn can_handle(&self, _path: &Path) -> ExtensionResult<bool> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.can_handle_panics {
            panic!("bad header");
        }
        Ok(self.handles)
    }

    fn create_viewer(&self) -> Box<dyn Viewer> {
        Box::new(NoopViewer)
    }
}

fn names(registry: &ExtensionRegistry) -> Vec<String> {
    registry
        .all_usable()
        .map(|e| e.name().to_string())
        .collect()
}

#[test]
fn test_failed_init_is_excluded() {
    let mut registry = ExtensionRegistry::new();
    registry.register(Box::new(Stub::new("text", 0, true)));
    registry.register(Box::new(Stub {
        init_fails: true,
        ..Stub::new("video", 100, true)
    }));

    assert_eq!(names(&registry), vec!["text"]);
    assert!(matches!(registry.status("video"), Some(ExtensionStatus::Failed(_))));
    assert_eq!(registry.len(), 2);

    let resolution = Resolver::new(&registry).resolve(Path::new("/tmp/a.mp4")).unwrap();
    assert_eq!(resolution.extension.name(), "text");
}

#[test]
fn test_resolves_highest_matching_priority() {
    let mut registry = ExtensionRegistry::new();
    registry.register(Box::new(Stub::new("high", 10, false)));
    registry.register(Box::new(Stub::new("low", -1, true)));
    registry.register(Box::new(Stub::new("mid", 5, true)));

    assert_eq!(names(&registry), vec!["high", "mid", "low"]);

    let resolver = Resolver::new(&registry);
    let path = Path::new("/tmp/report.pdf");
    for _ in 0..3 {
        assert_eq!(resolver.resolve(path).unwrap().extension.name(), "mid");
    }

    let candidates: Vec<_> = resolver.candidates(path).map(|e| e.name().to_string()).collect();
    assert_eq!(candidates, vec!["mid", "low"]);
}

#[test]
fn test_ties_keep_registration_order() {
    let mut registry = ExtensionRegistry::new();
    registry.register(Box::new(Stub::new("first", 0, true)));
    registry.register(Box::new(Stub::new("second", 0, true)));
    registry.register(Box::new(Stub::new("top", 1, true)));

    assert_eq!(names(&registry), vec!["top", "first", "second"]);
}

#[test]
fn test_register_is_idempotent() {
    let mut registry = ExtensionRegistry::new();
    assert!(registry.register(Box::new(Stub::new("text", 0, true))));
    assert!(!registry.register(Box::new(Stub::new("text", 50, false))));

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.extensions()[0].priority, 0);
}

#[test]
fn test_disabled_extensions_are_not_used() {
    let mut registry = ExtensionRegistry::with_disabled(["image"]);
    registry.register(Box::new(Stub::new("image", 10, true)));
    registry.register(Box::new(Stub::new("text", 0, true)));

    assert_eq!(registry.status("image"), Some(&ExtensionStatus::Disabled));
    assert!(registry.get("image").is_none());
    assert_eq!(names(&registry), vec!["text"]);
}

#[test]
fn test_panicking_can_handle_counts_as_false() {
    let mut registry = ExtensionRegistry::new();
    registry.register(Box::new(Stub {
        can_handle_panics: true,
        ..Stub::new("fragile", 10, true)
    }));
    registry.register(Box::new(Stub::new("sturdy", 0, true)));

    let resolution = Resolver::new(&registry).resolve(Path::new("/tmp/x.bin")).unwrap();
    assert_eq!(resolution.extension.name(), "sturdy");
}

#[test]
fn test_empty_path_resolves_to_nothing() {
    let stub = Stub::new("any", 0, true);
    let queries = Arc::clone(&stub.queries);

    let mut registry = ExtensionRegistry::new();
    registry.register(Box::new(stub));

    assert!(Resolver::new(&registry).resolve(Path::new("")).is_none());
    assert_eq!(queries.load(Ordering::SeqCst), 0);
}

#[test]
fn test_candidates_are_lazy() {
    let first = Stub::new("first", 2, true);
    let second = Stub::new("second", 1, true);
    let second_queries = Arc::clone(&second.queries);

    let mut registry = ExtensionRegistry::new();
    registry.register(Box::new(first));
    registry.register(Box::new(second));

    let mut candidates = Resolver::new(&registry).candidates(Path::new("/tmp/a"));
    assert_eq!(candidates.next().unwrap().name(), "first");
    assert_eq!(second_queries.load(Ordering::SeqCst), 0);

    assert_eq!(candidates.next().unwrap().name(), "second");
    assert!(candidates.next().is_none());
}

fn write_plugin(root: &Path, dir: &str, manifest: &str, script: &str) {
    let dir = root.join(dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("plugin.toml"), manifest).unwrap();
    fs::write(dir.join("main.lua"), script).unwrap();
}

const MARKDOWN: &str = r#"
local M = {}

function M:can_handle(path)
  local ext = fs.extension(path)
  return ext == "md" or ext == "markdown"
end

function M:prepare(path, ctx)
  ctx.title = "Markdown"
  ctx.width = 700
  ctx.height = 500
  ctx.theme = glimpse.setting("theme", "light")
end

function M:view(path, ctx)
  ctx.content = { kind = "markdown", header = fs.read_header(path, 7) }
  ctx.busy = false
end

return M
"#;

#[test]
fn test_discovers_lua_extensions_and_skips_broken_ones() {
    let temp = TempDir::new().unwrap();
    let plugins = temp.path().join("plugins");

    write_plugin(&plugins, "markdown", "name = \"markdown\"\npriority = 20\n", MARKDOWN);
    write_plugin(&plugins, "broken-toml", "name = ", "return {}");
    write_plugin(&plugins, "broken-script", "name = \"oops\"\n", "return {");
    write_plugin(&plugins, "no-table", "name = \"scalar\"\n", "return 42");
    fs::create_dir_all(plugins.join("not-a-plugin")).unwrap();

    let settings = Arc::new(SettingsStore::new(temp.path().join("settings")));
    settings.set("theme", "dark", "markdown").unwrap();

    let mut registry = ExtensionRegistry::new();
    assert_eq!(registry.discover(&plugins, &settings), 1);
    assert_eq!(names(&registry), vec!["markdown"]);

    let doc = temp.path().join("README.md");
    fs::write(&doc, "# Title\n\nBody").unwrap();

    let resolver = Resolver::new(&registry);
    assert!(resolver.resolve(&temp.path().join("notes.txt")).is_none());
    let resolution = resolver.resolve(&doc).unwrap();
    assert_eq!(resolution.extension.name(), "markdown");
    assert_eq!(resolution.extension.priority(), 20);

    let mut ctx = ViewerContext::detached(ScreenInfo::default());
    let mut viewer = resolution.extension.create_viewer();
    viewer.prepare(&doc, &mut ctx).unwrap();
    assert_eq!(ctx.title(), "Markdown");
    assert_eq!(ctx.theme().to_string(), "dark");

    ctx.set_busy(true);
    viewer.view(&doc, &mut ctx).unwrap();
    assert!(!ctx.is_busy());

    let content = ctx.viewer_content().unwrap().downcast_ref::<ScriptContent>().unwrap();
    let header = content.value.as_object().and_then(|o| o.get("header")).and_then(|v| v.as_str());
    assert_eq!(header, Some("# Title"));

    viewer.cleanup().unwrap();
    viewer.cleanup().unwrap();
}

#[test]
fn test_lua_errors_surface_as_extension_errors() {
    let temp = TempDir::new().unwrap();
    write_plugin(
        temp.path(),
        "faulty",
        "name = \"faulty\"\n",
        r#"
        local M = {}
        function M:can_handle(path) return true end
        function M:prepare(path, ctx) error("cannot parse") end
        return M
        "#,
    );

    let settings = Arc::new(SettingsStore::new(temp.path().join("settings")));
    let mut registry = ExtensionRegistry::new();
    registry.discover(temp.path(), &settings);

    let extension = registry.get("faulty").unwrap();
    let mut viewer = extension.create_viewer();
    let mut ctx = ViewerContext::detached(ScreenInfo::default());

    let err = viewer.prepare(Path::new("/tmp/x"), &mut ctx).unwrap_err();
    assert!(matches!(err, ExtensionError::Script { .. }));
    assert!(err.to_string().contains("cannot parse"));
}

#[test]
fn test_lua_init_failure_excludes_extension() {
    let temp = TempDir::new().unwrap();
    write_plugin(
        temp.path(),
        "needs-tool",
        "name = \"needs-tool\"\n",
        r#"
        local M = {}
        function M:init() error("tool not installed") end
        function M:can_handle(path) return true end
        return M
        "#,
    );

    let settings = Arc::new(SettingsStore::new(temp.path().join("settings")));
    let mut registry = ExtensionRegistry::new();
    assert_eq!(registry.discover(temp.path(), &settings), 1);

    assert!(registry.all_usable().next().is_none());
    assert!(matches!(registry.status("needs-tool"), Some(ExtensionStatus::Failed(_))));
}

#[test]
fn test_session_state_does_not_leak_between_viewers() {
    let temp = TempDir::new().unwrap();
    write_plugin(
        temp.path(),
        "counter",
        "name = \"counter\"\n",
        r#"
        local M = {}
        function M:can_handle(path) return true end
        function M:prepare(path, ctx)
          self.seen = (self.seen or 0) + 1
          ctx.title = tostring(self.seen)
        end
        return M
        "#,
    );

    let settings = Arc::new(SettingsStore::new(temp.path().join("settings")));
    let mut registry = ExtensionRegistry::new();
    registry.discover(temp.path(), &settings);
    let extension = registry.get("counter").unwrap();

    for _ in 0..2 {
        let mut ctx = ViewerContext::detached(ScreenInfo::default());
        let mut viewer = extension.create_viewer();
        viewer.prepare(Path::new("/tmp/x"), &mut ctx).unwrap();
        assert_eq!(ctx.title(), "1");
        viewer.cleanup().unwrap();
    }
}

#[test]
fn test_settings_round_trip_per_namespace() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("settings");

    let store = SettingsStore::new(&dir);
    store.set("zoom", 150i64, "image").unwrap();
    store.set("zoom", 90i64, "pdf").unwrap();
    store.set("wrap", true, "text").unwrap();

    let reopened = SettingsStore::new(&dir);
    assert_eq!(reopened.get("zoom", 100i64, "image"), 150);
    assert_eq!(reopened.get("zoom", 100i64, "pdf"), 90);
    assert!(reopened.get("wrap", false, "text"));
    assert_eq!(reopened.get("zoom", 100i64, "text"), 100);

    let scoped = reopened.scoped("image");
    assert_eq!(scoped.get("zoom", 0i64), 150);
}

#[test]
fn test_corrupt_settings_file_yields_default() {
    let temp = TempDir::new().unwrap();
    let store = SettingsStore::new(temp.path());
    fs::write(store.path_for("image"), "zoom = = 3\n[[[").unwrap();

    assert_eq!(store.get("zoom", 100i64, "image"), 100);

    // the next write replaces the corrupt file
    store.set("zoom", 120i64, "image").unwrap();
    let reopened = SettingsStore::new(temp.path());
    assert_eq!(reopened.get("zoom", 100i64, "image"), 120);
}

#[test]
fn test_bundled_plugins_load() {
    let plugins = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../plugins");
    let temp = TempDir::new().unwrap();
    let settings = Arc::new(SettingsStore::new(temp.path().join("settings")));
    settings.set("preview_bytes", 5, "plaintext").unwrap();

    let mut registry = ExtensionRegistry::new();
    assert_eq!(registry.discover(&plugins, &settings), 2);
    assert_eq!(names(&registry), vec!["markdown", "plaintext"]);

    let notes = temp.path().join("notes.txt");
    fs::write(&notes, "hello world").unwrap();
    let doc = temp.path().join("guide.md");
    fs::write(&doc, "# Intro\ntext\n## Usage\n").unwrap();

    let resolver = Resolver::new(&registry);
    assert!(resolver.resolve(temp.path()).is_none());

    let text = resolver.resolve(&notes).unwrap();
    assert_eq!(text.extension.name(), "plaintext");
    let mut ctx = ViewerContext::detached(ScreenInfo::default());
    let mut viewer = text.extension.create_viewer();
    viewer.prepare(&notes, &mut ctx).unwrap();
    ctx.set_busy(true);
    viewer.view(&notes, &mut ctx).unwrap();
    assert_eq!(ctx.title(), "notes.txt");
    assert!(!ctx.is_busy());
    let content = ctx.viewer_content().unwrap().downcast_ref::<ScriptContent>().unwrap();
    let shown = content.value.as_object().and_then(|o| o.get("text")).and_then(|v| v.as_str());
    assert_eq!(shown, Some("hello"));
    viewer.cleanup().unwrap();

    let markdown = resolver.resolve(&doc).unwrap();
    assert_eq!(markdown.extension.name(), "markdown");
    let mut ctx = ViewerContext::detached(ScreenInfo::default());
    let mut viewer = markdown.extension.create_viewer();
    viewer.prepare(&doc, &mut ctx).unwrap();
    assert_eq!(ctx.preferred_size().width, 900.0);
    viewer.view(&doc, &mut ctx).unwrap();
    let content = ctx.viewer_content().unwrap().downcast_ref::<ScriptContent>().unwrap();
    let headings = content
        .value
        .as_object()
        .and_then(|o| o.get("headings"))
        .and_then(|v| v.as_array())
        .unwrap();
    assert_eq!(headings.len(), 2);
    viewer.cleanup().unwrap();
}
