//! The last-resort viewer.
//!
//! [`InfoPanel`] handles every path with the lowest possible priority and
//! shows basic file information. Directory totals are computed on a
//! background thread and delivered through a [`ContextHandle`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local};
use jwalk::{Parallelism, WalkDir};
use glimpse_core::{ContextHandle, Size, ViewerContent, ViewerContext};
use glimpse_plugin::{Extension, ExtensionResult, Viewer};
use serde::Serialize;
use tracing::debug;

/// Registered name of the info panel.
pub const INFO_PANEL_NAME: &str = "info-panel";

/// Fixed panel size.
pub const INFO_PANEL_SIZE: Size = Size::new(453.0, 172.0);

/// Content shown by the info panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    /// File name, or the full path for roots.
    pub name: String,
    pub path: PathBuf,
    /// Local modification time, when known.
    pub modified: Option<String>,
    /// Human readable size, `None` while still being computed.
    pub size: Option<String>,
}

/// Totals for a directory tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderTotals {
    /// Directories, including the root itself.
    pub dirs: u64,
    pub files: u64,
    pub bytes: u64,
}

/// Fallback extension: handles everything, shows file information.
#[derive(Debug, Default)]
pub struct InfoPanel;

impl InfoPanel {
    pub fn new() -> Self {
        Self
    }
}

impl Extension for InfoPanel {
    fn name(&self) -> &str {
        INFO_PANEL_NAME
    }

    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn can_handle(&self, _path: &Path) -> ExtensionResult<bool> {
        Ok(true)
    }

    fn create_viewer(&self) -> Box<dyn Viewer> {
        Box::new(InfoViewer::default())
    }
}

#[derive(Debug, Default)]
struct InfoViewer {
    stop: Option<Arc<AtomicBool>>,
}

impl Viewer for InfoViewer {
    fn prepare(&mut self, _path: &Path, ctx: &mut ViewerContext) -> ExtensionResult<()> {
        ctx.set_preferred_size(INFO_PANEL_SIZE);
        ctx.set_title("");
        ctx.set_titlebar_overlap(false);
        ctx.set_titlebar_blur_visibility(false);
        ctx.set_titlebar_colour_visibility(false);
        ctx.set_can_resize(false);
        ctx.set_full_window_dragging(true);
        Ok(())
    }

    fn view(&mut self, path: &Path, ctx: &mut ViewerContext) -> ExtensionResult<()> {
        let mut info = FileInfo {
            name: display_name(path),
            path: path.to_path_buf(),
            modified: modified(path),
            size: None,
        };

        if path.is_file() {
            info.size = fs::metadata(path).ok().map(|m| pretty_size(m.len()));
        }

        let pending = info.size.is_none() && path.is_dir();
        ctx.set_viewer_content(ViewerContent::new(info.clone()));
        ctx.set_busy(false);

        if pending {
            let stop = Arc::new(AtomicBool::new(false));
            self.stop = Some(Arc::clone(&stop));
            spawn_folder_count(info, ctx.handle(), stop)?;
        }
        Ok(())
    }

    fn cleanup(&mut self) -> ExtensionResult<()> {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
        Ok(())
    }
}

fn spawn_folder_count(
    mut info: FileInfo,
    handle: ContextHandle,
    stop: Arc<AtomicBool>,
) -> ExtensionResult<()> {
    std::thread::Builder::new()
        .name("glimpse-info-panel".to_string())
        .spawn(move || {
            let totals = count_folder(&info.path, &stop);
            if stop.load(Ordering::Relaxed) {
                return;
            }

            info.size = Some(folder_summary(totals));
            if let Err(e) = handle.set_content(ViewerContent::new(info)) {
                debug!(error = %e, "Folder totals arrived after the session ended");
            }
        })?;
    Ok(())
}

/// Walk a directory tree, stopping early when `stop` is set.
///
/// Entries that cannot be read are skipped.
pub fn count_folder(root: &Path, stop: &AtomicBool) -> FolderTotals {
    let mut totals = FolderTotals::default();

    let walker = WalkDir::new(root)
        .parallelism(Parallelism::Serial)
        .skip_hidden(false)
        .follow_links(false)
        .min_depth(0);

    for entry_result in walker {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                debug!(error = %err, "Skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_dir() {
            totals.dirs += 1;
        } else {
            totals.files += 1;
            totals.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }

    totals
}

/// "4 KiB (2 folders and 3 files)".
pub fn folder_summary(totals: FolderTotals) -> String {
    let folders = match totals.dirs {
        0 => None,
        1 => Some("1 folder".to_string()),
        n => Some(format!("{n} folders")),
    };
    let files = match totals.files {
        0 => None,
        1 => Some("1 file".to_string()),
        n => Some(format!("{n} files")),
    };

    let size = pretty_size(totals.bytes);
    match (folders, files) {
        (Some(folders), Some(files)) => format!("{size} ({folders} and {files})"),
        (Some(one), None) | (None, Some(one)) => format!("{size} ({one})"),
        (None, None) => size,
    }
}

fn pretty_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn modified(path: &Path) -> Option<String> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let local: DateTime<Local> = modified.into();
    Some(local.format("%Y-%m-%d %H:%M:%S").to_string())
}
