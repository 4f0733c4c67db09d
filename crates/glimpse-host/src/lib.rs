//! Preview host for glimpse.
//!
//! This crate drives viewer extensions through their lifecycle and keeps the
//! preview window in sync with the active session:
//!
//! - [`Coordinator`] runs the session state machine and the candidate
//!   fallback chain.
//! - [`WindowController`] is the only consumer of context state. It fits the
//!   preferred size to the screen and forwards chrome changes to a
//!   [`PreviewWindow`].
//! - [`Host`] is the single-task event loop that owns both, fed through a
//!   [`HostHandle`].
//! - [`InfoPanel`] is the built-in last resort.

mod bootstrap;
mod coordinator;
mod error;
mod host;
mod info_panel;
mod window;

pub use bootstrap::load_registry;
pub use coordinator::{Coordinator, SessionReport, SessionState};
pub use error::{HostError, HostResult};
pub use host::{Host, HostEvent, HostHandle};
pub use info_panel::{
    FileInfo, FolderTotals, INFO_PANEL_NAME, INFO_PANEL_SIZE, InfoPanel, count_folder,
    folder_summary,
};
pub use window::{HeadlessWindow, PreviewWindow, TitlebarChrome, WindowController};
