//! Filesystem change notification.
//!
//! # Responsibilities
//! - Translate `notify` events into [`WatchEvent`]s
//! - Route events to per-file and per-directory listeners
//!
//! # Data Flow
//! ```text
//! notify backend ─▶ channel ─▶ dispatcher thread (batch, dedupe) ─▶ executor ─▶ listeners
//! ```

mod service;

pub use service::WatchService;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ConfigResult;
use crate::reactive::{Subscriber, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    Created,
    Deleted,
    Modified,
    /// Events may have been lost; listeners should rescan.
    Overflow,
}

impl WatchEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchEventKind::Created => "created",
            WatchEventKind::Deleted => "deleted",
            WatchEventKind::Modified => "modified",
            WatchEventKind::Overflow => "overflow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: WatchEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Delivers filesystem events to listeners. Closing the watcher calls
/// `on_close` on every active listener.
pub trait Watcher: Send + Sync {
    fn listen_to_file(
        &self,
        path: &Path,
        listener: Arc<dyn Subscriber<WatchEvent>>,
    ) -> ConfigResult<Subscription>;

    fn listen_to_directory(
        &self,
        path: &Path,
        listener: Arc<dyn Subscriber<WatchEvent>>,
    ) -> ConfigResult<Subscription>;
}
