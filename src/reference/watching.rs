//! Reload-on-change listener for watching references.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use crate::error::ConfigError;
use crate::reactive::Subscriber;
use crate::reference::{ErrorPhase, Shared};
use crate::watch::{WatchEvent, WatchEventKind};

/// Reloads the owning reference on file events. Creations and deletions are
/// ignored while the file still matches the reference's own last save.
/// Raw modifications always reload.
pub(crate) struct ReloadListener {
    shared: Weak<Shared>,
    path: PathBuf,
}

impl ReloadListener {
    pub(crate) fn new(shared: &Arc<Shared>, path: PathBuf) -> Self {
        Self {
            shared: Arc::downgrade(shared),
            path,
        }
    }
}

impl Subscriber<WatchEvent> for ReloadListener {
    fn submit(&self, event: &WatchEvent) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if shared.is_closed() {
            return;
        }
        if event.kind != WatchEventKind::Modified && shared.is_own_write() {
            tracing::debug!(path = %self.path.display(), kind = event.kind.as_str(), "Ignoring event caused by save");
            return;
        }
        tracing::info!(path = %self.path.display(), kind = event.kind.as_str(), "Configuration changed, reloading");
        if let Err(e) = shared.load() {
            shared.report(ErrorPhase::Loading, e);
        }
    }

    fn on_close(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        shared.report(
            ErrorPhase::Unknown,
            ConfigError::SourceClosed(self.path.display().to_string()),
        );
        shared.close();
    }
}
