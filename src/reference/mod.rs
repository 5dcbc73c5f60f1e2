//! Reloadable handles to a configuration tree.
//!
//! # Responsibilities
//! - Own the current root node of one loader and swap it atomically on reload
//! - Serialize loads and saves against the same loader
//! - Publish reloads to subscribers and failures to an error channel
//! - Hand out typed [`ValueReference`]s for individual paths
//!
//! # Design Decisions
//! - `save_node` assigns the new root before writing it. A failed write
//!   leaves memory and storage out of sync; the error is returned
//! - Updates are delivered on the loading thread so derived values are
//!   current by the time `load` returns
//! - Failures without a direct caller (watch reloads, value derivation) go
//!   to [`ConfigurationReference::errors`]; the fallback handler logs them

mod value;
mod watching;

pub use value::ValueReference;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::error::{ConfigError, ConfigResult, SerializationResult};
use crate::loader::ConfigurationLoader;
use crate::node::{ConfigNode, NodePath};
use crate::observability::metrics;
use crate::reactive::{Executor, Pending, Processor, Subscription, TransactionalProcessor};
use crate::types::Typed;
use crate::watch::Watcher;

/// Shared, lockable handle to a root node.
pub type SharedNode = Arc<RwLock<ConfigNode>>;

/// Which operation produced a [`ReferenceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorPhase {
    Loading,
    Saving,
    Unknown,
    Value,
}

impl ErrorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPhase::Loading => "loading",
            ErrorPhase::Saving => "saving",
            ErrorPhase::Unknown => "unknown",
            ErrorPhase::Value => "value",
        }
    }
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure published on a reference's error channel.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{phase} failed: {error}")]
pub struct ReferenceError {
    pub phase: ErrorPhase,
    pub error: Arc<ConfigError>,
}

pub(crate) struct Shared {
    loader: Box<dyn ConfigurationLoader>,
    loader_lock: ReentrantMutex<()>,
    root: ArcSwap<RwLock<ConfigNode>>,
    updates: TransactionalProcessor<SharedNode>,
    errors: Processor<ReferenceError>,
    executor: Executor,
    save_suppressed: AtomicBool,
    last_write: Mutex<Option<Fingerprint>>,
    closed: AtomicBool,
    watch: Mutex<Option<Subscription>>,
    source: Option<PathBuf>,
}

/// Modification time and length of a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: SystemTime,
    len: u64,
}

impl Fingerprint {
    fn of(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok()?,
            len: metadata.len(),
        })
    }
}

impl Shared {
    pub(crate) fn report(&self, phase: ErrorPhase, error: ConfigError) {
        metrics::record_reference_error(phase.as_str());
        tracing::debug!(phase = %phase, error = %error, "Configuration reference error");
        self.errors.submit(ReferenceError {
            phase,
            error: Arc::new(error),
        });
    }

    fn ensure_open(&self) -> ConfigResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConfigError::Closed);
        }
        Ok(())
    }

    /// Whether the source currently holds what this reference last wrote.
    ///
    /// Watch backends deliver the echo of a save after `save` has returned,
    /// so the flag alone only covers synchronous watchers.
    pub(crate) fn is_own_write(&self) -> bool {
        if self.save_suppressed.load(Ordering::Acquire) {
            return true;
        }
        let Some(written) = *self.last_write.lock() else {
            return false;
        };
        self.source
            .as_deref()
            .and_then(Fingerprint::of)
            .is_some_and(|current| current == written)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn load(&self) -> ConfigResult<()> {
        self.ensure_open()?;
        let _guard = self.loader_lock.lock();
        let result = self.loader.load();
        metrics::record_load(result.is_ok());
        let node = result?;
        let root: SharedNode = Arc::new(RwLock::new(node));
        self.root.store(root.clone());
        self.updates.submit(root);
        tracing::debug!(source = ?self.source, "Configuration loaded");
        Ok(())
    }

    fn write(&self, node: &ConfigNode) -> ConfigResult<()> {
        self.save_suppressed.store(true, Ordering::Release);
        let result = self.loader.save(node);
        if result.is_ok() {
            *self.last_write.lock() = self.source.as_deref().and_then(Fingerprint::of);
        }
        self.save_suppressed.store(false, Ordering::Release);
        metrics::record_save(result.is_ok());
        if let Err(e) = &result {
            tracing::warn!(source = ?self.source, error = %e, "Failed to save configuration");
        }
        result
    }

    fn save(&self) -> ConfigResult<()> {
        self.ensure_open()?;
        let _guard = self.loader_lock.lock();
        let root = self.root.load_full();
        let node = root.read();
        self.write(&node)
    }

    fn save_node(&self, node: ConfigNode) -> ConfigResult<()> {
        self.ensure_open()?;
        let _guard = self.loader_lock.lock();
        let root: SharedNode = Arc::new(RwLock::new(node));
        self.root.store(root.clone());
        self.updates.submit(root.clone());
        let node = root.read();
        self.write(&node)
    }

    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(subscription) = self.watch.lock().take() {
            subscription.dispose();
        }
        self.updates.close();
        self.errors.close();
        tracing::info!(source = ?self.source, "Configuration reference closed");
    }
}

/// Handle to a loaded configuration tree. Clones share the same state.
#[derive(Clone)]
pub struct ConfigurationReference {
    shared: Arc<Shared>,
}

/// Options for creating a [`ConfigurationReference`].
pub struct ReferenceBuilder {
    loader: Box<dyn ConfigurationLoader>,
    executor: Option<Executor>,
}

impl ReferenceBuilder {
    /// Executor for async operations, watch reloads and error delivery.
    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = Some(executor);
        self
    }

    fn open(self, source: Option<PathBuf>) -> ConfigurationReference {
        let executor = self.executor.unwrap_or_default();
        let errors = Processor::new(executor.clone());
        errors.set_fallback(|e: &ReferenceError| {
            tracing::error!(phase = %e.phase, error = %e.error, "Unhandled configuration reference error");
        });
        let root = ConfigNode::new(self.loader.default_options());
        ConfigurationReference {
            shared: Arc::new(Shared {
                loader: self.loader,
                loader_lock: ReentrantMutex::new(()),
                root: ArcSwap::from_pointee(RwLock::new(root)),
                updates: TransactionalProcessor::new(Executor::Inline),
                errors,
                executor,
                save_suppressed: AtomicBool::new(false),
                last_write: Mutex::new(None),
                closed: AtomicBool::new(false),
                watch: Mutex::new(None),
                source,
            }),
        }
    }

    /// Load once. The reference only changes through explicit calls.
    pub fn build(self) -> ConfigResult<ConfigurationReference> {
        let reference = self.open(None);
        reference.load()?;
        tracing::info!("Configuration reference opened");
        Ok(reference)
    }

    /// Load, then reload whenever `path` changes on disk.
    pub fn build_watching(
        self,
        path: impl AsRef<Path>,
        watcher: &dyn Watcher,
    ) -> ConfigResult<ConfigurationReference> {
        let path = path.as_ref().to_path_buf();
        let reference = self.open(Some(path.clone()));
        reference.load()?;
        let listener = watching::ReloadListener::new(&reference.shared, path.clone());
        let subscription = watcher.listen_to_file(&path, Arc::new(listener))?;
        *reference.shared.watch.lock() = Some(subscription);
        tracing::info!(path = %path.display(), "Watching configuration reference opened");
        Ok(reference)
    }
}

impl ConfigurationReference {
    pub fn builder(loader: impl ConfigurationLoader + 'static) -> ReferenceBuilder {
        ReferenceBuilder {
            loader: Box::new(loader),
            executor: None,
        }
    }

    /// A reference that loads once.
    pub fn fixed(loader: impl ConfigurationLoader + 'static) -> ConfigResult<Self> {
        Self::builder(loader).build()
    }

    /// A reference that reloads when `path` changes.
    pub fn watching(
        loader: impl ConfigurationLoader + 'static,
        path: impl AsRef<Path>,
        watcher: &dyn Watcher,
    ) -> ConfigResult<Self> {
        Self::builder(loader).build_watching(path, watcher)
    }

    /// Reload from the loader. On failure the current root is kept.
    pub fn load(&self) -> ConfigResult<()> {
        self.shared.load()
    }

    /// Persist the current root.
    pub fn save(&self) -> ConfigResult<()> {
        self.shared.save()
    }

    /// Replace the root with `node`, then persist it.
    pub fn save_node(&self, node: ConfigNode) -> ConfigResult<()> {
        self.shared.save_node(node)
    }

    pub fn save_async(&self) -> Pending<()> {
        let shared = self.shared.clone();
        Pending::spawn(&self.shared.executor, move || shared.save())
    }

    /// Apply `update` to a copy of the root, then save it as the new root.
    pub fn update_async<F>(&self, update: F) -> Pending<()>
    where
        F: FnOnce(&mut ConfigNode) -> ConfigResult<()> + Send + 'static,
    {
        let shared = self.shared.clone();
        Pending::spawn(&self.shared.executor, move || {
            let _guard = shared.loader_lock.lock();
            let mut node = shared.root.load_full().read().clone();
            update(&mut node)?;
            shared.save_node(node)
        })
    }

    /// The live root. A reload replaces it; this handle keeps the old tree.
    pub fn node(&self) -> SharedNode {
        self.shared.root.load_full()
    }

    /// Deep copy of the current root.
    pub fn snapshot(&self) -> ConfigNode {
        self.node().read().clone()
    }

    /// Copy of the node at `path`, virtual when absent.
    pub fn get(&self, path: impl Into<NodePath>) -> ConfigNode {
        let path = path.into();
        let root = self.node();
        let root = root.read();
        match root.child(&path) {
            Some(node) => node.clone(),
            None => root.new_root().node_mut(&path).clone(),
        }
    }

    /// Write `value` at `path` in the live root without saving.
    pub fn set<T: Typed>(&self, path: impl Into<NodePath>, value: T) -> SerializationResult<()> {
        let path = path.into();
        self.node().write().node_mut(&path).set(value)
    }

    pub fn reference_to<T: Typed + Clone>(
        &self,
        path: impl Into<NodePath>,
    ) -> SerializationResult<ValueReference<T>> {
        ValueReference::open(self.clone(), path.into(), None)
    }

    /// Like [`reference_to`](Self::reference_to), using `default` while the
    /// node is virtual.
    pub fn reference_to_or<T: Typed + Clone>(
        &self,
        path: impl Into<NodePath>,
        default: T,
    ) -> SerializationResult<ValueReference<T>> {
        ValueReference::open(self.clone(), path.into(), Some(default))
    }

    /// Reloads and replacements, delivered as begin/commit transactions.
    pub fn updates(&self) -> &TransactionalProcessor<SharedNode> {
        &self.shared.updates
    }

    pub fn errors(&self) -> &Processor<ReferenceError> {
        &self.shared.errors
    }

    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn executor(&self) -> &Executor {
        &self.shared.executor
    }
}

impl fmt::Debug for ConfigurationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationReference")
            .field("source", &self.shared.source)
            .field("closed", &self.is_closed())
            .finish()
    }
}
