//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use confnode::loader::{ConfigurationLoader, MemoryLoader};
use confnode::reactive::{Subscriber, Subscription};
use confnode::{
    ConfigError, ConfigNode, ConfigResult, ConfigurationOptions, WatchEvent, WatchEventKind,
    Watcher,
};

/// Collects every item it is handed.
pub fn recorder<V: Clone + Send + Sync + 'static>() -> (Arc<Mutex<Vec<V>>>, impl Fn(&V) + Send + Sync) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |item: &V| sink.lock().push(item.clone()))
}

/// A watcher driven by the test instead of the filesystem.
#[derive(Clone, Default)]
pub struct ScriptedWatcher {
    listeners: Arc<Mutex<Vec<(PathBuf, Arc<dyn Subscriber<WatchEvent>>)>>>,
}

impl ScriptedWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Deliver `kind` for `path` to every listener, on the calling thread.
    pub fn fire(&self, kind: WatchEventKind, path: &Path) {
        let listeners: Vec<_> = self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        let event = WatchEvent::new(kind, path);
        for listener in listeners {
            listener.submit(&event);
        }
    }

    /// Close every listener, as a deleted directory would.
    pub fn close_all(&self) {
        let listeners: Vec<_> = self.listeners.lock().drain(..).collect();
        for (_, listener) in listeners {
            listener.on_close();
        }
    }

    fn register(
        &self,
        path: &Path,
        listener: Arc<dyn Subscriber<WatchEvent>>,
    ) -> ConfigResult<Subscription> {
        self.listeners.lock().push((path.to_path_buf(), listener.clone()));
        let listeners = self.listeners.clone();
        Ok(Subscription::new(move || {
            listeners.lock().retain(|(_, l)| !Arc::ptr_eq(l, &listener));
        }))
    }
}

impl Watcher for ScriptedWatcher {
    fn listen_to_file(
        &self,
        path: &Path,
        listener: Arc<dyn Subscriber<WatchEvent>>,
    ) -> ConfigResult<Subscription> {
        self.register(path, listener)
    }

    fn listen_to_directory(
        &self,
        path: &Path,
        listener: Arc<dyn Subscriber<WatchEvent>>,
    ) -> ConfigResult<Subscription> {
        self.register(path, listener)
    }
}

/// In-memory loader that counts loads, can refuse saves, and can echo
/// watch events from inside `save` the way a file write would.
pub struct InstrumentedLoader {
    pub store: MemoryLoader,
    loads: AtomicUsize,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    echo: Mutex<Option<(ScriptedWatcher, PathBuf, Vec<WatchEventKind>)>>,
}

impl InstrumentedLoader {
    pub fn new(store: MemoryLoader) -> Arc<Self> {
        Arc::new(Self {
            store,
            loads: AtomicUsize::new(0),
            fail_loads: AtomicBool::new(false),
            fail_saves: AtomicBool::new(false),
            echo: Mutex::new(None),
        })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Fire `kinds` on `watcher` for `path` during every save.
    pub fn echo_saves(&self, watcher: &ScriptedWatcher, path: &Path, kinds: Vec<WatchEventKind>) {
        *self.echo.lock() = Some((watcher.clone(), path.to_path_buf(), kinds));
    }
}

impl ConfigurationLoader for InstrumentedLoader {
    fn load_with(&self, options: ConfigurationOptions) -> ConfigResult<ConfigNode> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(ConfigError::Unsupported("loading is disabled"));
        }
        self.store.load_with(options)
    }

    fn save(&self, node: &ConfigNode) -> ConfigResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ConfigError::Unsupported("saving is disabled"));
        }
        self.store.save(node)?;
        let echo = self.echo.lock().clone();
        if let Some((watcher, path, kinds)) = echo {
            for kind in kinds {
                watcher.fire(kind, &path);
            }
        }
        Ok(())
    }

    fn default_options(&self) -> ConfigurationOptions {
        self.store.default_options()
    }
}

/// Integer stored at `path` in `node`, if any.
pub fn integer_at(node: &ConfigNode, path: &str) -> Option<i64> {
    let path = confnode::NodePath::parse(path)?;
    node.child(&path)?.scalar()?.as_integer()
}

/// String stored at `path` in `node`, if any.
pub fn string_at(node: &ConfigNode, path: &str) -> Option<String> {
    let path = confnode::NodePath::parse(path)?;
    node.child(&path)?.scalar()?.as_str().map(str::to_string)
}
