//! `notify`-backed watch service.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;

use crate::error::{ConfigError, ConfigResult};
use crate::observability::metrics;
use crate::reactive::{Executor, Subscriber, Subscription};
use crate::watch::{WatchEvent, WatchEventKind, Watcher};

const RECV_TIMEOUT: Duration = Duration::from_millis(100);
const BATCH_PAUSE: Duration = Duration::from_millis(20);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

type Listener = Arc<dyn Subscriber<WatchEvent>>;

#[derive(Default)]
struct Registration {
    directory: Vec<(u64, Listener)>,
    files: HashMap<OsString, Vec<(u64, Listener)>>,
}

impl Registration {
    fn is_empty(&self) -> bool {
        self.directory.is_empty() && self.files.values().all(Vec::is_empty)
    }

    fn remove(&mut self, id: u64) {
        self.directory.retain(|(entry, _)| *entry != id);
        for listeners in self.files.values_mut() {
            listeners.retain(|(entry, _)| *entry != id);
        }
        self.files.retain(|_, listeners| !listeners.is_empty());
    }

    fn all(&self) -> Vec<Listener> {
        self.directory
            .iter()
            .chain(self.files.values().flatten())
            .map(|(_, l)| l.clone())
            .collect()
    }

    fn for_file(&self, name: Option<&std::ffi::OsStr>) -> Vec<Listener> {
        let files = name.and_then(|name| self.files.get(name));
        self.directory
            .iter()
            .chain(files.into_iter().flatten())
            .map(|(_, l)| l.clone())
            .collect()
    }
}

struct Inner {
    watcher: Mutex<Option<RecommendedWatcher>>,
    registrations: Mutex<HashMap<PathBuf, Registration>>,
    executor: Executor,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Inner {
    fn deliver(&self, listeners: Vec<Listener>, event: WatchEvent) {
        if listeners.is_empty() {
            return;
        }
        self.executor.execute(move || {
            for listener in &listeners {
                listener.submit(&event);
            }
        });
    }

    fn close_listeners(&self, listeners: Vec<Listener>) {
        if listeners.is_empty() {
            return;
        }
        self.executor.execute(move || {
            for listener in &listeners {
                listener.on_close();
            }
        });
    }

    fn dispatch(&self, batch: Vec<notify::Result<Event>>) {
        let mut seen = HashSet::new();
        for result in batch {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Watch backend reported an error");
                    self.overflow_all();
                    continue;
                }
            };
            if event.need_rescan() {
                self.overflow_all();
                continue;
            }
            for (kind, path) in translate(event) {
                if !seen.insert((kind, path.clone())) {
                    continue;
                }
                metrics::record_watch_event(kind.as_str());
                self.route(WatchEvent::new(kind, path));
            }
        }
    }

    fn route(&self, event: WatchEvent) {
        if event.kind == WatchEventKind::Deleted {
            let removed = self.registrations.lock().remove(&event.path);
            if let Some(registration) = removed {
                tracing::info!(path = %event.path.display(), "Watched directory removed");
                self.unwatch(&event.path);
                self.close_listeners(registration.all());
                return;
            }
        }
        let Some(parent) = event.path.parent() else {
            return;
        };
        let listeners = self
            .registrations
            .lock()
            .get(parent)
            .map(|registration| registration.for_file(event.path.file_name()))
            .unwrap_or_default();
        tracing::debug!(path = %event.path.display(), kind = event.kind.as_str(), listeners = listeners.len(), "Watch event");
        self.deliver(listeners, event);
    }

    fn overflow_all(&self) {
        let targets: Vec<(PathBuf, Vec<Listener>)> = self
            .registrations
            .lock()
            .iter()
            .map(|(dir, registration)| (dir.clone(), registration.all()))
            .collect();
        metrics::record_watch_event(WatchEventKind::Overflow.as_str());
        for (dir, listeners) in targets {
            self.deliver(listeners, WatchEvent::new(WatchEventKind::Overflow, dir));
        }
    }

    fn unwatch(&self, dir: &Path) {
        if let Some(watcher) = self.watcher.lock().as_mut() {
            if let Err(e) = watcher.unwatch(dir) {
                tracing::debug!(path = %dir.display(), error = %e, "Failed to unwatch directory");
            }
        }
    }

    fn register(
        self: &Arc<Self>,
        dir: PathBuf,
        file: Option<OsString>,
        listener: Listener,
    ) -> ConfigResult<Subscription> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConfigError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut registrations = self.registrations.lock();
        if !registrations.contains_key(&dir) {
            let mut watcher = self.watcher.lock();
            let watcher = watcher.as_mut().ok_or(ConfigError::Closed)?;
            watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            tracing::info!(path = %dir.display(), "Watching directory");
        }
        let registration = registrations.entry(dir.clone()).or_default();
        match file {
            Some(name) => registration.files.entry(name).or_default().push((id, listener)),
            None => registration.directory.push((id, listener)),
        }

        let inner: Weak<Inner> = Arc::downgrade(self);
        Ok(Subscription::new(move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut registrations = inner.registrations.lock();
            let now_empty = match registrations.get_mut(&dir) {
                Some(registration) => {
                    registration.remove(id);
                    registration.is_empty()
                }
                None => false,
            };
            if now_empty {
                registrations.remove(&dir);
                drop(registrations);
                inner.unwatch(&dir);
            }
        }))
    }
}

fn translate(event: Event) -> Vec<(WatchEventKind, PathBuf)> {
    let kind = match event.kind {
        EventKind::Create(_) => WatchEventKind::Created,
        EventKind::Remove(_) => WatchEventKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => WatchEventKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => WatchEventKind::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            let mut out = Vec::new();
            if let Some(from) = paths.next() {
                out.push((WatchEventKind::Deleted, from));
            }
            if let Some(to) = paths.next() {
                out.push((WatchEventKind::Created, to));
            }
            return out;
        }
        EventKind::Modify(_) => WatchEventKind::Modified,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };
    event.paths.into_iter().map(|path| (kind, path)).collect()
}

fn run_dispatcher(inner: Weak<Inner>, rx: mpsc::Receiver<notify::Result<Event>>) {
    loop {
        let first = match rx.recv_timeout(RECV_TIMEOUT) {
            Ok(first) => first,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                match inner.upgrade() {
                    Some(inner) if !inner.closed.load(Ordering::Acquire) => continue,
                    _ => break,
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        let mut batch = vec![first];
        batch.extend(rx.try_iter());
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.dispatch(batch);
        drop(inner);
        std::thread::sleep(BATCH_PAUSE);
    }
    tracing::debug!("Watch dispatcher stopped");
}

/// Watches directories with the platform's recommended backend. One
/// dispatcher thread per service delivers events to listeners on the
/// service's executor.
pub struct WatchService {
    inner: Arc<Inner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WatchService {
    pub fn new() -> ConfigResult<Self> {
        Self::with_executor(Executor::default())
    }

    pub fn with_executor(executor: Executor) -> ConfigResult<Self> {
        let (tx, rx) = mpsc::channel();
        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| {
                // Dispatcher gone means the service is closing.
                let _ = tx.send(result);
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;
        let inner = Arc::new(Inner {
            watcher: Mutex::new(Some(watcher)),
            registrations: Mutex::new(HashMap::new()),
            executor,
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        let weak = Arc::downgrade(&inner);
        let thread = std::thread::Builder::new()
            .name("confnode-watch".into())
            .spawn(move || run_dispatcher(weak, rx))
            .map_err(|e| ConfigError::Task(format!("failed to start watch thread: {e}")))?;
        tracing::info!("Watch service started");
        Ok(Self {
            inner,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Number of directories currently watched.
    pub fn watched_directories(&self) -> usize {
        self.inner.registrations.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stop watching, notify every listener and join the dispatcher.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        drop(self.inner.watcher.lock().take());
        let registrations: Vec<Registration> =
            self.inner.registrations.lock().drain().map(|(_, r)| r).collect();
        for registration in registrations {
            self.inner.close_listeners(registration.all());
        }
        if let Some(thread) = self.thread.lock().take() {
            if thread.thread().id() != std::thread::current().id() && thread.join().is_err() {
                tracing::error!("Watch dispatcher panicked");
            }
        }
        tracing::info!("Watch service closed");
    }
}

fn directory_of(path: &Path) -> ConfigResult<PathBuf> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    canonical(dir)
}

fn canonical(dir: &Path) -> ConfigResult<PathBuf> {
    dir.canonicalize().map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

impl Watcher for WatchService {
    fn listen_to_file(
        &self,
        path: &Path,
        listener: Arc<dyn Subscriber<WatchEvent>>,
    ) -> ConfigResult<Subscription> {
        let name = path
            .file_name()
            .ok_or_else(|| ConfigError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
            })?
            .to_os_string();
        self.inner.register(directory_of(path)?, Some(name), listener)
    }

    fn listen_to_directory(
        &self,
        path: &Path,
        listener: Arc<dyn Subscriber<WatchEvent>>,
    ) -> ConfigResult<Subscription> {
        self.inner.register(canonical(path)?, None, listener)
    }
}

impl Drop for WatchService {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for WatchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchService")
            .field("directories", &self.watched_directories())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_translate_kinds() {
        assert_eq!(
            translate(event(EventKind::Create(CreateKind::File), &["/a/b"])),
            vec![(WatchEventKind::Created, PathBuf::from("/a/b"))]
        );
        assert_eq!(
            translate(event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &["/a/b"])),
            vec![(WatchEventKind::Modified, PathBuf::from("/a/b"))]
        );
        assert_eq!(
            translate(event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/a/tmp", "/a/b"]
            )),
            vec![
                (WatchEventKind::Deleted, PathBuf::from("/a/tmp")),
                (WatchEventKind::Created, PathBuf::from("/a/b")),
            ]
        );
        assert!(translate(event(EventKind::Any, &["/a/b"])).is_empty());
    }

    #[test]
    fn test_registration_routing() {
        let mut registration = Registration::default();
        let dir_listener: Listener = Arc::new(|_: &WatchEvent| {});
        let file_listener: Listener = Arc::new(|_: &WatchEvent| {});
        registration.directory.push((0, dir_listener));
        registration
            .files
            .entry(OsString::from("app.toml"))
            .or_default()
            .push((1, file_listener));

        assert_eq!(registration.for_file(Some("app.toml".as_ref())).len(), 2);
        assert_eq!(registration.for_file(Some("other.toml".as_ref())).len(), 1);
        registration.remove(1);
        assert_eq!(registration.for_file(Some("app.toml".as_ref())).len(), 1);
        registration.remove(0);
        assert!(registration.is_empty());
    }

    #[test]
    fn test_dispatch_keeps_distinct_kinds_for_same_file() {
        let inner = Inner {
            watcher: Mutex::new(None),
            registrations: Mutex::new(HashMap::new()),
            executor: Executor::Inline,
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        };
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let listener: Listener = Arc::new(move |event: &WatchEvent| sink.lock().push(event.kind));
        inner
            .registrations
            .lock()
            .entry(PathBuf::from("/a"))
            .or_default()
            .files
            .entry(OsString::from("b"))
            .or_default()
            .push((0, listener));

        let modified = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        inner.dispatch(vec![
            Ok(event(EventKind::Create(CreateKind::File), &["/a/b"])),
            Ok(event(modified, &["/a/b"])),
            Ok(event(modified, &["/a/b"])),
            Ok(event(modified, &["/a/other"])),
        ]);

        assert_eq!(
            *received.lock(),
            vec![WatchEventKind::Created, WatchEventKind::Modified]
        );
    }
}
