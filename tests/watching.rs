//! Watch-driven reloads.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use confnode::loader::ConfigurationLoader;
use confnode::reactive::{Executor, Transaction};
use confnode::reference::SharedNode;
use confnode::{
    ConfigError, ConfigurationReference, ErrorPhase, MemoryLoader, ReferenceError,
    WatchEventKind, WatchService,
};

mod common;
use common::{integer_at, recorder, InstrumentedLoader, ScriptedWatcher};

fn seeded(port: i32) -> MemoryLoader {
    let loader = MemoryLoader::default();
    let mut node = loader.create_node();
    node.node_mut("port").set_value(port);
    loader.with_node(node)
}

#[test]
fn test_external_change_reloads() {
    let path = Path::new("/config/app.toml");
    let watcher = ScriptedWatcher::new();
    let store = seeded(8080);
    let loader = InstrumentedLoader::new(store.clone());
    let reference = ConfigurationReference::builder(loader.clone())
        .executor(Executor::Inline)
        .build_watching(path, &watcher)
        .unwrap();
    let port = reference.reference_to::<u16>("port").unwrap();
    assert_eq!(watcher.listener_count(), 1);
    assert_eq!(loader.loads(), 1);

    let mut edited = store.create_node();
    edited.node_mut("port").set_value(9090i32);
    store.replace(edited);
    watcher.fire(WatchEventKind::Modified, path);

    assert_eq!(loader.loads(), 2);
    assert_eq!(port.get(), Some(9090));
}

#[test]
fn test_events_caused_by_own_save_are_ignored() {
    let path = Path::new("/config/app.toml");
    let watcher = ScriptedWatcher::new();
    let loader = InstrumentedLoader::new(seeded(8080));
    let reference = ConfigurationReference::builder(loader.clone())
        .executor(Executor::Inline)
        .build_watching(path, &watcher)
        .unwrap();

    loader.echo_saves(&watcher, path, vec![WatchEventKind::Created, WatchEventKind::Deleted]);
    reference.save().unwrap();
    assert_eq!(loader.loads(), 1);

    loader.echo_saves(&watcher, path, vec![WatchEventKind::Modified]);
    reference.save().unwrap();
    assert_eq!(loader.loads(), 2);
}

#[test]
fn test_failed_reload_reports_once_and_keeps_root() {
    let path = Path::new("/config/app.toml");
    let watcher = ScriptedWatcher::new();
    let loader = InstrumentedLoader::new(seeded(8080));
    let reference = ConfigurationReference::builder(loader.clone())
        .executor(Executor::Inline)
        .build_watching(path, &watcher)
        .unwrap();
    let port = reference.reference_to::<u16>("port").unwrap();
    let (errors, sink) = recorder::<ReferenceError>();
    let _subscription = reference.errors().subscribe(sink);

    loader.fail_loads(true);
    watcher.fire(WatchEventKind::Modified, path);

    assert_eq!(loader.loads(), 2);
    assert_eq!(port.get(), Some(8080));
    assert_eq!(integer_at(&reference.snapshot(), "port"), Some(8080));
    assert!(!reference.is_closed());
    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].phase, ErrorPhase::Loading);
    assert!(matches!(*errors[0].error, ConfigError::Unsupported(_)));
}

#[test]
fn test_closed_source_closes_reference() {
    let path = Path::new("/config/app.toml");
    let watcher = ScriptedWatcher::new();
    let reference = ConfigurationReference::builder(seeded(8080))
        .executor(Executor::Inline)
        .build_watching(path, &watcher)
        .unwrap();
    let (errors, sink) = recorder::<ReferenceError>();
    let _subscription = reference.errors().subscribe(sink);

    watcher.close_all();

    assert!(reference.is_closed());
    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].phase, ErrorPhase::Unknown);
    assert!(matches!(*errors[0].error, ConfigError::SourceClosed(_)));
}

#[test]
fn test_closing_reference_stops_listening() {
    let path = Path::new("/config/app.toml");
    let watcher = ScriptedWatcher::new();
    let loader = InstrumentedLoader::new(seeded(8080));
    let reference = ConfigurationReference::builder(loader.clone())
        .executor(Executor::Inline)
        .build_watching(path, &watcher)
        .unwrap();

    reference.close();
    assert_eq!(watcher.listener_count(), 0);
    watcher.fire(WatchEventKind::Modified, path);
    assert_eq!(loader.loads(), 1);
}

fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    check()
}

#[test]
fn test_file_edit_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.toml");
    std::fs::write(&path, "port = 8080\n").unwrap();

    let watcher = WatchService::with_executor(Executor::Inline).unwrap();
    let reference =
        ConfigurationReference::watching(confnode::loader::toml(&path), &path, &watcher).unwrap();
    assert_eq!(integer_at(&reference.snapshot(), "port"), Some(8080));

    std::fs::write(&path, "port = 9090\n").unwrap();
    let reloaded = wait_until(Duration::from_secs(10), || {
        integer_at(&reference.snapshot(), "port") == Some(9090)
    });
    assert!(reloaded, "reference did not pick up the edit");

    reference.close();
    watcher.close();
}

#[test]
fn test_own_save_to_watched_file_does_not_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.toml");
    std::fs::write(&path, "port = 8080\n").unwrap();

    let watcher = WatchService::with_executor(Executor::Inline).unwrap();
    let reference =
        ConfigurationReference::watching(confnode::loader::toml(&path), &path, &watcher).unwrap();
    let reloads = Arc::new(AtomicUsize::new(0));
    let counter = reloads.clone();
    let _subscription = reference
        .updates()
        .subscribe(move |phase: Transaction<'_, SharedNode>| {
            if let Transaction::Begin(_) = phase {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

    reference.set("port", 9091i32).unwrap();
    reference.save().unwrap();
    std::thread::sleep(Duration::from_secs(2));

    assert_eq!(reloads.load(Ordering::SeqCst), 0);
    assert_eq!(integer_at(&reference.snapshot(), "port"), Some(9091));

    std::fs::write(&path, "port = 7070\n").unwrap();
    let reloaded = wait_until(Duration::from_secs(10), || {
        integer_at(&reference.snapshot(), "port") == Some(7070)
    });
    assert!(reloaded, "reference did not pick up the edit after its own save");
    assert!(reloads.load(Ordering::SeqCst) >= 1);

    reference.close();
    watcher.close();
}
