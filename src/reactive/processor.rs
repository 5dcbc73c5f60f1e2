//! Fan-out publishers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ConfigError;
use crate::reactive::executor::Executor;
use crate::reactive::subscriber::{
    Subscriber, Subscription, Transaction, TransactionFailed, TransactionalSubscriber,
};

type Entries<S> = RwLock<Vec<(u64, Arc<S>)>>;

struct Registry<S: ?Sized> {
    entries: Entries<S>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl<S: ?Sized + Send + Sync + 'static> Registry<S> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    fn add(self: &Arc<Self>, subscriber: Arc<S>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().push((id, subscriber));
        let registry = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.entries.write().retain(|(entry, _)| *entry != id);
            }
        })
    }

    fn snapshot(&self) -> Vec<Arc<S>> {
        self.entries.read().iter().map(|(_, s)| s.clone()).collect()
    }

    fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Mark closed and take all subscribers. `None` if already closed.
    fn close(&self) -> Option<Vec<Arc<S>>> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(self.entries.write().drain(..).map(|(_, s)| s).collect())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Publishes each submitted item to every subscriber on the executor.
///
/// Items submitted while nobody is subscribed go to the fallback handler.
pub struct Processor<V> {
    registry: Arc<Registry<dyn Subscriber<V>>>,
    fallback: Arc<RwLock<Option<Arc<dyn Subscriber<V>>>>>,
    executor: Executor,
}

impl<V> Clone for Processor<V> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            fallback: self.fallback.clone(),
            executor: self.executor.clone(),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Processor<V> {
    pub fn new(executor: Executor) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            fallback: Arc::new(RwLock::new(None)),
            executor,
        }
    }

    /// Register `subscriber`. After close it receives [`ConfigError::Closed`]
    /// and an inert subscription is returned.
    pub fn subscribe(&self, subscriber: impl Subscriber<V> + 'static) -> Subscription {
        if self.registry.is_closed() {
            subscriber.on_error(&ConfigError::Closed);
            return Subscription::inert();
        }
        self.registry.add(Arc::new(subscriber))
    }

    pub fn set_fallback(&self, subscriber: impl Subscriber<V> + 'static) {
        *self.fallback.write() = Some(Arc::new(subscriber));
    }

    fn targets(&self) -> Vec<Arc<dyn Subscriber<V>>> {
        let targets = self.registry.snapshot();
        if !targets.is_empty() {
            return targets;
        }
        self.fallback.read().iter().cloned().collect()
    }

    pub fn submit(&self, item: V) {
        if self.registry.is_closed() {
            return;
        }
        let targets = self.targets();
        if targets.is_empty() {
            return;
        }
        self.executor.execute(move || {
            for target in &targets {
                target.submit(&item);
            }
        });
    }

    /// Deliver `error` to every subscriber's `on_error`.
    pub fn inject_error(&self, error: ConfigError) {
        let targets = self.targets();
        if targets.is_empty() {
            return;
        }
        let error = Arc::new(error);
        self.executor.execute(move || {
            for target in &targets {
                target.on_error(&error);
            }
        });
    }

    pub fn has_subscribers(&self) -> bool {
        !self.registry.is_empty()
    }

    pub fn close(&self) {
        let Some(subscribers) = self.registry.close() else {
            return;
        };
        self.executor.execute(move || {
            for subscriber in &subscribers {
                subscriber.on_close();
            }
        });
    }

    /// Close only if nobody is subscribed. Returns whether it closed.
    pub fn close_if_unsubscribed(&self) -> bool {
        if self.has_subscribers() {
            return false;
        }
        self.close();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }
}

/// Delivers items in begin/commit phases. If any subscriber fails to begin,
/// every subscriber is rolled back and none sees the item.
pub struct TransactionalProcessor<V> {
    registry: Arc<Registry<dyn TransactionalSubscriber<V>>>,
    executor: Executor,
}

impl<V> Clone for TransactionalProcessor<V> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            executor: self.executor.clone(),
        }
    }
}

impl<V: Send + Sync + 'static> TransactionalProcessor<V> {
    pub fn new(executor: Executor) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            executor,
        }
    }

    pub fn subscribe(&self, subscriber: impl TransactionalSubscriber<V> + 'static) -> Subscription {
        if self.registry.is_closed() {
            return Subscription::inert();
        }
        self.registry.add(Arc::new(subscriber))
    }

    pub fn submit(&self, item: V) {
        if self.registry.is_closed() {
            return;
        }
        let targets = self.registry.snapshot();
        if targets.is_empty() {
            return;
        }
        self.executor.execute(move || {
            if let Err(e) = run_transaction(&targets, &item) {
                tracing::debug!(error = %e, "Transaction rolled back");
            }
        });
    }

    pub fn has_subscribers(&self) -> bool {
        !self.registry.is_empty()
    }

    pub fn close(&self) {
        let Some(subscribers) = self.registry.close() else {
            return;
        };
        self.executor.execute(move || {
            for subscriber in &subscribers {
                subscriber.on_close();
            }
        });
    }

    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }
}

fn run_transaction<V>(
    targets: &[Arc<dyn TransactionalSubscriber<V>>],
    item: &V,
) -> Result<(), TransactionFailed> {
    let mut failure = None;
    for target in targets {
        if let Err(e) = target.on_transaction(Transaction::Begin(item)) {
            failure = Some(e);
            break;
        }
    }
    let phase = || match failure {
        Some(_) => Transaction::Rollback,
        None => Transaction::Commit,
    };
    for target in targets {
        if let Err(e) = target.on_transaction(phase()) {
            tracing::warn!(error = %e, "Subscriber failed to finish transaction");
        }
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_submit_reaches_all_subscribers() {
        let processor = Processor::new(Executor::Inline);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = seen.clone();
        let second = seen.clone();
        let _a = processor.subscribe(move |v: &u32| first.lock().push(*v));
        let _b = processor.subscribe(move |v: &u32| second.lock().push(*v * 10));
        processor.submit(3);
        assert_eq!(*seen.lock(), vec![3, 30]);
    }

    #[test]
    fn test_fallback_only_without_subscribers() {
        let processor = Processor::new(Executor::Inline);
        let fallback = Arc::new(Mutex::new(0));
        let counter = fallback.clone();
        processor.set_fallback(move |_: &u32| *counter.lock() += 1);
        processor.submit(1);
        let subscription = processor.subscribe(|_: &u32| {});
        processor.submit(2);
        assert_eq!(*fallback.lock(), 1);
        subscription.dispose();
        processor.submit(3);
        assert_eq!(*fallback.lock(), 2);
    }

    #[test]
    fn test_subscribe_after_close_is_inert() {
        struct Recorder(Arc<Mutex<Vec<String>>>);
        impl Subscriber<u32> for Recorder {
            fn submit(&self, _item: &u32) {}
            fn on_error(&self, error: &ConfigError) {
                self.0.lock().push(error.to_string());
            }
        }

        let processor = Processor::<u32>::new(Executor::Inline);
        processor.close();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let subscription = processor.subscribe(Recorder(errors.clone()));
        assert!(subscription.is_disposed());
        assert_eq!(errors.lock().len(), 1);
    }

    #[test]
    fn test_close_if_unsubscribed() {
        let processor = Processor::<u32>::new(Executor::Inline);
        let subscription = processor.subscribe(|_: &u32| {});
        assert!(!processor.close_if_unsubscribed());
        subscription.dispose();
        assert!(processor.close_if_unsubscribed());
        assert!(processor.is_closed());
    }

    #[test]
    fn test_transaction_rolls_back_everyone_on_failure() {
        let processor = TransactionalProcessor::new(Executor::Inline);
        let committed = Arc::new(Mutex::new(Vec::new()));
        let log = committed.clone();
        let staged = Arc::new(Mutex::new(None));
        let _ok = processor.subscribe(move |phase: Transaction<'_, u32>| {
            match phase {
                Transaction::Begin(v) => *staged.lock() = Some(*v),
                Transaction::Commit => log.lock().extend(staged.lock().take()),
                Transaction::Rollback => {
                    staged.lock().take();
                }
            }
            Ok(())
        });
        let _picky = processor.subscribe(|phase: Transaction<'_, u32>| match phase {
            Transaction::Begin(v) if *v > 10 => Err(TransactionFailed::new("too large")),
            _ => Ok(()),
        });

        processor.submit(5);
        processor.submit(50);
        assert_eq!(*committed.lock(), vec![5]);
    }
}
