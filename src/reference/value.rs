//! Typed, cached view of one path in a reference.

use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::error::{ConfigError, ConfigResult, SerializationResult};
use crate::node::{ConfigNode, NodePath};
use crate::reactive::{
    Pending, Processor, Subscriber, Subscription, Transaction, TransactionFailed,
};
use crate::reference::{ConfigurationReference, ErrorPhase, Shared, SharedNode};
use crate::types::Typed;

struct ValueState<T> {
    path: NodePath,
    default: Option<T>,
    cache: ArcSwap<Option<T>>,
    staged: Mutex<Option<Option<T>>>,
    changes: Processor<Option<T>>,
    owner: Weak<Shared>,
}

impl<T: Typed + Clone> ValueState<T> {
    fn derive(&self, root: &mut ConfigNode) -> SerializationResult<Option<T>> {
        let target = root.node_mut(&self.path);
        match &self.default {
            Some(default) if target.is_virtual() => {
                if target.options().copy_defaults() {
                    target.set(default.clone())?;
                }
                Ok(Some(default.clone()))
            }
            _ => target.get::<T>(),
        }
    }

    fn publish(&self, value: Option<T>) {
        self.cache.store(Arc::new(value.clone()));
        self.changes.submit(value);
    }

    fn on_update(&self, phase: Transaction<'_, SharedNode>) -> Result<(), TransactionFailed> {
        match phase {
            Transaction::Begin(root) => {
                let derived = self.derive(&mut root.write());
                match derived {
                    Ok(value) => {
                        *self.staged.lock() = Some(value);
                        Ok(())
                    }
                    Err(e) => {
                        let failure = TransactionFailed::new(&e);
                        if let Some(owner) = self.owner.upgrade() {
                            owner.report(ErrorPhase::Value, ConfigError::Serialization(e));
                        }
                        Err(failure)
                    }
                }
            }
            Transaction::Commit => {
                if let Some(value) = self.staged.lock().take() {
                    self.publish(value);
                }
                Ok(())
            }
            Transaction::Rollback => {
                self.staged.lock().take();
                Ok(())
            }
        }
    }
}

/// Stops update delivery once the last clone of a value reference drops.
struct Registration(Subscription);

impl Drop for Registration {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

/// Cached, typed value at one path of a [`ConfigurationReference`].
///
/// The cache is refreshed on every reload of the owning reference. A reload
/// whose value fails to deserialize keeps the previous value and reports the
/// failure on the reference's error channel.
pub struct ValueReference<T> {
    reference: ConfigurationReference,
    state: Arc<ValueState<T>>,
    _registration: Arc<Registration>,
}

impl<T> Clone for ValueReference<T> {
    fn clone(&self) -> Self {
        Self {
            reference: self.reference.clone(),
            state: self.state.clone(),
            _registration: self._registration.clone(),
        }
    }
}

impl<T: Typed + Clone> ValueReference<T> {
    pub(crate) fn open(
        reference: ConfigurationReference,
        path: NodePath,
        default: Option<T>,
    ) -> SerializationResult<Self> {
        let state = Arc::new(ValueState {
            path,
            default,
            cache: ArcSwap::from_pointee(None),
            staged: Mutex::new(None),
            changes: Processor::new(reference.executor().clone()),
            owner: Arc::downgrade(reference.shared()),
        });
        let initial = state.derive(&mut reference.node().write())?;
        state.cache.store(Arc::new(initial));

        let subscriber = state.clone();
        let subscription = reference
            .updates()
            .subscribe(move |phase: Transaction<'_, SharedNode>| subscriber.on_update(phase));
        Ok(Self {
            reference,
            state,
            _registration: Arc::new(Registration(subscription)),
        })
    }

    /// The last successfully derived value.
    pub fn get(&self) -> Option<T> {
        (**self.state.cache.load()).clone()
    }

    pub fn path(&self) -> &NodePath {
        &self.state.path
    }

    /// Write `value` into the live root and the cache, without saving.
    pub fn set(&self, value: T) -> SerializationResult<()> {
        self.reference
            .node()
            .write()
            .node_mut(&self.state.path)
            .set(value.clone())?;
        self.state.publish(Some(value));
        Ok(())
    }

    pub fn set_and_save(&self, value: T) -> ConfigResult<()> {
        self.set(value)?;
        self.reference.save()
    }

    pub fn set_and_save_async(&self, value: T) -> Pending<()> {
        let this = self.clone();
        Pending::spawn(self.reference.executor(), move || this.set_and_save(value))
    }

    /// Replace the value with `update(current)`, without saving.
    pub fn update<F>(&self, update: F) -> SerializationResult<()>
    where
        F: FnOnce(Option<T>) -> T,
    {
        self.set(update(self.get()))
    }

    /// Apply `update` and save, on the reference's executor.
    pub fn update_async<F>(&self, update: F) -> Pending<()>
    where
        F: FnOnce(Option<T>) -> T + Send + 'static,
    {
        let this = self.clone();
        Pending::spawn(self.reference.executor(), move || {
            this.update(update)?;
            this.reference.save()
        })
    }

    /// Notified with every new cached value.
    pub fn subscribe(&self, subscriber: impl Subscriber<Option<T>> + 'static) -> Subscription {
        self.state.changes.subscribe(subscriber)
    }

    /// Copy of the node backing this value.
    pub fn node(&self) -> ConfigNode {
        self.reference.get(&self.state.path)
    }
}

impl<T: Typed + Clone + std::fmt::Debug> std::fmt::Debug for ValueReference<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueReference")
            .field("path", &self.state.path.to_string())
            .field("value", &self.get())
            .finish()
    }
}
