//! Subscriber traits.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::error::ConfigError;

/// Receives items from a [`Processor`](crate::reactive::Processor).
pub trait Subscriber<V>: Send + Sync {
    fn submit(&self, item: &V);

    fn on_error(&self, error: &ConfigError) {
        tracing::debug!(error = %error, "Unhandled subscriber error");
    }

    fn on_close(&self) {}
}

impl<V, F> Subscriber<V> for F
where
    F: Fn(&V) + Send + Sync,
{
    fn submit(&self, item: &V) {
        self(item)
    }
}

/// Phase of a transactional delivery.
#[derive(Debug)]
pub enum Transaction<'a, V> {
    /// Stage `V`. Returning an error rolls back every subscriber.
    Begin(&'a V),
    /// Make the staged value visible.
    Commit,
    /// Discard the staged value.
    Rollback,
}

/// A subscriber rejected a staged value.
#[derive(Debug, Clone, Error)]
#[error("transaction failed: {0}")]
pub struct TransactionFailed(pub String);

impl TransactionFailed {
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self(reason.to_string())
    }
}

/// Receives items in begin/commit/rollback phases.
pub trait TransactionalSubscriber<V>: Send + Sync {
    fn on_transaction(&self, phase: Transaction<'_, V>) -> Result<(), TransactionFailed>;

    fn on_close(&self) {}
}

impl<V, F> TransactionalSubscriber<V> for F
where
    F: Fn(Transaction<'_, V>) -> Result<(), TransactionFailed> + Send + Sync,
{
    fn on_transaction(&self, phase: Transaction<'_, V>) -> Result<(), TransactionFailed> {
        self(phase)
    }
}

/// Handle to a registration. Dropping it keeps the registration alive.
pub struct Subscription {
    remove: Option<Box<dyn Fn() + Send + Sync>>,
    disposed: AtomicBool,
}

impl Subscription {
    pub fn new(remove: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
            disposed: AtomicBool::new(false),
        }
    }

    /// A subscription that was never registered.
    pub fn inert() -> Self {
        Self {
            remove: None,
            disposed: AtomicBool::new(true),
        }
    }

    /// Unregister. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(remove) = &self.remove {
            remove();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
