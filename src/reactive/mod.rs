//! Publishers and subscribers behind reloadable references.
//!
//! # Responsibilities
//! - Fan items out to subscribers on a chosen [`Executor`]
//! - Deliver updates transactionally so derived values change all-or-nothing
//! - Represent async results as [`Pending`]

mod executor;
mod pending;
mod processor;
mod subscriber;

pub use executor::Executor;
pub use pending::Pending;
pub use processor::{Processor, TransactionalProcessor};
pub use subscriber::{
    Subscriber, Subscription, Transaction, TransactionFailed, TransactionalSubscriber,
};
