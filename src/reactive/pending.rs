//! Results of operations scheduled on an executor.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{ConfigError, ConfigResult};
use crate::reactive::executor::Executor;

/// Completion of a scheduled operation. Await it, or call [`wait`](Self::wait)
/// from outside an async context.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<ConfigResult<T>>,
}

impl<T: Send + 'static> Pending<T> {
    /// Run `task` on `executor`.
    pub fn spawn<F>(executor: &Executor, task: F) -> Self
    where
        F: FnOnce() -> ConfigResult<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        executor.execute(move || {
            // Receiver may have been dropped; nothing to report then.
            let _ = tx.send(task());
        });
        Self { rx }
    }

    /// An already completed result.
    pub fn ready(result: ConfigResult<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Block until the operation finishes. Must not be called from within
    /// an async runtime thread.
    pub fn wait(self) -> ConfigResult<T> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(abandoned()))
    }
}

fn abandoned() -> ConfigError {
    ConfigError::Task("operation was dropped before completing".into())
}

impl<T> Future for Pending<T> {
    type Output = ConfigResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Err(abandoned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_on_thread() {
        let pending = Pending::spawn(&Executor::Thread, || Ok(21 * 2));
        assert_eq!(pending.wait().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_await_on_runtime() {
        let pending = Pending::spawn(&Executor::current(), || Ok("done"));
        assert_eq!(pending.await.unwrap(), "done");
    }

    #[test]
    fn test_errors_pass_through() {
        let pending: Pending<()> = Pending::ready(Err(ConfigError::Closed));
        assert!(matches!(pending.wait(), Err(ConfigError::Closed)));
    }
}
