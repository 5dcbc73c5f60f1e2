//! Where subscriber callbacks and async operations run.

use tokio::runtime::Handle;

#[derive(Debug, Clone)]
pub enum Executor {
    /// Run on the calling thread.
    Inline,
    /// Spawn a named OS thread per task.
    Thread,
    /// Run on a Tokio runtime's blocking pool.
    Tokio(Handle),
}

impl Executor {
    /// The current Tokio runtime if one is entered, else [`Executor::Thread`].
    pub fn current() -> Self {
        Handle::try_current()
            .map(Executor::Tokio)
            .unwrap_or(Executor::Thread)
    }

    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Executor::Inline => task(),
            Executor::Thread => {
                let spawned = std::thread::Builder::new()
                    .name("confnode-task".into())
                    .spawn(task);
                if let Err(e) = spawned {
                    tracing::error!(error = %e, "Failed to spawn task thread");
                }
            }
            Executor::Tokio(handle) => {
                drop(handle.spawn_blocking(task));
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_default_without_runtime_uses_threads() {
        assert!(matches!(Executor::default(), Executor::Thread));
    }

    #[test]
    fn test_thread_executor_runs_task() {
        let (tx, rx) = mpsc::channel();
        Executor::Thread.execute(move || tx.send(7).unwrap());
        assert_eq!(rx.recv().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_default_inside_runtime_uses_tokio() {
        assert!(matches!(Executor::default(), Executor::Tokio(_)));
    }
}
