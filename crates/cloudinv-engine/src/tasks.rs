//! Background task runner for fire-and-forget discovery runs.
//!
//! Tasks are tracked in a [`JoinSet`] so the process can wait for
//! in-flight runs on shutdown. Nothing here cancels a task.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    set: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.set.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawn `task` and return immediately. Finished tasks are reaped
    /// on every spawn so the set does not grow without bound.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.set();
        while let Some(result) = set.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "Background task panicked");
            }
        }
        set.spawn(task);
    }

    /// Number of tasks not yet reaped.
    pub fn len(&self) -> usize {
        self.set().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every spawned task to finish.
    pub async fn wait_idle(&self) {
        loop {
            let mut set = std::mem::take(&mut *self.set());
            if set.is_empty() {
                return;
            }
            while let Some(result) = set.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Background task ended abnormally");
                }
            }
        }
    }

    /// Shutdown hook: waits for in-flight tasks, cancels none.
    pub async fn shutdown(&self) {
        self.wait_idle().await;
        info!("Background tasks drained");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn wait_idle_drains_spawned_tasks() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            tasks.spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        tasks.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn panicking_task_does_not_poison_the_runner() {
        let tasks = BackgroundTasks::new();
        tasks.spawn(async { panic!("boom") });
        tasks.wait_idle().await;

        tasks.spawn(async {});
        tasks.wait_idle().await;
        assert!(tasks.is_empty());
    }
}
