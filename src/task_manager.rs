//! Manages the lifecycle of the long-running tasks of the application.
use futures::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

type NamedHandles = Vec<(&'static str, JoinHandle<()>)>;

/// A centralized manager for spawned tasks.
///
/// Tasks observe the shared shutdown receiver themselves; `shutdown` only
/// waits for them to finish.
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<NamedHandles>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskManager {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_rx,
        }
    }

    /// Spawns a new task and adds its handle to the manager.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        self.handles().push((name, handle));
    }

    /// Returns a clone of the shutdown receiver.
    pub fn get_shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub fn task_count(&self) -> usize {
        self.handles().len()
    }

    /// Waits for all managed tasks to complete.
    pub async fn shutdown(self) {
        let handles: NamedHandles = self.handles().drain(..).collect();
        info!("Waiting for {} tasks to complete...", handles.len());

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        debug!(tasks = ?names, "Awaiting all tasks.");

        let results = join_all(handles).await;
        let mut panicked = Vec::new();
        for (task_name, result) in names.into_iter().zip(results) {
            match result {
                Ok(()) => debug!(task_name, "Task shut down gracefully."),
                Err(e) => {
                    error!(task_name, error = %e, "Task panicked during shutdown.");
                    panicked.push(task_name);
                }
            }
        }

        if panicked.is_empty() {
            info!("All tasks shut down gracefully.");
        } else {
            error!(tasks = ?panicked, "{} tasks panicked during shutdown", panicked.len());
        }
    }

    fn handles(&self) -> MutexGuard<'_, NamedHandles> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
