use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::Mutex,
};

use tokio::task::AbortHandle;

/// Runs at most one task per key. Starting a task aborts the one already
/// running under that key, so only the last started fetch can deliver.
pub struct LatestOnly<K> {
    running: Mutex<HashMap<K, (u64, AbortHandle)>>,
    next: Mutex<u64>,
}

impl<K: Eq + Hash + Clone> Default for LatestOnly<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> LatestOnly<K> {
    pub fn new() -> Self {
        Self {
            running: Mutex::new(HashMap::new()),
            next: Mutex::new(0),
        }
    }

    fn ticket(&self) -> u64 {
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        *next += 1;
        *next
    }

    /// Run `fut`, superseding any task under `key`. Returns `None` when this
    /// task is superseded before its result is handed back, even if the
    /// task itself already finished.
    pub async fn run<F>(&self, key: K, fut: F) -> Option<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let ticket = self.ticket();
        let handle = tokio::spawn(fut);

        let previous = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), (ticket, handle.abort_handle()));
        if let Some((_, previous)) = previous {
            previous.abort();
        }

        let outcome = handle.await;

        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        let current = running.get(&key).is_some_and(|(held, _)| *held == ticket);
        if current {
            running.remove(&key);
        }
        drop(running);

        match outcome {
            // Finished, but a newer task took the key before we got here
            Ok(_) if !current => {
                tracing::debug!("Superseded fetch discarded");
                None
            }
            Ok(value) => Some(value),
            Err(e) if e.is_cancelled() => {
                tracing::debug!("Superseded fetch cancelled");
                None
            }
            Err(e) => {
                tracing::error!("Fetch task failed: {}", e);
                None
            }
        }
    }

    /// Abort whatever is running under `key`.
    pub fn cancel(&self, key: &K) {
        if let Some((_, handle)) = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
        {
            handle.abort();
        }
    }

    pub fn is_running(&self, key: &K) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }
}
