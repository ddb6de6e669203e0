use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::task::JoinHandle;

/// Quiet period after the last keystroke before a search fetch is issued.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Runs only the most recent of a burst of calls, once `delay` has passed
/// without a newer call.
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedules `action`; any earlier pending action is abandoned.
    pub fn call<F, Fut>(&self, action: F) -> JoinHandle<bool>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) != ticket {
                return false;
            }
            action().await;
            true
        })
    }

    /// Abandons whatever is pending.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}
