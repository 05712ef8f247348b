use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

/// Coalesces concurrent loads of the same key into one execution.
///
/// Callers that arrive while a load is running wait for it and share its value.
/// A failed load is not shared: the next waiter runs its own. Entries are
/// removed as soon as the load settles, so later calls start fresh.
#[derive(Debug)]
pub struct SingleFlight<T> {
    inflight: DashMap<String, Arc<OnceCell<T>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<E, F, Fut>(&self, key: &str, load: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cell = Arc::clone(
            self.inflight
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        let result = cell.get_or_try_init(load).await.cloned();
        self.inflight
            .remove_if(key, |_, current| Arc::ptr_eq(current, &cell));
        result
    }

    /// Number of keys with a load currently registered.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}
