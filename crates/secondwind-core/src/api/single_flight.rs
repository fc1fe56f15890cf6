use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

/// Deduplicates concurrent executions of the same async operation.
///
/// While a call is in flight every other caller awaits the same shared
/// future. The memo is cleared once it settles, so the next call after that
/// starts fresh.
pub struct SingleFlight<T: Clone> {
    in_flight: Mutex<Option<Shared<BoxFuture<'static, T>>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(None),
        }
    }

    /// Join the in-flight call or start a new one with `make`.
    /// Returns the result and whether this caller started the call.
    pub async fn run<F, Fut>(&self, make: F) -> (T, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (shared, leader) = {
            let mut slot = self.slot();
            match slot.as_ref() {
                Some(existing) => (existing.clone(), false),
                None => {
                    let fresh = make().boxed().shared();
                    *slot = Some(fresh.clone());
                    (fresh, true)
                }
            }
        };

        let result = shared.clone().await;

        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&shared)) {
            *slot = None;
        }
        (result, leader)
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Shared<BoxFuture<'static, T>>>> {
        // The guarded value is always consistent; recover from poisoning.
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
