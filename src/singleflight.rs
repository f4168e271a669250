//! Request-coalescing flight gate
//!
//! Guarantees at most one in-flight load per key: the first caller installs a
//! shared future, later callers for the same key await the same future and
//! receive the identical outcome. Completed flights are removed from the
//! registry, so a caller arriving after completion starts a fresh load — the
//! gate coalesces concurrent work, it does not cache results.
//!
//! The load future always executes with the registry mutex released; the
//! mutex is held only across map lookups, inserts, and removals.

use std::collections::HashMap;
use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

type Flight<T> = Shared<BoxFuture<'static, T>>;

/// Deduplicates concurrent loads per key.
///
/// `T` must be `Clone` because every coalesced caller receives its own copy
/// of the single outcome. If one waiter is cancelled, the shared load keeps
/// running as long as any other waiter remains.
pub struct FlightGroup<T: Clone> {
    calls: Mutex<HashMap<String, Flight<T>>>,
}

impl<T: Clone> Default for FlightGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FlightGroup<T> {
    /// Create an empty gate.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T> FlightGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `fut` for `key`, coalescing with any load already in flight.
    pub async fn run<F>(&self, key: &str, fut: F) -> T
    where
        F: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut calls = self.calls.lock();
            match calls.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    let flight = fut.boxed().shared();
                    calls.insert(key.to_string(), flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        // Retire the flight. The identity check keeps a newer flight for the
        // same key (started after this one completed) from being clobbered by
        // a slow waiter.
        let mut calls = self.calls.lock();
        if let Some(current) = calls.get(key) {
            if current.ptr_eq(&flight) {
                calls.remove(key);
            }
        }

        result
    }
}

// =============================================================================
// Tests
// =============================================================================
