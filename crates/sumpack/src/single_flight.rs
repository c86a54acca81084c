//! A single-flight implementation to suppress duplicate builds.

use std::{
    hash::Hash,
    sync::Arc,
    thread::{self, ThreadId},
};

use dashmap::{DashMap, mapref::entry::Entry};
use fxhash::FxBuildHasher;
use parking_lot::{Condvar, Mutex};
use tracing::trace;

struct Flight {
    owner: ThreadId,
    done: Mutex<bool>,
    finished: Condvar,
}

/// Ensures that only one thread performs the work for a given key at a time.
///
/// Other threads asking for the same key block until the first one is done.
pub struct SingleFlight<K> {
    flights: DashMap<K, Arc<Flight>, FxBuildHasher>,
}

impl<K> std::fmt::Debug for SingleFlight<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight").finish_non_exhaustive()
    }
}

impl<K: Eq + Hash> SingleFlight<K> {
    pub fn new(shard_amount: usize) -> Self {
        Self {
            flights: DashMap::with_hasher_and_shard_amount(
                FxBuildHasher::default(),
                shard_amount,
            ),
        }
    }
}

/// Removes the flight and wakes its waiters, even if the work panics.
struct Landing<'a, K: Eq + Hash> {
    flights: &'a DashMap<K, Arc<Flight>, FxBuildHasher>,
    key: &'a K,
    flight: Arc<Flight>,
}

impl<K: Eq + Hash> Drop for Landing<'_, K> {
    fn drop(&mut self) {
        self.flights.remove(self.key);

        *self.flight.done.lock() = true;
        self.flight.finished.notify_all();
    }
}

impl<K: Eq + Hash + Clone> SingleFlight<K> {
    /// Waits for an ongoing operation for the given key to complete, or
    /// performs the work if no operation is ongoing.
    ///
    /// Returns `None` to a waiter. A re-entrant call from the thread that
    /// owns the flight runs `work` directly instead of waiting on itself.
    pub fn wait_or_work<T>(
        &self,
        key: &K,
        work: impl FnOnce() -> T,
    ) -> Option<T> {
        let current = thread::current().id();

        let flight = match self.flights.entry(key.clone()) {
            Entry::Occupied(occupied_entry) => {
                Ok(occupied_entry.get().clone())
            }
            Entry::Vacant(vacant_entry) => {
                let flight = Arc::new(Flight {
                    owner: current,
                    done: Mutex::new(false),
                    finished: Condvar::new(),
                });
                drop(vacant_entry.insert(flight.clone()));

                Err(flight)
            }
        };

        match flight {
            Ok(flight) if flight.owner == current => Some(work()),

            Ok(flight) => {
                trace!("waiting for an in-flight build");

                let mut done = flight.done.lock();
                while !*done {
                    flight.finished.wait(&mut done);
                }

                // we were a waiter, so no result
                None
            }

            Err(flight) => {
                let _landing =
                    Landing { flights: &self.flights, key, flight };

                // we were the worker, so return the result
                Some(work())
            }
        }
    }
}
