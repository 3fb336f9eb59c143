use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Opaque integer handles for values owned on the native side.
///
/// Handles start at 1 and are never reused, so `0`, a handle that was never
/// issued and one that was already removed all resolve to nothing.
#[derive(Debug)]
pub struct HandleTable<T> {
    next: AtomicI64,
    entries: Mutex<HashMap<i64, T>>,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<i64, T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, value: T) -> i64 {
        let handle = self.next.fetch_add(1, Ordering::Relaxed);
        self.entries().insert(handle, value);
        handle
    }

    /// Runs `f` on the value behind `handle` while holding the table lock.
    pub fn with<R>(&self, handle: i64, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.entries().get(&handle).map(f)
    }

    /// Takes the value out of the table. The caller drops it outside the lock.
    pub fn remove(&self, handle: i64) -> Option<T> {
        self.entries().remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
