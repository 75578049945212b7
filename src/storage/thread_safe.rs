//! Mutex-guarded shared handle over [`SimpleLru`].

use std::sync::{Arc, Mutex, MutexGuard};

use super::{SimpleLru, Storage};

/// Clone-able store handle shared by every worker reactor.
///
/// Each operation holds one process-wide mutex for its whole duration.
/// Reads promote entries, so a reader/writer split would not be sound
/// here; the plain mutex is the only contended primitive on the fast
/// path.
#[derive(Clone)]
pub struct ThreadSafeLru {
    inner: Arc<Mutex<SimpleLru>>,
}

impl ThreadSafeLru {
    /// Creates a store bounded by `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self { inner: Arc::new(Mutex::new(SimpleLru::new(max_size))) }
    }

    /// Bytes currently held.
    pub fn current_size(&self) -> usize {
        self.lock().current_size()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // a poisoned lock means a panic mid-operation and possibly broken
    // list invariants; propagating the panic is the only safe answer
    fn lock(&self) -> MutexGuard<'_, SimpleLru> {
        self.inner.lock().expect("lru mutex poisoned")
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        self.lock().check_invariants();
    }
}

impl Storage for ThreadSafeLru {
    fn put(&self, key: &[u8], value: &[u8]) -> bool {
        self.lock().put(key, value)
    }

    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> bool {
        self.lock().put_if_absent(key, value)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> bool {
        self.lock().set(key, value)
    }

    fn delete(&self, key: &[u8]) -> bool {
        self.lock().delete(key)
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.lock().get(key).map(<[u8]>::to_vec)
    }

    fn append(&self, key: &[u8], suffix: &[u8]) -> bool {
        self.lock().append(key, suffix)
    }

    fn prepend(&self, key: &[u8], prefix: &[u8]) -> bool {
        self.lock().prepend(key, prefix)
    }

    fn max_size(&self) -> usize {
        self.lock().max_size()
    }
}
