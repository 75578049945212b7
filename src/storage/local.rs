//! Single-threaded shared handle over [`SimpleLru`].

use std::cell::RefCell;
use std::rc::Rc;

use super::{SimpleLru, Storage};

/// Clone-able store handle for topologies where one reactor thread owns
/// every connection. Clones share the same store. Not `Send`; sharing
/// across threads takes a [`ThreadSafeLru`](super::ThreadSafeLru).
#[derive(Clone)]
pub struct LocalLru {
    inner: Rc<RefCell<SimpleLru>>,
}

impl LocalLru {
    /// Creates a store bounded by `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self { inner: Rc::new(RefCell::new(SimpleLru::new(max_size))) }
    }
}

impl Storage for LocalLru {
    fn put(&self, key: &[u8], value: &[u8]) -> bool {
        self.inner.borrow_mut().put(key, value)
    }

    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> bool {
        self.inner.borrow_mut().put_if_absent(key, value)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> bool {
        self.inner.borrow_mut().set(key, value)
    }

    fn delete(&self, key: &[u8]) -> bool {
        self.inner.borrow_mut().delete(key)
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.borrow_mut().get(key).map(<[u8]>::to_vec)
    }

    fn append(&self, key: &[u8], suffix: &[u8]) -> bool {
        self.inner.borrow_mut().append(key, suffix)
    }

    fn prepend(&self, key: &[u8], prefix: &[u8]) -> bool {
        self.inner.borrow_mut().prepend(key, prefix)
    }

    fn max_size(&self) -> usize {
        self.inner.borrow().max_size()
    }
}
