//! Reusable session shells.

use crate::session::Session;
use parking_lot::Mutex;

/// Bounded free list of [`Session`] shells.
///
/// [`SessionPool::release`] resets a shell before it is stored, so a shell
/// handed out by [`SessionPool::acquire`] never carries a previous request's
/// ID, name, attributes or driver.
#[derive(Debug)]
pub struct SessionPool {
    free: Mutex<Vec<Session>>,
    capacity: usize,
}

impl SessionPool {
    /// Create a pool that keeps at most `capacity` idle shells.
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Take an unbound shell, allocating one if the pool is empty.
    pub fn acquire(&self) -> Session {
        self.free.lock().pop().unwrap_or_else(Session::empty)
    }

    /// Reset a session and keep it for reuse.
    ///
    /// The shell is dropped instead when the pool is full.
    pub fn release(&self, mut session: Session) {
        session.reset();

        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(session);
        }
    }

    /// Number of idle shells.
    pub fn len(&self) -> usize {
        self.free.lock().len()
    }

    /// Whether no idle shell is available.
    pub fn is_empty(&self) -> bool {
        self.free.lock().is_empty()
    }

    /// Maximum number of idle shells.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
