//! Per-node reader-writer lock.
//!
//! The lock is swapped for its `loom` counterpart when the `loom` feature is enabled so that the
//! locking protocol of [`ConcurrentTree`](crate::ConcurrentTree) can be model checked.

use std::sync::PoisonError;

#[cfg(feature = "loom")]
use loom::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
#[cfg(not(feature = "loom"))]
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// [`NodeLock`] guards the mutable state of a single node.
///
/// Poisoning is ignored: every critical section restores the node invariants before its guard is
/// dropped, therefore a panicking reader or writer cannot leave a half-updated node behind.
pub(crate) struct NodeLock<T> {
    inner: RwLock<T>,
}

impl<T> NodeLock<T> {
    #[inline]
    pub(crate) fn new(state: T) -> Self {
        Self {
            inner: RwLock::new(state),
        }
    }

    /// Acquires a shared lock.
    #[inline]
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires an exclusive lock.
    #[inline]
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
