//! MemoryBudget + RAII guard implementations.
//!
//! Operators hold one guard per buffer and resize it as the buffer grows.
//! Dropping the guard returns the bytes to the budget (panic-safe), which is
//! what releases a fragment's memory on completion, error, or cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gridsql_core::budget::{BudgetGuard, MemoryBudget};

use crate::error::{Error, Result};

/// Shared inner state for the budget.
struct BudgetInner {
    capacity: usize,
    used: AtomicUsize,
}

impl BudgetInner {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: AtomicUsize::new(0),
        }
    }

    fn try_acquire(&self, bytes: usize) -> bool {
        loop {
            let cur = self.used.load(Ordering::Relaxed);
            let next = cur.saturating_add(bytes);
            if next > self.capacity {
                return false;
            }
            if self
                .used
                .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// Concrete MemoryBudget implementation. Cloning shares the same pool.
#[derive(Clone)]
pub struct MemoryBudgetImpl {
    inner: Arc<BudgetInner>,
}

impl std::fmt::Debug for MemoryBudgetImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBudgetImpl")
            .field("capacity", &self.inner.capacity)
            .field("used", &self.inner.used.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemoryBudgetImpl {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Arc::new(BudgetInner::new(capacity_bytes)),
        }
    }

    /// Zero-byte guard that an operator grows with [`BudgetGuardImpl::grow_to`].
    pub fn empty_guard(&self, tag: &'static str) -> BudgetGuardImpl {
        BudgetGuardImpl {
            inner: Arc::clone(&self.inner),
            bytes: 0,
            tag,
        }
    }

    /// Like `try_acquire`, but reports the shortfall as an error.
    pub fn acquire(&self, bytes: usize, tag: &'static str) -> Result<BudgetGuardImpl> {
        self.try_acquire(bytes, tag)
            .ok_or_else(|| self.exceeded(tag, bytes))
    }

    fn exceeded(&self, tag: &'static str, requested: usize) -> Error {
        let used = self.inner.used.load(Ordering::Relaxed);
        #[cfg(feature = "tracing")]
        tracing::warn!(tag, requested, used, capacity = self.inner.capacity, "memory budget exhausted");
        Error::BudgetExceeded {
            tag,
            requested,
            capacity: self.inner.capacity,
            used,
        }
    }
}

/// RAII guard that accounts for a number of bytes.
/// Dropping it returns bytes to the budget.
pub struct BudgetGuardImpl {
    inner: Arc<BudgetInner>,
    bytes: usize,
    tag: &'static str,
}

impl std::fmt::Debug for BudgetGuardImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetGuardImpl")
            .field("tag", &self.tag)
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl Drop for BudgetGuardImpl {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.inner.release(self.bytes);
            // NOTE: do not log here to keep drop path fast.
            self.bytes = 0;
        }
    }
}

// ----- trait impls -----

impl BudgetGuard for BudgetGuardImpl {
    fn bytes(&self) -> usize {
        self.bytes
    }
    fn tag(&self) -> &'static str {
        self.tag
    }
}

impl BudgetGuardImpl {
    /// Try to resize this guard to a new byte count.
    /// Returns true if successful, false if the new size would exceed capacity.
    /// If new_bytes < current bytes, the guard is always shrunk successfully.
    pub fn try_resize(&mut self, new_bytes: usize) -> bool {
        if new_bytes == self.bytes {
            return true;
        }

        if new_bytes < self.bytes {
            let delta = self.bytes - new_bytes;
            self.inner.release(delta);
            self.bytes = new_bytes;
            true
        } else {
            let delta = new_bytes - self.bytes;
            if self.inner.try_acquire(delta) {
                self.bytes = new_bytes;
                true
            } else {
                false
            }
        }
    }

    /// Grow (or shrink) to `new_bytes`, reporting a shortfall as an error.
    pub fn grow_to(&mut self, new_bytes: usize) -> Result<()> {
        if self.try_resize(new_bytes) {
            return Ok(());
        }
        let requested = new_bytes - self.bytes;
        let used = self.inner.used.load(Ordering::Relaxed);
        #[cfg(feature = "tracing")]
        tracing::warn!(tag = self.tag, requested, used, capacity = self.inner.capacity, "memory budget exhausted");
        Err(Error::BudgetExceeded {
            tag: self.tag,
            requested,
            capacity: self.inner.capacity,
            used,
        })
    }

    /// Release everything this guard holds but keep it usable.
    pub fn reset(&mut self) {
        let _ = self.try_resize(0);
    }
}

impl MemoryBudget for MemoryBudgetImpl {
    type Guard = BudgetGuardImpl;

    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard> {
        if bytes == 0 {
            return Some(self.empty_guard(tag));
        }
        if self.inner.try_acquire(bytes) {
            Some(BudgetGuardImpl {
                inner: Arc::clone(&self.inner),
                bytes,
                tag,
            })
        } else {
            None
        }
    }

    fn capacity_bytes(&self) -> usize {
        self.inner.capacity
    }

    fn used_bytes(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }
}
