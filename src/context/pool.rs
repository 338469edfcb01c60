use std::sync::{Mutex, PoisonError};

use super::Context;

/// Bounded free list of reusable contexts.
///
/// Contexts are reset on the way in and on the way out, so whatever a
/// request left behind is dropped at release time and a freshly acquired
/// context is always blank. At most `capacity` idle contexts are kept;
/// extras are dropped.
#[derive(Debug)]
pub struct ContextPool {
    free: Mutex<Vec<Context>>,
    capacity: usize,
}

impl ContextPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity.min(64))),
            capacity,
        }
    }

    /// A blank context, reused when one is idle.
    pub fn acquire(&self) -> Context {
        let reused = self.free.lock().unwrap_or_else(PoisonError::into_inner).pop();
        match reused {
            Some(mut c) => {
                c.reset();
                c
            }
            None => Context::new(),
        }
    }

    /// Hand a context back for reuse.
    pub fn release(&self, mut c: Context) {
        c.reset();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.capacity {
            free.push(c);
        }
    }

    /// Number of idle contexts.
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
