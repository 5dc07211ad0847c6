//! Recursive global runtime lock
//!
//! The embedded runtime is process-global and not safe for concurrent native
//! calls, so every bridge operation that touches it runs under one lock. The
//! lock is re-entrant for the thread that holds it: a runtime-side extension
//! may call back into host APIs that re-enter the bridge while the outer call
//! is still in progress.
//!
//! Ownership is tracked as (thread, depth). The guard releases one level on
//! drop, so every exit path (including `?` and unwinding) unlocks.

use std::marker::PhantomData;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

static GLOBAL_LOCK: RuntimeLock = RuntimeLock::new();

#[derive(Debug)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Depth-counted mutex with recursive acquire for the owning thread
#[derive(Debug)]
pub struct RuntimeLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl RuntimeLock {
    pub const fn new() -> Self {
        RuntimeLock {
            state: Mutex::new(LockState {
                owner: None,
                depth: 0,
            }),
            released: Condvar::new(),
        }
    }

    /// The lock guarding the process-wide runtime
    pub fn global() -> &'static RuntimeLock {
        &GLOBAL_LOCK
    }

    /// Block until the calling thread holds the lock
    pub fn acquire(&self) -> RuntimeGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    break;
                }
                Some(_) => {
                    state = self
                        .released
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        RuntimeGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Acquire without blocking; `None` if another thread holds the lock
    pub fn try_acquire(&self) -> Option<RuntimeGuard<'_>> {
        let me = thread::current().id();
        let mut state = self.state();
        match state.owner {
            Some(owner) if owner != me => None,
            _ => {
                state.owner = Some(me);
                state.depth += 1;
                Some(RuntimeGuard {
                    lock: self,
                    _not_send: PhantomData,
                })
            }
        }
    }

    /// Nesting depth held by the calling thread (0 if not held)
    pub fn depth(&self) -> usize {
        let state = self.state();
        if state.owner == Some(thread::current().id()) {
            state.depth
        } else {
            0
        }
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.depth() > 0
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        // A panic while holding the inner mutex cannot corrupt (owner, depth)
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut state = self.state();
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_one();
        }
    }
}

impl Default for RuntimeLock {
    fn default() -> Self {
        Self::new()
    }
}

/// One level of ownership of a [`RuntimeLock`]
///
/// Not `Send`: the level must be released by the thread that acquired it.
#[derive(Debug)]
pub struct RuntimeGuard<'a> {
    lock: &'a RuntimeLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for RuntimeGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_recursive_acquire_on_same_thread() {
        let lock = RuntimeLock::new();
        assert_eq!(lock.depth(), 0);
        {
            let _outer = lock.acquire();
            assert_eq!(lock.depth(), 1);
            {
                let _inner = lock.acquire();
                assert_eq!(lock.depth(), 2);
            }
            assert_eq!(lock.depth(), 1);
        }
        assert!(!lock.is_held_by_current_thread());
    }

    #[test]
    fn test_other_thread_blocks_until_fully_released() {
        let lock = Arc::new(RuntimeLock::new());
        let acquired = Arc::new(AtomicBool::new(false));

        let outer = lock.acquire();
        let inner = lock.acquire();

        let handle = {
            let lock = Arc::clone(&lock);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _guard = lock.acquire();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        drop(inner);
        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst), "one level still held");
        drop(outer);

        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_try_acquire() {
        let lock = Arc::new(RuntimeLock::new());
        let _guard = lock.acquire();
        assert!(lock.try_acquire().is_some(), "re-entrant for the owner");

        let other = Arc::clone(&lock);
        let got = thread::spawn(move || other.try_acquire().is_some())
            .join()
            .unwrap();
        assert!(!got);
    }

    #[test]
    fn test_released_on_unwind() {
        let lock = Arc::new(RuntimeLock::new());
        let inner = Arc::clone(&lock);
        let result = std::panic::catch_unwind(move || {
            let _guard = inner.acquire();
            panic!("boom");
        });
        assert!(result.is_err());

        let other = Arc::clone(&lock);
        let got = thread::spawn(move || other.try_acquire().is_some())
            .join()
            .unwrap();
        assert!(got);
    }
}
