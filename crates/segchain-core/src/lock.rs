//! Handle lock with optional acquisition timeout
//!
//! `std::sync::Mutex` cannot wait with a deadline, so the lock is split in
//! two: a gate flag guarded by a short-lived mutex and a condition variable,
//! and the protected data in its own mutex. Only the gate holder ever locks
//! the data mutex, so that lock never blocks.

use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Error, Resource, Result};

/// Mutual exclusion over `T` with a timed `lock`
#[derive(Debug)]
pub struct ChainLock<T> {
    held: Mutex<bool>,
    available: Condvar,
    data: Mutex<T>,
}

impl<T> ChainLock<T> {
    /// Create an unlocked lock
    pub fn new(value: T) -> Self {
        Self {
            held: Mutex::new(false),
            available: Condvar::new(),
            data: Mutex::new(value),
        }
    }

    /// Lock, waiting at most `timeout` (`None` waits forever)
    ///
    /// Fails with `Timeout(Lock)` when the deadline passes and with
    /// `InvalidState` when a previous holder panicked.
    pub fn lock(&self, timeout: Option<Duration>) -> Result<ChainGuard<'_, T>> {
        let gate = self.enter(timeout)?;
        let data = self.data.lock().map_err(|_| {
            log::error!("Chain lock poisoned by a panic in a previous operation");
            Error::InvalidState
        })?;
        Ok(ChainGuard { data, _gate: gate })
    }

    /// Lock like [`lock`](Self::lock) but recover the data after a panic
    pub fn lock_recover(&self, timeout: Option<Duration>) -> Result<ChainGuard<'_, T>> {
        let gate = self.enter(timeout)?;
        let data = self.data.lock().unwrap_or_else(|poisoned| {
            log::warn!("Recovering poisoned chain lock");
            poisoned.into_inner()
        });
        Ok(ChainGuard { data, _gate: gate })
    }

    fn enter(&self, timeout: Option<Duration>) -> Result<Gate<'_, T>> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);

        match timeout {
            None => {
                while *held {
                    held = self
                        .available
                        .wait(held)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while *held {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::Timeout(Resource::Lock));
                    }
                    let (guard, _) = self
                        .available
                        .wait_timeout(held, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    held = guard;
                }
            }
        }

        *held = true;
        Ok(Gate { lock: self })
    }

    fn leave(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        *held = false;
        self.available.notify_one();
    }
}

struct Gate<'a, T> {
    lock: &'a ChainLock<T>,
}

impl<T> Drop for Gate<'_, T> {
    fn drop(&mut self) {
        self.lock.leave();
    }
}

/// Exclusive access to the locked value, released on drop
pub struct ChainGuard<'a, T> {
    // Dropped before the gate opens
    data: MutexGuard<'a, T>,
    _gate: Gate<'a, T>,
}

impl<T> Deref for ChainGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for ChainGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::vec;
    use std::vec::Vec;

    #[test]
    fn test_lock_and_relock() {
        let lock = ChainLock::new(0u32);
        {
            let mut guard = lock.lock(None).unwrap();
            *guard += 1;
        }
        assert_eq!(*lock.lock(Some(Duration::from_millis(10))).unwrap(), 1);
    }

    #[test]
    fn test_timeout_while_held() {
        let lock = Arc::new(ChainLock::new(()));
        let (locked_tx, locked_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let holder = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                let _guard = lock.lock(None).unwrap();
                locked_tx.send(()).unwrap();
                done_rx.recv().unwrap();
            })
        };

        locked_rx.recv().unwrap();
        assert!(matches!(
            lock.lock(Some(Duration::from_millis(20))),
            Err(Error::Timeout(Resource::Lock))
        ));

        done_tx.send(()).unwrap();
        holder.join().unwrap();
        assert!(lock.lock(Some(Duration::from_millis(20))).is_ok());
    }

    #[test]
    fn test_waiter_gets_lock_after_release() {
        let lock = Arc::new(ChainLock::new(Vec::new()));
        let guard = lock.lock(None).unwrap();

        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                lock.lock(Some(Duration::from_secs(5))).unwrap().push(2);
            })
        };

        thread::sleep(Duration::from_millis(20));
        drop(guard);
        waiter.join().unwrap();
        assert_eq!(*lock.lock(None).unwrap(), vec![2]);
    }

    #[test]
    fn test_poisoned_lock() {
        let lock = Arc::new(ChainLock::new(7u8));
        let panicker = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                let _guard = lock.lock(None).unwrap();
                panic!("boom");
            })
        };
        assert!(panicker.join().is_err());

        assert!(matches!(lock.lock(None), Err(Error::InvalidState)));
        assert_eq!(*lock.lock_recover(None).unwrap(), 7);
    }
}
