//! Condition variable paired with [`crate::Mutex`].
//!
//! This is the blocking primitive underneath [`crate::Semaphore`] and
//! [`crate::Signal`]: a worker parks here when its queue is empty and consumes
//! no CPU until a producer signals it.

use std::time::Duration;

use crate::MutexGuard;

/// A condition variable without poisoning.
///
/// # Examples
///
/// ```
/// use engine_jobs::{Condvar, Mutex};
/// use std::sync::Arc;
/// use std::thread;
///
/// let pair = Arc::new((Mutex::new(false), Condvar::new()));
/// let pair2 = Arc::clone(&pair);
///
/// thread::spawn(move || {
///     let (lock, cvar) = &*pair2;
///     *lock.lock() = true;
///     cvar.notify_one();
/// });
///
/// let (lock, cvar) = &*pair;
/// let mut ready = lock.lock();
/// while !*ready {
///     cvar.wait(&mut ready);
/// }
/// ```
#[derive(Debug, Default)]
pub struct Condvar {
    inner: parking_lot::Condvar,
}

impl Condvar {
    /// Creates a new condition variable.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: parking_lot::Condvar::new(),
        }
    }

    /// Atomically releases `guard`, blocks until notified, then re-acquires it.
    ///
    /// Spurious wakeups are possible; callers re-check their condition in a loop.
    #[inline]
    pub fn wait<T>(&self, guard: &mut MutexGuard<'_, T>) {
        self.inner.wait(guard);
    }

    /// Like [`Condvar::wait`] but gives up after `timeout`.
    ///
    /// Returns `true` if the wait timed out.
    #[inline]
    pub fn wait_for<T>(&self, guard: &mut MutexGuard<'_, T>, timeout: Duration) -> bool {
        self.inner.wait_for(guard, timeout).timed_out()
    }

    /// Wakes one blocked thread.
    #[inline]
    pub fn notify_one(&self) -> bool {
        self.inner.notify_one()
    }

    /// Wakes every blocked thread and returns how many were woken.
    #[inline]
    pub fn notify_all(&self) -> usize {
        self.inner.notify_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mutex;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_until_flag_set() {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let pair2 = Arc::clone(&pair);

        thread::spawn(move || {
            let (lock, cvar) = &*pair2;
            thread::sleep(Duration::from_millis(10));
            *lock.lock() = true;
            cvar.notify_one();
        });

        let (lock, cvar) = &*pair;
        let mut ready = lock.lock();
        while !*ready {
            cvar.wait(&mut ready);
        }
        assert!(*ready);
    }

    #[test]
    fn test_wait_for_times_out() {
        let lock = Mutex::new(());
        let cvar = Condvar::new();

        let mut guard = lock.lock();
        assert!(cvar.wait_for(&mut guard, Duration::from_millis(5)));
    }

    #[test]
    fn test_notify_all_wakes_every_waiter() {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let mut handles = vec![];

        for _ in 0..4 {
            let pair = Arc::clone(&pair);
            handles.push(thread::spawn(move || {
                let (lock, cvar) = &*pair;
                let mut go = lock.lock();
                while !*go {
                    cvar.wait(&mut go);
                }
            }));
        }

        thread::sleep(Duration::from_millis(10));
        {
            let (lock, cvar) = &*pair;
            *lock.lock() = true;
            cvar.notify_all();
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
