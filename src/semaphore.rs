//! Counting semaphore.
//!
//! Each worker owns one. Every job pushed into a worker's queues adds one
//! permit; the worker takes one permit before each pop, so the count always
//! matches the number of queued jobs plus any pending wake-up for shutdown.

use std::time::{Duration, Instant};

use crate::{Condvar, Mutex};

/// A counting semaphore built on [`Mutex`] and [`Condvar`].
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `permits` permits.
    #[must_use]
    pub const fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Block until a permit is available, then take it.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Take a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Block up to `timeout` for a permit. Returns `true` if one was taken.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut permits = self.permits.lock();
        while *permits == 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.available.wait_for(&mut permits, remaining);
        }
        *permits -= 1;
        true
    }

    /// Add one permit and wake a single waiter.
    pub fn release(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.available.notify_one();
    }

    /// Current number of permits.
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_permits_are_counted() {
        let sem = Semaphore::new(2);
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());

        sem.release();
        assert_eq!(sem.available(), 1);
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let sem = Arc::new(Semaphore::new(0));
        let woke = Arc::new(AtomicUsize::new(0));

        let waiter = {
            let sem = Arc::clone(&sem);
            let woke = Arc::clone(&woke);
            thread::spawn(move || {
                sem.acquire();
                woke.fetch_add(1, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert_eq!(woke.load(Ordering::SeqCst), 0);

        sem.release();
        waiter.join().unwrap();
        assert_eq!(woke.load(Ordering::SeqCst), 1);
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn test_acquire_timeout_without_permit() {
        let sem = Semaphore::new(0);
        assert!(!sem.acquire_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_every_release_wakes_one_consumer() {
        let sem = Arc::new(Semaphore::new(0));
        let consumed = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..4 {
            let sem = Arc::clone(&sem);
            let consumed = Arc::clone(&consumed);
            handles.push(thread::spawn(move || {
                for _ in 0..25 {
                    sem.acquire();
                    consumed.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        for _ in 0..100 {
            sem.release();
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(consumed.load(Ordering::SeqCst), 100);
        assert_eq!(sem.available(), 0);
    }
}
