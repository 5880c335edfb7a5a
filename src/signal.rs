//! Manual-reset blocking signal.
//!
//! Used for the worker start-up handshake: `JobSystem::new` does not return
//! until every worker has entered its loop. Tests also use it as a gate to hold
//! an entry function open while more work is queued behind it.

use std::time::{Duration, Instant};

use crate::{Condvar, Mutex};

/// A flag that threads can block on until another thread sets it.
#[derive(Debug, Default)]
pub struct Signal {
    set: Mutex<bool>,
    changed: Condvar,
}

impl Signal {
    /// Create an unset signal.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            set: Mutex::new(false),
            changed: Condvar::new(),
        }
    }

    /// Set the signal and release every waiter. Stays set until [`Signal::reset`].
    pub fn set(&self) {
        let mut set = self.set.lock();
        *set = true;
        self.changed.notify_all();
    }

    /// Clear the signal.
    pub fn reset(&self) {
        *self.set.lock() = false;
    }

    /// Whether the signal is currently set.
    pub fn is_set(&self) -> bool {
        *self.set.lock()
    }

    /// Block until the signal is set.
    pub fn wait(&self) {
        let mut set = self.set.lock();
        while !*set {
            self.changed.wait(&mut set);
        }
    }

    /// Block up to `timeout`. Returns `true` if the signal was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = self.set.lock();
        while !*set {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.changed.wait_for(&mut set, remaining);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_returns_once_set() {
        let signal = Arc::new(Signal::new());
        let s = Arc::clone(&signal);

        let setter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            s.set();
        });

        signal.wait();
        assert!(signal.is_set());
        setter.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_unset() {
        let signal = Signal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_reset_clears() {
        let signal = Signal::new();
        signal.set();
        assert!(signal.wait_timeout(Duration::from_millis(1)));
        signal.reset();
        assert!(!signal.is_set());
    }
}
