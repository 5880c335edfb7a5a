//! Mutex used to guard the scheduler's shared tables.
//!
//! The job system keeps every per-worker queue, the record pool, the dependency
//! index and the completion queue behind one lock. Critical sections are short
//! (a queue push or pop, a few table writes), so the lock is taken from workers,
//! producers and the main-thread drain without spinning.
//!
//! The type is `parking_lot`'s mutex: no poisoning, so a panicking entry function
//! cannot wedge the scheduler for every other worker.
//!
//! ```
//! use engine_jobs::Mutex;
//!
//! let table = Mutex::new(Vec::<u16>::new());
//! table.lock().push(7);
//! assert_eq!(table.lock().as_slice(), &[7]);
//! ```

pub use parking_lot::{Mutex, MutexGuard};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_mutex_shared_between_workers() {
        let ids = Arc::new(Mutex::new(Vec::new()));
        let mut handles = vec![];

        for worker in 0..8u16 {
            let ids = Arc::clone(&ids);
            handles.push(thread::spawn(move || {
                ids.lock().push(worker);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let mut ids = ids.lock().clone();
        ids.sort_unstable();
        assert_eq!(ids, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_mutex_not_poisoned_by_panic() {
        let mutex = Arc::new(Mutex::new(0));
        let m = Arc::clone(&mutex);

        let result = thread::spawn(move || {
            let _guard = m.lock();
            panic!("entry blew up while holding the lock");
        })
        .join();

        assert!(result.is_err());
        *mutex.lock() += 1;
        assert_eq!(*mutex.lock(), 1);
    }

    #[test]
    fn test_mutex_is_locked() {
        let mutex = Mutex::new(0);
        assert!(!mutex.is_locked());

        let _guard = mutex.lock();
        assert!(mutex.is_locked());
    }
}
