//! Fixed-capacity FIFO ring.
//!
//! Storage is allocated once; `push` fails instead of growing. The ring holds no
//! lock of its own: every instance lives inside the scheduler state and is only
//! touched while the scheduler mutex is held.

/// Bounded FIFO with head and tail indices modulo capacity.
#[derive(Debug)]
pub struct RingQueue<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> RingQueue<T> {
    /// Allocate a ring with room for `capacity` entries. A zero capacity is
    /// bumped to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    /// Append at the tail. Hands the item back if the ring is full.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` when no slot is free.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        let tail = (self.head + self.len) % self.slots.len();
        self.slots[tail] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Remove from the head, or `None` when empty.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        item
    }

    /// Borrow the head entry.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        if self.len == 0 {
            None
        } else {
            self.slots[self.head].as_ref()
        }
    }

    /// Entries currently stored.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the ring is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether every slot is in use.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let cap = self.slots.len();
        (0..self.len).filter_map(move |i| self.slots[(self.head + i) % cap].as_ref())
    }
}
