//! Bounded raw-frame pools.
//!
//! A pool owns a fixed arena of frame slots allocated once at context
//! creation. Producers acquire a slot id (blocking until one is free),
//! fill the slot, and enqueue the id; the encoder worker resolves the id
//! against the arena and pushes it back when the task completes. The pool
//! is the engine's only admission control: with all slots in flight, every
//! producer blocks.

use parking_lot::Mutex;
use std::time::Duration;

/// Sleep between acquisition attempts while the free list is empty.
const ACQUIRE_RETRY: Duration = Duration::from_millis(1);

/// Fixed-cardinality slot arena with a free list.
pub struct FramePool<T> {
    slots: Vec<Mutex<T>>,
    free: Mutex<Vec<usize>>,
}

impl<T> FramePool<T> {
    /// Allocate `count` slots using `make`.
    pub fn new(count: usize, mut make: impl FnMut() -> T) -> Self {
        let slots = (0..count).map(|_| Mutex::new(make())).collect();
        let free = (0..count).rev().collect();
        Self {
            slots,
            free: Mutex::new(free),
        }
    }

    /// Pop a free slot id, blocking with short sleeps until one appears.
    /// First-come-first-served by mutex order only.
    pub fn acquire(&self) -> usize {
        loop {
            if let Some(slot) = self.try_acquire() {
                return slot;
            }
            std::thread::sleep(ACQUIRE_RETRY);
        }
    }

    /// Pop a free slot id without blocking.
    pub fn try_acquire(&self) -> Option<usize> {
        self.free.lock().pop()
    }

    /// Return a slot id to the free list. No wakeup is signalled;
    /// producers poll.
    pub fn release(&self, slot: usize) {
        debug_assert!(slot < self.slots.len());
        self.free.lock().push(slot);
    }

    /// Access a slot by id.
    pub fn slot(&self, slot: usize) -> &Mutex<T> {
        &self.slots[slot]
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently on the free list.
    pub fn free_count(&self) -> usize {
        self.free.lock().len()
    }
}

impl<T> std::fmt::Debug for FramePool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePool")
            .field("capacity", &self.slots.len())
            .field("free", &self.free_count())
            .finish()
    }
}
