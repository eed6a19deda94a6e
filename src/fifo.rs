//! Single-producer / single-consumer ring buffer shared with an interrupt.
//!
//! Used twice: the RX interval queue (ISR produces, main loop consumes) and
//! the TX pulse queue (main loop produces, ISR consumes).
//!
//! # Ownership
//!
//! ```text
//! producer ──▶ write, staged ──▶ [slots] ──▶ read ◀── consumer
//!                        └──── size (shared) ────┘
//! ```
//!
//! - `write` and `staged` are written only by the producer
//! - `read` is written only by the consumer
//! - `size` is the only field both sides write. The side running in the
//!   main loop updates it under [`IrqLine::masked`]; the side running in the
//!   interrupt passes [`InIsr`](crate::hal::InIsr)
//!
//! `size` is only ever loaded and stored, never read-modify-written, so
//! targets without atomic RMW instructions are fine.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::hal::IrqLine;

/// Fixed-capacity SPSC queue. `N` must be a power of 2.
pub struct SpscFifo<T: Copy, const N: usize> {
    slots: UnsafeCell<[T; N]>,

    /// Next slot the producer fills (wraps via mask).
    write: UnsafeCell<u32>,

    /// Entries written behind `write` but not yet visible to the consumer.
    staged: UnsafeCell<u32>,

    /// Next slot the consumer empties (wraps via mask).
    read: UnsafeCell<u32>,

    /// Published entries.
    size: AtomicU32,
}

// SAFETY: One producer and one consumer, each touching only its own index.
// The slot at `read` is never written until the consumer has released it
// through `size`, and a slot is only read after `size` published it.
unsafe impl<T: Copy + Send, const N: usize> Sync for SpscFifo<T, N> {}
unsafe impl<T: Copy + Send, const N: usize> Send for SpscFifo<T, N> {}

impl<T: Copy, const N: usize> SpscFifo<T, N> {
    const MASK: u32 = (N - 1) as u32;

    /// Create an empty queue, `fill` initialises the storage.
    pub const fn new(fill: T) -> Self {
        const { assert!(N.is_power_of_two(), "FIFO size must be power of 2") };

        Self {
            slots: UnsafeCell::new([fill; N]),
            write: UnsafeCell::new(0),
            staged: UnsafeCell::new(0),
            read: UnsafeCell::new(0),
            size: AtomicU32::new(0),
        }
    }

    /// Published entries waiting for the consumer.
    #[inline]
    pub fn len(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() as usize >= N
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    // --- Producer side ---

    /// Write `item` behind the tail without making it visible.
    ///
    /// Returns `false` (and drops the item) if published plus staged entries
    /// already fill the queue.
    #[inline]
    pub fn stage(&self, item: T) -> bool {
        // SAFETY: producer-owned fields, single producer
        unsafe {
            let staged = *self.staged.get();
            if (self.len() + staged) as usize >= N {
                return false;
            }
            let write = *self.write.get();
            (*self.slots.get())[(write & Self::MASK) as usize] = item;
            *self.write.get() = write.wrapping_add(1);
            *self.staged.get() = staged + 1;
        }
        true
    }

    /// Make every staged entry visible with a single occupancy update.
    ///
    /// Returns the number of entries published.
    #[inline]
    pub fn publish<I: IrqLine>(&self, irq: &I) -> u32 {
        // SAFETY: producer-owned field, single producer
        let staged = unsafe { *self.staged.get() };
        if staged == 0 {
            return 0;
        }

        irq.masked(|| {
            let size = self.size.load(Ordering::Relaxed);
            self.size.store(size + staged, Ordering::Release);
        });

        // SAFETY: producer-owned field, single producer
        unsafe {
            *self.staged.get() = 0;
        }
        staged
    }

    /// Stage and publish one entry.
    #[inline]
    pub fn push<I: IrqLine>(&self, item: T, irq: &I) -> bool {
        if !self.stage(item) {
            return false;
        }
        self.publish(irq);
        true
    }

    // --- Consumer side ---

    /// Take the oldest published entry.
    #[inline]
    pub fn pop<I: IrqLine>(&self, irq: &I) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        // SAFETY: consumer-owned index, slot published by the Acquire load above
        let item = unsafe {
            let read = *self.read.get();
            let item = (*self.slots.get())[(read & Self::MASK) as usize];
            *self.read.get() = read.wrapping_add(1);
            item
        };

        irq.masked(|| {
            let size = self.size.load(Ordering::Relaxed);
            self.size.store(size - 1, Ordering::Release);
        });

        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::InIsr;
    use core::cell::Cell;

    /// Counts mask/unmask calls and checks they pair up.
    #[derive(Default)]
    struct CountingIrq {
        masked: Cell<bool>,
        sections: Cell<u32>,
    }

    impl IrqLine for CountingIrq {
        fn mask(&self) {
            assert!(!self.masked.get(), "nested mask");
            self.masked.set(true);
        }

        fn unmask(&self) {
            assert!(self.masked.get(), "unmask without mask");
            self.masked.set(false);
            self.sections.set(self.sections.get() + 1);
        }
    }

    #[test]
    fn test_fifo_order() {
        let fifo = SpscFifo::<u32, 8>::new(0);

        assert!(fifo.push(1, &InIsr));
        assert!(fifo.push(2, &InIsr));
        assert!(fifo.push(3, &InIsr));

        assert_eq!(fifo.len(), 3);
        assert_eq!(fifo.pop(&InIsr), Some(1));
        assert_eq!(fifo.pop(&InIsr), Some(2));
        assert_eq!(fifo.pop(&InIsr), Some(3));
        assert_eq!(fifo.pop(&InIsr), None);
    }

    #[test]
    fn test_fifo_full_drops_newest() {
        let fifo = SpscFifo::<u32, 4>::new(0);

        for i in 0..4 {
            assert!(fifo.push(i, &InIsr));
        }
        assert!(fifo.is_full());
        assert!(!fifo.push(99, &InIsr));

        // Oldest data intact, 99 never entered
        for i in 0..4 {
            assert_eq!(fifo.pop(&InIsr), Some(i));
        }
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_fifo_wrap_around() {
        let fifo = SpscFifo::<u32, 4>::new(0);

        for round in 0..10u32 {
            assert!(fifo.push(round * 2, &InIsr));
            assert!(fifo.push(round * 2 + 1, &InIsr));
            assert_eq!(fifo.pop(&InIsr), Some(round * 2));
            assert_eq!(fifo.pop(&InIsr), Some(round * 2 + 1));
        }
    }

    #[test]
    fn test_staged_entries_invisible_until_published() {
        let fifo = SpscFifo::<u32, 8>::new(0);

        assert!(fifo.stage(10));
        assert!(fifo.stage(11));
        assert!(fifo.is_empty());
        assert_eq!(fifo.pop(&InIsr), None);

        assert_eq!(fifo.publish(&InIsr), 2);
        assert_eq!(fifo.len(), 2);
        assert_eq!(fifo.pop(&InIsr), Some(10));

        // Nothing staged, nothing to publish
        assert_eq!(fifo.publish(&InIsr), 0);
    }

    #[test]
    fn test_staging_respects_capacity() {
        let fifo = SpscFifo::<u32, 4>::new(0);

        assert!(fifo.push(0, &InIsr));
        assert!(fifo.stage(1));
        assert!(fifo.stage(2));
        assert!(fifo.stage(3));
        assert!(!fifo.stage(4));
        assert_eq!(fifo.publish(&InIsr), 3);
        assert!(fifo.is_full());
    }

    #[test]
    fn test_main_side_updates_are_masked() {
        let fifo = SpscFifo::<u32, 8>::new(0);
        let irq = CountingIrq::default();

        // One critical section per publish, regardless of batch size
        fifo.stage(1);
        fifo.stage(2);
        fifo.stage(3);
        fifo.publish(&irq);
        assert_eq!(irq.sections.get(), 1);

        fifo.pop(&irq);
        assert_eq!(irq.sections.get(), 2);

        // Empty pop never enters a critical section
        fifo.pop(&irq);
        fifo.pop(&irq);
        fifo.pop(&irq);
        assert_eq!(irq.sections.get(), 4);
        assert!(!irq.masked.get());
    }
}
