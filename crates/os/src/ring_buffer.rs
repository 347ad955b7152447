//! Const-generic, lock-free ring buffer shared between a task and an ISR.
//!
//! `RingBuffer<T, N>` stores up to `N` `Copy` items without heap allocation.
//! It is a single-producer / single-consumer (SPSC) structure: in the SPI
//! engine the TX buffer is produced by `send` and consumed by the interrupt
//! handler, the RX buffer the other way round.
//!
//! # Counters
//!
//! The read and write counters run modulo `2N`, so a full buffer
//! (`write - read == N`) and an empty one (`write == read`) are distinct
//! without wasting a slot. The slot index is `counter % N`, always in `[0, N)`.
//!
//! ```text
//!   read=1        write=4            len = (4 + 2N - 1) % 2N = 3
//!     │             │
//!   [ . | a | b | c | . | . ]       N = 6
//! ```
//!
//! # Ownership of counters
//!
//! The producer only stores the write counter; the consumer only advances the
//! read counter. The single exception is [`OverflowPolicy::Overwrite`]: a
//! producer that finds the buffer full moves the read counter forward by one
//! with a compare-exchange, so a concurrent `pop` either wins the race (and
//! the producer then has room) or loses it and retries on the next item.
//!
//! # Constraints
//!
//! - `N == 0` is rejected at compile time.
//! - `no_std`, no `heapless`; the backing store lives in the struct, which is
//!   normally a `static` or a field of one.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

/// What `push` does when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverflowPolicy {
    /// Refuse the new item; the buffer is unchanged.
    Reject,
    /// Drop the oldest unread item to make room.
    Overwrite,
}

/// Error returned by [`RingBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RingBufferError {
    /// Buffer full under [`OverflowPolicy::Reject`].
    #[error("ring buffer full")]
    Full,
}

/// A fixed-capacity SPSC ring buffer.
///
/// Capacity is set at compile time via the const generic `N`.
pub struct RingBuffer<T: Copy, const N: usize> {
    slots: UnsafeCell<[MaybeUninit<T>; N]>,
    /// Read counter, modulo `2N`.
    read: AtomicUsize,
    /// Write counter, modulo `2N`.
    write: AtomicUsize,
    policy: OverflowPolicy,
}

// SAFETY: slots are only written by the producer at `write % N` while that slot
// is outside `[read, write)`, and only read by the consumer inside it. The
// counters are atomics with acquire/release pairing, so a slot's contents are
// published before the counter that exposes them.
unsafe impl<T: Copy + Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    const NON_EMPTY: () = assert!(N > 0, "RingBuffer capacity must be non-zero");
    const COUNTER_LIMIT: usize = {
        assert!(N <= usize::MAX / 2, "RingBuffer capacity too large");
        #[allow(clippy::arithmetic_side_effects)] // Safety: N <= usize::MAX / 2 asserted above
        let limit = N * 2;
        limit
    };

    /// Create a new, empty ring buffer with a fixed overflow policy.
    ///
    /// This function is `const` so that ring buffers may be stored in
    /// `static` variables without a runtime initialiser.
    pub const fn new(policy: OverflowPolicy) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NON_EMPTY;
        Self {
            // SAFETY: an array of `MaybeUninit` has no initialisation requirement.
            slots: UnsafeCell::new(unsafe { MaybeUninit::uninit().assume_init() }),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
            policy,
        }
    }

    /// Append `item` (producer side).
    ///
    /// # Errors
    ///
    /// `Err(RingBufferError::Full)` under [`OverflowPolicy::Reject`] when no
    /// slot is free; the buffer is left unchanged. Never fails under
    /// [`OverflowPolicy::Overwrite`].
    pub fn push(&self, item: T) -> Result<(), RingBufferError> {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        if Self::distance(read, write) == N {
            match self.policy {
                OverflowPolicy::Reject => return Err(RingBufferError::Full),
                OverflowPolicy::Overwrite => {
                    // A failed exchange means the consumer just freed the slot.
                    let _ = self.read.compare_exchange(
                        read,
                        Self::advance(read),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                }
            }
        }
        // SAFETY: `write % N` is outside `[read, write)` after the full check,
        // and only the producer writes slots.
        unsafe { self.slot(write).write(MaybeUninit::new(item)) };
        self.write.store(Self::advance(write), Ordering::Release);
        Ok(())
    }

    /// Append as many items of `items` as fit, in order (producer side).
    ///
    /// Returns the number accepted. Under [`OverflowPolicy::Overwrite`] every
    /// item is accepted.
    pub fn push_slice(&self, items: &[T]) -> usize {
        items
            .iter()
            .take_while(|&&item| self.push(item).is_ok())
            .count()
    }

    /// Remove the oldest item (consumer side).
    pub fn pop(&self) -> Option<T> {
        loop {
            let read = self.read.load(Ordering::Acquire);
            let write = self.write.load(Ordering::Acquire);
            if read == write {
                return None;
            }
            // SAFETY: `read % N` is inside `[read, write)` and was published by
            // the release store of `write`.
            let item = unsafe { self.slot(read).read().assume_init() };
            if self
                .read
                .compare_exchange(read, Self::advance(read), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(item);
            }
            // An overwriting producer discarded this item; take the next one.
        }
    }

    /// Pop into `out` until it is full or the buffer is empty.
    ///
    /// Returns the number of items written to `out`.
    pub fn pop_slice(&self, out: &mut [T]) -> usize {
        let mut n = 0usize;
        for slot in out.iter_mut() {
            match self.pop() {
                Some(item) => {
                    *slot = item;
                    n = n.saturating_add(1);
                }
                None => break,
            }
        }
        n
    }

    /// Discard every unread item (consumer side).
    pub fn clear(&self) {
        let write = self.write.load(Ordering::Acquire);
        let mut read = self.read.load(Ordering::Acquire);
        while let Err(current) =
            self.read
                .compare_exchange(read, write, Ordering::AcqRel, Ordering::Acquire)
        {
            read = current;
        }
    }

    /// Number of items currently available to read.
    pub fn len(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        Self::distance(read, write)
    }

    /// `true` when no items are present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` when the buffer is completely full.
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Maximum number of items the buffer can hold.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Overflow policy chosen at construction.
    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Items between `read` and `write`, both modulo `2N`.
    #[allow(clippy::arithmetic_side_effects)] // Safety: both counters < 2N, so no term overflows
    fn distance(read: usize, write: usize) -> usize {
        if write >= read {
            write - read
        } else {
            write + Self::COUNTER_LIMIT - read
        }
    }

    /// Next counter value, modulo `2N`.
    #[allow(clippy::arithmetic_side_effects)] // Safety: counter < 2N <= usize::MAX
    fn advance(counter: usize) -> usize {
        let next = counter + 1;
        if next == Self::COUNTER_LIMIT {
            0
        } else {
            next
        }
    }

    /// Pointer to the slot behind `counter`.
    #[allow(clippy::arithmetic_side_effects)] // Safety: N > 0 by NON_EMPTY
    fn slot(&self, counter: usize) -> *mut MaybeUninit<T> {
        let index = counter % N;
        // SAFETY: `index < N`, so the offset stays inside the array.
        unsafe { self.slots.get().cast::<MaybeUninit<T>>().add(index) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let rb: RingBuffer<u8, 4> = RingBuffer::new(OverflowPolicy::Reject);
        assert!(rb.is_empty());
        assert!(!rb.is_full());
        assert_eq!(rb.capacity(), 4);
        assert_eq!(rb.pop(), None);
    }

    #[test]
    fn test_fifo_order() {
        let rb: RingBuffer<u8, 4> = RingBuffer::new(OverflowPolicy::Reject);
        rb.push(1).unwrap();
        rb.push(2).unwrap();
        rb.push(3).unwrap();
        assert_eq!(rb.pop(), Some(1));
        assert_eq!(rb.pop(), Some(2));
        assert_eq!(rb.pop(), Some(3));
        assert_eq!(rb.pop(), None);
    }

    #[test]
    fn test_reject_policy_keeps_contents_when_full() {
        let rb: RingBuffer<u8, 2> = RingBuffer::new(OverflowPolicy::Reject);
        rb.push(10).unwrap();
        rb.push(20).unwrap();
        assert_eq!(rb.push(30), Err(RingBufferError::Full));
        assert_eq!(rb.len(), 2, "rejected push must not change len");
        assert_eq!(rb.pop(), Some(10));
        assert_eq!(rb.pop(), Some(20));
    }

    #[test]
    fn test_overwrite_policy_drops_oldest() {
        let rb: RingBuffer<u8, 3> = RingBuffer::new(OverflowPolicy::Overwrite);
        for b in 1..=5 {
            rb.push(b).unwrap();
        }
        assert!(rb.is_full());
        assert_eq!(rb.pop(), Some(3));
        assert_eq!(rb.pop(), Some(4));
        assert_eq!(rb.pop(), Some(5));
        assert!(rb.is_empty());
    }

    #[test]
    fn test_wraps_many_times() {
        let rb: RingBuffer<u32, 3> = RingBuffer::new(OverflowPolicy::Reject);
        for i in 0..100u32 {
            rb.push(i).unwrap();
            assert_eq!(rb.pop(), Some(i));
        }
        assert!(rb.is_empty());
    }

    #[test]
    fn test_push_slice_partial_fill() {
        let rb: RingBuffer<u8, 4> = RingBuffer::new(OverflowPolicy::Reject);
        rb.push(0).unwrap();
        assert_eq!(rb.push_slice(&[1, 2, 3, 4, 5]), 3);
        let mut out = [0u8; 8];
        assert_eq!(rb.pop_slice(&mut out), 4);
        assert_eq!(&out[..4], &[0, 1, 2, 3]);
    }

    #[test]
    fn test_clear_empties_buffer() {
        let rb: RingBuffer<u8, 4> = RingBuffer::new(OverflowPolicy::Reject);
        rb.push_slice(&[1, 2, 3]);
        rb.clear();
        assert!(rb.is_empty());
        rb.push(9).unwrap();
        assert_eq!(rb.pop(), Some(9), "buffer must be usable after clear");
    }

    #[test]
    fn test_policy_is_fixed() {
        let rb: RingBuffer<u8, 1> = RingBuffer::new(OverflowPolicy::Overwrite);
        assert_eq!(rb.policy(), OverflowPolicy::Overwrite);
    }
}
