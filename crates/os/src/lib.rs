//! OS primitives shared by HAL drivers and application code
//!
//! - [`ring_buffer`] - lock-free SPSC queue between a task and an ISR
//! - [`semaphore`] - counting/binary semaphore, ISR-safe `signal`, async `wait`
#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod ring_buffer;
pub mod semaphore;

pub use ring_buffer::{OverflowPolicy, RingBuffer, RingBufferError};
pub use semaphore::Semaphore;
