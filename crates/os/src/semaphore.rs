//! Counting / binary semaphore with an interrupt-safe `signal`.
//!
//! The count lives behind an embassy `blocking_mutex::Mutex` over a
//! `CriticalSectionRawMutex`, so `signal` can run from an ISR (it never
//! blocks, it only takes a critical section). Waiters are async; each one
//! parks its waker in a `MultiWakerRegistration<W>`. `W` bounds how many
//! pending waiters are tracked at once; when more register, all are woken
//! and re-poll, so nothing is lost, only spuriously woken.
//!
//! ```text
//!   ISR ── signal() ──► count += 1 (saturating at max) ──► wake waiters
//!   task ─ wait().await ◄──────────────── count -= 1 ◄──────┘
//! ```

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::MultiWakerRegistration;

struct State<const W: usize> {
    count: u32,
    max: u32,
    waiters: MultiWakerRegistration<W>,
}

/// Bounded counting semaphore; `W` is the number of tracked pending waiters.
pub struct Semaphore<const W: usize> {
    state: Mutex<CriticalSectionRawMutex, RefCell<State<W>>>,
}

impl<const W: usize> Semaphore<W> {
    /// Semaphore holding `initial` permits out of at most `max`.
    ///
    /// `initial` above `max` is clamped.
    pub const fn new(initial: u32, max: u32) -> Self {
        let count = if initial > max { max } else { initial };
        Self {
            state: Mutex::new(RefCell::new(State {
                count,
                max,
                waiters: MultiWakerRegistration::new(),
            })),
        }
    }

    /// Binary semaphore; `taken` starts it with no permit available.
    pub const fn binary(taken: bool) -> Self {
        Self::new(if taken { 0 } else { 1 }, 1)
    }

    /// Release one permit and wake waiters. Safe from interrupt context.
    ///
    /// Returns `false` when the count was already at its maximum.
    pub fn signal(&self) -> bool {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            let changed = state.count < state.max;
            if changed {
                state.count = state.count.saturating_add(1);
            }
            state.waiters.wake();
            changed
        })
    }

    /// Take a permit if one is available, without waiting.
    pub fn try_wait(&self) -> bool {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            if state.count > 0 {
                state.count = state.count.saturating_sub(1);
                true
            } else {
                false
            }
        })
    }

    /// Wait until a permit is available and take it.
    pub async fn wait(&self) {
        poll_fn(|cx| {
            self.state.lock(|cell| {
                let mut state = cell.borrow_mut();
                if state.count > 0 {
                    state.count = state.count.saturating_sub(1);
                    Poll::Ready(())
                } else {
                    state.waiters.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await;
    }

    /// Spin until a permit is available and take it.
    ///
    /// Foreground only: calling this from an ISR that the signaller cannot
    /// preempt never returns.
    pub fn wait_blocking(&self) {
        embassy_futures::block_on(self.wait());
    }

    /// Permits currently available.
    pub fn count(&self) -> u32 {
        self.state.lock(|cell| cell.borrow().count)
    }

    /// Upper bound on the count.
    pub fn max(&self) -> u32 {
        self.state.lock(|cell| cell.borrow().max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_clamped_to_max() {
        let sem: Semaphore<1> = Semaphore::new(5, 2);
        assert_eq!(sem.count(), 2);
        assert_eq!(sem.max(), 2);
    }

    #[test]
    fn test_binary_taken_has_no_permit() {
        let sem: Semaphore<1> = Semaphore::binary(true);
        assert!(!sem.try_wait());
        assert!(sem.signal());
        assert!(sem.try_wait());
    }

    #[test]
    fn test_signal_saturates_at_max() {
        let sem: Semaphore<1> = Semaphore::binary(false);
        assert!(!sem.signal(), "signal at max must report no change");
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn test_try_wait_consumes_permits() {
        let sem: Semaphore<1> = Semaphore::new(2, 4);
        assert!(sem.try_wait());
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
        assert_eq!(sem.count(), 0);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_with_permit() {
        let sem: Semaphore<2> = Semaphore::new(1, 1);
        sem.wait().await;
        assert_eq!(sem.count(), 0);
    }

    #[test]
    fn test_wait_blocking_with_permit() {
        let sem: Semaphore<1> = Semaphore::new(1, 1);
        sem.wait_blocking();
        assert_eq!(sem.count(), 0);
    }
}
