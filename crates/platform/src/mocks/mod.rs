//! Mock implementations for testing
//!
//! In-memory register block standing in for a peripheral's MMIO window.
//! Drivers in `hal` wrap it to add hardware reactions (ready bits, status
//! flags) for their own host tests. Always available (no_std-compatible) so
//! integration tests in other crates can use it without a feature flag.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::register::RegisterBlock;

/// Depth of the recorded write log; older writes are still counted.
pub const WRITE_LOG_DEPTH: usize = 128;

struct State<const N: usize> {
    words: [u32; N],
    log: heapless::Vec<(usize, u32), WRITE_LOG_DEPTH>,
    write_count: usize,
}

/// Mock register block of `N` 32-bit registers
///
/// Offsets are byte offsets (`0x00`, `0x04`, ...). Reads of an offset outside
/// the block return 0 and writes to it are recorded but otherwise dropped.
pub struct MockRegisterBlock<const N: usize> {
    state: Mutex<RefCell<State<N>>>,
}

impl<const N: usize> MockRegisterBlock<N> {
    /// All registers zero, empty write log
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                words: [0; N],
                log: heapless::Vec::new(),
                write_count: 0,
            })),
        }
    }

    /// Block with the given `(offset, value)` pairs preloaded (reset values)
    pub fn with_values(values: &[(usize, u32)]) -> Self {
        let block = Self::new();
        for &(offset, value) in values {
            block.poke(offset, value);
        }
        block
    }

    /// Read a register without going through the driver path
    pub fn peek(&self, offset: usize) -> u32 {
        critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            word_index(offset)
                .and_then(|i| state.words.get(i).copied())
                .unwrap_or(0)
        })
    }

    /// Change a register as the hardware would; not logged as a write
    pub fn poke(&self, offset: usize, value: u32) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if let Some(word) = word_index(offset).and_then(|i| state.words.get_mut(i)) {
                *word = value;
            }
        });
    }

    /// Set or clear bits as the hardware would; not logged as a write
    pub fn poke_bits(&self, offset: usize, mask: u32, set: bool) {
        let current = self.peek(offset);
        let next = if set { current | mask } else { current & !mask };
        self.poke(offset, next);
    }

    /// Number of driver writes since construction or the last [`Self::clear_log`]
    pub fn write_count(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).write_count)
    }

    /// Most recent driver writes, oldest first
    pub fn writes(&self) -> heapless::Vec<(usize, u32), WRITE_LOG_DEPTH> {
        critical_section::with(|cs| self.state.borrow_ref(cs).log.clone())
    }

    /// Driver writes that targeted `offset`, oldest first
    pub fn writes_to(&self, offset: usize) -> heapless::Vec<u32, WRITE_LOG_DEPTH> {
        self.writes()
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Forget recorded writes
    pub fn clear_log(&self) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.log.clear();
            state.write_count = 0;
        });
    }
}

impl<const N: usize> Default for MockRegisterBlock<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RegisterBlock for MockRegisterBlock<N> {
    fn read(&self, offset: usize) -> u32 {
        self.peek(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if let Some(word) = word_index(offset).and_then(|i| state.words.get_mut(i)) {
                *word = value;
            }
            if state.log.is_full() {
                state.log.remove(0);
            }
            // Capacity was just ensured above.
            let _ = state.log.push((offset, value));
            state.write_count = state.write_count.saturating_add(1);
        });
    }
}

fn word_index(offset: usize) -> Option<usize> {
    match offset.checked_rem(4) {
        Some(0) => offset.checked_div(4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poke_is_not_a_write() {
        let regs = MockRegisterBlock::<2>::new();
        regs.poke(0x04, 0xDEAD_BEEF);
        assert_eq!(regs.read(0x04), 0xDEAD_BEEF);
        assert_eq!(regs.write_count(), 0, "hardware-side changes must not be logged");
    }

    #[test]
    fn test_writes_are_logged_in_order() {
        let regs = MockRegisterBlock::<2>::new();
        regs.write(0x00, 1);
        regs.write(0x04, 2);
        regs.write(0x00, 3);
        assert_eq!(regs.writes().as_slice(), &[(0x00, 1), (0x04, 2), (0x00, 3)]);
        assert_eq!(regs.writes_to(0x00).as_slice(), &[1, 3]);
    }

    #[test]
    fn test_out_of_range_offset_reads_zero() {
        let regs = MockRegisterBlock::<1>::new();
        regs.write(0x40, 0xFFFF_FFFF);
        assert_eq!(regs.read(0x40), 0);
        assert_eq!(regs.read(0x02), 0, "unaligned offsets are not registers");
        assert_eq!(regs.write_count(), 1);
    }

    #[test]
    fn test_modify_uses_one_write() {
        let regs = MockRegisterBlock::<1>::with_values(&[(0x00, 0b1010)]);
        regs.modify(0x00, |v| v | 0b0001);
        assert_eq!(regs.peek(0x00), 0b1011);
        assert_eq!(regs.write_count(), 1);
    }

    #[test]
    fn test_log_keeps_newest_when_full() {
        let regs = MockRegisterBlock::<1>::new();
        for i in 0..(WRITE_LOG_DEPTH as u32 + 5) {
            regs.write(0x00, i);
        }
        assert_eq!(regs.write_count(), WRITE_LOG_DEPTH + 5);
        assert_eq!(regs.writes().first().map(|w| w.1), Some(5));
    }
}
