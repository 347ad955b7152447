//! Mock SPI peripheral for host-side testing
//!
//! Records every byte written to `DR` and serves queued bytes on `DR` reads,
//! keeping `RXNE` in step with the queue. Status flags can be forced to
//! simulate overrun, mode fault or CRC errors. `SR` writes behave like the
//! silicon: only `CRCERR` is writable, and only to 0.

use core::cell::RefCell;

use critical_section::Mutex;
use platform::mocks::MockRegisterBlock;
use platform::{RegisterBlock, RegisterField};

use super::registers::{SpiStatus, DR, SR, SR_RESET, WORDS};

/// Bytes the mock can queue for reception or record as transmitted.
pub const MOCK_FIFO_DEPTH: usize = 256;

struct Wire {
    rx: heapless::Deque<u8, MOCK_FIFO_DEPTH>,
    tx: heapless::Vec<u8, MOCK_FIFO_DEPTH>,
    data_read: bool,
}

/// Mock SPI peripheral with a byte-level wire log.
pub struct MockSpi {
    registers: MockRegisterBlock<WORDS>,
    wire: Mutex<RefCell<Wire>>,
}

impl MockSpi {
    /// Idle peripheral: TXE set, nothing received.
    pub fn new() -> Self {
        Self {
            registers: MockRegisterBlock::with_values(&[(SR, SR_RESET)]),
            wire: Mutex::new(RefCell::new(Wire {
                rx: heapless::Deque::new(),
                tx: heapless::Vec::new(),
                data_read: false,
            })),
        }
    }

    /// Queue `bytes` as if clocked in from the bus; sets `RXNE`.
    ///
    /// Bytes beyond [`MOCK_FIFO_DEPTH`] are dropped.
    pub fn feed(&self, bytes: &[u8]) {
        critical_section::with(|cs| {
            let mut wire = self.wire.borrow_ref_mut(cs);
            for &b in bytes {
                let _ = wire.rx.push_back(b);
            }
        });
        self.sync_rxne();
    }

    /// Bytes written to `DR` so far, oldest first.
    pub fn transmitted(&self) -> heapless::Vec<u8, MOCK_FIFO_DEPTH> {
        critical_section::with(|cs| self.wire.borrow_ref(cs).tx.clone())
    }

    /// Force a status flag as the hardware would.
    pub fn set_status(&self, flag: SpiStatus, set: bool) {
        self.registers.poke_bits(SR, flag.bits().mask(), set);
    }

    /// Underlying register block (peek, write log).
    pub fn registers(&self) -> &MockRegisterBlock<WORDS> {
        &self.registers
    }

    /// Current raw value of the register at `offset`.
    pub fn peek(&self, offset: usize) -> u32 {
        self.registers.peek(offset)
    }

    fn sync_rxne(&self) {
        let pending = critical_section::with(|cs| !self.wire.borrow_ref(cs).rx.is_empty());
        self.set_status(SpiStatus::ReceiveNotEmpty, pending);
    }
}

impl Default for MockSpi {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBlock for MockSpi {
    fn read(&self, offset: usize) -> u32 {
        match offset {
            DR => {
                let byte = critical_section::with(|cs| {
                    let mut wire = self.wire.borrow_ref_mut(cs);
                    wire.data_read = true;
                    wire.rx.pop_front()
                });
                self.sync_rxne();
                byte.map_or(0, u32::from)
            }
            SR => {
                let clear_overrun = critical_section::with(|cs| {
                    let mut wire = self.wire.borrow_ref_mut(cs);
                    core::mem::replace(&mut wire.data_read, false)
                });
                let status = self.registers.peek(SR);
                if clear_overrun {
                    // DR read followed by SR read clears OVR.
                    self.set_status(SpiStatus::Overrun, false);
                }
                status
            }
            _ => self.registers.read(offset),
        }
    }

    fn write(&self, offset: usize, value: u32) {
        if offset == SR {
            let crc = SpiStatus::CrcError.bits();
            let mut status = self.registers.peek(SR);
            if crc.extract(value) == 0 {
                status = crc.insert(status, 0);
            }
            self.registers.write(SR, status);
            return;
        }
        if offset == DR {
            critical_section::with(|cs| {
                let mut wire = self.wire.borrow_ref_mut(cs);
                #[allow(clippy::cast_possible_truncation)] // 8-bit frames
                let _ = wire.tx.push(value as u8);
            });
        }
        self.registers.write(offset, value);
    }
}
