//! Mock RCC for host-side testing
//!
//! Wraps [`MockRegisterBlock`] and reacts to writes the way the silicon does:
//! an oscillator's ready bit follows its on bit, and `SWS` follows `SW` once
//! the selected oscillator is ready. Oscillators can be stalled to exercise
//! the not-ready timeout path, or latched to exercise an oscillator that will
//! not unlock.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use platform::clock_config::{Oscillator, SystemClockSource};
use platform::mocks::MockRegisterBlock;
use platform::{RegisterBlock, RegisterField};

use super::registers::{
    oscillator_fields, ClockConfig, CFGR, CR, CR_RESET, PLLCFGR, PLLCFGR_RESET, WORDS,
};

const OSCILLATORS: [Oscillator; 4] = [
    Oscillator::Hsi,
    Oscillator::Hse,
    Oscillator::Pll,
    Oscillator::PllI2s,
];

/// Mock RCC: reactive register block that records every write.
pub struct MockRcc {
    registers: MockRegisterBlock<WORDS>,
    stalled: AtomicU8,
    latched: AtomicU8,
    switch_stuck: AtomicBool,
}

impl MockRcc {
    /// RCC in its reset state: HSI on, ready and selected.
    pub fn new() -> Self {
        Self {
            registers: MockRegisterBlock::with_values(&[(CR, CR_RESET), (PLLCFGR, PLLCFGR_RESET)]),
            stalled: AtomicU8::new(0),
            latched: AtomicU8::new(0),
            switch_stuck: AtomicBool::new(false),
        }
    }

    /// Keep `oscillator`'s ready bit low even when it is switched on.
    pub fn stall(&self, oscillator: Oscillator) {
        self.stalled.fetch_or(osc_mask(oscillator), Ordering::SeqCst);
        self.settle();
    }

    /// Let a stalled oscillator report ready again.
    pub fn release(&self, oscillator: Oscillator) {
        self.stalled.fetch_and(!osc_mask(oscillator), Ordering::SeqCst);
        self.settle();
    }

    /// Keep `oscillator`'s ready bit high even when it is switched off.
    pub fn latch(&self, oscillator: Oscillator) {
        self.latched.fetch_or(osc_mask(oscillator), Ordering::SeqCst);
        self.settle();
    }

    /// Freeze `SWS` at its current value regardless of `SW`.
    pub fn stick_switch(&self, stuck: bool) {
        self.switch_stuck.store(stuck, Ordering::SeqCst);
    }

    /// Underlying register block (peek, write log).
    pub fn registers(&self) -> &MockRegisterBlock<WORDS> {
        &self.registers
    }

    /// Current raw value of the register at `offset`.
    pub fn peek(&self, offset: usize) -> u32 {
        self.registers.peek(offset)
    }

    /// Driver writes since construction or the last [`Self::clear_log`].
    pub fn write_count(&self) -> usize {
        self.registers.write_count()
    }

    /// Forget recorded writes.
    pub fn clear_log(&self) {
        self.registers.clear_log();
    }

    fn is_stalled(&self, oscillator: Oscillator) -> bool {
        self.stalled.load(Ordering::SeqCst) & osc_mask(oscillator) != 0
    }

    fn is_latched(&self, oscillator: Oscillator) -> bool {
        self.latched.load(Ordering::SeqCst) & osc_mask(oscillator) != 0
    }

    /// Apply hardware reactions to the current register contents.
    fn settle(&self) {
        let mut cr = self.registers.peek(CR);
        for osc in OSCILLATORS {
            let (on, ready) = oscillator_fields(osc);
            let running = (on.bits().extract(cr) != 0 && !self.is_stalled(osc))
                || self.is_latched(osc);
            cr = ready.bits().insert(cr, u32::from(running));
        }
        self.registers.poke(CR, cr);

        if self.switch_stuck.load(Ordering::SeqCst) {
            return;
        }
        let cfgr = self.registers.peek(CFGR);
        let requested = ClockConfig::SystemClockSwitch.bits().extract(cfgr);
        let Some(source) = SystemClockSource::from_code(requested) else {
            return;
        };
        let (_, ready) = oscillator_fields(source.oscillator());
        if ready.bits().extract(cr) != 0 {
            let cfgr = ClockConfig::SystemClockStatus.bits().insert(cfgr, requested);
            self.registers.poke(CFGR, cfgr);
        }
    }
}

impl Default for MockRcc {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBlock for MockRcc {
    fn read(&self, offset: usize) -> u32 {
        self.registers.read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        self.registers.write(offset, value);
        self.settle();
    }
}

fn osc_mask(oscillator: Oscillator) -> u8 {
    match oscillator {
        Oscillator::Hsi => 0b0001,
        Oscillator::Hse => 0b0010,
        Oscillator::Pll => 0b0100,
        Oscillator::PllI2s => 0b1000,
    }
}

/// Delay provider that only counts the time it was asked to wait.
///
/// Lets timeout tests assert the poll loop gave up after the configured bound
/// without sleeping.
#[derive(Debug, Default)]
pub struct TickDelay {
    elapsed_ns: u64,
    calls: usize,
}

impl TickDelay {
    /// Zero elapsed time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested delay (µs).
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns / 1_000
    }

    /// Number of delay calls.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl embedded_hal::delay::DelayNs for TickDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns = self.elapsed_ns.saturating_add(u64::from(ns));
        self.calls = self.calls.saturating_add(1);
    }
}
