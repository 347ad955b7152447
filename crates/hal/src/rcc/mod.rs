//! Reset and clock control (RCC) driver for STM32F4.
//!
//! [`ClockTree`] owns the RCC register block and keeps a cached
//! [`ClockConfiguration`] that is recomputed eagerly on every mutating call,
//! so [`ClockTree::get_clock_speed`] is a field read and never stale.
//!
//! # Sequencing rules
//!
//! - `RCC_PLLCFGR` is only written with `PLLON` cleared, and never while the
//!   PLL drives SYSCLK ([`ClockError::SourceBusy`]).
//! - PLL parameters are validated before any register write; a rejected call
//!   leaves registers and cache untouched.
//! - A source switch first turns the oscillator on and polls its ready bit
//!   with a bounded [`DelayNs`] loop, then writes `SW` and waits for `SWS`.
//!   On timeout nothing is switched.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut clocks = ClockTree::new(rcc, delay, RccConfig::default());
//! clocks.configure_apb1_clock(ApbPrescaler::Div2);
//! clocks.configure_main_pll(PllSource::Hsi, 16_000_000, 16, 336, PllOutputPrescaler::Div4, 7)?;
//! clocks.set_system_clock_source(SystemClockSource::Pll)?;
//! assert_eq!(clocks.get_clock_speed(Bus::Ahb1), 84_000_000);
//! ```

pub mod mock;
pub mod registers;

use embedded_hal::delay::DelayNs;
use platform::clock_config::{
    AhbPrescaler, ApbPrescaler, Bus, ClockConfiguration, Oscillator, PllConfigError,
    PllFrequencies, PllOutputPrescaler, PllParameters, PllSource, SystemClockSource,
    HSI_FREQUENCY_HZ,
};
use platform::register::BitRange;
use platform::{RegisterBlock, RegisterView};
use thiserror_no_std::Error;

use crate::config::{DEFAULT_READY_TIMEOUT_US, READY_POLL_INTERVAL_US, SWITCH_POLL_LIMIT};

pub use registers::{
    Ahb1Clock, Ahb2Clock, Ahb3Clock, AhbClock, Apb1Clock, Apb2Clock, ApbClock, PeripheralClock,
    RccControl,
};
use registers::{oscillator_fields, ClockConfig, PllConfig};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Clock tree configuration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// PLL parameters rejected; nothing was written.
    #[error("invalid PLL configuration: {0}")]
    InvalidPllConfiguration(#[from] PllConfigError),
    /// The oscillator or PLL currently drives SYSCLK.
    #[error("clock source is driving the system clock")]
    SourceBusy,
    /// Ready bit did not assert within the configured timeout.
    #[error("{0:?} did not become ready")]
    SourceNotReady(Oscillator),
    /// Switching to the PLL before [`ClockTree::configure_main_pll`].
    #[error("main PLL has not been configured")]
    PllNotConfigured,
    /// Switching to HSE with no crystal frequency in [`RccConfig`].
    #[error("HSE frequency not configured")]
    HseFrequencyUnknown,
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Board-level RCC settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RccConfig {
    /// Frequency of the HSE crystal or bypass clock, if one is fitted (Hz).
    pub hse_frequency: Option<u32>,
    /// Bound on each oscillator ready poll (µs).
    pub ready_timeout_us: u32,
}

impl Default for RccConfig {
    fn default() -> Self {
        Self {
            hse_frequency: None,
            ready_timeout_us: DEFAULT_READY_TIMEOUT_US,
        }
    }
}

// ─── Driver ──────────────────────────────────────────────────────────────────

/// Clock tree driver with cached bus frequencies.
pub struct ClockTree<R, D> {
    registers: R,
    delay: D,
    config: RccConfig,
    clocks: ClockConfiguration,
    source: SystemClockSource,
    pll: Option<(PllParameters, PllFrequencies)>,
}

impl<R: RegisterBlock, D: DelayNs> ClockTree<R, D> {
    /// Take ownership of the RCC block.
    ///
    /// The cache starts at reset defaults (HSI, all prescalers undivided);
    /// nothing is read from or written to hardware.
    pub fn new(registers: R, delay: D, config: RccConfig) -> Self {
        Self {
            registers,
            delay,
            config,
            clocks: ClockConfiguration::RESET,
            source: SystemClockSource::Hsi,
            pll: None,
        }
    }

    /// Give back the register block and delay provider.
    pub fn release(self) -> (R, D) {
        (self.registers, self.delay)
    }

    // ── Raw control register ────────────────────────────────────────────────

    /// Read one `RCC_CR` field.
    pub fn get_control_register(&self, field: RccControl) -> u32 {
        self.registers.read_field(field)
    }

    /// Write one `RCC_CR` field.
    ///
    /// Raw passthrough: the frequency cache is not updated, so prefer the
    /// oscillator methods for anything that affects SYSCLK.
    pub fn set_control_register(&self, field: RccControl, value: u32) {
        self.registers.write_field(field, value);
    }

    // ── Oscillators ─────────────────────────────────────────────────────────

    /// Switch an oscillator on and wait until it reports ready.
    pub fn enable_oscillator(&mut self, oscillator: Oscillator) -> Result<(), ClockError> {
        if oscillator == Oscillator::Pll && self.pll.is_none() {
            return Err(ClockError::PllNotConfigured);
        }
        self.ensure_running(oscillator)
    }

    /// Switch an oscillator off.
    ///
    /// Fails with [`ClockError::SourceBusy`] when it drives SYSCLK, directly or
    /// as the input of the PLL that does.
    pub fn disable_oscillator(&mut self, oscillator: Oscillator) -> Result<(), ClockError> {
        if self.is_in_use(oscillator) {
            return Err(ClockError::SourceBusy);
        }
        let (on, _) = oscillator_fields(oscillator);
        self.registers.clear(on);
        #[cfg(feature = "defmt")]
        defmt::debug!("RCC: {} off", oscillator);
        Ok(())
    }

    // ── Main PLL ────────────────────────────────────────────────────────────

    /// Validate and program the main PLL.
    ///
    /// Sequence: clear `PLLON`, wait for `PLLRDY` to drop, write
    /// M/N/P/source/Q in a single `PLLCFGR` write, set `PLLON`. Lock is
    /// awaited by the later source switch. If the PLL does not unlock in
    /// time `PLLCFGR` is left alone and `PLLON` restored.
    pub fn configure_main_pll(
        &mut self,
        source: PllSource,
        input_frequency: u32,
        m: u8,
        n: u16,
        p: PllOutputPrescaler,
        q: u8,
    ) -> Result<PllFrequencies, ClockError> {
        if self.source == SystemClockSource::Pll {
            return Err(ClockError::SourceBusy);
        }
        let params = PllParameters {
            source,
            input_frequency,
            m,
            n,
            p,
            q,
        };
        let freqs = self.validate_pll(&params)?;

        let was_on = self.registers.is_set(RccControl::PllOn);
        self.registers.clear(RccControl::PllOn);
        if !self.wait_for(RccControl::PllReady, false) {
            if was_on {
                self.registers.set(RccControl::PllOn);
            }
            #[cfg(feature = "defmt")]
            defmt::warn!("RCC: PLL still locked, PLLCFGR not written");
            return Err(ClockError::SourceNotReady(Oscillator::Pll));
        }
        self.registers.write_fields(&[
            (PllConfig::M, u32::from(m)),
            (PllConfig::N, u32::from(n)),
            (PllConfig::P, p.code()),
            (PllConfig::Source, source.code()),
            (PllConfig::Q, u32::from(q)),
        ]);
        self.registers.set(RccControl::PllOn);

        self.pll = Some((params, freqs));
        #[cfg(feature = "defmt")]
        defmt::info!(
            "RCC: PLL {} / {} * {} / {} = {=u32} Hz",
            source,
            m,
            n,
            p.divisor(),
            freqs.output
        );
        Ok(freqs)
    }

    /// Check `params` without touching hardware.
    ///
    /// On top of the range checks the input frequency must be what the
    /// selected oscillator produces: 16 MHz for HSI, the configured crystal
    /// for HSE.
    pub fn validate_pll(&self, params: &PllParameters) -> Result<PllFrequencies, ClockError> {
        let expected = match params.source {
            PllSource::Hsi => HSI_FREQUENCY_HZ,
            PllSource::Hse => self
                .config
                .hse_frequency
                .ok_or(ClockError::HseFrequencyUnknown)?,
        };
        if params.input_frequency != expected {
            return Err(PllConfigError::InputFrequencyMismatch(params.input_frequency).into());
        }
        Ok(params.validate()?)
    }

    // ── System clock mux ────────────────────────────────────────────────────

    /// Make `source` drive SYSCLK and recompute every bus frequency.
    ///
    /// Switching to the active source is a no-op.
    pub fn set_system_clock_source(&mut self, source: SystemClockSource) -> Result<(), ClockError> {
        if source == self.source {
            return Ok(());
        }
        let frequency = self.source_frequency(source)?;

        if let (SystemClockSource::Pll, Some((params, _))) = (source, self.pll) {
            self.ensure_running(params.source.oscillator())?;
        }
        self.ensure_running(source.oscillator())?;

        self.registers
            .write_field(ClockConfig::SystemClockSwitch, source.code());
        if !self.wait_for_switch(source) {
            self.registers
                .write_field(ClockConfig::SystemClockSwitch, self.source.code());
            #[cfg(feature = "defmt")]
            defmt::warn!("RCC: SWS did not follow SW for {}", source);
            return Err(ClockError::SourceNotReady(source.oscillator()));
        }

        self.source = source;
        self.recompute(frequency);
        #[cfg(feature = "defmt")]
        defmt::info!("RCC: SYSCLK <- {} ({=u32} Hz)", source, frequency);
        Ok(())
    }

    // ── Bus prescalers ──────────────────────────────────────────────────────

    /// Program `HPRE`; AHB and both APB buses are recomputed.
    pub fn configure_ahb_clock(&mut self, prescaler: AhbPrescaler) {
        self.registers
            .write_field(ClockConfig::AhbPrescaler, prescaler.code());
        self.clocks = ClockConfiguration::derive(
            self.clocks.system_clock,
            prescaler,
            self.clocks.apb1_prescaler,
            self.clocks.apb2_prescaler,
        );
    }

    /// Program `PPRE1`. APB1 must stay at or below 42 MHz on F40x/F41x.
    pub fn configure_apb1_clock(&mut self, prescaler: ApbPrescaler) {
        self.registers
            .write_field(ClockConfig::Apb1Prescaler, prescaler.code());
        self.clocks = ClockConfiguration::derive(
            self.clocks.system_clock,
            self.clocks.ahb_prescaler,
            prescaler,
            self.clocks.apb2_prescaler,
        );
    }

    /// Program `PPRE2`.
    ///
    /// APB2 >= APB1 is not enforced; keeping the high-speed bus at least as
    /// fast is the caller's responsibility.
    pub fn configure_apb2_clock(&mut self, prescaler: ApbPrescaler) {
        self.registers
            .write_field(ClockConfig::Apb2Prescaler, prescaler.code());
        self.clocks = ClockConfiguration::derive(
            self.clocks.system_clock,
            self.clocks.ahb_prescaler,
            self.clocks.apb1_prescaler,
            prescaler,
        );
    }

    // ── Peripheral clock gates ──────────────────────────────────────────────

    /// Gate an AHB peripheral clock.
    pub fn set_ahb_clock(&self, clock: AhbClock, enable: bool) {
        self.set_peripheral_clock(clock.into(), enable);
    }

    /// Gate an APB peripheral clock.
    pub fn set_apb_clock(&self, clock: ApbClock, enable: bool) {
        self.set_peripheral_clock(clock.into(), enable);
    }

    /// Set or clear one enable bit; a gate already in the requested state is
    /// left alone (no write).
    pub fn set_peripheral_clock(&self, clock: PeripheralClock, enable: bool) {
        if self.is_peripheral_clock_enabled(clock) == enable {
            return;
        }
        let bit = BitRange::bit(clock.bit());
        self.registers
            .modify(clock.register(), |value| bit.insert(value, u32::from(enable)));
    }

    /// `true` when the gate's enable bit is set.
    pub fn is_peripheral_clock_enabled(&self, clock: PeripheralClock) -> bool {
        BitRange::bit(clock.bit()).extract(self.registers.read(clock.register())) != 0
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Cached frequency of `bus` (Hz).
    pub fn get_clock_speed(&self, bus: Bus) -> u32 {
        self.clocks.speed(bus)
    }

    /// Timer kernel clock on `bus` (Hz).
    pub fn timer_clock_speed(&self, bus: Bus) -> u32 {
        self.clocks.timer_speed(bus)
    }

    /// Snapshot of every derived frequency and applied prescaler.
    pub fn clock_configuration(&self) -> ClockConfiguration {
        self.clocks
    }

    /// Oscillator currently driving SYSCLK.
    pub fn system_clock_source(&self) -> SystemClockSource {
        self.source
    }

    /// PLLCLK of the configured main PLL (Hz).
    pub fn pll_frequency(&self) -> Option<u32> {
        self.pll.map(|(_, freqs)| freqs.output)
    }

    /// PLL48CK of the configured main PLL (Hz).
    pub fn pll48_frequency(&self) -> Option<u32> {
        self.pll.map(|(_, freqs)| freqs.pll48)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn source_frequency(&self, source: SystemClockSource) -> Result<u32, ClockError> {
        match source {
            SystemClockSource::Hsi => Ok(HSI_FREQUENCY_HZ),
            SystemClockSource::Hse => self
                .config
                .hse_frequency
                .ok_or(ClockError::HseFrequencyUnknown),
            SystemClockSource::Pll => self
                .pll
                .map(|(_, freqs)| freqs.output)
                .ok_or(ClockError::PllNotConfigured),
        }
    }

    fn is_in_use(&self, oscillator: Oscillator) -> bool {
        if self.source.oscillator() == oscillator {
            return true;
        }
        match (self.source, self.pll) {
            (SystemClockSource::Pll, Some((params, _))) => params.source.oscillator() == oscillator,
            _ => false,
        }
    }

    fn ensure_running(&mut self, oscillator: Oscillator) -> Result<(), ClockError> {
        let (on, ready) = oscillator_fields(oscillator);
        if !self.registers.is_set(on) {
            self.registers.set(on);
        }
        if self.wait_for(ready, true) {
            Ok(())
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "RCC: {} not ready after {=u32} us",
                oscillator,
                self.config.ready_timeout_us
            );
            Err(ClockError::SourceNotReady(oscillator))
        }
    }

    /// Poll `field` until it reads `expected` or the ready timeout elapses.
    fn wait_for(&mut self, field: RccControl, expected: bool) -> bool {
        let mut waited_us = 0u32;
        loop {
            if self.registers.is_set(field) == expected {
                return true;
            }
            if waited_us >= self.config.ready_timeout_us {
                return false;
            }
            self.delay.delay_us(READY_POLL_INTERVAL_US);
            waited_us = waited_us.saturating_add(READY_POLL_INTERVAL_US);
        }
    }

    fn wait_for_switch(&mut self, source: SystemClockSource) -> bool {
        for _ in 0..SWITCH_POLL_LIMIT {
            if self.registers.read_field(ClockConfig::SystemClockStatus) == source.code() {
                return true;
            }
            self.delay.delay_us(READY_POLL_INTERVAL_US);
        }
        false
    }

    fn recompute(&mut self, system_clock: u32) {
        self.clocks = ClockConfiguration::derive(
            system_clock,
            self.clocks.ahb_prescaler,
            self.clocks.apb1_prescaler,
            self.clocks.apb2_prescaler,
        );
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use platform::clock_config::Bus;

    use super::mock::MockRcc;
    use platform::RegisterField;

    use super::registers::{APB1ENR, CFGR, PLLCFGR};
    use super::*;

    fn tree(rcc: &MockRcc) -> ClockTree<&MockRcc, NoopDelay> {
        ClockTree::new(rcc, NoopDelay::new(), RccConfig::default())
    }

    #[test]
    fn test_new_reports_reset_defaults() {
        let rcc = MockRcc::new();
        let clocks = tree(&rcc);
        assert_eq!(clocks.get_clock_speed(Bus::Ahb1), 16_000_000);
        assert_eq!(clocks.system_clock_source(), SystemClockSource::Hsi);
        assert_eq!(rcc.write_count(), 0, "construction must not touch hardware");
    }

    #[test]
    fn test_pll_fields_written_in_one_pllcfgr_write() {
        let rcc = MockRcc::new();
        let mut clocks = tree(&rcc);
        clocks
            .configure_main_pll(PllSource::Hsi, 16_000_000, 16, 336, PllOutputPrescaler::Div4, 7)
            .unwrap();
        let writes = rcc.registers().writes_to(PLLCFGR);
        assert_eq!(writes.len(), 1, "PLLCFGR must be written exactly once");
        let value = rcc.peek(PLLCFGR);
        assert_eq!(PllConfig::M.bits().extract(value), 16);
        assert_eq!(PllConfig::N.bits().extract(value), 336);
        assert_eq!(PllConfig::P.bits().extract(value), 0b01);
        assert_eq!(PllConfig::Q.bits().extract(value), 7);
        assert!(clocks.get_control_register(RccControl::PllOn) != 0);
    }

    #[test]
    fn test_prescaler_codes_land_in_cfgr() {
        let rcc = MockRcc::new();
        let mut clocks = tree(&rcc);
        clocks.configure_ahb_clock(AhbPrescaler::Div2);
        clocks.configure_apb1_clock(ApbPrescaler::Div4);
        clocks.configure_apb2_clock(ApbPrescaler::Div2);
        let cfgr = rcc.peek(CFGR);
        assert_eq!(ClockConfig::AhbPrescaler.bits().extract(cfgr), 0b1000);
        assert_eq!(ClockConfig::Apb1Prescaler.bits().extract(cfgr), 0b101);
        assert_eq!(ClockConfig::Apb2Prescaler.bits().extract(cfgr), 0b100);
        assert_eq!(clocks.get_clock_speed(Bus::Ahb1), 8_000_000);
        assert_eq!(clocks.get_clock_speed(Bus::Apb1), 2_000_000, "APB1 derives from AHB");
        assert_eq!(clocks.get_clock_speed(Bus::Apb2), 4_000_000);
    }

    #[test]
    fn test_enable_pll_before_configure_fails() {
        let rcc = MockRcc::new();
        let mut clocks = tree(&rcc);
        assert_eq!(
            clocks.enable_oscillator(Oscillator::Pll),
            Err(ClockError::PllNotConfigured)
        );
    }

    #[test]
    fn test_disable_active_source_is_busy() {
        let rcc = MockRcc::new();
        let mut clocks = tree(&rcc);
        assert_eq!(
            clocks.disable_oscillator(Oscillator::Hsi),
            Err(ClockError::SourceBusy)
        );
        assert!(clocks.get_control_register(RccControl::HsiOn) != 0);
    }

    #[test]
    fn test_gate_toggle_touches_only_its_bit() {
        let rcc = MockRcc::new();
        let clocks = tree(&rcc);
        clocks.set_apb_clock(ApbClock::Apb1(Apb1Clock::Spi2), true);
        clocks.set_apb_clock(ApbClock::Apb1(Apb1Clock::Usart2), true);
        clocks.set_apb_clock(ApbClock::Apb1(Apb1Clock::Spi2), false);
        assert_eq!(rcc.peek(APB1ENR), 1 << 17);
    }

    #[test]
    fn test_set_control_register_passthrough() {
        let rcc = MockRcc::new();
        let clocks = tree(&rcc);
        clocks.set_control_register(RccControl::HsiTrim, 0x12);
        assert_eq!(clocks.get_control_register(RccControl::HsiTrim), 0x12);
    }
}
