//! Clock-domain value types and main-PLL arithmetic for STM32F4-class RCC.
//!
//! Everything here is pure data: oscillator and mux selections, prescaler
//! codes as they appear in `RCC_CFGR`/`RCC_PLLCFGR`, and the frequency math the
//! clock tree caches. Nothing in this module touches a register, so the whole
//! clock plan can be validated on the host.
//!
//! # Clock tree
//!
//! ```text
//!   HSI (16 MHz) ─┬──────────────────────────────┐
//!                 │                              ├─ SW ─► SYSCLK ─► HPRE ─► AHB1/2/3
//!   HSE (4-26 MHz)┴─ PLLSRC ─► /M ─► xN ─► /P ───┘                     │
//!                                       └─► /Q ─► PLL48CK (USB/SDIO)   ├─► PPRE1 ─► APB1
//!                                                                      └─► PPRE2 ─► APB2
//! ```
//!
//! # PLL formula
//!
//!   VCO_INPUT  = f_in / M          (1-2 MHz)
//!   VCO_OUTPUT = VCO_INPUT x N     (100-432 MHz)
//!   PLLCLK     = VCO_OUTPUT / P    (<= 180 MHz)
//!   PLL48CK    = VCO_OUTPUT / Q
//!
//! Evaluated left to right in integer arithmetic, exactly `f_in / M * N / P`,
//! so the cached frequency matches what firmware on the part reports.
//!
//! References:
//! - STM32F4 RM0090 Rev 19, S6.3.2 (RCC_PLLCFGR), S6.3.3 (RCC_CFGR)
//! - STM32F446 datasheet, Table 17 (main PLL characteristics)

use thiserror_no_std::Error;

// ── Limits ───────────────────────────────────────────────────────────────────

/// HSI RC oscillator frequency (Hz). System clock source out of reset.
pub const HSI_FREQUENCY_HZ: u32 = 16_000_000;

/// Valid PLLM input divider values.
pub const PLL_M_RANGE: core::ops::RangeInclusive<u8> = 2..=63;

/// Valid PLLN multiplier values.
pub const PLL_N_RANGE: core::ops::RangeInclusive<u16> = 50..=432;

/// Valid PLLQ divider values.
pub const PLL_Q_RANGE: core::ops::RangeInclusive<u8> = 2..=15;

/// VCO input window (Hz). 2 MHz is recommended to limit PLL jitter.
pub const VCO_INPUT_RANGE_HZ: core::ops::RangeInclusive<u32> = 1_000_000..=2_000_000;

/// VCO output window (Hz).
pub const VCO_OUTPUT_RANGE_HZ: core::ops::RangeInclusive<u32> = 100_000_000..=432_000_000;

/// System clock ceiling across the family (Hz).
pub const SYSCLK_MAX_HZ: u32 = 180_000_000;

// ── Sources ──────────────────────────────────────────────────────────────────

/// Oscillators with an on/ready pair in `RCC_CR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oscillator {
    /// Internal 16 MHz RC oscillator.
    Hsi,
    /// External crystal or clock input.
    Hse,
    /// Main PLL.
    Pll,
    /// Audio PLL feeding the I2S kernel clock.
    PllI2s,
}

/// System clock mux selection (`RCC_CFGR.SW` / `SWS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemClockSource {
    /// HSI oscillator.
    Hsi,
    /// HSE oscillator.
    Hse,
    /// Main PLL output (PLLCLK, after /P).
    Pll,
}

impl SystemClockSource {
    /// Two-bit `SW` encoding.
    pub const fn code(self) -> u32 {
        match self {
            Self::Hsi => 0b00,
            Self::Hse => 0b01,
            Self::Pll => 0b10,
        }
    }

    /// Decode an `SWS` value. `0b11` is reserved and yields `None`.
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0b00 => Some(Self::Hsi),
            0b01 => Some(Self::Hse),
            0b10 => Some(Self::Pll),
            _ => None,
        }
    }

    /// Oscillator that must be ready before switching to this source.
    pub const fn oscillator(self) -> Oscillator {
        match self {
            Self::Hsi => Oscillator::Hsi,
            Self::Hse => Oscillator::Hse,
            Self::Pll => Oscillator::Pll,
        }
    }
}

/// Main PLL / PLLI2S input selection (`RCC_PLLCFGR.PLLSRC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllSource {
    /// HSI oscillator.
    Hsi,
    /// HSE oscillator.
    Hse,
}

impl PllSource {
    /// One-bit `PLLSRC` encoding.
    pub const fn code(self) -> u32 {
        match self {
            Self::Hsi => 0,
            Self::Hse => 1,
        }
    }

    /// Oscillator feeding the PLL.
    pub const fn oscillator(self) -> Oscillator {
        match self {
            Self::Hsi => Oscillator::Hsi,
            Self::Hse => Oscillator::Hse,
        }
    }
}

// ── Prescalers ───────────────────────────────────────────────────────────────

/// Main PLL output divider (`RCC_PLLCFGR.PLLP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllOutputPrescaler {
    /// PLLCLK = VCO / 2.
    Div2,
    /// PLLCLK = VCO / 4.
    Div4,
    /// PLLCLK = VCO / 6.
    Div6,
    /// PLLCLK = VCO / 8.
    Div8,
}

impl PllOutputPrescaler {
    /// Two-bit `PLLP` encoding.
    pub const fn code(self) -> u32 {
        match self {
            Self::Div2 => 0b00,
            Self::Div4 => 0b01,
            Self::Div6 => 0b10,
            Self::Div8 => 0b11,
        }
    }

    /// Division factor.
    pub const fn divisor(self) -> u32 {
        match self {
            Self::Div2 => 2,
            Self::Div4 => 4,
            Self::Div6 => 6,
            Self::Div8 => 8,
        }
    }

    /// Prescaler for a raw division factor; only 2, 4, 6 and 8 exist.
    pub const fn from_divisor(divisor: u32) -> Option<Self> {
        match divisor {
            2 => Some(Self::Div2),
            4 => Some(Self::Div4),
            6 => Some(Self::Div6),
            8 => Some(Self::Div8),
            _ => None,
        }
    }
}

/// AHB prescaler (`RCC_CFGR.HPRE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AhbPrescaler {
    /// SYSCLK not divided.
    #[default]
    None,
    /// SYSCLK / 2.
    Div2,
    /// SYSCLK / 4.
    Div4,
    /// SYSCLK / 8.
    Div8,
    /// SYSCLK / 16.
    Div16,
    /// SYSCLK / 64.
    Div64,
    /// SYSCLK / 128.
    Div128,
    /// SYSCLK / 256.
    Div256,
    /// SYSCLK / 512.
    Div512,
}

impl AhbPrescaler {
    /// Four-bit `HPRE` encoding.
    pub const fn code(self) -> u32 {
        match self {
            Self::None => 0b0000,
            Self::Div2 => 0b1000,
            Self::Div4 => 0b1001,
            Self::Div8 => 0b1010,
            Self::Div16 => 0b1011,
            Self::Div64 => 0b1100,
            Self::Div128 => 0b1101,
            Self::Div256 => 0b1110,
            Self::Div512 => 0b1111,
        }
    }

    /// Decode `HPRE`. Codes `0b0xxx` all mean "not divided".
    pub const fn from_code(code: u32) -> Self {
        match code & 0b1111 {
            0b1000 => Self::Div2,
            0b1001 => Self::Div4,
            0b1010 => Self::Div8,
            0b1011 => Self::Div16,
            0b1100 => Self::Div64,
            0b1101 => Self::Div128,
            0b1110 => Self::Div256,
            0b1111 => Self::Div512,
            _ => Self::None,
        }
    }

    /// Division factor.
    pub const fn divisor(self) -> u32 {
        match self {
            Self::None => 1,
            Self::Div2 => 2,
            Self::Div4 => 4,
            Self::Div8 => 8,
            Self::Div16 => 16,
            Self::Div64 => 64,
            Self::Div128 => 128,
            Self::Div256 => 256,
            Self::Div512 => 512,
        }
    }
}

/// APB1/APB2 prescaler (`RCC_CFGR.PPRE1` / `PPRE2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbPrescaler {
    /// HCLK not divided.
    #[default]
    None,
    /// HCLK / 2.
    Div2,
    /// HCLK / 4.
    Div4,
    /// HCLK / 8.
    Div8,
    /// HCLK / 16.
    Div16,
}

impl ApbPrescaler {
    /// Three-bit `PPREx` encoding.
    pub const fn code(self) -> u32 {
        match self {
            Self::None => 0b000,
            Self::Div2 => 0b100,
            Self::Div4 => 0b101,
            Self::Div8 => 0b110,
            Self::Div16 => 0b111,
        }
    }

    /// Decode `PPREx`. Codes `0b0xx` all mean "not divided".
    pub const fn from_code(code: u32) -> Self {
        match code & 0b111 {
            0b100 => Self::Div2,
            0b101 => Self::Div4,
            0b110 => Self::Div8,
            0b111 => Self::Div16,
            _ => Self::None,
        }
    }

    /// Division factor.
    pub const fn divisor(self) -> u32 {
        match self {
            Self::None => 1,
            Self::Div2 => 2,
            Self::Div4 => 4,
            Self::Div8 => 8,
            Self::Div16 => 16,
        }
    }
}

/// Bus domains whose frequency the clock tree caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bus {
    /// AHB1 (GPIO, DMA, CRC).
    Ahb1,
    /// AHB2 (USB OTG FS, RNG, DCMI).
    Ahb2,
    /// AHB3 (FMC, QUADSPI).
    Ahb3,
    /// APB1, low-speed peripheral bus (SPI2/3, I2C, USART2-5).
    Apb1,
    /// APB2, high-speed peripheral bus (SPI1/4, USART1/6, SDIO).
    Apb2,
}

// ── Derived configuration ────────────────────────────────────────────────────

/// Snapshot of the derived clock frequencies and the prescalers producing them.
///
/// Always consistent: `ahb = system_clock / ahb_prescaler` and
/// `apbN = ahb / apbN_prescaler`. Build it with [`ClockConfiguration::derive`]
/// rather than by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfiguration {
    /// SYSCLK (Hz).
    pub system_clock: u32,
    /// HCLK, shared by AHB1/2/3 (Hz).
    pub ahb: u32,
    /// PCLK1 (Hz).
    pub apb1: u32,
    /// PCLK2 (Hz).
    pub apb2: u32,
    /// Applied `HPRE`.
    pub ahb_prescaler: AhbPrescaler,
    /// Applied `PPRE1`.
    pub apb1_prescaler: ApbPrescaler,
    /// Applied `PPRE2`.
    pub apb2_prescaler: ApbPrescaler,
}

impl ClockConfiguration {
    /// Out-of-reset state: HSI drives everything undivided.
    pub const RESET: Self = Self::derive(
        HSI_FREQUENCY_HZ,
        AhbPrescaler::None,
        ApbPrescaler::None,
        ApbPrescaler::None,
    );

    /// Derive every bus frequency from SYSCLK and the three prescalers.
    pub const fn derive(
        system_clock: u32,
        ahb_prescaler: AhbPrescaler,
        apb1_prescaler: ApbPrescaler,
        apb2_prescaler: ApbPrescaler,
    ) -> Self {
        // Divisors are never zero.
        #[allow(clippy::arithmetic_side_effects)]
        let ahb = system_clock / ahb_prescaler.divisor();
        #[allow(clippy::arithmetic_side_effects)]
        let apb1 = ahb / apb1_prescaler.divisor();
        #[allow(clippy::arithmetic_side_effects)]
        let apb2 = ahb / apb2_prescaler.divisor();
        Self {
            system_clock,
            ahb,
            apb1,
            apb2,
            ahb_prescaler,
            apb1_prescaler,
            apb2_prescaler,
        }
    }

    /// Frequency of `bus` (Hz).
    pub const fn speed(&self, bus: Bus) -> u32 {
        match bus {
            Bus::Ahb1 | Bus::Ahb2 | Bus::Ahb3 => self.ahb,
            Bus::Apb1 => self.apb1,
            Bus::Apb2 => self.apb2,
        }
    }

    /// Timer kernel clock on `bus` (Hz).
    ///
    /// APB timers run at twice PCLK whenever their APB prescaler divides;
    /// AHB buses have no timers and report HCLK.
    pub const fn timer_speed(&self, bus: Bus) -> u32 {
        let prescaler = match bus {
            Bus::Apb1 => self.apb1_prescaler,
            Bus::Apb2 => self.apb2_prescaler,
            Bus::Ahb1 | Bus::Ahb2 | Bus::Ahb3 => return self.ahb,
        };
        let pclk = self.speed(bus);
        match prescaler {
            ApbPrescaler::None => pclk,
            _ => pclk.saturating_mul(2),
        }
    }
}

impl Default for ClockConfiguration {
    fn default() -> Self {
        Self::RESET
    }
}

// ── Main PLL ─────────────────────────────────────────────────────────────────

/// Which main-PLL check a parameter set failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllConfigError {
    /// PLLM outside 2..=63.
    #[error("PLLM {0} outside 2..=63")]
    InputDivider(u8),
    /// PLLN outside 50..=432.
    #[error("PLLN {0} outside 50..=432")]
    Multiplier(u16),
    /// PLLQ outside 2..=15.
    #[error("PLLQ {0} outside 2..=15")]
    UsbDivider(u8),
    /// Input frequency differs from what the selected oscillator runs at.
    #[error("PLL input {0} Hz does not match the selected oscillator")]
    InputFrequencyMismatch(u32),
    /// f_in / M outside 1-2 MHz.
    #[error("VCO input {0} Hz outside 1-2 MHz")]
    VcoInputOutOfRange(u32),
    /// f_in / M x N outside 100-432 MHz.
    #[error("VCO output {0} Hz outside 100-432 MHz")]
    VcoOutputOutOfRange(u32),
    /// PLLCLK above the system clock ceiling.
    #[error("PLL output {0} Hz exceeds 180 MHz")]
    OutputTooFast(u32),
}

/// Main PLL parameter set as written to `RCC_PLLCFGR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllParameters {
    /// Input mux.
    pub source: PllSource,
    /// Frequency of the selected input (Hz).
    pub input_frequency: u32,
    /// Input divider.
    pub m: u8,
    /// VCO multiplier.
    pub n: u16,
    /// System clock output divider.
    pub p: PllOutputPrescaler,
    /// USB/SDIO output divider.
    pub q: u8,
}

/// Frequencies produced by a validated [`PllParameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllFrequencies {
    /// f_in / M (Hz).
    pub vco_input: u32,
    /// VCO output (Hz).
    pub vco_output: u32,
    /// PLLCLK, the system clock candidate (Hz).
    pub output: u32,
    /// PLL48CK (Hz).
    pub pll48: u32,
}

impl PllParameters {
    /// Check every range and frequency window, returning the derived clocks.
    ///
    /// Divider ranges are checked before any frequency so that the error names
    /// the field the caller got wrong rather than a downstream symptom.
    pub fn validate(&self) -> Result<PllFrequencies, PllConfigError> {
        if !PLL_M_RANGE.contains(&self.m) {
            return Err(PllConfigError::InputDivider(self.m));
        }
        if !PLL_N_RANGE.contains(&self.n) {
            return Err(PllConfigError::Multiplier(self.n));
        }
        if !PLL_Q_RANGE.contains(&self.q) {
            return Err(PllConfigError::UsbDivider(self.q));
        }

        let vco_input = self
            .input_frequency
            .checked_div(u32::from(self.m))
            .ok_or(PllConfigError::InputDivider(self.m))?;
        if !VCO_INPUT_RANGE_HZ.contains(&vco_input) {
            return Err(PllConfigError::VcoInputOutOfRange(vco_input));
        }

        // vco_input <= 2 MHz and N <= 432, so this cannot overflow; keep it checked anyway.
        let vco_output = vco_input
            .checked_mul(u32::from(self.n))
            .ok_or(PllConfigError::VcoOutputOutOfRange(u32::MAX))?;
        if !VCO_OUTPUT_RANGE_HZ.contains(&vco_output) {
            return Err(PllConfigError::VcoOutputOutOfRange(vco_output));
        }

        // Divisors are non-zero by construction.
        #[allow(clippy::arithmetic_side_effects)]
        let output = vco_output / self.p.divisor();
        if output > SYSCLK_MAX_HZ {
            return Err(PllConfigError::OutputTooFast(output));
        }
        #[allow(clippy::arithmetic_side_effects)]
        let pll48 = vco_output / u32::from(self.q);

        Ok(PllFrequencies {
            vco_input,
            vco_output,
            output,
            pll48,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn hsi_84mhz() -> PllParameters {
        PllParameters {
            source: PllSource::Hsi,
            input_frequency: HSI_FREQUENCY_HZ,
            m: 16,
            n: 336,
            p: PllOutputPrescaler::Div4,
            q: 7,
        }
    }

    /// HSI/16 x 336 / 4 is the classic 84 MHz F401 configuration, with an exact
    /// 48 MHz USB clock from Q=7.
    #[test]
    fn hsi_84mhz_derives_expected_clocks() {
        let freqs = hsi_84mhz().validate().expect("84 MHz plan must be valid");
        assert_eq!(freqs.vco_input, 1_000_000);
        assert_eq!(freqs.vco_output, 336_000_000);
        assert_eq!(freqs.output, 84_000_000);
        assert_eq!(freqs.pll48, 48_000_000, "Q=7 must give 48 MHz for USB");
    }

    #[test]
    fn m_below_two_is_rejected() {
        let params = PllParameters { m: 1, ..hsi_84mhz() };
        assert_eq!(params.validate(), Err(PllConfigError::InputDivider(1)));
    }

    #[test]
    fn n_out_of_range_is_rejected() {
        let params = PllParameters { n: 433, ..hsi_84mhz() };
        assert_eq!(params.validate(), Err(PllConfigError::Multiplier(433)));
    }

    #[test]
    fn q_out_of_range_is_rejected() {
        let params = PllParameters { q: 16, ..hsi_84mhz() };
        assert_eq!(params.validate(), Err(PllConfigError::UsbDivider(16)));
    }

    /// 16 MHz / 4 = 4 MHz VCO input, above the 2 MHz window.
    #[test]
    fn vco_input_window_is_enforced() {
        let params = PllParameters { m: 4, ..hsi_84mhz() };
        assert_eq!(
            params.validate(),
            Err(PllConfigError::VcoInputOutOfRange(4_000_000))
        );
    }

    #[test]
    fn output_above_ceiling_is_rejected() {
        // 2 MHz x 400 = 800 MHz VCO fails the VCO check first.
        let params = PllParameters { m: 8, n: 400, ..hsi_84mhz() };
        assert_eq!(
            params.validate(),
            Err(PllConfigError::VcoOutputOutOfRange(800_000_000))
        );
        // 2 MHz x 192 = 384 MHz VCO, /2 = 192 MHz > 180 MHz.
        let params = PllParameters {
            m: 8,
            n: 192,
            p: PllOutputPrescaler::Div2,
            ..hsi_84mhz()
        };
        assert_eq!(
            params.validate(),
            Err(PllConfigError::OutputTooFast(192_000_000))
        );
    }

    #[test]
    fn reset_configuration_is_hsi_undivided() {
        let cfg = ClockConfiguration::default();
        for bus in [Bus::Ahb1, Bus::Ahb2, Bus::Ahb3, Bus::Apb1, Bus::Apb2] {
            assert_eq!(cfg.speed(bus), HSI_FREQUENCY_HZ, "{bus:?} must run at HSI");
        }
    }

    #[test]
    fn apb_derives_from_ahb() {
        let cfg = ClockConfiguration::derive(
            168_000_000,
            AhbPrescaler::Div2,
            ApbPrescaler::Div4,
            ApbPrescaler::Div2,
        );
        assert_eq!(cfg.ahb, 84_000_000);
        assert_eq!(cfg.apb1, 21_000_000, "APB1 = AHB / 4");
        assert_eq!(cfg.apb2, 42_000_000, "APB2 = AHB / 2");
    }

    #[test]
    fn apb_timers_double_when_divided() {
        let cfg = ClockConfiguration::derive(
            84_000_000,
            AhbPrescaler::None,
            ApbPrescaler::Div2,
            ApbPrescaler::None,
        );
        assert_eq!(cfg.timer_speed(Bus::Apb1), 84_000_000);
        assert_eq!(cfg.timer_speed(Bus::Apb2), 84_000_000);
        assert_eq!(cfg.timer_speed(Bus::Ahb1), 84_000_000);
    }

    #[test]
    fn prescaler_codes_decode_back() {
        for p in [
            AhbPrescaler::None,
            AhbPrescaler::Div2,
            AhbPrescaler::Div64,
            AhbPrescaler::Div512,
        ] {
            assert_eq!(AhbPrescaler::from_code(p.code()), p);
        }
        assert_eq!(AhbPrescaler::from_code(0b0111), AhbPrescaler::None);
        assert_eq!(ApbPrescaler::from_code(0b011), ApbPrescaler::None);
        assert_eq!(ApbPrescaler::from_code(0b110), ApbPrescaler::Div8);
        assert_eq!(SystemClockSource::from_code(0b11), None);
    }

    #[test]
    fn pll_output_divisor_lookup() {
        assert_eq!(PllOutputPrescaler::from_divisor(6), Some(PllOutputPrescaler::Div6));
        assert_eq!(PllOutputPrescaler::from_divisor(3), None);
    }
}
