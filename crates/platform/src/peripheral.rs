//! SPI peripheral configuration types
//!
//! Plain values written into `SPI_CR1` by the transfer engine's `configure`.

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    /// SCK = PCLK / prescaler
    pub baud_prescaler: SpiBaudratePrescaler,
    /// SPI mode (CPOL, CPHA)
    pub mode: SpiMode,
    /// Bit order
    pub bit_order: BitOrder,
    /// Master or slave
    pub role: SpiRole,
    /// Frame size
    pub frame: DataFrame,
    /// Manage NSS in software (SSM=1, SSI follows role)
    pub software_nss: bool,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            baud_prescaler: SpiBaudratePrescaler::Div256,
            mode: SpiMode::Mode0,
            bit_order: BitOrder::MsbFirst,
            role: SpiRole::Master,
            frame: DataFrame::Eight,
            software_nss: true,
        }
    }
}

/// SPI modes (CPOL, CPHA)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiMode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl SpiMode {
    /// Clock idles high
    pub const fn cpol(self) -> bool {
        matches!(self, Self::Mode2 | Self::Mode3)
    }

    /// Data captured on the second clock edge
    pub const fn cpha(self) -> bool {
        matches!(self, Self::Mode1 | Self::Mode3)
    }
}

/// Bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// Bus role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiRole {
    /// Drives SCK
    Master,
    /// Follows an external SCK
    Slave,
}

/// Frame size (`CR1.DFF`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataFrame {
    /// 8-bit frames
    Eight,
    /// 16-bit frames
    Sixteen,
}

/// Baud-rate divider (`CR1.BR`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiBaudratePrescaler {
    /// PCLK / 2
    Div2,
    /// PCLK / 4
    Div4,
    /// PCLK / 8
    Div8,
    /// PCLK / 16
    Div16,
    /// PCLK / 32
    Div32,
    /// PCLK / 64
    Div64,
    /// PCLK / 128
    Div128,
    /// PCLK / 256
    Div256,
}

impl SpiBaudratePrescaler {
    /// All prescalers, fastest first.
    pub const ALL: [Self; 8] = [
        Self::Div2,
        Self::Div4,
        Self::Div8,
        Self::Div16,
        Self::Div32,
        Self::Div64,
        Self::Div128,
        Self::Div256,
    ];

    /// Three-bit `BR` encoding
    pub const fn code(self) -> u32 {
        match self {
            Self::Div2 => 0b000,
            Self::Div4 => 0b001,
            Self::Div8 => 0b010,
            Self::Div16 => 0b011,
            Self::Div32 => 0b100,
            Self::Div64 => 0b101,
            Self::Div128 => 0b110,
            Self::Div256 => 0b111,
        }
    }

    /// Division factor
    pub const fn divisor(self) -> u32 {
        match self {
            Self::Div2 => 2,
            Self::Div4 => 4,
            Self::Div8 => 8,
            Self::Div16 => 16,
            Self::Div32 => 32,
            Self::Div64 => 64,
            Self::Div128 => 128,
            Self::Div256 => 256,
        }
    }

    /// Fastest prescaler whose SCK does not exceed `max_hz` at `pclk_hz`.
    ///
    /// Falls back to [`Self::Div256`] when even the slowest divider is too fast.
    pub fn for_frequency(pclk_hz: u32, max_hz: u32) -> Self {
        Self::ALL
            .into_iter()
            .find(|p| pclk_hz.checked_div(p.divisor()).is_some_and(|sck| sck <= max_hz))
            .unwrap_or(Self::Div256)
    }

    /// Resulting SCK frequency (Hz)
    pub const fn sck_frequency(self, pclk_hz: u32) -> u32 {
        // Divisor is never zero.
        #[allow(clippy::arithmetic_side_effects)]
        let sck = pclk_hz / self.divisor();
        sck
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_polarity_and_phase() {
        assert!(!SpiMode::Mode0.cpol() && !SpiMode::Mode0.cpha());
        assert!(!SpiMode::Mode1.cpol() && SpiMode::Mode1.cpha());
        assert!(SpiMode::Mode2.cpol() && !SpiMode::Mode2.cpha());
        assert!(SpiMode::Mode3.cpol() && SpiMode::Mode3.cpha());
    }

    #[test]
    fn for_frequency_picks_fastest_within_limit() {
        // 42 MHz APB2 / 4 = 10.5 MHz <= 12 MHz; /2 = 21 MHz is too fast.
        assert_eq!(
            SpiBaudratePrescaler::for_frequency(42_000_000, 12_000_000),
            SpiBaudratePrescaler::Div4
        );
        assert_eq!(
            SpiBaudratePrescaler::for_frequency(16_000_000, 8_000_000),
            SpiBaudratePrescaler::Div2,
            "exact match must be accepted"
        );
    }

    #[test]
    fn for_frequency_saturates_at_slowest() {
        assert_eq!(
            SpiBaudratePrescaler::for_frequency(84_000_000, 1_000),
            SpiBaudratePrescaler::Div256
        );
    }

    #[test]
    fn sck_frequency_divides_pclk() {
        assert_eq!(SpiBaudratePrescaler::Div8.sck_frequency(16_000_000), 2_000_000);
    }
}
