//! STM32F4 SPI register map
//!
//! Source: RM0090 Rev 19, §28.5 (SPI and I2S registers)
//!
//! ## Reading DR clears RXNE, writing DR clears TXE
//! The interrupt handler reads `SR` once, then services RXNE before TXE so
//! a full-duplex byte is never left behind in the receive register.
//!
//! ## Clearing OVR
//! OVR clears on a read of `DR` followed by a read of `SR`; the error path
//! performs both so a stale overrun does not re-fire after recovery.

// ---------------------------------------------------------------------------
// Register offsets
// ---------------------------------------------------------------------------

/// Control register 1
pub const CR1: usize = 0x00;

/// Control register 2
pub const CR2: usize = 0x04;

/// Status register
pub const SR: usize = 0x08;

/// Data register
pub const DR: usize = 0x0C;

/// Words spanned by the SPI block up to and including `DR`
pub const WORDS: usize = 4;

/// `SPI_SR` reset value: TXE set, everything else clear
pub const SR_RESET: u32 = 0x0000_0002;

// ---------------------------------------------------------------------------
// Field tables
// ---------------------------------------------------------------------------

platform::register_fields! {
    /// `SPI_CR1` fields
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum SpiControl1 @ CR1 {
        /// Clock phase
        ClockPhase = (0, 1),
        /// Clock polarity
        ClockPolarity = (1, 1),
        /// Master selection
        MasterSelect = (2, 1),
        /// Baud-rate prescaler
        Baudrate = (3, 3),
        /// Peripheral enable
        SpiEnable = (6, 1),
        /// LSB transmitted first
        LsbFirst = (7, 1),
        /// Internal slave select (with SSM)
        InternalSlaveSelect = (8, 1),
        /// Software slave management
        SoftwareSlaveManagement = (9, 1),
        /// Receive only
        ReceiveOnly = (10, 1),
        /// 16-bit data frame
        DataFrameFormat = (11, 1),
        /// Transmit CRC next
        CrcNext = (12, 1),
        /// Hardware CRC enable
        CrcEnable = (13, 1),
        /// Output enable in bidirectional mode
        BidirectionalOutput = (14, 1),
        /// Bidirectional data mode
        BidirectionalMode = (15, 1),
    }
}

platform::register_fields! {
    /// `SPI_CR2` fields
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum SpiControl2 @ CR2 {
        /// RX buffer DMA enable
        ReceiveDmaEnable = (0, 1),
        /// TX buffer DMA enable
        TransmitDmaEnable = (1, 1),
        /// SS output enable
        SlaveSelectOutput = (2, 1),
        /// TI frame format
        FrameFormat = (4, 1),
        /// Error interrupt enable
        ErrorInterrupt = (5, 1),
        /// RX buffer not empty interrupt enable
        ReceiveInterrupt = (6, 1),
        /// TX buffer empty interrupt enable
        TransmitInterrupt = (7, 1),
    }
}

platform::register_fields! {
    /// `SPI_SR` flags
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum SpiStatus @ SR {
        /// Receive buffer not empty
        ReceiveNotEmpty = (0, 1),
        /// Transmit buffer empty
        TransmitEmpty = (1, 1),
        /// Channel side (I2S)
        ChannelSide = (2, 1),
        /// Underrun (I2S)
        Underrun = (3, 1),
        /// CRC mismatch
        CrcError = (4, 1),
        /// Mode fault
        ModeFault = (5, 1),
        /// Overrun
        Overrun = (6, 1),
        /// Busy
        Busy = (7, 1),
        /// TI frame format error
        FrameFormatError = (8, 1),
    }
}

platform::register_fields! {
    /// `SPI_DR`
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum SpiData @ DR {
        /// Data byte (8-bit frames)
        Data = (0, 8),
    }
}

/// A field of either SPI control register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiControl {
    /// `SPI_CR1` field
    Cr1(SpiControl1),
    /// `SPI_CR2` field
    Cr2(SpiControl2),
}

impl From<SpiControl1> for SpiControl {
    fn from(field: SpiControl1) -> Self {
        Self::Cr1(field)
    }
}

impl From<SpiControl2> for SpiControl {
    fn from(field: SpiControl2) -> Self {
        Self::Cr2(field)
    }
}

#[cfg(test)]
mod tests {
    use platform::RegisterField;

    use super::*;

    #[test]
    fn interrupt_enables_match_reference_manual() {
        assert_eq!(SpiControl2::ErrorInterrupt.bits().offset(), 5);
        assert_eq!(SpiControl2::ReceiveInterrupt.bits().offset(), 6);
        assert_eq!(SpiControl2::TransmitInterrupt.bits().offset(), 7);
    }

    #[test]
    fn status_flags_match_reference_manual() {
        assert_eq!(SpiStatus::ReceiveNotEmpty.bits().offset(), 0);
        assert_eq!(SpiStatus::TransmitEmpty.bits().offset(), 1);
        assert_eq!(SpiStatus::Overrun.bits().offset(), 6);
        assert_eq!(SpiStatus::Busy.bits().offset(), 7);
        assert_eq!(SpiStatus::TransmitEmpty.bits().extract(SR_RESET), 1);
    }

    #[test]
    fn baudrate_field_is_three_bits() {
        assert_eq!(SpiControl1::Baudrate.bits().width(), 3);
        assert_eq!(SpiControl1::Baudrate.register(), CR1);
    }
}
