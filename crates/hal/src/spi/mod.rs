//! Interrupt-driven SPI transfer engine for STM32F4 SPI1/2/3.
//!
//! [`SpiTransferEngine`] owns one TX and one RX [`RingBuffer`] and a small
//! state machine driven from the SPI global interrupt. The foreground queues
//! bytes with [`SpiTransferEngine::send`] and drains received bytes with
//! [`SpiTransferEngine::receive`]; the vector calls
//! [`InterruptHandler::on_interrupt`], which moves one byte per event
//! between the rings and `SPI_DR`.
//!
//! # States
//!
//! ```text
//!            send()                 TX ring drained, no RX pending
//!   Idle ─────────────► Transmitting ─────────────────────────────► Idle
//!    │                      │  TX ring drained, RX pending
//!    │ RXNE                 └──────────────────────────► Receiving
//!    └──────────► Receiving ── receive() drains RX ring ──► Idle
//!
//!   any ── OVR / MODF / CRCERR / RX ring full ──► Error ── recover() ──► Idle
//! ```
//!
//! Error is sticky: every interrupt enable is cleared on entry and nothing
//! moves until [`SpiTransferEngine::recover`]. Every return to Idle signals
//! the completion semaphore that [`SpiTransferEngine::wait_idle`] awaits.
//!
//! # Concurrency
//!
//! All methods take `&self` so the engine can live in a `static` shared with
//! the vector. TX is produced by `send` and consumed by the ISR, RX the other
//! way round. `CR2` updates go through [`RegisterBlock::modify`], so arming
//! `TXEIE` in the foreground cannot race the ISR disarming it.

pub mod mock;
pub mod registers;

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use os::{OverflowPolicy, RingBuffer, Semaphore};
use platform::clock_config::Bus;
use platform::{
    BitOrder, DataFrame, InterruptHandler, IrqNumber, RegisterBlock, RegisterField, RegisterView,
    SpiBaudratePrescaler, SpiConfig, SpiRole,
};
use thiserror_no_std::Error;

use crate::config::{
    SPI1_BASE, SPI1_IRQ, SPI2_BASE, SPI2_IRQ, SPI3_BASE, SPI3_IRQ, SPI_BUFFER_CAPACITY,
    SPI_MAX_WAITERS,
};
use crate::rcc::{Apb1Clock, Apb2Clock, PeripheralClock};

pub use registers::{SpiControl, SpiControl1, SpiControl2, SpiStatus};
use registers::{SpiData, CR1, CR2, DR, SR};

// ─── Instances ───────────────────────────────────────────────────────────────

/// SPI peripherals on the STM32F4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiInstance {
    /// SPI1 (APB2)
    Spi1,
    /// SPI2 (APB1)
    Spi2,
    /// SPI3 (APB1)
    Spi3,
}

impl SpiInstance {
    /// RCC gate feeding this peripheral.
    pub fn clock(self) -> PeripheralClock {
        match self {
            Self::Spi1 => Apb2Clock::Spi1.into(),
            Self::Spi2 => Apb1Clock::Spi2.into(),
            Self::Spi3 => Apb1Clock::Spi3.into(),
        }
    }

    /// Bus whose clock drives the baud-rate generator.
    pub fn bus(self) -> Bus {
        self.clock().bus()
    }

    /// Global interrupt line.
    pub fn irq(self) -> IrqNumber {
        match self {
            Self::Spi1 => SPI1_IRQ,
            Self::Spi2 => SPI2_IRQ,
            Self::Spi3 => SPI3_IRQ,
        }
    }

    /// Register block base address.
    pub fn base_address(self) -> usize {
        match self {
            Self::Spi1 => SPI1_BASE,
            Self::Spi2 => SPI2_BASE,
            Self::Spi3 => SPI3_BASE,
        }
    }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// Transfer state of one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransferState {
    /// Nothing queued, nothing waiting to be read.
    Idle = 0,
    /// TX ring being drained into `DR`.
    Transmitting = 1,
    /// Received bytes waiting in the RX ring.
    Receiving = 2,
    /// Faulted; see [`SpiTransferEngine::error_flags`].
    Error = 3,
}

impl TransferState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Transmitting,
            2 => Self::Receiving,
            _ => Self::Error,
        }
    }
}

/// Latched fault causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiErrorFlags(u8);

impl SpiErrorFlags {
    /// No fault.
    pub const NONE: Self = Self(0);
    /// `SR.OVR`: a byte arrived before the previous one was read.
    pub const OVERRUN: Self = Self(0b0001);
    /// `SR.MODF`: NSS pulled low while master.
    pub const MODE_FAULT: Self = Self(0b0010);
    /// `SR.CRCERR`
    pub const CRC_ERROR: Self = Self(0b0100);
    /// RX ring full; the byte was dropped.
    pub const BUFFER_OVERRUN: Self = Self(0b1000);

    /// Hardware error bits present in a raw `SPI_SR` value.
    pub fn from_status(status: u32) -> Self {
        let mut flags = Self::NONE;
        if SpiStatus::Overrun.bits().extract(status) != 0 {
            flags = flags.union(Self::OVERRUN);
        }
        if SpiStatus::ModeFault.bits().extract(status) != 0 {
            flags = flags.union(Self::MODE_FAULT);
        }
        if SpiStatus::CrcError.bits().extract(status) != 0 {
            flags = flags.union(Self::CRC_ERROR);
        }
        flags
    }

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Both sets of causes.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// `true` when every cause in `other` is also in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` when no cause is latched.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Event decoded from `SPI_SR` by the vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiEvent {
    /// `TXE` with `TXEIE` armed.
    TransmitEmpty,
    /// `RXNE` with `RXNEIE` armed.
    ReceiveNotEmpty,
    /// One or more hardware error bits.
    Error(SpiErrorFlags),
}

/// Foreground transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// TX ring full; nothing was queued.
    #[error("SPI transmit buffer full")]
    BufferFull,
    /// Engine is latched in Error; call `recover`.
    #[error("SPI engine faulted: {0:?}")]
    Faulted(SpiErrorFlags),
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Ring-buffered, interrupt-driven SPI master/slave for 8-bit frames.
///
/// `TX` and `RX` are the ring capacities. Both rings reject on full: a full
/// TX ring bounds `send`, a full RX ring faults the engine with
/// [`SpiErrorFlags::BUFFER_OVERRUN`].
pub struct SpiTransferEngine<
    R,
    const TX: usize = { SPI_BUFFER_CAPACITY },
    const RX: usize = { SPI_BUFFER_CAPACITY },
> {
    registers: R,
    tx: RingBuffer<u8, TX>,
    rx: RingBuffer<u8, RX>,
    state: AtomicU8,
    errors: AtomicU8,
    faults: AtomicU32,
    idle: Semaphore<SPI_MAX_WAITERS>,
}

impl<R: RegisterBlock, const TX: usize, const RX: usize> SpiTransferEngine<R, TX, RX> {
    /// Engine over `registers`, Idle, with empty rings.
    ///
    /// No register is touched until [`Self::configure`].
    pub const fn new(registers: R) -> Self {
        Self {
            registers,
            tx: RingBuffer::new(OverflowPolicy::Reject),
            rx: RingBuffer::new(OverflowPolicy::Reject),
            state: AtomicU8::new(TransferState::Idle as u8),
            errors: AtomicU8::new(0),
            faults: AtomicU32::new(0),
            idle: Semaphore::binary(true),
        }
    }

    /// Underlying register block.
    pub fn registers(&self) -> &R {
        &self.registers
    }

    // ── Base operations ──────────────────────────────────────────────────────

    /// `true` when `flag` is set in `SPI_SR`.
    pub fn read_status(&self, flag: SpiStatus) -> bool {
        self.registers.is_set(flag)
    }

    /// Write one field of `SPI_CR1` or `SPI_CR2` (read-modify-write).
    pub fn write_control(&self, field: impl Into<SpiControl>, value: u32) {
        match field.into() {
            SpiControl::Cr1(field) => self.registers.write_field(field, value),
            SpiControl::Cr2(field) => self.registers.write_field(field, value),
        }
    }

    /// Select the SCK divider.
    pub fn set_baudrate(&self, prescaler: SpiBaudratePrescaler) {
        self.registers
            .write_field(SpiControl1::Baudrate, prescaler.code());
    }

    /// Apply `config`, enable the peripheral and arm RXNE/error interrupts.
    ///
    /// The engine moves the low byte of each frame; 16-bit frames keep only
    /// their low byte.
    pub fn configure(&self, config: SpiConfig) {
        let master = config.role == SpiRole::Master;
        self.registers.clear(SpiControl1::SpiEnable);
        self.registers.write_fields(&[
            (SpiControl1::ClockPhase, u32::from(config.mode.cpha())),
            (SpiControl1::ClockPolarity, u32::from(config.mode.cpol())),
            (SpiControl1::MasterSelect, u32::from(master)),
            (SpiControl1::Baudrate, config.baud_prescaler.code()),
            (
                SpiControl1::LsbFirst,
                u32::from(config.bit_order == BitOrder::LsbFirst),
            ),
            (
                SpiControl1::SoftwareSlaveManagement,
                u32::from(config.software_nss),
            ),
            (
                SpiControl1::InternalSlaveSelect,
                u32::from(config.software_nss && master),
            ),
            (
                SpiControl1::DataFrameFormat,
                u32::from(config.frame == DataFrame::Sixteen),
            ),
        ]);
        self.registers.set(SpiControl1::SpiEnable);
        self.arm_receive();

        #[cfg(feature = "defmt")]
        defmt::info!(
            "SPI configured: {} {} SCK=PCLK/{}",
            config.role,
            config.mode,
            config.baud_prescaler.divisor()
        );
    }

    // ── Foreground transfer API ──────────────────────────────────────────────

    /// Queue `data` for transmission and arm `TXEIE`.
    ///
    /// Returns how many leading bytes were accepted; the caller re-queues the
    /// rest. An empty slice is `Ok(0)` and changes nothing.
    ///
    /// # Errors
    ///
    /// - [`TransferError::Faulted`] while the engine is in Error.
    /// - [`TransferError::BufferFull`] when no byte fit.
    pub fn send(&self, data: &[u8]) -> Result<usize, TransferError> {
        if self.state() == TransferState::Error {
            return Err(TransferError::Faulted(self.error_flags()));
        }
        if data.is_empty() {
            return Ok(0);
        }
        let accepted = self.tx.push_slice(data);
        if accepted == 0 {
            return Err(TransferError::BufferFull);
        }

        let started = critical_section::with(|_| {
            if self.state() == TransferState::Error {
                return false;
            }
            self.state
                .store(TransferState::Transmitting as u8, Ordering::Release);
            self.registers.set(SpiControl2::TransmitInterrupt);
            true
        });
        if !started {
            return Err(TransferError::Faulted(self.error_flags()));
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("SPI: queued {} of {} bytes", accepted, data.len());

        Ok(accepted)
    }

    /// Move received bytes into `buf` without blocking.
    ///
    /// Returns the number copied. Draining the RX ring with nothing left to
    /// send returns a Receiving engine to Idle.
    pub fn receive(&self, buf: &mut [u8]) -> usize {
        let n = self.rx.pop_slice(buf);
        let drained = critical_section::with(|_| {
            self.rx.is_empty()
                && self.tx.is_empty()
                && self.transition(TransferState::Receiving, TransferState::Idle)
        });
        if drained {
            self.idle.signal();
        }
        n
    }

    /// Wait until the engine is Idle.
    ///
    /// # Errors
    ///
    /// [`TransferError::Faulted`] if the engine is, or ends up, in Error.
    pub async fn wait_idle(&self) -> Result<(), TransferError> {
        loop {
            match self.state() {
                TransferState::Idle => return Ok(()),
                TransferState::Error => return Err(TransferError::Faulted(self.error_flags())),
                TransferState::Transmitting | TransferState::Receiving => self.idle.wait().await,
            }
        }
    }

    /// Leave Error: clear latched flags and both rings, return to Idle and
    /// re-arm RXNE/error interrupts.
    ///
    /// Returns the flags that were cleared. Queued and unread bytes are lost.
    /// After a mode fault the peripheral has dropped `MSTR` and `SPE`; call
    /// [`Self::configure`] again.
    pub fn recover(&self) -> SpiErrorFlags {
        let flags = critical_section::with(|_| {
            self.clear_hardware_errors();
            self.tx.clear();
            self.rx.clear();
            let flags = SpiErrorFlags(self.errors.swap(0, Ordering::AcqRel));
            self.state
                .store(TransferState::Idle as u8, Ordering::Release);
            self.registers.write_fields(&[
                (SpiControl2::TransmitInterrupt, 0),
                (SpiControl2::ReceiveInterrupt, 1),
                (SpiControl2::ErrorInterrupt, 1),
            ]);
            flags
        });
        self.idle.signal();

        #[cfg(feature = "defmt")]
        defmt::info!("SPI recovered, cleared {}", flags);

        flags
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> TransferState {
        TransferState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Causes latched since the last [`Self::recover`].
    pub fn error_flags(&self) -> SpiErrorFlags {
        SpiErrorFlags(self.errors.load(Ordering::Acquire))
    }

    /// Bytes queued but not yet written to `DR`.
    pub fn tx_pending(&self) -> usize {
        self.tx.len()
    }

    /// Received bytes waiting for [`Self::receive`].
    pub fn rx_available(&self) -> usize {
        self.rx.len()
    }

    /// Number of times the engine has entered Error.
    pub fn fault_count(&self) -> u32 {
        self.faults.load(Ordering::Relaxed)
    }

    // ── Interrupt side ───────────────────────────────────────────────────────

    /// Service one event. Never blocks; called from the vector.
    pub fn irq_handler(&self, event: SpiEvent) {
        match event {
            SpiEvent::Error(flags) => {
                self.clear_hardware_errors();
                self.fault(flags);
            }
            _ if self.state() == TransferState::Error => {}
            SpiEvent::ReceiveNotEmpty => self.on_receive(),
            SpiEvent::TransmitEmpty => self.on_transmit_empty(),
        }
    }

    fn on_receive(&self) {
        #[allow(clippy::cast_possible_truncation)] // Safety: Data field is 8 bits wide
        let byte = SpiData::Data.bits().extract(self.registers.read(DR)) as u8;
        // Push and state change are one step as seen by `receive`.
        let stored = critical_section::with(|_| {
            if self.rx.push(byte).is_err() {
                return false;
            }
            if self.transition(TransferState::Idle, TransferState::Receiving) {
                #[cfg(feature = "defmt")]
                defmt::debug!("SPI: Idle -> Receiving");
            }
            true
        });
        if !stored {
            self.fault(SpiErrorFlags::BUFFER_OVERRUN);
        }
    }

    fn on_transmit_empty(&self) {
        if let Some(byte) = self.tx.pop() {
            self.registers.write(DR, u32::from(byte));
            if !self.tx.is_empty() {
                return;
            }
        }
        self.registers.clear(SpiControl2::TransmitInterrupt);
        let rx_pending = self.registers.is_set(SpiStatus::ReceiveNotEmpty) || !self.rx.is_empty();
        let next = if rx_pending {
            TransferState::Receiving
        } else {
            TransferState::Idle
        };
        if self.transition(TransferState::Transmitting, next) {
            #[cfg(feature = "defmt")]
            defmt::debug!("SPI: Transmitting -> {}", next);

            if next == TransferState::Idle {
                self.idle.signal();
            }
        }
    }

    /// Latch `flags` and enter Error; disarms every interrupt on first entry.
    fn fault(&self, flags: SpiErrorFlags) {
        self.errors.fetch_or(flags.bits(), Ordering::AcqRel);
        let previous = self
            .state
            .swap(TransferState::Error as u8, Ordering::AcqRel);
        if previous == TransferState::Error as u8 {
            return;
        }
        self.registers.write_fields(&[
            (SpiControl2::ErrorInterrupt, 0),
            (SpiControl2::ReceiveInterrupt, 0),
            (SpiControl2::TransmitInterrupt, 0),
        ]);
        self.faults.fetch_add(1, Ordering::Relaxed);
        self.idle.signal();

        #[cfg(feature = "defmt")]
        defmt::warn!("SPI fault: {}", flags);
    }

    /// OVR clears on a `DR` read followed by an `SR` read; MODF on the `SR`
    /// read followed by a `CR1` write. CRCERR is rc_w0: written back as 0.
    fn clear_hardware_errors(&self) {
        let _ = self.registers.read(DR);
        let status = self.registers.read(SR);
        if SpiStatus::ModeFault.bits().extract(status) != 0 {
            self.registers.modify(CR1, |cr1| cr1);
        }
        if SpiStatus::CrcError.bits().extract(status) != 0 {
            self.registers.clear(SpiStatus::CrcError);
        }
    }

    fn arm_receive(&self) {
        self.registers.write_fields(&[
            (SpiControl2::ReceiveInterrupt, 1),
            (SpiControl2::ErrorInterrupt, 1),
        ]);
    }

    fn transition(&self, from: TransferState, to: TransferState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl<R: RegisterBlock, const TX: usize, const RX: usize> InterruptHandler
    for SpiTransferEngine<R, TX, RX>
{
    /// Read `SR` once and dispatch every pending event: errors first, then
    /// RXNE, then TXE.
    fn on_interrupt(&self) {
        let status = self.registers.read(SR);
        let errors = SpiErrorFlags::from_status(status);
        if !errors.is_empty() && self.state() != TransferState::Error {
            self.irq_handler(SpiEvent::Error(errors));
            return;
        }
        let control = self.registers.read(CR2);
        let armed = |field: SpiControl2| field.bits().extract(control) != 0;
        if SpiStatus::ReceiveNotEmpty.bits().extract(status) != 0
            && armed(SpiControl2::ReceiveInterrupt)
        {
            self.irq_handler(SpiEvent::ReceiveNotEmpty);
        }
        if SpiStatus::TransmitEmpty.bits().extract(status) != 0
            && armed(SpiControl2::TransmitInterrupt)
        {
            self.irq_handler(SpiEvent::TransmitEmpty);
        }
    }
}
