//! Compile-time configuration for the STM32F4 HAL.
//!
//! Frequency limits live with the math in [`platform::clock_config`]; this
//! module holds the timing and wiring constants the drivers use.
//!
//! References:
//! - STM32F401 datasheet, Table 33 (HSE start-up time up to 2 ms)
//! - STM32F4 RM0090 Rev 19, Table 61 (vector table, SPI1/2/3 positions)

use platform::IrqNumber;

pub use platform::clock_config::{
    HSI_FREQUENCY_HZ, PLL_M_RANGE, PLL_N_RANGE, PLL_Q_RANGE, SYSCLK_MAX_HZ, VCO_INPUT_RANGE_HZ,
    VCO_OUTPUT_RANGE_HZ,
};

/// Delay between two reads of an oscillator ready bit (µs).
pub const READY_POLL_INTERVAL_US: u32 = 10;

/// Default bound on how long an oscillator may take to report ready (µs).
///
/// HSE crystals start in up to 2 ms; the PLL locks in ~100 µs. 5 ms leaves
/// margin for slow crystals without hanging boot on a missing one.
pub const DEFAULT_READY_TIMEOUT_US: u32 = 5_000;

/// Reads of `RCC_CFGR.SWS` after a mux write before giving up.
///
/// The switch completes within a few cycles of the target clock once the
/// oscillator is ready; this bound only guards against a wedged mux.
pub const SWITCH_POLL_LIMIT: u32 = 16;

/// RCC base address.
pub const RCC_BASE: usize = 0x4002_3800;

/// SPI1 base address (APB2).
pub const SPI1_BASE: usize = 0x4001_3000;

/// SPI2 base address (APB1).
pub const SPI2_BASE: usize = 0x4000_3800;

/// SPI3 base address (APB1).
pub const SPI3_BASE: usize = 0x4000_3C00;

/// SPI1 global interrupt.
pub const SPI1_IRQ: IrqNumber = IrqNumber::new(35);

/// SPI2 global interrupt.
pub const SPI2_IRQ: IrqNumber = IrqNumber::new(36);

/// SPI3 global interrupt.
pub const SPI3_IRQ: IrqNumber = IrqNumber::new(51);

/// Vendor interrupt lines on the largest F4 parts (F446: 97).
pub const IRQ_LINES: usize = 97;

/// Default capacity of an SPI engine's TX and RX ring buffers.
pub const SPI_BUFFER_CAPACITY: usize = 64;

/// Pending `wait_idle` callers tracked per SPI engine.
pub const SPI_MAX_WAITERS: usize = 4;
