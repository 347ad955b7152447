//! STM32F4 clock tree and interrupt-driven SPI HAL
//!
//! # Architecture
//!
//! ```text
//! Application (boot, tasks)
//!         ↓
//! hal (this crate - ClockTree, SpiTransferEngine, InterruptDispatcher)
//!         ↓
//! os (RingBuffer, Semaphore)    platform (register view, clock math)
//!         ↓
//! RegisterBlock (MmioBlock on target, reactive mocks on host)
//! ```
//!
//! # Modules
//!
//! - [`rcc`] - oscillators, main PLL, SYSCLK mux, bus prescalers, clock gates
//! - [`spi`] - ring-buffered SPI transfer engine
//! - [`interrupt`] - IRQ line → driver dispatch table
//! - [`boot`] - one-shot [`boot::ClockPlan`] application
//! - [`config`] - timing, address and IRQ constants
//!
//! # Features
//!
//! - `hardware` - STM32F4 target: [`mmio::MmioBlock`], cortex-m critical section, defmt
//! - `defmt` - structured logging and `defmt::Format` derives
//! - `std` - host builds
//!
//! ## Hardware Target
//!
//! ```bash
//! cargo build --release --target thumbv7em-none-eabihf --features hardware
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Critical correctness: deny these
#![deny(clippy::await_holding_lock)] // holding a blocking Mutex across .await is a bug
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
#![warn(clippy::dbg_macro)]
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)] // register names (RCC_CFGR, SPI_SR) in doc comments
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod boot;
pub mod config;
pub mod interrupt;
pub mod rcc;
pub mod spi;

#[cfg(feature = "hardware")]
pub mod mmio;

// Re-export key types
pub use boot::ClockPlan;
pub use interrupt::{DispatchError, InterruptDispatcher};
pub use rcc::{ClockError, ClockTree, PeripheralClock, RccConfig};
pub use spi::{
    SpiErrorFlags, SpiEvent, SpiInstance, SpiTransferEngine, TransferError, TransferState,
};

#[cfg(feature = "hardware")]
pub use mmio::MmioBlock;
