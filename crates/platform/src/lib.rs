//! Platform layer for the STM32F4 clock-tree / SPI HAL
//!
//! Hardware-independent building blocks shared by the drivers in `hal`.
//! Everything here compiles and tests on the host.
//!
//! # Architecture Layers
//!
//! ```text
//! Application
//!         ↓
//! hal (ClockTree, SpiTransferEngine, InterruptDispatcher)
//!         ↓
//! platform (this crate - register view, clock math, config types)
//!         ↓
//! RegisterBlock impl (volatile MMIO on target, MockRegisterBlock on host)
//! ```
//!
//! # Modules
//!
//! - [`register`] - [`RegisterBlock`], [`RegisterField`], [`RegisterView`]
//! - [`clock_config`] - oscillators, prescaler codes, PLL validation
//! - [`peripheral`] - SPI configuration values
//! - [`interrupt`] - [`InterruptHandler`] and [`IrqNumber`]
//! - [`mocks`] - in-memory register block for host tests
//!
//! # Features
//!
//! - `std`: reserved for host-only helpers
//! - `defmt`: derive `defmt::Format` on public types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // register names (RCC_PLLCFGR, SPI_CR1) in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod clock_config;
pub mod interrupt;
pub mod mocks;
pub mod peripheral;
pub mod register;

pub use clock_config::{
    AhbPrescaler, ApbPrescaler, Bus, ClockConfiguration, Oscillator, PllConfigError,
    PllFrequencies, PllOutputPrescaler, PllParameters, PllSource, SystemClockSource,
};
pub use interrupt::{InterruptHandler, IrqNumber};
pub use peripheral::{BitOrder, DataFrame, SpiBaudratePrescaler, SpiConfig, SpiMode, SpiRole};
pub use register::{BitRange, RegisterBlock, RegisterField, RegisterView};
