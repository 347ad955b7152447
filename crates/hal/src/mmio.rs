//! Volatile memory-mapped register block (target only).
//!
//! The drivers are generic over [`RegisterBlock`]; on the STM32F4 they are
//! instantiated with an [`MmioBlock`] at the peripheral's base address.
//! Read-modify-write goes through the default
//! [`RegisterBlock::modify`], i.e. a `cortex-m` single-core critical section.
//!
//! ```rust,ignore
//! static SPI1: SpiTransferEngine<MmioBlock> =
//!     SpiTransferEngine::new(unsafe { MmioBlock::new(SpiInstance::Spi1.base_address()) });
//! ```

use platform::RegisterBlock;

/// A peripheral's registers at a fixed base address.
#[derive(Debug)]
pub struct MmioBlock {
    base: usize,
}

// SAFETY: every access is a single aligned volatile word access; RMW
// sequences run inside a critical section.
unsafe impl Sync for MmioBlock {}

impl MmioBlock {
    /// Register block at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the address of a peripheral register block that stays
    /// mapped for the life of the program, and no other `MmioBlock` or PAC
    /// instance may drive the same peripheral.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Base address.
    pub const fn base(&self) -> usize {
        self.base
    }

    fn register(&self, offset: usize) -> *mut u32 {
        debug_assert!(offset.trailing_zeros() >= 2, "register offsets are word aligned");
        self.base.wrapping_add(offset) as *mut u32
    }
}

impl RegisterBlock for MmioBlock {
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `new`'s contract makes base + offset a mapped, aligned
        // peripheral register.
        unsafe { self.register(offset).read_volatile() }
    }

    fn write(&self, offset: usize, value: u32) {
        // SAFETY: as for `read`.
        unsafe { self.register(offset).write_volatile(value) }
    }
}
