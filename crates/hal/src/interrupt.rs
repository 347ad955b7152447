//! Interrupt dispatch table.
//!
//! Vendor vectors are thin trampolines: each SPI vector calls
//! [`InterruptDispatcher::dispatch`] with its line, and the dispatcher calls
//! the one driver registered for it.
//!
//! ```rust,ignore
//! static SPI1: SpiTransferEngine<MmioBlock> = SpiTransferEngine::new(unsafe { MmioBlock::new(SPI1_BASE) });
//! static IRQS: InterruptDispatcher = InterruptDispatcher::new();
//!
//! IRQS.register(SpiInstance::Spi1.irq(), &SPI1)?;
//!
//! #[interrupt]
//! fn SPI1() {
//!     IRQS.dispatch(SpiInstance::Spi1.irq());
//! }
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use platform::{InterruptHandler, IrqNumber};
use thiserror_no_std::Error;

use crate::config::IRQ_LINES;

/// A handler that can be shared with interrupt context.
pub type SharedHandler = &'static (dyn InterruptHandler + Sync);

/// Registration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    /// Line number beyond the table.
    #[error("IRQ {0} outside the dispatch table")]
    OutOfRange(u16),
    /// Another handler already owns the line.
    #[error("IRQ {0} already has a handler")]
    AlreadyRegistered(u16),
}

/// Maps interrupt lines to registered handlers.
pub struct InterruptDispatcher<const N: usize = IRQ_LINES> {
    table: Mutex<CriticalSectionRawMutex, RefCell<[Option<SharedHandler>; N]>>,
}

impl<const N: usize> InterruptDispatcher<N> {
    /// Empty table.
    pub const fn new() -> Self {
        Self {
            table: Mutex::new(RefCell::new([None; N])),
        }
    }

    /// Bind `handler` to `irq`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::OutOfRange`] for a line past `N`,
    /// [`DispatchError::AlreadyRegistered`] if the line is taken.
    pub fn register(&self, irq: IrqNumber, handler: SharedHandler) -> Result<(), DispatchError> {
        self.table.lock(|table| {
            let mut table = table.borrow_mut();
            let slot = table
                .get_mut(irq.index())
                .ok_or(DispatchError::OutOfRange(irq.number()))?;
            if slot.is_some() {
                return Err(DispatchError::AlreadyRegistered(irq.number()));
            }
            *slot = Some(handler);
            Ok(())
        })?;

        #[cfg(feature = "defmt")]
        defmt::debug!("IRQ {} bound", irq.number());

        Ok(())
    }

    /// Unbind `irq`; returns whether a handler was registered.
    pub fn unregister(&self, irq: IrqNumber) -> bool {
        self.table.lock(|table| {
            table
                .borrow_mut()
                .get_mut(irq.index())
                .and_then(Option::take)
                .is_some()
        })
    }

    /// `true` when `irq` has a handler.
    pub fn is_registered(&self, irq: IrqNumber) -> bool {
        self.handler(irq).is_some()
    }

    /// Call the handler bound to `irq` once.
    ///
    /// Returns `false` for an unbound or out-of-range line. The handler runs
    /// outside the table lock, so it may itself take critical sections.
    pub fn dispatch(&self, irq: IrqNumber) -> bool {
        match self.handler(irq) {
            Some(handler) => {
                handler.on_interrupt();
                true
            }
            None => false,
        }
    }

    fn handler(&self, irq: IrqNumber) -> Option<SharedHandler> {
        self.table
            .lock(|table| table.borrow().get(irq.index()).copied().flatten())
    }
}

impl<const N: usize> Default for InterruptDispatcher<N> {
    fn default() -> Self {
        Self::new()
    }
}
