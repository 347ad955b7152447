//! Interrupt handler abstraction
//!
//! A peripheral driver that services an NVIC line implements
//! [`InterruptHandler`]; the HAL's dispatcher maps an [`IrqNumber`] to one
//! registered handler and calls it from the vector.
//!
//! The platform never re-enters a handler for the same line, so
//! implementations may assume `on_interrupt` calls on one instance are
//! serialised. They must not block.

/// NVIC interrupt line (position in the vendor vector table, after the 16
/// Cortex-M system exceptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrqNumber(u16);

impl IrqNumber {
    /// Wrap a raw line number.
    pub const fn new(number: u16) -> Self {
        Self(number)
    }

    /// Raw line number.
    pub const fn number(self) -> u16 {
        self.0
    }

    /// Line number as a table index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A driver that services one interrupt line.
pub trait InterruptHandler {
    /// Service every pending event of the peripheral. Called from the vector.
    fn on_interrupt(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irq_number_round_trips_index() {
        let irq = IrqNumber::new(35);
        assert_eq!(irq.number(), 35);
        assert_eq!(irq.index(), 35);
    }
}
