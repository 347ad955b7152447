//! Register view: typed access to 32-bit memory-mapped control/status registers.
//!
//! Every peripheral in this HAL talks to hardware through a [`RegisterBlock`]:
//! a window of 32-bit registers at a base address fixed when the block is
//! constructed. Drivers never touch memory directly, which is what lets the
//! host test suite swap in [`crate::mocks::MockRegisterBlock`].
//!
//! Named bit fields are data, not code. A register's field list is declared
//! once with [`register_fields!`](crate::register_fields), which produces an
//! enum implementing [`RegisterField`] (register offset, bit offset, width).
//! The generic [`RegisterView`] extension then covers every field of every
//! peripheral with the same five operations.
//!
//! ```text
//!   RccControl::HseReady ──► RegisterField { register: 0x00, bits: 17..18 }
//!                                   │
//!                                   ▼
//!            RegisterView::is_set ──► RegisterBlock::read(0x00) & mask
//! ```
//!
//! # Shared read-modify-write
//!
//! [`RegisterBlock::modify`] performs its read-modify-write inside a
//! `critical_section::with` block. The RCC enable registers are shared by every
//! peripheral, and SPI `CR2` is written from both foreground and interrupt
//! context; an unguarded RMW on either can silently clear a bit set by the
//! other side.

/// A window of 32-bit registers addressed by byte offset from a fixed base.
pub trait RegisterBlock {
    /// Read the register at byte offset `offset`.
    fn read(&self, offset: usize) -> u32;

    /// Write `value` to the register at byte offset `offset`.
    fn write(&self, offset: usize, value: u32);

    /// Read-modify-write the register at `offset` inside a critical section.
    fn modify<F>(&self, offset: usize, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        critical_section::with(|_| {
            let current = self.read(offset);
            self.write(offset, f(current));
        });
    }
}

impl<T: RegisterBlock + ?Sized> RegisterBlock for &T {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value);
    }

    fn modify<F>(&self, offset: usize, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        (**self).modify(offset, f);
    }
}

// ── BitRange ─────────────────────────────────────────────────────────────────

/// Position and width of a bit field inside a 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitRange {
    offset: u8,
    width: u8,
}

impl BitRange {
    /// Field of `width` bits starting at bit `offset`.
    ///
    /// A zero width or a field extending past bit 31 is a table bug and trips a
    /// debug assertion.
    pub const fn new(offset: u8, width: u8) -> Self {
        debug_assert!(width > 0, "bit field width must be non-zero");
        debug_assert!(
            (offset as u32) + (width as u32) <= 32,
            "bit field extends past bit 31"
        );
        Self { offset, width }
    }

    /// Single-bit field at `offset`.
    pub const fn bit(offset: u8) -> Self {
        Self::new(offset, 1)
    }

    /// Lowest bit of the field.
    pub const fn offset(self) -> u8 {
        self.offset
    }

    /// Number of bits in the field.
    pub const fn width(self) -> u8 {
        self.width
    }

    /// Mask of the field in register position.
    pub const fn mask(self) -> u32 {
        let ones = if self.width >= 32 {
            u32::MAX
        } else {
            (1u32.wrapping_shl(self.width as u32)).wrapping_sub(1)
        };
        ones.wrapping_shl(self.offset as u32)
    }

    /// Largest value the field can hold.
    pub const fn max_value(self) -> u32 {
        self.mask().wrapping_shr(self.offset as u32)
    }

    /// Extract the field from a full register value.
    pub const fn extract(self, register: u32) -> u32 {
        (register & self.mask()).wrapping_shr(self.offset as u32)
    }

    /// Return `register` with the field replaced by `value`.
    ///
    /// Bits of `value` that do not fit in the field are discarded.
    pub const fn insert(self, register: u32, value: u32) -> u32 {
        (register & !self.mask()) | (value.wrapping_shl(self.offset as u32) & self.mask())
    }
}

// ── Field descriptors ────────────────────────────────────────────────────────

/// A named bit field belonging to one register of a peripheral.
pub trait RegisterField: Copy {
    /// Byte offset of the owning register from the peripheral base.
    fn register(self) -> usize;

    /// Position and width of the field.
    fn bits(self) -> BitRange;

    /// Field name as written in the reference manual tables.
    fn name(self) -> &'static str;
}

/// Declare the field table of one register.
///
/// Expands to a `Copy` enum with one variant per field, an `ALL` slice in
/// declaration order and a [`RegisterField`] implementation.
///
/// ```
/// use platform::register::{RegisterField, BitRange};
///
/// platform::register_fields! {
///     /// Demo control register.
///     pub enum DemoControl @ 0x04 {
///         /// Enable bit.
///         Enable = (0, 1),
///         /// Three-bit divider.
///         Divider = (3, 3),
///     }
/// }
///
/// assert_eq!(DemoControl::Divider.register(), 0x04);
/// assert_eq!(DemoControl::Divider.bits(), BitRange::new(3, 3));
/// assert_eq!(DemoControl::ALL.len(), 2);
/// ```
#[macro_export]
macro_rules! register_fields {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident @ $register:tt {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = ($offset:expr, $width:expr)
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            /// Every field of this register, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl $crate::register::RegisterField for $name {
            fn register(self) -> usize {
                $register
            }

            fn bits(self) -> $crate::register::BitRange {
                match self {
                    $($name::$variant => $crate::register::BitRange::new($offset, $width),)+
                }
            }

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }
        }
    };
}

// ── RegisterView ─────────────────────────────────────────────────────────────

/// Field-level access on top of any [`RegisterBlock`].
///
/// Blanket-implemented; drivers only ever implement `RegisterBlock`.
pub trait RegisterView: RegisterBlock {
    /// Current value of `field`, shifted down to bit 0.
    fn read_field<F: RegisterField>(&self, field: F) -> u32 {
        field.bits().extract(self.read(field.register()))
    }

    /// Replace `field` with `value` (read-modify-write, critical section).
    fn write_field<F: RegisterField>(&self, field: F, value: u32) {
        let bits = field.bits();
        self.modify(field.register(), |current| bits.insert(current, value));
    }

    /// Replace several fields of the same register in one read-modify-write.
    ///
    /// Either every update lands or, with an empty slice, nothing is written.
    fn write_fields<F: RegisterField>(&self, updates: &[(F, u32)]) {
        let Some((first, _)) = updates.first() else {
            return;
        };
        let register = first.register();
        debug_assert!(
            updates.iter().all(|(field, _)| field.register() == register),
            "write_fields updates must target a single register"
        );
        self.modify(register, |current| {
            updates
                .iter()
                .fold(current, |acc, (field, value)| field.bits().insert(acc, *value))
        });
    }

    /// `true` when any bit of `field` is set.
    fn is_set<F: RegisterField>(&self, field: F) -> bool {
        self.read_field(field) != 0
    }

    /// Set every bit of `field`.
    fn set<F: RegisterField>(&self, field: F) {
        self.write_field(field, u32::MAX);
    }

    /// Clear every bit of `field`.
    fn clear<F: RegisterField>(&self, field: F) {
        self.write_field(field, 0);
    }
}

impl<T: RegisterBlock + ?Sized> RegisterView for T {}
