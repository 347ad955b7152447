//! Boot-time clock plan.
//!
//! A [`ClockPlan`] is the whole clock tree as one value, applied once from
//! reset in an order that never overclocks a bus on the way:
//!
//! 1. bus prescalers that divide further than the current ones,
//! 2. main PLL (after moving SYSCLK off it if it is running from it),
//! 3. SYSCLK source switch,
//! 4. the remaining prescalers.
//!
//! PLL parameters are validated before the first register write, so an
//! invalid plan leaves the tree untouched.

use embedded_hal::delay::DelayNs;
use platform::clock_config::{
    AhbPrescaler, ApbPrescaler, ClockConfiguration, PllOutputPrescaler, PllParameters, PllSource,
    SystemClockSource, HSI_FREQUENCY_HZ,
};
use platform::RegisterBlock;

use crate::rcc::{ClockError, ClockTree};

/// Target clock tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockPlan {
    /// SYSCLK source after boot.
    pub source: SystemClockSource,
    /// Main PLL settings, if the PLL is to be (re)programmed.
    pub pll: Option<PllParameters>,
    /// `HPRE`
    pub ahb: AhbPrescaler,
    /// `PPRE1`
    pub apb1: ApbPrescaler,
    /// `PPRE2`
    pub apb2: ApbPrescaler,
}

impl ClockPlan {
    /// HSI → PLL (M=16, N=336, P=4, Q=7): 84 MHz SYSCLK/AHB, APB1 42 MHz,
    /// APB2 84 MHz, 48 MHz for USB.
    pub const fn hsi_84mhz() -> Self {
        Self {
            source: SystemClockSource::Pll,
            pll: Some(PllParameters {
                source: PllSource::Hsi,
                input_frequency: HSI_FREQUENCY_HZ,
                m: 16,
                n: 336,
                p: PllOutputPrescaler::Div4,
                q: 7,
            }),
            ahb: AhbPrescaler::None,
            apb1: ApbPrescaler::Div2,
            apb2: ApbPrescaler::None,
        }
    }

    /// Reset configuration: HSI, nothing divided.
    pub const fn reset() -> Self {
        Self {
            source: SystemClockSource::Hsi,
            pll: None,
            ahb: AhbPrescaler::None,
            apb1: ApbPrescaler::None,
            apb2: ApbPrescaler::None,
        }
    }

    /// Drive `clocks` to this plan and return the resulting bus frequencies.
    ///
    /// # Errors
    ///
    /// Any [`ClockError`] from the PLL or source switch. A PLL rejected by
    /// validation is reported before anything is written.
    pub fn apply<R: RegisterBlock, D: DelayNs>(
        &self,
        clocks: &mut ClockTree<R, D>,
    ) -> Result<ClockConfiguration, ClockError> {
        if let Some(pll) = self.pll {
            clocks.validate_pll(&pll)?;
        }

        let current = clocks.clock_configuration();
        let ahb_first = self.ahb.divisor() >= current.ahb_prescaler.divisor();
        let apb1_first = self.apb1.divisor() >= current.apb1_prescaler.divisor();
        let apb2_first = self.apb2.divisor() >= current.apb2_prescaler.divisor();
        if ahb_first {
            clocks.configure_ahb_clock(self.ahb);
        }
        if apb1_first {
            clocks.configure_apb1_clock(self.apb1);
        }
        if apb2_first {
            clocks.configure_apb2_clock(self.apb2);
        }

        if let Some(pll) = self.pll {
            if clocks.system_clock_source() == SystemClockSource::Pll {
                clocks.set_system_clock_source(SystemClockSource::Hsi)?;
            }
            clocks.configure_main_pll(pll.source, pll.input_frequency, pll.m, pll.n, pll.p, pll.q)?;
        }
        clocks.set_system_clock_source(self.source)?;

        if !ahb_first {
            clocks.configure_ahb_clock(self.ahb);
        }
        if !apb1_first {
            clocks.configure_apb1_clock(self.apb1);
        }
        if !apb2_first {
            clocks.configure_apb2_clock(self.apb2);
        }

        let applied = clocks.clock_configuration();
        #[cfg(feature = "defmt")]
        defmt::info!(
            "boot clocks: SYSCLK={=u32} AHB={=u32} APB1={=u32} APB2={=u32}",
            applied.system_clock,
            applied.ahb,
            applied.apb1,
            applied.apb2
        );
        Ok(applied)
    }
}

impl Default for ClockPlan {
    fn default() -> Self {
        Self::reset()
    }
}
