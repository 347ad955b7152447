//! STM32F4 RCC register map
//!
//! Source: RM0090 Rev 19, §6.3 (RCC registers)
//!
//! Every field the clock tree touches is declared here as data; the driver
//! only ever goes through [`platform::RegisterView`].
//!
//! ## Ready bits are read-only
//! `HSIRDY`, `HSERDY`, `PLLRDY`, `PLLI2SRDY` and `SWS` are set by hardware.
//! Writing them has no effect on silicon; the driver only polls them.
//!
//! ## PLLCFGR is only writable with PLLON = 0
//! Writes to `RCC_PLLCFGR` while the main PLL runs are ignored by hardware,
//! so the driver clears `PLLON` first and sets it again afterwards.

use platform::clock_config::Oscillator;

// ---------------------------------------------------------------------------
// Register offsets
// ---------------------------------------------------------------------------

/// Clock control register
pub const CR: usize = 0x00;

/// Main PLL configuration register
pub const PLLCFGR: usize = 0x04;

/// Clock configuration register
pub const CFGR: usize = 0x08;

/// AHB1 peripheral clock enable register
pub const AHB1ENR: usize = 0x30;

/// AHB2 peripheral clock enable register
pub const AHB2ENR: usize = 0x34;

/// AHB3 peripheral clock enable register
pub const AHB3ENR: usize = 0x38;

/// APB1 peripheral clock enable register
pub const APB1ENR: usize = 0x40;

/// APB2 peripheral clock enable register
pub const APB2ENR: usize = 0x44;

/// Words spanned by the RCC block up to and including `APB2ENR`
pub const WORDS: usize = 18;

/// `RCC_CR` reset value: HSI on and ready, trim at midpoint (16)
pub const CR_RESET: u32 = 0x0000_0083;

/// `RCC_PLLCFGR` reset value
pub const PLLCFGR_RESET: u32 = 0x2400_3010;

// ---------------------------------------------------------------------------
// Field tables
// ---------------------------------------------------------------------------

platform::register_fields! {
    /// `RCC_CR` fields
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum RccControl @ CR {
        /// HSI oscillator enable
        HsiOn = (0, 1),
        /// HSI ready (read-only)
        HsiReady = (1, 1),
        /// HSI trimming
        HsiTrim = (3, 5),
        /// HSI factory calibration (read-only)
        HsiCalibration = (8, 8),
        /// HSE oscillator enable
        HseOn = (16, 1),
        /// HSE ready (read-only)
        HseReady = (17, 1),
        /// HSE bypassed with an external clock
        HseBypass = (18, 1),
        /// Clock security system enable
        ClockSecurity = (19, 1),
        /// Main PLL enable
        PllOn = (24, 1),
        /// Main PLL locked (read-only)
        PllReady = (25, 1),
        /// PLLI2S enable
        PllI2sOn = (26, 1),
        /// PLLI2S locked (read-only)
        PllI2sReady = (27, 1),
    }
}

platform::register_fields! {
    /// `RCC_PLLCFGR` fields
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum PllConfig @ PLLCFGR {
        /// Input divider M
        M = (0, 6),
        /// VCO multiplier N
        N = (6, 9),
        /// System clock divider P (encoded)
        P = (16, 2),
        /// Input source (0 = HSI, 1 = HSE)
        Source = (22, 1),
        /// USB/SDIO divider Q
        Q = (24, 4),
    }
}

platform::register_fields! {
    /// `RCC_CFGR` fields
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum ClockConfig @ CFGR {
        /// System clock switch
        SystemClockSwitch = (0, 2),
        /// System clock switch status (read-only)
        SystemClockStatus = (2, 2),
        /// AHB prescaler
        AhbPrescaler = (4, 4),
        /// APB1 prescaler
        Apb1Prescaler = (10, 3),
        /// APB2 prescaler
        Apb2Prescaler = (13, 3),
        /// HSE division for the RTC clock
        RtcPrescaler = (16, 5),
        /// MCO1 source
        Mco1 = (21, 2),
        /// I2S clock source
        I2sSource = (23, 1),
        /// MCO1 prescaler
        Mco1Prescaler = (24, 3),
        /// MCO2 prescaler
        Mco2Prescaler = (27, 3),
        /// MCO2 source
        Mco2 = (30, 2),
    }
}

/// `(on, ready)` field pair of an oscillator in `RCC_CR`.
pub const fn oscillator_fields(oscillator: Oscillator) -> (RccControl, RccControl) {
    match oscillator {
        Oscillator::Hsi => (RccControl::HsiOn, RccControl::HsiReady),
        Oscillator::Hse => (RccControl::HseOn, RccControl::HseReady),
        Oscillator::Pll => (RccControl::PllOn, RccControl::PllReady),
        Oscillator::PllI2s => (RccControl::PllI2sOn, RccControl::PllI2sReady),
    }
}

// ---------------------------------------------------------------------------
// Peripheral clock gates
// ---------------------------------------------------------------------------

platform::register_fields! {
    /// `RCC_AHB1ENR` clock gates
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Ahb1Clock @ AHB1ENR {
        /// GPIOA
        GpioA = (0, 1),
        /// GPIOB
        GpioB = (1, 1),
        /// GPIOC
        GpioC = (2, 1),
        /// GPIOD
        GpioD = (3, 1),
        /// GPIOE
        GpioE = (4, 1),
        /// GPIOF
        GpioF = (5, 1),
        /// GPIOG
        GpioG = (6, 1),
        /// GPIOH
        GpioH = (7, 1),
        /// GPIOI
        GpioI = (8, 1),
        /// CRC unit
        Crc = (12, 1),
        /// Backup SRAM interface
        BackupSram = (18, 1),
        /// CCM data RAM
        CcmDataRam = (20, 1),
        /// DMA1
        Dma1 = (21, 1),
        /// DMA2
        Dma2 = (22, 1),
        /// Ethernet MAC
        EthernetMac = (25, 1),
        /// Ethernet transmission
        EthernetMacTx = (26, 1),
        /// Ethernet reception
        EthernetMacRx = (27, 1),
        /// Ethernet PTP
        EthernetPtp = (28, 1),
        /// USB OTG HS
        UsbOtgHs = (29, 1),
        /// USB OTG HS ULPI
        UsbOtgHsUlpi = (30, 1),
    }
}

platform::register_fields! {
    /// `RCC_AHB2ENR` clock gates
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Ahb2Clock @ AHB2ENR {
        /// Camera interface
        Dcmi = (0, 1),
        /// Cryptographic processor
        Cryp = (4, 1),
        /// Hash processor
        Hash = (5, 1),
        /// Random number generator
        Rng = (6, 1),
        /// USB OTG FS
        UsbOtgFs = (7, 1),
    }
}

platform::register_fields! {
    /// `RCC_AHB3ENR` clock gates
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Ahb3Clock @ AHB3ENR {
        /// Flexible static memory controller
        Fsmc = (0, 1),
    }
}

platform::register_fields! {
    /// `RCC_APB1ENR` clock gates
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Apb1Clock @ APB1ENR {
        /// TIM2
        Tim2 = (0, 1),
        /// TIM3
        Tim3 = (1, 1),
        /// TIM4
        Tim4 = (2, 1),
        /// TIM5
        Tim5 = (3, 1),
        /// TIM6
        Tim6 = (4, 1),
        /// TIM7
        Tim7 = (5, 1),
        /// TIM12
        Tim12 = (6, 1),
        /// TIM13
        Tim13 = (7, 1),
        /// TIM14
        Tim14 = (8, 1),
        /// Window watchdog
        WindowWatchdog = (11, 1),
        /// SPI2
        Spi2 = (14, 1),
        /// SPI3
        Spi3 = (15, 1),
        /// USART2
        Usart2 = (17, 1),
        /// USART3
        Usart3 = (18, 1),
        /// UART4
        Uart4 = (19, 1),
        /// UART5
        Uart5 = (20, 1),
        /// I2C1
        I2c1 = (21, 1),
        /// I2C2
        I2c2 = (22, 1),
        /// I2C3
        I2c3 = (23, 1),
        /// CAN1
        Can1 = (25, 1),
        /// CAN2
        Can2 = (26, 1),
        /// Power interface
        Power = (28, 1),
        /// DAC
        Dac = (29, 1),
    }
}

platform::register_fields! {
    /// `RCC_APB2ENR` clock gates
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Apb2Clock @ APB2ENR {
        /// TIM1
        Tim1 = (0, 1),
        /// TIM8
        Tim8 = (1, 1),
        /// USART1
        Usart1 = (4, 1),
        /// USART6
        Usart6 = (5, 1),
        /// ADC1
        Adc1 = (8, 1),
        /// ADC2
        Adc2 = (9, 1),
        /// ADC3
        Adc3 = (10, 1),
        /// SDIO
        Sdio = (11, 1),
        /// SPI1
        Spi1 = (12, 1),
        /// System configuration controller
        SysConfig = (14, 1),
        /// TIM9
        Tim9 = (16, 1),
        /// TIM10
        Tim10 = (17, 1),
        /// TIM11
        Tim11 = (18, 1),
    }
}

/// A clock gate on one of the AHB buses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AhbClock {
    /// Gate in `RCC_AHB1ENR`
    Ahb1(Ahb1Clock),
    /// Gate in `RCC_AHB2ENR`
    Ahb2(Ahb2Clock),
    /// Gate in `RCC_AHB3ENR`
    Ahb3(Ahb3Clock),
}

/// A clock gate on one of the APB buses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbClock {
    /// Gate in `RCC_APB1ENR`
    Apb1(Apb1Clock),
    /// Gate in `RCC_APB2ENR`
    Apb2(Apb2Clock),
}

/// Any peripheral clock gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralClock {
    /// AHB gate
    Ahb(AhbClock),
    /// APB gate
    Apb(ApbClock),
}

impl PeripheralClock {
    /// Enable-register offset of this gate.
    pub fn register(self) -> usize {
        use platform::RegisterField;
        match self {
            Self::Ahb(AhbClock::Ahb1(c)) => c.register(),
            Self::Ahb(AhbClock::Ahb2(c)) => c.register(),
            Self::Ahb(AhbClock::Ahb3(c)) => c.register(),
            Self::Apb(ApbClock::Apb1(c)) => c.register(),
            Self::Apb(ApbClock::Apb2(c)) => c.register(),
        }
    }

    /// Bit position of this gate in its enable register.
    pub fn bit(self) -> u8 {
        use platform::RegisterField;
        match self {
            Self::Ahb(AhbClock::Ahb1(c)) => c.bits().offset(),
            Self::Ahb(AhbClock::Ahb2(c)) => c.bits().offset(),
            Self::Ahb(AhbClock::Ahb3(c)) => c.bits().offset(),
            Self::Apb(ApbClock::Apb1(c)) => c.bits().offset(),
            Self::Apb(ApbClock::Apb2(c)) => c.bits().offset(),
        }
    }

    /// Bus the gated peripheral sits on.
    pub fn bus(self) -> platform::Bus {
        match self {
            Self::Ahb(AhbClock::Ahb1(_)) => platform::Bus::Ahb1,
            Self::Ahb(AhbClock::Ahb2(_)) => platform::Bus::Ahb2,
            Self::Ahb(AhbClock::Ahb3(_)) => platform::Bus::Ahb3,
            Self::Apb(ApbClock::Apb1(_)) => platform::Bus::Apb1,
            Self::Apb(ApbClock::Apb2(_)) => platform::Bus::Apb2,
        }
    }
}

impl From<AhbClock> for PeripheralClock {
    fn from(clock: AhbClock) -> Self {
        Self::Ahb(clock)
    }
}

impl From<ApbClock> for PeripheralClock {
    fn from(clock: ApbClock) -> Self {
        Self::Apb(clock)
    }
}

impl From<Ahb1Clock> for PeripheralClock {
    fn from(clock: Ahb1Clock) -> Self {
        Self::Ahb(AhbClock::Ahb1(clock))
    }
}

impl From<Ahb2Clock> for PeripheralClock {
    fn from(clock: Ahb2Clock) -> Self {
        Self::Ahb(AhbClock::Ahb2(clock))
    }
}

impl From<Ahb3Clock> for PeripheralClock {
    fn from(clock: Ahb3Clock) -> Self {
        Self::Ahb(AhbClock::Ahb3(clock))
    }
}

impl From<Apb1Clock> for PeripheralClock {
    fn from(clock: Apb1Clock) -> Self {
        Self::Apb(ApbClock::Apb1(clock))
    }
}

impl From<Apb2Clock> for PeripheralClock {
    fn from(clock: Apb2Clock) -> Self {
        Self::Apb(ApbClock::Apb2(clock))
    }
}
