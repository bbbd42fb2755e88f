//! Types describing the configuration register of the INA219
//!
//! The register is laid out as follows (see figure 19 of the datasheet):
//!
//! | Bits    | Field                  | Type                  |
//! |---------|------------------------|-----------------------|
//! | 15      | reset                  | [`Reset`]             |
//! | 14      | unused                 |                       |
//! | 13      | bus voltage range      | [`BusVoltageRange`]   |
//! | 11..=12 | PGA gain               | [`Gain`]              |
//! | 7..=10  | bus ADC resolution     | [`Resolution`]        |
//! | 3..=6   | shunt ADC resolution   | [`Resolution`]        |
//! | 0..=2   | operating mode         | [`OperatingMode`]     |
//!
//! [`Configuration`] describes a full register value while [`RawConfiguration`] edits single fields
//! of a value read back from the device and leaves all other bits untouched.
//!
//! # Example
//! ```rust
//! use ina219_autogain::configuration::{Configuration, Gain, Resolution};
//!
//! let conf = Configuration {
//!     gain: Gain::Fsr40mv,
//!     shunt_resolution: Resolution::Avg128,
//!     ..Default::default()
//! };
//! assert_eq!(conf.as_bits(), 0b0010_0001_1111_1111);
//! ```

use crate::errors::ConfigError;
use crate::register::{ReadRegister, Register, RegisterName, WriteRegister};

/// Perform a system reset or continue work as normal
///
/// If set to `Reset` all registers are set to their defaults. The flag clears itself once the
/// reset has been performed, so it always reads back as `Run`.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum Reset {
    /// Continue normal operation
    #[default]
    Run = 0,
    /// Perform system reset
    Reset = 1,
}

impl Reset {
    const SHIFT: u8 = 15;
    const MASK: u16 = 1;

    #[must_use]
    const fn from_register(reg: u16) -> Self {
        if (reg >> Self::SHIFT) & Self::MASK == 0 {
            Self::Run
        } else {
            Self::Reset
        }
    }

    #[must_use]
    const fn apply_to_reg(self, reg: u16) -> u16 {
        apply_field(reg, self as u16, Self::SHIFT, Self::MASK)
    }
}

/// Full scale range of the bus voltage measurement
#[derive(Default, Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
#[repr(u8)]
pub enum BusVoltageRange {
    /// Maximum bus voltage of 16V
    Fsr16v = 0,
    /// Maximum bus voltage of 32V (still limited by the 26V maximum of the IC)
    #[default]
    Fsr32v = 1,
}

impl BusVoltageRange {
    const SHIFT: u8 = 13;
    const MASK: u16 = 1;

    /// Pick the range from its full scale value in volts
    ///
    /// # Errors
    /// Only 16 and 32 are supported ranges.
    ///
    /// ```rust
    /// # use ina219_autogain::configuration::BusVoltageRange;
    /// assert_eq!(BusVoltageRange::from_volts(16), Ok(BusVoltageRange::Fsr16v));
    /// assert!(BusVoltageRange::from_volts(24).is_err());
    /// ```
    pub const fn from_volts(volts: u8) -> Result<Self, ConfigError> {
        match volts {
            16 => Ok(Self::Fsr16v),
            32 => Ok(Self::Fsr32v),
            _ => Err(ConfigError::BusVoltageRangeOutOfRange(volts)),
        }
    }

    /// Full scale of this range in volts
    #[must_use]
    pub const fn max_volts(self) -> u8 {
        match self {
            Self::Fsr16v => 16,
            Self::Fsr32v => 32,
        }
    }

    #[must_use]
    const fn from_register(reg: u16) -> Self {
        if (reg >> Self::SHIFT) & Self::MASK == 0 {
            Self::Fsr16v
        } else {
            Self::Fsr32v
        }
    }

    #[must_use]
    const fn apply_to_reg(self, reg: u16) -> u16 {
        apply_field(reg, self as u16, Self::SHIFT, Self::MASK)
    }
}

/// Selector index as used in the register: `0` is 16V, `1` is 32V
impl TryFrom<u8> for BusVoltageRange {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Fsr16v),
            1 => Ok(Self::Fsr32v),
            other => Err(ConfigError::BusVoltageRangeOutOfRange(other)),
        }
    }
}

/// Gain step of the [PGA](https://en.wikipedia.org/wiki/Programmable-gain_amplifier)
///
/// Each step sets the maximum shunt voltage that can be measured. Lower steps give a better
/// resolution for the same shunt, higher steps allow larger currents.
#[derive(Default, Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
#[repr(u8)]
pub enum Gain {
    /// Step 0: range of ±40mV, gain of 1
    Fsr40mv = 0,
    /// Step 1: range of ±80mV, gain of 1/2
    Fsr80mv = 1,
    /// Step 2: range of ±160mV, gain of 1/4
    Fsr160mv = 2,
    /// Step 3: range of ±320mV, gain of 1/8
    #[default]
    Fsr320mv = 3,
}

impl Gain {
    const SHIFT: u8 = 11;
    const MASK: u16 = 0b11;

    /// All gain steps ordered from the smallest to the largest shunt voltage range
    pub const ALL: [Self; 4] = [Self::Fsr40mv, Self::Fsr80mv, Self::Fsr160mv, Self::Fsr320mv];

    /// The step with the largest shunt voltage range
    pub const MAX: Self = Self::Fsr320mv;

    /// Pick the gain from its step number `0..=3`
    ///
    /// # Errors
    /// Returns `ConfigError::GainOutOfRange` for any step above 3.
    pub const fn from_step(step: u8) -> Result<Self, ConfigError> {
        match step {
            0 => Ok(Self::Fsr40mv),
            1 => Ok(Self::Fsr80mv),
            2 => Ok(Self::Fsr160mv),
            3 => Ok(Self::Fsr320mv),
            _ => Err(ConfigError::GainOutOfRange(step)),
        }
    }

    /// Step number of this gain
    #[must_use]
    pub const fn step(self) -> u8 {
        self as u8
    }

    /// Largest shunt voltage in mV that can be measured with this gain
    #[must_use]
    pub const fn max_shunt_mv(self) -> u16 {
        match self {
            Self::Fsr40mv => 40,
            Self::Fsr80mv => 80,
            Self::Fsr160mv => 160,
            Self::Fsr320mv => 320,
        }
    }

    /// Largest shunt voltage in V that can be measured with this gain
    #[must_use]
    pub fn max_shunt_volts(self) -> f32 {
        f32::from(self.max_shunt_mv()) / 1000.0
    }

    /// The next larger range, `None` at [`Gain::MAX`]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Fsr40mv => Some(Self::Fsr80mv),
            Self::Fsr80mv => Some(Self::Fsr160mv),
            Self::Fsr160mv => Some(Self::Fsr320mv),
            Self::Fsr320mv => None,
        }
    }

    #[must_use]
    const fn from_register(reg: u16) -> Self {
        match (reg >> Self::SHIFT) & Self::MASK {
            0 => Self::Fsr40mv,
            1 => Self::Fsr80mv,
            2 => Self::Fsr160mv,
            _ => Self::Fsr320mv,
        }
    }

    #[must_use]
    const fn apply_to_reg(self, reg: u16) -> u16 {
        apply_field(reg, self as u16, Self::SHIFT, Self::MASK)
    }
}

impl TryFrom<u8> for Gain {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_step(value)
    }
}

/// How the driver picks and maintains the gain
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GainPolicy {
    /// Always use the given gain, overflows are reported to the caller
    Fixed(Gain),
    /// Start at the best gain for the expected current and raise it whenever the device reports
    /// an overflow
    Auto,
}

impl From<Gain> for GainPolicy {
    fn from(gain: Gain) -> Self {
        Self::Fixed(gain)
    }
}

/// Resolution / averaging mode of one ADC channel
#[derive(Default, Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
#[repr(u8)]
pub enum Resolution {
    /// Single 9 bit sample
    Res9Bit = 0b0000,
    /// Single 10 bit sample
    Res10Bit = 0b0001,
    /// Single 11 bit sample
    Res11Bit = 0b0010,
    /// Single 12 bit sample
    #[default]
    Res12Bit = 0b0011,
    /// 2 averaged 12 bit samples
    Avg2 = 0b1001,
    /// 4 averaged 12 bit samples
    Avg4 = 0b1010,
    /// 8 averaged 12 bit samples
    Avg8 = 0b1011,
    /// 16 averaged 12 bit samples
    Avg16 = 0b1100,
    /// 32 averaged 12 bit samples
    Avg32 = 0b1101,
    /// 64 averaged 12 bit samples
    Avg64 = 0b1110,
    /// 128 averaged 12 bit samples
    Avg128 = 0b1111,
}

impl Resolution {
    const SHIFT_BUS: u8 = 7;
    const SHIFT_SHUNT: u8 = 3;
    const MASK: u16 = 0b1111;

    #[must_use]
    const fn from_field(field: u16) -> Self {
        // Several patterns select a single 12 bit sample, the datasheet marks bit 2 as don't care
        // for the single sample modes
        match field & Self::MASK {
            0b0000 | 0b0100 => Self::Res9Bit,
            0b0001 | 0b0101 => Self::Res10Bit,
            0b0010 | 0b0110 => Self::Res11Bit,
            0b1001 => Self::Avg2,
            0b1010 => Self::Avg4,
            0b1011 => Self::Avg8,
            0b1100 => Self::Avg16,
            0b1101 => Self::Avg32,
            0b1110 => Self::Avg64,
            0b1111 => Self::Avg128,
            _ => Self::Res12Bit,
        }
    }

    #[must_use]
    const fn from_bus_register(reg: u16) -> Self {
        Self::from_field(reg >> Self::SHIFT_BUS)
    }

    #[must_use]
    const fn apply_to_bus_reg(self, reg: u16) -> u16 {
        apply_field(reg, self as u16, Self::SHIFT_BUS, Self::MASK)
    }

    #[must_use]
    const fn from_shunt_register(reg: u16) -> Self {
        Self::from_field(reg >> Self::SHIFT_SHUNT)
    }

    #[must_use]
    const fn apply_to_shunt_reg(self, reg: u16) -> u16 {
        apply_field(reg, self as u16, Self::SHIFT_SHUNT, Self::MASK)
    }
}

/// Which signals are measured during a conversion
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum MeasuredSignals {
    /// Only the shunt voltage is measured
    ShuntVoltage = 1,
    /// Only the bus voltage is measured
    BusVoltage = 2,
    /// Both voltages are measured
    #[default]
    ShuntAndBusVoltage = 3,
}

/// Operating mode of the INA219
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OperatingMode {
    /// Reduce power usage and disable current into the input pins
    ///
    /// Recovery takes 40µs.
    PowerDown,
    /// Stop the conversions
    AdcOff,
    /// Trigger a single conversion of the given signals
    Triggered(MeasuredSignals),
    /// Continuously measure the given signals
    Continuous(MeasuredSignals),
}

impl OperatingMode {
    const SHIFT: u8 = 0;
    const MASK: u16 = 0b111;
    const CONTINUOUS: u16 = 0b100;

    #[must_use]
    const fn from_register(reg: u16) -> Self {
        let bits = (reg >> Self::SHIFT) & Self::MASK;
        let signals = match bits & 0b11 {
            1 => MeasuredSignals::ShuntVoltage,
            2 => MeasuredSignals::BusVoltage,
            _ => MeasuredSignals::ShuntAndBusVoltage,
        };
        match bits {
            0 => Self::PowerDown,
            0b100 => Self::AdcOff,
            1..=3 => Self::Triggered(signals),
            _ => Self::Continuous(signals),
        }
    }

    #[must_use]
    const fn apply_to_reg(self, reg: u16) -> u16 {
        apply_field(reg, self.as_bits(), Self::SHIFT, Self::MASK)
    }

    /// Return the bits representing this mode
    #[must_use]
    pub const fn as_bits(self) -> u16 {
        match self {
            Self::PowerDown => 0,
            Self::AdcOff => Self::CONTINUOUS,
            Self::Triggered(signals) => signals as u16,
            Self::Continuous(signals) => signals as u16 | Self::CONTINUOUS,
        }
    }
}

impl Default for OperatingMode {
    fn default() -> Self {
        Self::Continuous(MeasuredSignals::ShuntAndBusVoltage)
    }
}

/// Configuration register
///
/// The default is the power-on reset value `0x399F`.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Configuration {
    /// Indicate to perform a reset or continue to run normally
    pub reset: Reset,
    /// Full scale range of the bus voltage
    pub bus_voltage_range: BusVoltageRange,
    /// PGA gain and with it the full scale range of the shunt voltage
    pub gain: Gain,
    /// Resolution / averaging mode for the bus voltage measurement
    pub bus_resolution: Resolution,
    /// Resolution / averaging mode for the shunt voltage measurement
    pub shunt_resolution: Resolution,
    /// Which signals to measure and if continuous or triggered operation is set up
    pub operating_mode: OperatingMode,
}

impl Configuration {
    /// Decode the bits of the configuration register
    #[must_use]
    pub const fn from_bits(reg: u16) -> Self {
        Self {
            reset: Reset::from_register(reg),
            bus_voltage_range: BusVoltageRange::from_register(reg),
            gain: Gain::from_register(reg),
            bus_resolution: Resolution::from_bus_register(reg),
            shunt_resolution: Resolution::from_shunt_register(reg),
            operating_mode: OperatingMode::from_register(reg),
        }
    }

    /// Encode this configuration into the bits of the register
    #[must_use]
    pub const fn as_bits(self) -> u16 {
        let Self {
            reset,
            bus_voltage_range,
            gain,
            bus_resolution,
            shunt_resolution,
            operating_mode,
        } = self;

        let mut bits = 0;
        bits = reset.apply_to_reg(bits);
        bits = bus_voltage_range.apply_to_reg(bits);
        bits = gain.apply_to_reg(bits);
        bits = bus_resolution.apply_to_bus_reg(bits);
        bits = shunt_resolution.apply_to_shunt_reg(bits);
        bits = operating_mode.apply_to_reg(bits);
        bits
    }
}

impl Register for Configuration {
    const ADDRESS: u8 = RegisterName::Configuration as u8;
}

impl ReadRegister for Configuration {
    fn from_bits(bits: u16) -> Self {
        Self::from_bits(bits)
    }
}

impl WriteRegister for Configuration {
    fn as_bits(&self) -> u16 {
        Configuration::as_bits(*self)
    }
}

/// Configuration register exactly as read from the device
///
/// Editing a field only touches the bits of that field, so redundant encodings and unused bits
/// survive a read-modify-write cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RawConfiguration(pub u16);

impl RawConfiguration {
    /// Gain currently selected by the register
    #[must_use]
    pub const fn gain(self) -> Gain {
        Gain::from_register(self.0)
    }

    /// Replace only the gain bits (11..=12)
    #[must_use]
    pub const fn with_gain(self, gain: Gain) -> Self {
        Self(gain.apply_to_reg(self.0))
    }

    /// Operating mode currently selected by the register
    #[must_use]
    pub const fn operating_mode(self) -> OperatingMode {
        OperatingMode::from_register(self.0)
    }

    /// Replace only the mode bits (0..=2)
    #[must_use]
    pub const fn with_operating_mode(self, mode: OperatingMode) -> Self {
        Self(mode.apply_to_reg(self.0))
    }

    /// Decode all fields
    #[must_use]
    pub const fn decode(self) -> Configuration {
        Configuration::from_bits(self.0)
    }
}

impl Register for RawConfiguration {
    const ADDRESS: u8 = RegisterName::Configuration as u8;
}

impl ReadRegister for RawConfiguration {
    fn from_bits(bits: u16) -> Self {
        Self(bits)
    }
}

impl WriteRegister for RawConfiguration {
    fn as_bits(&self) -> u16 {
        self.0
    }
}

const fn apply_field(reg: u16, value: u16, shift: u8, mask: u16) -> u16 {
    (reg & !(mask << shift)) | ((value & mask) << shift)
}
