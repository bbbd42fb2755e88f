//! Errors that can be returned by the different functions

use crate::configuration::Gain;
use core::fmt::{Debug, Display, Formatter};

/// A requested setting is outside of what the INA219 supports
///
/// These are detected before anything is written to the device.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ConfigError {
    /// The shunt resistance must be a finite value above zero
    InvalidShuntResistance(f32),
    /// The maximum expected current must be a finite value of at least zero
    InvalidMaxExpectedCurrent(f32),
    /// Only a 16V (`0`) or 32V (`1`) bus voltage range exists
    BusVoltageRangeOutOfRange(u8),
    /// Only the gain steps `0..=3` exist
    GainOutOfRange(u8),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidShuntResistance(ohms) => {
                write!(f, "Shunt resistance must be above 0Ω, got {ohms}Ω")
            }
            Self::InvalidMaxExpectedCurrent(amps) => {
                write!(f, "Maximum expected current must be at least 0A, got {amps}A")
            }
            Self::BusVoltageRangeOutOfRange(range) => {
                write!(f, "Invalid bus voltage range {range}, must be 16V or 32V")
            }
            Self::GainOutOfRange(step) => {
                write!(f, "Invalid gain step {step}, must be in 0..=3")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// The expected current can not be measured with the shunt resistor in use
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RangeError {
    /// Even the largest gain can not measure the expected current, use a smaller shunt resistor
    ExceedsMaximumGain {
        /// Maximum expected current in A
        max_expected_amps: f32,
        /// Shunt voltage in mV the expected current would cause
        shunt_mv: f32,
    },
    /// The expected current is larger than what can be measured with the selected gain
    ExceedsPossibleCurrent {
        /// Maximum expected current in A
        max_expected_amps: f32,
        /// Largest current in A the selected gain can measure
        max_possible_amps: f32,
    },
}

impl Display for RangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ExceedsMaximumGain {
                max_expected_amps,
                shunt_mv,
            } => write!(
                f,
                "Expected current {max_expected_amps}A causes {shunt_mv}mV over the shunt which is out of range, use a lower value shunt resistor"
            ),
            Self::ExceedsPossibleCurrent {
                max_expected_amps,
                max_possible_amps,
            } => write!(
                f,
                "Expected current {max_expected_amps}A is greater than max possible current {max_possible_amps}A"
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RangeError {}

/// Errors that can happen while configuring and calibrating the device
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ConfigureError<I2cErr> {
    /// An I2C read or write failed
    I2cError(I2cErr),
    /// The expected current does not fit the shunt and gain, nothing was written
    Range(RangeError),
}

impl<E> From<E> for ConfigureError<E> {
    fn from(value: E) -> Self {
        Self::I2cError(value)
    }
}

impl<I2cErr: Debug> Display for ConfigureError<I2cErr> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::I2cError(err) => write!(f, "I2C error: {err:?}"),
            Self::Range(err) => write!(f, "Calibration error: {err}"),
        }
    }
}

#[cfg(feature = "std")]
impl<I2cErr> std::error::Error for ConfigureError<I2cErr>
where
    I2cErr: Debug + std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::I2cError(err) => Some(err),
            Self::Range(err) => Some(err),
        }
    }
}

/// Description of a shunt voltage overflow reported by the device
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OverflowCondition {
    /// Gain in effect when the overflow was seen
    pub gain: Gain,
    /// Automatic gain was enabled and already reached the largest gain
    ///
    /// When `false` auto gain is disabled and a larger gain might resolve the overflow.
    pub auto_gain_exhausted: bool,
}

/// Errors that can happen when a measurement is read
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MeasurementError<I2cErr> {
    /// An I2C read or write failed
    I2cError(I2cErr),
    /// Recalibrating for a larger gain failed
    Range(RangeError),
    /// The device has not been configured since construction or the last reset, so there is no
    /// current or power LSB
    NotCalibrated,
    /// The shunt voltage was out of range for the gain
    ///
    /// `value` is what the register read converts to, it is not a valid measurement.
    Overflow {
        /// The converted but meaningless reading
        value: f32,
        /// What the device reported
        condition: OverflowCondition,
    },
}

impl<E> From<E> for MeasurementError<E> {
    fn from(value: E) -> Self {
        Self::I2cError(value)
    }
}

impl<I2cErr: Debug> Display for MeasurementError<I2cErr> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::I2cError(err) => write!(f, "I2C error: {err:?}"),
            Self::Range(err) => write!(f, "Calibration error: {err}"),
            Self::NotCalibrated => write!(f, "Device is not calibrated, configure it first"),
            Self::Overflow { value, condition } if condition.auto_gain_exhausted => write!(
                f,
                "Current out of device range with gain {}mV (overflow), reading {value} is invalid",
                condition.gain.max_shunt_mv()
            ),
            Self::Overflow { value, condition } => write!(
                f,
                "Current out of range (overflow) for gain {}mV, reading {value} is invalid",
                condition.gain.max_shunt_mv()
            ),
        }
    }
}

#[cfg(feature = "std")]
impl<I2cErr> std::error::Error for MeasurementError<I2cErr>
where
    I2cErr: Debug + std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::I2cError(err) => Some(err),
            Self::Range(err) => Some(err),
            Self::NotCalibrated | Self::Overflow { .. } => None,
        }
    }
}
