//! Calibration of the INA219 from the shunt resistor and the expected current
//!
//! The INA219 turns the measured shunt voltage into current and power readings by multiplying with
//! the calibration register. Choosing that value means choosing a current LSB (the current one bit
//! of the current register represents):
//!
//! ```text
//! current_lsb = max_current / 32767
//! power_lsb   = 20 * current_lsb
//! calibration = trunc(0.04096 / (current_lsb * r_shunt))
//! ```
//!
//! `max_current` is the maximum expected current if one is known, otherwise the largest current
//! the selected gain can measure over the shunt. The current LSB is never allowed to go below the
//! value that would overflow the calibration register.

use crate::address::Address;
use crate::configuration::Gain;
use crate::errors::{ConfigError, RangeError};
use crate::register::{ReadRegister, Register, RegisterName, WriteRegister};

/// Fixed scaling factor of the calibration register in V, see equation 1 of the datasheet
pub const CALIBRATION_FACTOR: f32 = 0.040_96;

/// Largest usable value of the calibration register, bit 0 is not implemented
pub const MAX_CALIBRATION_VALUE: u16 = 0xFFFE;

/// Largest positive value of the current register
pub const CURRENT_LSB_FACTOR: f32 = 32_767.0;

/// Ratio between the power LSB and the current LSB
pub const POWER_LSB_FACTOR: f32 = 20.0;

/// Smallest current LSB in A that still fits the calibration register for this shunt
///
/// ```rust
/// # use ina219_autogain::calibration::min_device_current_lsb;
/// let lsb = min_device_current_lsb(0.1);
/// assert!((lsb - 0.040_96 / (0.1 * 65_534.0)).abs() < 1e-12);
/// ```
#[must_use]
pub fn min_device_current_lsb(shunt_ohms: f32) -> f32 {
    CALIBRATION_FACTOR / (shunt_ohms * f32::from(MAX_CALIBRATION_VALUE))
}

/// Parameters of the measurement circuit, fixed once the driver is created
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DeviceConfig {
    shunt_ohms: f32,
    max_expected_amps: Option<f32>,
    address: Address,
}

impl DeviceConfig {
    /// Describe a circuit with a shunt of `shunt_ohms` Ω at the default address and without a
    /// maximum expected current
    ///
    /// # Errors
    /// The shunt resistance has to be finite and above zero. It also has to be large enough for
    /// the smallest current LSB to be finite.
    pub fn new(shunt_ohms: f32) -> Result<Self, ConfigError> {
        if !shunt_ohms.is_finite()
            || shunt_ohms <= 0.0
            || !min_device_current_lsb(shunt_ohms).is_finite()
        {
            return Err(ConfigError::InvalidShuntResistance(shunt_ohms));
        }

        Ok(Self {
            shunt_ohms,
            max_expected_amps: None,
            address: Address::default(),
        })
    }

    /// Set the largest current in A expected to flow through the shunt
    ///
    /// This allows a finer current LSB than the gain alone would give. A value of `0` means the
    /// maximum is unknown.
    ///
    /// # Errors
    /// The current has to be finite and not negative.
    pub fn with_max_expected_amps(mut self, amps: f32) -> Result<Self, ConfigError> {
        if !amps.is_finite() || amps < 0.0 {
            return Err(ConfigError::InvalidMaxExpectedCurrent(amps));
        }

        self.max_expected_amps = if amps == 0.0 { None } else { Some(amps) };
        Ok(self)
    }

    /// Talk to the INA219 at `address` instead of the default `0x40`
    #[must_use]
    pub const fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    /// Resistance of the shunt in Ω
    #[must_use]
    pub const fn shunt_ohms(&self) -> f32 {
        self.shunt_ohms
    }

    /// Largest expected current in A, if known
    #[must_use]
    pub const fn max_expected_amps(&self) -> Option<f32> {
        self.max_expected_amps
    }

    /// I2C address of the INA219
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Smallest current LSB in A that still fits the calibration register, see
    /// [`min_device_current_lsb`]
    #[must_use]
    pub fn min_device_current_lsb(&self) -> f32 {
        min_device_current_lsb(self.shunt_ohms)
    }

    /// Largest current in A that can be measured with `gain`
    #[must_use]
    pub fn max_possible_amps(&self, gain: Gain) -> f32 {
        gain.max_shunt_volts() / self.shunt_ohms
    }

    /// Pick the smallest gain whose range exceeds the shunt voltage caused by `max_expected_amps`
    ///
    /// A shunt voltage of exactly 320mV selects [`Gain::Fsr320mv`].
    ///
    /// # Errors
    /// Returns `RangeError::ExceedsMaximumGain` if the shunt voltage is above 320mV.
    pub fn determine_gain(&self, max_expected_amps: f32) -> Result<Gain, RangeError> {
        let shunt_volts = max_expected_amps * self.shunt_ohms;
        if shunt_volts > Gain::MAX.max_shunt_volts() {
            return Err(RangeError::ExceedsMaximumGain {
                max_expected_amps,
                shunt_mv: shunt_volts * 1000.0,
            });
        }

        Ok(Gain::ALL
            .into_iter()
            .find(|gain| gain.max_shunt_volts() > shunt_volts)
            .unwrap_or(Gain::MAX))
    }

    /// Current LSB in A for `gain` before the device minimum is applied
    ///
    /// # Errors
    /// Returns `RangeError::ExceedsPossibleCurrent` if the maximum expected current is above what
    /// `gain` can measure, rounded to mA.
    pub fn requested_current_lsb(&self, gain: Gain) -> Result<f32, RangeError> {
        let max_possible_amps = self.max_possible_amps(gain);

        let max_amps = match self.max_expected_amps {
            None => max_possible_amps,
            Some(max_expected_amps) => {
                if max_expected_amps > round_to_milli(max_possible_amps) {
                    return Err(RangeError::ExceedsPossibleCurrent {
                        max_expected_amps,
                        max_possible_amps,
                    });
                }
                max_expected_amps.min(max_possible_amps)
            }
        };

        Ok(max_amps / CURRENT_LSB_FACTOR)
    }

    /// Current LSB in A to use with `gain`, never below [`Self::min_device_current_lsb`]
    ///
    /// # Errors
    /// See [`Self::requested_current_lsb`].
    pub fn determine_current_lsb(&self, gain: Gain) -> Result<f32, RangeError> {
        let requested = self.requested_current_lsb(gain)?;
        Ok(requested.max(self.min_device_current_lsb()))
    }

    /// Derive the full calibration for `gain`
    ///
    /// # Errors
    /// See [`Self::requested_current_lsb`].
    pub fn calibrate(&self, gain: Gain) -> Result<Calibration, RangeError> {
        let current_lsb = self.determine_current_lsb(gain)?;
        let calibration = Calibration::new(current_lsb, self.shunt_ohms);

        log::debug!(
            "calibrated for {}mV: current LSB {:e} A/bit, power LSB {:e} W/bit, register {:#06x}",
            gain.max_shunt_mv(),
            calibration.current_lsb(),
            calibration.power_lsb(),
            calibration.register_bits(),
        );

        Ok(calibration)
    }
}

/// Round a non-negative value to three decimals
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn round_to_milli(value: f32) -> f32 {
    ((value * 1000.0 + 0.5) as u64) as f32 / 1000.0
}

/// A derived calibration: the LSBs of the current and power registers and the register value
/// that makes the device use them
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Calibration {
    current_lsb: f32,
    power_lsb: f32,
    register: CalibrationRegister,
}

impl Calibration {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn new(current_lsb: f32, shunt_ohms: f32) -> Self {
        // `as` truncates towards zero and saturates, the minimum current LSB keeps this in range
        let register = (CALIBRATION_FACTOR / (current_lsb * shunt_ohms)) as u16;

        Self {
            current_lsb,
            power_lsb: current_lsb * POWER_LSB_FACTOR,
            register: CalibrationRegister(register),
        }
    }

    /// Value of the least significant bit of the current register in A
    #[must_use]
    pub const fn current_lsb(&self) -> f32 {
        self.current_lsb
    }

    /// Value of the least significant bit of the power register in W
    #[must_use]
    pub const fn power_lsb(&self) -> f32 {
        self.power_lsb
    }

    /// Value to write to the calibration register
    #[must_use]
    pub const fn register_bits(&self) -> u16 {
        self.register.0
    }

    /// The calibration register as written to the device
    #[must_use]
    pub const fn register(&self) -> CalibrationRegister {
        self.register
    }
}

/// Contents of the calibration register
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct CalibrationRegister(pub u16);

impl Register for CalibrationRegister {
    const ADDRESS: u8 = RegisterName::Calibration as u8;
}

impl ReadRegister for CalibrationRegister {
    fn from_bits(bits: u16) -> Self {
        Self(bits)
    }
}

impl WriteRegister for CalibrationRegister {
    fn as_bits(&self) -> u16 {
        self.0
    }
}

/// Gain and calibration the driver currently has applied to the device
///
/// The default matches a device after power on: largest gain, no calibration.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct CalibrationState {
    gain: Gain,
    auto_gain_enabled: bool,
    calibration: Option<Calibration>,
}

impl CalibrationState {
    pub(crate) const fn new_uncalibrated() -> Self {
        Self {
            gain: Gain::Fsr320mv,
            auto_gain_enabled: false,
            calibration: None,
        }
    }

    pub(crate) const fn new(gain: Gain, auto_gain_enabled: bool, calibration: Calibration) -> Self {
        Self {
            gain,
            auto_gain_enabled,
            calibration: Some(calibration),
        }
    }

    /// Record a calibration as soon as it was written, current and power scale with it alone
    pub(crate) fn set_calibration(&mut self, calibration: Calibration) {
        self.calibration = Some(calibration);
    }

    pub(crate) fn set_gain(&mut self, gain: Gain) {
        self.gain = gain;
    }

    /// Gain in effect
    #[must_use]
    pub const fn gain(&self) -> Gain {
        self.gain
    }

    /// Whether overflows cause the gain to be raised
    #[must_use]
    pub const fn auto_gain_enabled(&self) -> bool {
        self.auto_gain_enabled
    }

    /// Calibration in effect, `None` until configured
    #[must_use]
    pub const fn calibration(&self) -> Option<Calibration> {
        self.calibration
    }
}
