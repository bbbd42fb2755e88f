//! Raw measurement registers and their conversion into physical units
//!
//! Every conversion here is a pure function of the register bits and, for current and power, the
//! LSB of the calibration in effect. Reading the registers is up to the driver.

use crate::register::{ReadRegister, Register, RegisterName};

/// Value of one bit of the bus voltage in mV
pub const BUS_VOLTAGE_LSB_MV: f32 = 4.0;

/// Value of one bit of the shunt voltage in mV
pub const SHUNT_VOLTAGE_LSB_MV: f32 = 0.01;

/// Contents of the shunt voltage register
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct ShuntVoltage(i16);

impl ShuntVoltage {
    /// Reinterpret the register bits as the signed value they hold
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(i16::from_ne_bytes(bits.to_ne_bytes()))
    }

    /// The shunt voltage in the internal resolution of 10µV
    #[must_use]
    pub const fn shunt_voltage_10uv(self) -> i16 {
        self.0
    }

    /// The shunt voltage in mV
    #[must_use]
    pub fn millivolts(self) -> f32 {
        f32::from(self.0) * SHUNT_VOLTAGE_LSB_MV
    }
}

impl Register for ShuntVoltage {
    const ADDRESS: u8 = RegisterName::ShuntVoltage as u8;
}

impl ReadRegister for ShuntVoltage {
    fn from_bits(bits: u16) -> Self {
        Self::from_bits(bits)
    }
}

/// Contents of the bus voltage register
///
/// Next to the measurement this holds flags about the last conversion.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct BusVoltage(u16);

impl BusVoltage {
    const VALUE_SHIFT: u8 = 3;
    const CONVERSION_READY: u16 = 0b10;
    const OVERFLOW: u16 = 0b01;

    /// Create `BusVoltage` from the contents of the register.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// The bus voltage in the internal resolution of 4mV
    #[must_use]
    pub const fn voltage_4mv(self) -> u16 {
        self.0 >> Self::VALUE_SHIFT
    }

    /// The bus voltage in V
    #[must_use]
    pub fn volts(self) -> f32 {
        f32::from(self.voltage_4mv()) * BUS_VOLTAGE_LSB_MV / 1000.0
    }

    /// Check if the conversion ready flag is set
    ///
    /// The flag is set when a conversion finished. It is cleared when the power register is read
    /// or the operating mode is written.
    #[must_use]
    pub const fn is_conversion_ready(self) -> bool {
        self.0 & Self::CONVERSION_READY != 0
    }

    /// The shunt voltage exceeded the range of the gain, current and power are not valid
    #[must_use]
    pub const fn has_overflowed(self) -> bool {
        self.0 & Self::OVERFLOW != 0
    }
}

impl Register for BusVoltage {
    const ADDRESS: u8 = RegisterName::BusVoltage as u8;
}

impl ReadRegister for BusVoltage {
    fn from_bits(bits: u16) -> Self {
        Self::from_bits(bits)
    }
}

/// Contents of the power register, unsigned multiples of the power LSB
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct PowerRegister(pub u16);

impl PowerRegister {
    /// The power in mW for a power LSB given in W
    #[must_use]
    pub fn milliwatts(self, power_lsb: f32) -> f32 {
        f32::from(self.0) * power_lsb * 1000.0
    }
}

impl Register for PowerRegister {
    const ADDRESS: u8 = RegisterName::Power as u8;
}

impl ReadRegister for PowerRegister {
    fn from_bits(bits: u16) -> Self {
        Self(bits)
    }
}

/// Contents of the current register, signed multiples of the current LSB
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct CurrentRegister(pub u16);

impl CurrentRegister {
    /// The register reinterpreted as the signed value it holds
    #[must_use]
    pub const fn signed(self) -> i16 {
        i16::from_ne_bytes(self.0.to_ne_bytes())
    }

    /// The current in mA for a current LSB given in A
    #[must_use]
    pub fn milliamps(self, current_lsb: f32) -> f32 {
        f32::from(self.signed()) * current_lsb * 1000.0
    }
}

impl Register for CurrentRegister {
    const ADDRESS: u8 = RegisterName::Current as u8;
}

impl ReadRegister for CurrentRegister {
    fn from_bits(bits: u16) -> Self {
        Self(bits)
    }
}

/// Voltage of the supply in V: the bus voltage plus the drop over the shunt
#[must_use]
pub fn supply_volts(bus_volts: f32, shunt_millivolts: f32) -> f32 {
    bus_volts + shunt_millivolts / 1000.0
}
