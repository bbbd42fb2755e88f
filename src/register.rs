//! Register map of the INA219 and the traits tying register types to their addresses
#![allow(clippy::module_name_repetitions)]

/// Addresses of the internal registers of the INA219
///
/// | Name          | Address | Access | Contents                                   |
/// |---------------|---------|--------|--------------------------------------------|
/// | Configuration | `0x00`  | R/W    | reset, range, gain, ADC resolution, mode   |
/// | Shunt voltage | `0x01`  | R      | signed, 10µV per bit                       |
/// | Bus voltage   | `0x02`  | R      | bits 3..=15 value (4mV), bit 1 ready, bit 0 overflow |
/// | Power         | `0x03`  | R      | unsigned, power LSB per bit                |
/// | Current       | `0x04`  | R      | signed, current LSB per bit                |
/// | Calibration   | `0x05`  | R/W    | unsigned calibration value                 |
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegisterName {
    /// Configuration register, see [`Configuration`](crate::configuration::Configuration)
    Configuration = 0x00,
    /// Shunt voltage register, see [`ShuntVoltage`](crate::measurements::ShuntVoltage)
    ShuntVoltage = 0x01,
    /// Bus voltage register, see [`BusVoltage`](crate::measurements::BusVoltage)
    BusVoltage = 0x02,
    /// Power register, see [`PowerRegister`](crate::measurements::PowerRegister)
    Power = 0x03,
    /// Current register, see [`CurrentRegister`](crate::measurements::CurrentRegister)
    Current = 0x04,
    /// Calibration register, see [`CalibrationRegister`](crate::calibration::CalibrationRegister)
    Calibration = 0x05,
}

impl RegisterName {
    /// The pointer byte selecting this register on the bus
    #[must_use]
    pub const fn address(self) -> u8 {
        self as u8
    }
}

/// A register with a fixed address
pub trait Register {
    const ADDRESS: u8;
}

/// A register whose 16 bits can be turned into this type
pub trait ReadRegister: Register {
    fn from_bits(bits: u16) -> Self;
}

/// A register that can be written as 16 bits
pub trait WriteRegister: Register {
    fn as_bits(&self) -> u16;
}
