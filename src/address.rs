//! I2C address of the INA219
//!
//! The two address pins A0 and A1 can each be strapped to GND, VS+, SDA or SCL, which gives 16
//! addresses from `0x40` to `0x4F` (table 1 of the datasheet).

use core::fmt::Formatter;
use core::ops::RangeInclusive;

/// Signal an address pin is strapped to
///
/// The discriminant is the two bit value the pin contributes to the address.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum Pin {
    /// Strapped to GND
    Gnd = 0b00,
    /// Strapped to VS+
    Vcc = 0b01,
    /// Strapped to SDA
    Sda = 0b10,
    /// Strapped to SCL
    Scl = 0b11,
}

impl Pin {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Gnd,
            0b01 => Self::Vcc,
            0b10 => Self::Sda,
            _ => Self::Scl,
        }
    }
}

/// 7 bit I2C address of an INA219
///
/// ```rust
/// use ina219_autogain::address::{Address, Pin};
///
/// assert_eq!(Address::default().as_byte(), 0x40);
/// assert_eq!(Address::from_pins(Pin::Vcc, Pin::Gnd).as_byte(), 0x41);
/// assert_eq!(Address::from_byte(0x45).unwrap().as_pins(), (Pin::Vcc, Pin::Vcc));
/// assert!(Address::from_byte(0x20).is_err());
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Address {
    byte: u8,
}

impl Address {
    const VALID: RangeInclusive<u8> = 0x40..=0x4F;
    const BASE: u8 = *Self::VALID.start();
    const LAST: u8 = *Self::VALID.end();

    /// Address selected by the straps of A0 and A1
    #[must_use]
    pub const fn from_pins(a0: Pin, a1: Pin) -> Self {
        Self {
            byte: Self::BASE | ((a1 as u8) << 2) | (a0 as u8),
        }
    }

    /// Address from its 7 bit value
    ///
    /// # Errors
    /// Fails for bytes outside of `0x40..=0x4F`.
    pub const fn from_byte(byte: u8) -> Result<Self, OutOfRange> {
        match byte {
            Self::BASE..=Self::LAST => Ok(Self { byte }),
            which => Err(OutOfRange { which }),
        }
    }

    /// The 7 bit address
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.byte
    }

    /// The straps of A0 and A1 selecting this address
    #[must_use]
    pub const fn as_pins(self) -> (Pin, Pin) {
        (Pin::from_bits(self.byte), Pin::from_bits(self.byte >> 2))
    }
}

/// Both address pins to GND, `0x40`
impl Default for Address {
    fn default() -> Self {
        Self::from_pins(Pin::Gnd, Pin::Gnd)
    }
}

impl TryFrom<u8> for Address {
    type Error = OutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_byte(value)
    }
}

/// The byte is not an INA219 address
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OutOfRange {
    which: u8,
}

impl core::fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Address {:#04x} out of range, should be in {:#04x}..={:#04x}",
            self.which,
            Address::BASE,
            Address::LAST,
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OutOfRange {}
