//! Driver for the INA219 current/power monitor with shunt based calibration and automatic gain
//!
//! The driver derives the calibration register from the shunt resistance and, optionally, the
//! largest current expected to flow. With [`GainPolicy::Auto`](configuration::GainPolicy) it
//! starts at the gain with the best resolution for that current and raises the gain whenever the
//! device reports that the shunt voltage overflowed its range.
//!
//! ```no_run
//! # #[cfg(all(feature = "sync", feature = "std"))]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use ina219_autogain::calibration::DeviceConfig;
//! use ina219_autogain::configuration::{BusVoltageRange, GainPolicy, Resolution};
//! use ina219_autogain::SyncIna219;
//! use linux_embedded_hal::{Delay, I2cdev};
//!
//! let config = DeviceConfig::new(0.1)?.with_max_expected_amps(0.2)?;
//! let mut ina = SyncIna219::new(I2cdev::new("/dev/i2c-1")?, Delay, config);
//! ina.configure(
//!     BusVoltageRange::Fsr32v,
//!     GainPolicy::Auto,
//!     Resolution::Res12Bit,
//!     Resolution::Res12Bit,
//! )?;
//!
//! println!("{}V {}mA {}mW", ina.voltage()?, ina.current()?, ina.power()?);
//! # Ok(())
//! # }
//! # #[cfg(not(all(feature = "sync", feature = "std")))]
//! # fn main() {}
//! ```
//!
//! # Features
//! - `sync` (default): blocking driver [`SyncIna219`] on `embedded-hal`
//! - `async` (default): async driver [`AsyncIna219`] on `embedded-hal-async`
//! - `std`: implement `std::error::Error` for all error types

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(clippy::pedantic)]

pub mod address;
pub mod calibration;
pub mod configuration;
pub mod errors;
pub mod measurements;
pub mod register;

#[cfg(feature = "async")]
mod r#async;

#[cfg(feature = "async")]
pub use r#async::INA219 as AsyncIna219;

#[cfg(feature = "sync")]
mod sync {
    include!(concat!(env!("OUT_DIR"), "/de-asynced.rs"));
}

#[cfg(feature = "sync")]
pub use sync::INA219 as SyncIna219;

/// Delays the INA219 needs before a register access gives a valid result, in µs
pub mod timing {
    /// Between selecting a register and reading it
    pub const REGISTER_READ_US: u32 = 1_000;
    /// After changing the gain until current and power are valid again
    pub const GAIN_SETTLE_US: u32 = 1_000;
    /// Recovery from power down (datasheet page 14)
    pub const WAKE_RECOVERY_US: u32 = 40;
}

#[cfg(all(test, feature = "sync"))]
mod tests;
