use crate::calibration::{Calibration, CalibrationRegister, CalibrationState, DeviceConfig};
use crate::configuration::{
    BusVoltageRange, Configuration, Gain, GainPolicy, OperatingMode, RawConfiguration, Reset,
    Resolution,
};
use crate::errors::{ConfigureError, MeasurementError, OverflowCondition};
use crate::measurements::{
    supply_volts, BusVoltage, CurrentRegister, PowerRegister, ShuntVoltage,
};
use crate::register::{ReadRegister, RegisterName, WriteRegister};
use crate::timing;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

/// Embedded HAL compatible driver for the INA219
///
/// The driver exclusively owns the bus handle and the delay. If several devices share one bus
/// the caller has to serialize access to it.
pub struct INA219<I2C, Delay> {
    i2c: I2C,
    delay: Delay,
    config: DeviceConfig,
    state: CalibrationState,
}

impl<I2C, Delay> INA219<I2C, Delay>
where
    I2C: I2c,
    Delay: DelayNs,
{
    /// Create a driver for the circuit described by `config`
    ///
    /// Nothing is sent to the device, call [`Self::configure`] before reading current or power.
    pub const fn new(i2c: I2C, delay: Delay, config: DeviceConfig) -> Self {
        INA219 {
            i2c,
            delay,
            config,
            state: CalibrationState::new_uncalibrated(),
        }
    }

    /// Destroy the driver returning the underlying I2C device and delay
    ///
    /// This does leave the device in its current state.
    pub fn destroy(self) -> (I2C, Delay) {
        (self.i2c, self.delay)
    }

    /// The circuit parameters given at construction
    pub const fn device_config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Gain, auto gain flag and calibration currently applied
    pub const fn calibration_state(&self) -> CalibrationState {
        self.state
    }

    /// Gain currently applied
    pub const fn gain(&self) -> Gain {
        self.state.gain()
    }

    /// Whether overflows raise the gain
    pub const fn auto_gain_enabled(&self) -> bool {
        self.state.auto_gain_enabled()
    }

    /// Calibration currently applied, `None` before [`Self::configure`] and after [`Self::reset`]
    pub const fn calibration(&self) -> Option<Calibration> {
        self.state.calibration()
    }

    /// Configure range, gain and ADC resolution and calibrate the device
    ///
    /// With [`GainPolicy::Auto`] the gain starts at the smallest range that fits the maximum
    /// expected current, or at 40mV if none is known, and auto gain is enabled. A fixed gain
    /// disables auto gain.
    ///
    /// The calibration register is written first, then the configuration register with continuous
    /// shunt and bus conversions. Once the calibration register is written current and power use
    /// the new calibration, even if writing the configuration fails.
    ///
    /// # Errors
    /// Returns `ConfigureError::Range` without writing anything if the maximum expected current
    /// can not be measured with the gain, or an I2C error.
    pub async fn configure(
        &mut self,
        range: BusVoltageRange,
        gain: GainPolicy,
        bus_adc: Resolution,
        shunt_adc: Resolution,
    ) -> Result<(), ConfigureError<I2C::Error>> {
        let (gain, auto_gain_enabled) = match (gain, self.config.max_expected_amps()) {
            (GainPolicy::Fixed(gain), _) => (gain, false),
            (GainPolicy::Auto, Some(amps)) => (
                self.config
                    .determine_gain(amps)
                    .map_err(ConfigureError::Range)?,
                true,
            ),
            (GainPolicy::Auto, None) => (Gain::Fsr40mv, true),
        };

        let calibration = self
            .config
            .calibrate(gain)
            .map_err(ConfigureError::Range)?;

        log::debug!(
            "configuring: bus range {}V, gain {}mV (auto: {auto_gain_enabled}), bus ADC {bus_adc:?}, shunt ADC {shunt_adc:?}",
            range.max_volts(),
            gain.max_shunt_mv(),
        );

        self.write(calibration.register()).await?;
        self.state.set_calibration(calibration);
        self.write(Configuration {
            reset: Reset::Run,
            bus_voltage_range: range,
            gain,
            bus_resolution: bus_adc,
            shunt_resolution: shunt_adc,
            operating_mode: OperatingMode::default(),
        })
        .await?;

        self.state = CalibrationState::new(gain, auto_gain_enabled, calibration);
        Ok(())
    }

    /// Check the overflow flag and, with auto gain, raise the gain until it clears
    ///
    /// Each step recalibrates for the next larger gain, writes the gain bits of the configuration
    /// register and waits 1ms for the device to settle. At most three steps are taken.
    ///
    /// Returns `Ok(None)` when the device does not report an overflow (anymore). `Ok(Some(_))`
    /// means current, power and shunt voltage readings are invalid: either auto gain is disabled
    /// or the largest gain was reached.
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error or recalibrating fails.
    pub async fn handle_overflow(
        &mut self,
    ) -> Result<Option<OverflowCondition>, MeasurementError<I2C::Error>> {
        let mut escalations = 0;

        loop {
            if !self.current_overflow().await? {
                return Ok(None);
            }

            if !self.state.auto_gain_enabled() {
                let gain = self.state.gain();
                log::warn!(
                    "current out of range (overflow) for gain {}mV",
                    gain.max_shunt_mv()
                );
                return Ok(Some(OverflowCondition {
                    gain,
                    auto_gain_exhausted: false,
                }));
            }

            let config: RawConfiguration = self.read().await?;
            let gain = config.gain();
            let next = match gain.next() {
                Some(next) if escalations < Gain::MAX.step() => next,
                _ => {
                    log::warn!(
                        "device limit reached, current out of range (overflow) for gain {}mV",
                        gain.max_shunt_mv()
                    );
                    return Ok(Some(OverflowCondition {
                        gain,
                        auto_gain_exhausted: true,
                    }));
                }
            };

            log::debug!(
                "current overflow at {}mV, increasing gain to {}mV",
                gain.max_shunt_mv(),
                next.max_shunt_mv()
            );

            let calibration = self
                .config
                .calibrate(next)
                .map_err(MeasurementError::Range)?;
            self.write(calibration.register()).await?;
            self.state.set_calibration(calibration);
            self.write(config.with_gain(next)).await?;
            self.state.set_gain(next);

            // Current and power are invalid until the new gain took effect
            self.delay.delay_us(timing::GAIN_SETTLE_US).await;
            escalations += 1;
        }
    }

    /// Read the overflow flag of the bus voltage register without changing the gain
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn current_overflow(&mut self) -> Result<bool, I2C::Error> {
        Ok(self.bus_voltage().await?.has_overflowed())
    }

    /// Read the bus voltage register including its flags
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn bus_voltage(&mut self) -> Result<BusVoltage, I2C::Error> {
        self.read().await
    }

    /// Bus voltage in V
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn voltage(&mut self) -> Result<f32, I2C::Error> {
        Ok(self.bus_voltage().await?.volts())
    }

    /// Shunt voltage in mV
    ///
    /// # Errors
    /// Returns `MeasurementError::Overflow` carrying the reading if the shunt voltage is out of
    /// range, see [`Self::handle_overflow`]. Also returns an error if the underlying I2C device
    /// returns an error.
    pub async fn shunt_voltage(&mut self) -> Result<f32, MeasurementError<I2C::Error>> {
        let (millivolts, overflow) = self.shunt_millivolts().await?;
        checked(millivolts, overflow)
    }

    /// Supply voltage in V, the bus voltage plus the voltage over the shunt
    ///
    /// # Errors
    /// See [`Self::shunt_voltage`].
    pub async fn supply_voltage(&mut self) -> Result<f32, MeasurementError<I2C::Error>> {
        let bus = self.voltage().await?;
        let (shunt, overflow) = self.shunt_millivolts().await?;
        checked(supply_volts(bus, shunt), overflow)
    }

    /// Current in mA
    ///
    /// # Errors
    /// Returns `MeasurementError::NotCalibrated` without bus traffic if the device has not been
    /// configured. Returns `MeasurementError::Overflow` carrying the reading if the shunt voltage
    /// is out of range, see [`Self::handle_overflow`]. Also returns an error if the underlying I2C
    /// device returns an error.
    pub async fn current(&mut self) -> Result<f32, MeasurementError<I2C::Error>> {
        if self.state.calibration().is_none() {
            return Err(MeasurementError::NotCalibrated);
        }

        let overflow = self.handle_overflow().await?;
        let calibration = self
            .state
            .calibration()
            .ok_or(MeasurementError::NotCalibrated)?;
        let raw = self.current_raw().await?;

        checked(raw.milliamps(calibration.current_lsb()), overflow)
    }

    /// Power in mW
    ///
    /// # Errors
    /// See [`Self::current`].
    pub async fn power(&mut self) -> Result<f32, MeasurementError<I2C::Error>> {
        if self.state.calibration().is_none() {
            return Err(MeasurementError::NotCalibrated);
        }

        let overflow = self.handle_overflow().await?;
        let calibration = self
            .state
            .calibration()
            .ok_or(MeasurementError::NotCalibrated)?;
        let raw = self.power_raw().await?;

        checked(raw.milliwatts(calibration.power_lsb()), overflow)
    }

    /// Put the device into power down mode by clearing the mode bits
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn sleep(&mut self) -> Result<(), I2C::Error> {
        let config: RawConfiguration = self.read().await?;
        self.write(config.with_operating_mode(OperatingMode::PowerDown))
            .await
    }

    /// Return from power down to continuous shunt and bus conversions
    ///
    /// Waits the 40µs the device needs to recover before returning.
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn wake(&mut self) -> Result<(), I2C::Error> {
        let config: RawConfiguration = self.read().await?;
        self.write(config.with_operating_mode(OperatingMode::default()))
            .await?;
        self.delay.delay_us(timing::WAKE_RECOVERY_US).await;
        Ok(())
    }

    /// Reset all registers of the device to their power on defaults
    ///
    /// The calibration is lost, call [`Self::configure`] again before reading current or power.
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn reset(&mut self) -> Result<(), I2C::Error> {
        self.write(Configuration {
            reset: Reset::Reset,
            ..Default::default()
        })
        .await?;
        self.state = CalibrationState::new_uncalibrated();
        Ok(())
    }

    /// Read and decode the configuration register
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn configuration(&mut self) -> Result<Configuration, I2C::Error> {
        self.read().await
    }

    /// Read the configuration register without decoding it
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn configuration_raw(&mut self) -> Result<RawConfiguration, I2C::Error> {
        self.read().await
    }

    /// Read back the calibration register
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn calibration_register(&mut self) -> Result<CalibrationRegister, I2C::Error> {
        self.read().await
    }

    /// Read the current register without checking for an overflow
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn current_raw(&mut self) -> Result<CurrentRegister, I2C::Error> {
        self.read().await
    }

    /// Read the power register without checking for an overflow
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn power_raw(&mut self) -> Result<PowerRegister, I2C::Error> {
        self.read().await
    }

    /// Read a register: select it, wait 1ms, then read two bytes big endian
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn read_register(&mut self, register: RegisterName) -> Result<u16, I2C::Error> {
        self.read_address(register.address()).await
    }

    /// Write a register as address byte followed by the value big endian
    ///
    /// Writing registers behind the back of the driver can invalidate its calibration state.
    ///
    /// # Errors
    /// Returns an error if the underlying I2C device returns an error.
    pub async fn write_register(
        &mut self,
        register: RegisterName,
        value: u16,
    ) -> Result<(), I2C::Error> {
        self.write_address(register.address(), value).await
    }

    async fn shunt_millivolts(
        &mut self,
    ) -> Result<(f32, Option<OverflowCondition>), MeasurementError<I2C::Error>> {
        let overflow = self.handle_overflow().await?;
        let shunt: ShuntVoltage = self.read().await?;
        Ok((shunt.millivolts(), overflow))
    }

    async fn read<Reg: ReadRegister>(&mut self) -> Result<Reg, I2C::Error> {
        Ok(Reg::from_bits(self.read_address(Reg::ADDRESS).await?))
    }

    async fn write<Reg: WriteRegister>(&mut self, reg: Reg) -> Result<(), I2C::Error> {
        self.write_address(Reg::ADDRESS, reg.as_bits()).await
    }

    async fn read_address(&mut self, register: u8) -> Result<u16, I2C::Error> {
        let address = self.config.address().as_byte();
        let mut buf: [u8; 2] = [0x00; 2];

        self.i2c.write(address, &[register]).await?;
        self.delay.delay_us(timing::REGISTER_READ_US).await;
        self.i2c.read(address, &mut buf).await?;

        Ok(u16::from_be_bytes(buf))
    }

    async fn write_address(&mut self, register: u8, value: u16) -> Result<(), I2C::Error> {
        let [high, low] = value.to_be_bytes();
        self.i2c
            .write(self.config.address().as_byte(), &[register, high, low])
            .await
    }
}

/// Turn a reading into an error if it was taken while the device reported an overflow
fn checked<E>(
    value: f32,
    overflow: Option<OverflowCondition>,
) -> Result<f32, MeasurementError<E>> {
    match overflow {
        None => Ok(value),
        Some(condition) => Err(MeasurementError::Overflow { value, condition }),
    }
}
