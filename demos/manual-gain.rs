use ina219_autogain::calibration::DeviceConfig;
use ina219_autogain::configuration::{BusVoltageRange, Gain, Resolution};
use ina219_autogain::errors::MeasurementError;
use ina219_autogain::SyncIna219;
use linux_embedded_hal::{Delay, I2cdev};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // 0.1Ω shunt and the 40mV range allow up to 0.4A
    let config = DeviceConfig::new(0.1)?.with_max_expected_amps(0.35)?;
    let device = I2cdev::new("/dev/i2c-1")?;
    let mut ina = SyncIna219::new(device, Delay, config);

    ina.configure(
        BusVoltageRange::Fsr16v,
        Gain::Fsr40mv.into(),
        Resolution::Avg16,
        Resolution::Avg16,
    )?;

    let calibration = ina.calibration().expect("configured above");
    println!(
        "Calibration {:#06x}, current LSB {:.3e}A, power LSB {:.3e}W",
        calibration.register_bits(),
        calibration.current_lsb(),
        calibration.power_lsb()
    );

    println!("Bus:     {:.3} V", ina.voltage()?);
    match ina.current() {
        Ok(current) => println!("Current: {current:.3} mA"),
        // Without auto gain the driver leaves the range as configured
        Err(MeasurementError::Overflow { value, condition }) => println!(
            "Current: more than {}mV over the shunt, got {value:.3} mA",
            condition.gain.max_shunt_mv()
        ),
        Err(err) => return Err(err.into()),
    }
    println!("Power:   {:.3} mW", ina.power()?);

    ina.sleep()?;

    Ok(())
}
