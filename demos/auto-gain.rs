use ina219_autogain::calibration::DeviceConfig;
use ina219_autogain::configuration::{BusVoltageRange, GainPolicy, Resolution};
use ina219_autogain::SyncIna219;
use linux_embedded_hal::{Delay, I2cdev};
use std::error::Error;
use std::fmt::Display;
use std::time::Duration;

/// Print a reading, an overflow is shown together with the invalid value
fn show<E: Display>(name: &str, unit: &str, reading: Result<f32, E>) {
    match reading {
        Ok(value) => println!("{name:<8} {value:>10.3} {unit}"),
        Err(err) => println!("{name:<8} {err}"),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // 0.1Ω shunt with up to 0.2A on a 32V bus
    let config = DeviceConfig::new(0.1)?.with_max_expected_amps(0.2)?;
    let device = I2cdev::new("/dev/i2c-1")?;
    let mut ina = SyncIna219::new(device, Delay, config);

    ina.configure(
        BusVoltageRange::Fsr32v,
        GainPolicy::Auto,
        Resolution::Res12Bit,
        Resolution::Res12Bit,
    )?;

    loop {
        show("Bus", "V", ina.voltage());
        show("Supply", "V", ina.supply_voltage());
        show("Shunt", "mV", ina.shunt_voltage());
        show("Current", "mA", ina.current());
        show("Power", "mW", ina.power());
        println!("Gain     {:>10} mV", ina.gain().max_shunt_mv());
        println!();

        std::thread::sleep(Duration::from_secs(1));
    }
}
