use crate::calibration::DeviceConfig;
use crate::configuration::{BusVoltageRange, Gain, GainPolicy, Resolution};
use crate::errors::{ConfigureError, MeasurementError, OverflowCondition, RangeError};
use crate::register::RegisterName;
use crate::SyncIna219;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::ErrorKind;
use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

const DEV_ADDR: u8 = 0x40;

/// Configuration written by `configure` for 32V, 12 bit ADCs and continuous conversions
const fn config_bits(gain: Gain) -> u16 {
    0b0010_0001_1001_1111 | (gain as u16) << 11
}

const OVERFLOW: u16 = 0b01;
const CONVERSION_READY: u16 = 0b10;

/// Calculate the value for the bus voltage register without the flags
const fn bus_voltage(milli_volts: u16) -> u16 {
    (milli_volts / 4) << 3
}

/// Create the expected `Transaction`s for a register read: select, then read two bytes
#[allow(clippy::cast_possible_truncation)]
fn read_reg(reg: RegisterName, value: u16) -> Vec<Transaction> {
    vec![
        Transaction::write(DEV_ADDR, vec![reg as u8]),
        Transaction::read(DEV_ADDR, vec![(value >> 8) as u8, value as u8]),
    ]
}

/// Create the expected `Transaction` for a register write
#[allow(clippy::cast_possible_truncation)]
fn write_reg(reg: RegisterName, value: u16) -> Vec<Transaction> {
    vec![Transaction::write(
        DEV_ADDR,
        vec![reg as u8, (value >> 8) as u8, value as u8],
    )]
}

/// Transactions of `configure` for the given circuit and resulting gain
fn configure_transactions(config: &DeviceConfig, gain: Gain) -> Vec<Transaction> {
    let cal = config.calibrate(gain).unwrap();
    [
        write_reg(RegisterName::Calibration, cal.register_bits()),
        write_reg(RegisterName::Configuration, config_bits(gain)),
    ]
    .concat()
}

/// Transactions of one gain step of the auto gain escalation
fn escalate_transactions(config: &DeviceConfig, from: Gain, to: Gain) -> Vec<Transaction> {
    let cal = config.calibrate(to).unwrap();
    [
        read_reg(RegisterName::BusVoltage, bus_voltage(5_000) | OVERFLOW),
        read_reg(RegisterName::Configuration, config_bits(from)),
        write_reg(RegisterName::Calibration, cal.register_bits()),
        write_reg(RegisterName::Configuration, config_bits(to)),
    ]
    .concat()
}

fn shunt_config(ohms: f32, max_expected_amps: f32) -> DeviceConfig {
    DeviceConfig::new(ohms)
        .unwrap()
        .with_max_expected_amps(max_expected_amps)
        .unwrap()
}

/// Create an `INA219` that will react with the given transactions to a test
fn mock(config: DeviceConfig, transactions: &[Transaction]) -> SyncIna219<I2cMock, NoopDelay> {
    SyncIna219::new(I2cMock::new(transactions), NoopDelay::new(), config)
}

/// Create an `INA219` configured for 32V and 12 bit ADCs, followed by the given transactions
fn mock_configured(
    config: DeviceConfig,
    policy: GainPolicy,
    gain: Gain,
    transactions: &[Transaction],
) -> SyncIna219<I2cMock, NoopDelay> {
    let mut all_transactions = configure_transactions(&config, gain);
    all_transactions.extend_from_slice(transactions);

    let mut ina = mock(config, &all_transactions);
    configure(&mut ina, policy).unwrap();
    ina
}

fn configure(
    ina: &mut SyncIna219<I2cMock, NoopDelay>,
    policy: GainPolicy,
) -> Result<(), ConfigureError<ErrorKind>> {
    ina.configure(
        BusVoltageRange::Fsr32v,
        policy,
        Resolution::Res12Bit,
        Resolution::Res12Bit,
    )
}

/// Delay that remembers every requested wait in µs
#[derive(Debug, Default)]
struct RecordingDelay {
    waits_us: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.waits_us.push(ns.div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.waits_us.push(us);
    }
}

fn mock_recording(
    config: DeviceConfig,
    transactions: &[Transaction],
) -> SyncIna219<I2cMock, RecordingDelay> {
    SyncIna219::new(I2cMock::new(transactions), RecordingDelay::default(), config)
}

/// Finish the I2C expectations and return the waits the driver asked for
fn waits(ina: SyncIna219<I2cMock, RecordingDelay>) -> Vec<u32> {
    let (mut i2c, delay) = ina.destroy();
    i2c.done();
    delay.waits_us
}

/// A register write the device does not acknowledge
fn failing_write_reg(reg: RegisterName, value: u16) -> Transaction {
    let [high, low] = value.to_be_bytes();
    Transaction::write(DEV_ADDR, vec![reg as u8, high, low]).with_error(ErrorKind::Other)
}

fn done(ina: SyncIna219<I2cMock, NoopDelay>) {
    let (mut i2c, _delay) = ina.destroy();
    i2c.done();
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-4 * b.abs().max(1.0)
}

#[test]
fn auto_gain_picks_smallest_range_for_expected_current() {
    // 0.2A over 0.1Ω is 20mV which fits the 40mV range
    let config = shunt_config(0.1, 0.2);
    let ina = mock_configured(config, GainPolicy::Auto, Gain::Fsr40mv, &[]);

    assert_eq!(ina.gain(), Gain::Fsr40mv);
    assert!(ina.auto_gain_enabled());

    let cal = ina.calibration().expect("configured");
    assert!(cal.current_lsb() >= config.min_device_current_lsb());
    assert!(approx(cal.power_lsb(), 20.0 * cal.current_lsb()));

    done(ina);
}

#[test]
fn auto_gain_without_expected_current_starts_at_40mv() {
    let config = DeviceConfig::new(0.1).unwrap();
    let ina = mock_configured(config, GainPolicy::Auto, Gain::Fsr40mv, &[]);

    assert_eq!(ina.gain(), Gain::Fsr40mv);
    assert!(ina.auto_gain_enabled());

    done(ina);
}

#[test]
fn fixed_gain_disables_auto_gain() {
    let config = shunt_config(0.1, 0.2);
    let ina = mock_configured(
        config,
        GainPolicy::Fixed(Gain::Fsr160mv),
        Gain::Fsr160mv,
        &[],
    );

    assert_eq!(ina.gain(), Gain::Fsr160mv);
    assert!(!ina.auto_gain_enabled());

    done(ina);
}

#[test]
fn configure_writes_adc_and_range_fields() {
    let config = DeviceConfig::new(0.1).unwrap();
    let cal = config.calibrate(Gain::Fsr320mv).unwrap();
    let mut ina = mock(
        config,
        &[
            write_reg(RegisterName::Calibration, cal.register_bits()),
            write_reg(RegisterName::Configuration, 0b0001_1000_0111_1111),
        ]
        .concat(),
    );

    ina.configure(
        BusVoltageRange::Fsr16v,
        Gain::Fsr320mv.into(),
        Resolution::Res9Bit,
        Resolution::Avg128,
    )
    .unwrap();

    done(ina);
}

#[test]
fn expected_current_beyond_max_gain_writes_nothing() {
    // 3.5A over 0.1Ω is 350mV, more than the 320mV of the largest gain
    let mut ina = mock(shunt_config(0.1, 3.5), &[]);

    let err = configure(&mut ina, GainPolicy::Auto).unwrap_err();
    assert!(matches!(
        err,
        ConfigureError::Range(RangeError::ExceedsMaximumGain { .. })
    ));
    assert!(ina.calibration().is_none());

    done(ina);
}

#[test]
fn expected_current_beyond_fixed_gain_writes_nothing() {
    // At 40mV a 0.1Ω shunt allows 0.4A
    let mut ina = mock(shunt_config(0.1, 3.0), &[]);

    let err = configure(&mut ina, GainPolicy::Fixed(Gain::Fsr40mv)).unwrap_err();
    assert!(matches!(
        err,
        ConfigureError::Range(RangeError::ExceedsPossibleCurrent { .. })
    ));

    done(ina);
}

#[test]
fn calibration_register_reads_back() {
    let config = shunt_config(0.1, 0.2);
    let bits = config.calibrate(Gain::Fsr40mv).unwrap().register_bits();
    let mut ina = mock_configured(
        config,
        GainPolicy::Auto,
        Gain::Fsr40mv,
        &read_reg(RegisterName::Calibration, bits),
    );

    let read = ina.calibration_register().unwrap();
    assert_eq!(read, ina.calibration().unwrap().register());

    done(ina);
}

#[test]
fn read_measurements() {
    let config = DeviceConfig::new(0.1).unwrap();
    let transactions = [
        // voltage
        read_reg(RegisterName::BusVoltage, bus_voltage(12_000) | CONVERSION_READY),
        // current: overflow check, then the current register
        read_reg(RegisterName::BusVoltage, bus_voltage(12_000)),
        read_reg(RegisterName::Current, 1_000),
        // power: overflow check, then the power register
        read_reg(RegisterName::BusVoltage, bus_voltage(12_000)),
        read_reg(RegisterName::Power, 500),
        // shunt voltage: overflow check, then the shunt register
        read_reg(RegisterName::BusVoltage, bus_voltage(12_000)),
        read_reg(RegisterName::ShuntVoltage, 0b1111_0000_0101_1111), // -40.01mV
    ]
    .concat();
    let mut ina = mock_configured(
        config,
        GainPolicy::Fixed(Gain::Fsr320mv),
        Gain::Fsr320mv,
        &transactions,
    );
    let cal = ina.calibration().unwrap();

    assert!(approx(ina.voltage().unwrap(), 12.0));
    assert!(approx(
        ina.current().unwrap(),
        1_000.0 * cal.current_lsb() * 1000.0
    ));
    assert!(approx(ina.power().unwrap(), 500.0 * cal.power_lsb() * 1000.0));
    assert!(approx(ina.shunt_voltage().unwrap(), -40.01));

    done(ina);
}

#[test]
fn supply_voltage_adds_shunt_drop() {
    let config = DeviceConfig::new(0.1).unwrap();
    let transactions = [
        read_reg(RegisterName::BusVoltage, bus_voltage(12_000)),
        read_reg(RegisterName::BusVoltage, bus_voltage(12_000)),
        read_reg(RegisterName::ShuntVoltage, 4_000), // 40mV
    ]
    .concat();
    let mut ina = mock(config, &transactions);

    assert!(approx(ina.supply_voltage().unwrap(), 12.04));

    done(ina);
}

#[test]
fn overflow_without_auto_gain_is_reported() {
    let config = shunt_config(0.1, 0.2);
    // Value bits 1 (4mV) and the overflow flag
    let flagged = 0b0000_0000_0000_1001;
    let transactions = [
        read_reg(RegisterName::BusVoltage, flagged),
        read_reg(RegisterName::BusVoltage, flagged),
        read_reg(RegisterName::Current, 100),
        read_reg(RegisterName::BusVoltage, flagged),
        read_reg(RegisterName::Power, 7),
    ]
    .concat();
    let mut ina = mock_configured(
        config,
        GainPolicy::Fixed(Gain::Fsr40mv),
        Gain::Fsr40mv,
        &transactions,
    );
    let cal = ina.calibration().unwrap();
    let condition = OverflowCondition {
        gain: Gain::Fsr40mv,
        auto_gain_exhausted: false,
    };

    // The bus voltage itself stays readable
    assert!(approx(ina.voltage().unwrap(), 0.004));

    match ina.current().unwrap_err() {
        MeasurementError::Overflow { value, condition: c } => {
            assert_eq!(c, condition);
            assert!(approx(value, 100.0 * cal.current_lsb() * 1000.0));
        }
        e => panic!("Unexpected error: {e:?}"),
    }

    assert!(matches!(
        ina.power().unwrap_err(),
        MeasurementError::Overflow { condition: c, .. } if c == condition
    ));

    // No gain change without auto gain
    assert_eq!(ina.gain(), Gain::Fsr40mv);

    done(ina);
}

#[test]
fn auto_gain_escalates_until_overflow_clears() {
    let config = shunt_config(0.1, 0.2);
    let transactions = [
        escalate_transactions(&config, Gain::Fsr40mv, Gain::Fsr80mv),
        read_reg(RegisterName::BusVoltage, bus_voltage(5_000)),
        read_reg(RegisterName::Current, 2_000),
    ]
    .concat();
    let mut ina = mock_configured(config, GainPolicy::Auto, Gain::Fsr40mv, &transactions);

    let current = ina.current().unwrap();

    assert_eq!(ina.gain(), Gain::Fsr80mv);
    let cal = ina.calibration().unwrap();
    assert_eq!(cal, config.calibrate(Gain::Fsr80mv).unwrap());
    assert!(approx(current, 2_000.0 * cal.current_lsb() * 1000.0));

    done(ina);
}

#[test]
fn auto_gain_reports_overflow_at_max_gain() {
    // 1A over 0.1Ω is 100mV, so auto gain starts at 160mV and has a single step left
    let config = shunt_config(0.1, 1.0);
    let transactions = [
        escalate_transactions(&config, Gain::Fsr160mv, Gain::Fsr320mv),
        read_reg(RegisterName::BusVoltage, bus_voltage(5_000) | OVERFLOW),
        read_reg(RegisterName::Configuration, config_bits(Gain::Fsr320mv)),
        read_reg(RegisterName::Power, 1_234),
    ]
    .concat();
    let mut ina = mock_configured(config, GainPolicy::Auto, Gain::Fsr160mv, &transactions);

    let err = ina.power().unwrap_err();
    assert!(matches!(
        err,
        MeasurementError::Overflow {
            condition: OverflowCondition {
                gain: Gain::Fsr320mv,
                auto_gain_exhausted: true,
            },
            ..
        }
    ));
    assert_eq!(ina.gain(), Gain::Fsr320mv);

    done(ina);
}

#[test]
fn escalation_is_bounded_by_gain_steps() {
    let config = shunt_config(0.1, 0.2);
    let transactions = [
        escalate_transactions(&config, Gain::Fsr40mv, Gain::Fsr80mv),
        escalate_transactions(&config, Gain::Fsr80mv, Gain::Fsr160mv),
        escalate_transactions(&config, Gain::Fsr160mv, Gain::Fsr320mv),
        read_reg(RegisterName::BusVoltage, bus_voltage(5_000) | OVERFLOW),
        read_reg(RegisterName::Configuration, config_bits(Gain::Fsr320mv)),
        read_reg(RegisterName::ShuntVoltage, 32_000), // 320mV
    ]
    .concat();
    let mut ina = mock_configured(config, GainPolicy::Auto, Gain::Fsr40mv, &transactions);

    match ina.shunt_voltage().unwrap_err() {
        MeasurementError::Overflow { value, condition } => {
            assert!(approx(value, 320.0));
            assert_eq!(condition.gain, Gain::MAX);
            assert!(condition.auto_gain_exhausted);
        }
        e => panic!("Unexpected error: {e:?}"),
    }

    done(ina);
}

#[test]
fn escalation_stops_if_device_ignores_gain() {
    // The device keeps reporting 40mV, the driver gives up after three steps
    let config = shunt_config(0.1, 0.2);
    let stuck = escalate_transactions(&config, Gain::Fsr40mv, Gain::Fsr80mv);
    let transactions = [
        stuck.clone(),
        stuck.clone(),
        stuck,
        read_reg(RegisterName::BusVoltage, bus_voltage(5_000) | OVERFLOW),
        read_reg(RegisterName::Configuration, config_bits(Gain::Fsr40mv)),
    ]
    .concat();
    let mut ina = mock_configured(config, GainPolicy::Auto, Gain::Fsr40mv, &transactions);

    let condition = ina.handle_overflow().unwrap().expect("still overflowing");
    assert!(condition.auto_gain_exhausted);

    done(ina);
}

#[test]
fn transport_error_aborts_reading() {
    let config = shunt_config(0.1, 0.2);
    let transactions = [
        Transaction::write(DEV_ADDR, vec![RegisterName::BusVoltage as u8]),
        Transaction::read(DEV_ADDR, vec![0, 0]).with_error(ErrorKind::Other),
    ];
    let mut ina = mock_configured(config, GainPolicy::Auto, Gain::Fsr40mv, &transactions);

    // The current register is never read
    assert_eq!(
        ina.current().unwrap_err(),
        MeasurementError::I2cError(ErrorKind::Other)
    );

    done(ina);
}

#[test]
fn transport_error_while_configuring() {
    let config = DeviceConfig::new(0.1).unwrap();
    let cal = config.calibrate(Gain::Fsr40mv).unwrap();
    let transactions = [Transaction::write(
        DEV_ADDR,
        vec![
            RegisterName::Calibration as u8,
            cal.register_bits().to_be_bytes()[0],
            cal.register_bits().to_be_bytes()[1],
        ],
    )
    .with_error(ErrorKind::Other)];
    let mut ina = mock(config, &transactions);

    assert_eq!(
        configure(&mut ina, GainPolicy::Auto),
        Err(ConfigureError::I2cError(ErrorKind::Other))
    );
    assert!(ina.calibration().is_none());

    done(ina);
}

#[test]
fn current_requires_calibration() {
    let mut ina = mock(DeviceConfig::new(0.1).unwrap(), &[]);

    assert_eq!(ina.current(), Err(MeasurementError::NotCalibrated));
    assert_eq!(ina.power(), Err(MeasurementError::NotCalibrated));

    done(ina);
}

#[test]
fn reset_drops_calibration() {
    let config = shunt_config(0.1, 0.2);
    let mut ina = mock_configured(
        config,
        GainPolicy::Auto,
        Gain::Fsr40mv,
        &write_reg(RegisterName::Configuration, 0b1011_1001_1001_1111),
    );

    ina.reset().unwrap();

    assert!(ina.calibration().is_none());
    assert!(!ina.auto_gain_enabled());
    assert_eq!(ina.gain(), Gain::Fsr320mv);
    assert_eq!(ina.current(), Err(MeasurementError::NotCalibrated));

    done(ina);
}

#[test]
fn sleep_and_wake_only_touch_mode_bits() {
    let config = DeviceConfig::new(0.1).unwrap();
    let awake = config_bits(Gain::Fsr80mv) | 1 << 14; // unused bit stays as read
    let asleep = awake & !0b111;
    let transactions = [
        read_reg(RegisterName::Configuration, awake),
        write_reg(RegisterName::Configuration, asleep),
        read_reg(RegisterName::Configuration, asleep),
        write_reg(RegisterName::Configuration, awake),
    ]
    .concat();
    let mut ina = mock(config, &transactions);

    ina.sleep().unwrap();
    ina.wake().unwrap();

    done(ina);
}

#[test]
fn raw_register_access() {
    let config = DeviceConfig::new(0.1).unwrap();
    let transactions = [
        write_reg(RegisterName::Calibration, 0x1234),
        read_reg(RegisterName::Calibration, 0x1234),
        read_reg(RegisterName::BusVoltage, bus_voltage(4_000) | OVERFLOW),
    ]
    .concat();
    let mut ina = mock(config, &transactions);

    ina.write_register(RegisterName::Calibration, 0x1234).unwrap();
    assert_eq!(ina.read_register(RegisterName::Calibration), Ok(0x1234));
    assert_eq!(ina.current_overflow(), Ok(true));

    done(ina);
}

#[test]
fn register_read_waits_before_reading() {
    let mut ina = mock_recording(
        DeviceConfig::new(0.1).unwrap(),
        &read_reg(RegisterName::Power, 0),
    );

    ina.read_register(RegisterName::Power).unwrap();

    assert_eq!(waits(ina), [1_000]);
}

#[test]
fn gain_change_waits_for_device_to_settle() {
    let config = DeviceConfig::new(0.1).unwrap();
    let transactions = [
        configure_transactions(&config, Gain::Fsr40mv),
        escalate_transactions(&config, Gain::Fsr40mv, Gain::Fsr80mv),
        read_reg(RegisterName::BusVoltage, bus_voltage(5_000)),
        read_reg(RegisterName::Current, 0),
    ]
    .concat();
    let mut ina = mock_recording(config, &transactions);
    ina.configure(
        BusVoltageRange::Fsr32v,
        GainPolicy::Auto,
        Resolution::Res12Bit,
        Resolution::Res12Bit,
    )
    .unwrap();

    ina.current().unwrap();

    // Bus voltage, configuration, settling, bus voltage, current
    assert_eq!(waits(ina), [1_000, 1_000, 1_000, 1_000, 1_000]);
}

#[test]
fn wake_waits_for_recovery() {
    let asleep = config_bits(Gain::Fsr320mv) & !0b111;
    let transactions = [
        read_reg(RegisterName::Configuration, asleep),
        write_reg(RegisterName::Configuration, config_bits(Gain::Fsr320mv)),
    ]
    .concat();
    let mut ina = mock_recording(DeviceConfig::new(0.1).unwrap(), &transactions);

    ina.wake().unwrap();

    assert_eq!(waits(ina), [1_000, 40]);
}

#[test]
fn failed_gain_write_keeps_written_calibration() {
    let config = DeviceConfig::new(0.1).unwrap();
    let escalated = config.calibrate(Gain::Fsr80mv).unwrap();
    let transactions = [
        read_reg(RegisterName::BusVoltage, bus_voltage(5_000) | OVERFLOW),
        read_reg(RegisterName::Configuration, config_bits(Gain::Fsr40mv)),
        write_reg(RegisterName::Calibration, escalated.register_bits()),
    ]
    .concat();
    let transactions = [
        transactions,
        vec![failing_write_reg(
            RegisterName::Configuration,
            config_bits(Gain::Fsr80mv),
        )],
        read_reg(RegisterName::BusVoltage, bus_voltage(5_000)),
        read_reg(RegisterName::Current, 1_000),
    ]
    .concat();
    let mut ina = mock_configured(config, GainPolicy::Auto, Gain::Fsr40mv, &transactions);

    assert_eq!(
        ina.current(),
        Err(MeasurementError::I2cError(ErrorKind::Other))
    );

    // The device scales current with the new calibration register, the gain is unchanged
    assert_eq!(ina.calibration(), Some(escalated));
    assert_eq!(ina.gain(), Gain::Fsr40mv);

    let current = ina.current().unwrap();
    assert!(approx(current, 1_000.0 * escalated.current_lsb() * 1000.0));

    done(ina);
}

#[test]
fn failed_configuration_write_keeps_written_calibration() {
    let config = shunt_config(0.1, 0.2);
    let fixed = config.calibrate(Gain::Fsr160mv).unwrap();
    let transactions = [
        write_reg(RegisterName::Calibration, fixed.register_bits()),
        vec![failing_write_reg(
            RegisterName::Configuration,
            config_bits(Gain::Fsr160mv),
        )],
    ]
    .concat();
    let mut ina = mock_configured(config, GainPolicy::Auto, Gain::Fsr40mv, &transactions);

    assert_eq!(
        configure(&mut ina, GainPolicy::Fixed(Gain::Fsr160mv)),
        Err(ConfigureError::I2cError(ErrorKind::Other))
    );
    assert_eq!(ina.calibration(), Some(fixed));
    assert_eq!(ina.gain(), Gain::Fsr40mv);
    assert!(ina.auto_gain_enabled());

    done(ina);
}

#[test]
fn failed_reset_keeps_calibration() {
    let config = shunt_config(0.1, 0.2);
    let mut ina = mock_configured(
        config,
        GainPolicy::Auto,
        Gain::Fsr40mv,
        &[failing_write_reg(
            RegisterName::Configuration,
            0b1011_1001_1001_1111,
        )],
    );
    let calibration = ina.calibration();

    assert_eq!(ina.reset(), Err(ErrorKind::Other));
    assert!(calibration.is_some());
    assert_eq!(ina.calibration(), calibration);
    assert_eq!(ina.gain(), Gain::Fsr40mv);

    done(ina);
}
