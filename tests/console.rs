use ateam_pack_monitor::{
    can::BusLink,
    charge_state::{ChargeState, SharedChargeState},
    console::{Console, ConsoleContext, ConsoleError},
    fmt::LogLevel,
    readings::{BankMeans, SharedBankMeans},
    settings::{load_settings, PackSettings, RamSettingsStore, SharedSettings},
};

#[derive(Clone, Copy, PartialEq, Debug)]
enum BusCall {
    Enable(u32),
    Disable,
}

#[derive(Default)]
struct RecordingBus {
    calls: Vec<BusCall>,
}

impl BusLink for RecordingBus {
    fn enable(&mut self, bitrate: u32) {
        self.calls.push(BusCall::Enable(bitrate));
    }

    fn disable(&mut self) {
        self.calls.push(BusCall::Disable);
    }
}

struct Harness {
    console: Console,
    settings: SharedSettings,
    charge: SharedChargeState,
    means: SharedBankMeans,
    store: RamSettingsStore,
    bus: RecordingBus,
    out: String,
}

impl Harness {
    fn new() -> Self {
        let settings = PackSettings::factory_default();
        Harness {
            console: Console::new(),
            settings: SharedSettings::new(settings),
            charge: SharedChargeState::new(ChargeState::new(settings.current_pack_ah, settings.max_pack_ah)),
            means: SharedBankMeans::new(),
            store: RamSettingsStore::new(),
            bus: RecordingBus::default(),
            out: String::new(),
        }
    }

    /// Type a line (terminated with CR LF) and return the command result.
    fn send(&mut self, line: &str) -> Option<Result<(), ConsoleError>> {
        let mut ctx = ConsoleContext {
            settings: &self.settings,
            charge: &self.charge,
            means: &self.means,
            store: &mut self.store,
            bus: &mut self.bus,
        };

        let mut result = None;
        for byte in line.bytes().chain(*b"\r\n") {
            if let Some(r) = self.console.receive(byte, &mut ctx, &mut self.out) {
                result = Some(r);
            }
        }
        result
    }
}

#[test]
fn can_speed_applies_and_persists() {
    let mut h = Harness::new();

    assert_eq!(Some(Ok(())), h.send("CANSPEED=250000"));

    assert_eq!(250_000, h.settings.get().can_bitrate);
    assert_eq!(vec![BusCall::Enable(250_000)], h.bus.calls);
    assert_eq!(1, h.store.saves);
    assert_eq!(250_000, load_settings(&mut h.store).can_bitrate);
}

#[test]
fn can_speed_out_of_range() {
    let mut h = Harness::new();

    assert_eq!(Some(Err(ConsoleError::InvalidValue)), h.send("CANSPEED=0"));
    assert_eq!(Some(Err(ConsoleError::InvalidValue)), h.send("CANSPEED=1000001"));

    assert_eq!(PackSettings::factory_default().can_bitrate, h.settings.get().can_bitrate);
    assert_eq!(0, h.store.saves);
    assert!(h.bus.calls.is_empty());
    assert!(h.out.contains("Invalid value"));
}

#[test]
fn can_enable_clamps_and_drives_bus() {
    let mut h = Harness::new();

    assert_eq!(Some(Ok(())), h.send("CANEN=0"));
    assert!(!h.settings.get().can_enabled);

    assert_eq!(Some(Ok(())), h.send("CANEN=7"));
    assert!(h.settings.get().can_enabled);

    assert_eq!(vec![BusCall::Disable, BusCall::Enable(500_000)], h.bus.calls);
}

#[test]
fn sensor_address_accepts_hex() {
    let mut h = Harness::new();

    assert_eq!(Some(Ok(())), h.send("CABADDR=0x3C3"));
    assert_eq!(0x3C3, h.settings.get().sensor_address);

    assert_eq!(Some(Err(ConsoleError::InvalidValue)), h.send("CABADDR=0x800"));
    assert_eq!(Some(Err(ConsoleError::InvalidValue)), h.send("CABADDR=0"));
    assert_eq!(Some(Err(ConsoleError::InvalidValue)), h.send("CABADDR=abc"));
    assert_eq!(Some(Err(ConsoleError::InvalidValue)), h.send("CABADDR=--962"));
    assert_eq!(Some(Err(ConsoleError::InvalidValue)), h.send("CABADDR=0x-3C2"));
    assert_eq!(0x3C3, h.settings.get().sensor_address);
}

#[test]
fn balance_threshold_must_be_positive() {
    let mut h = Harness::new();

    assert_eq!(Some(Err(ConsoleError::InvalidValue)), h.send("BALTHR=0"));
    assert_eq!(Some(Ok(())), h.send("BALTHR=150"));
    assert_eq!(150, h.settings.get().balance_threshold_mv);
}

#[test]
fn float_commands_are_case_insensitive() {
    let mut h = Harness::new();

    assert_eq!(Some(Ok(())), h.send("tmult2c=0.5"));
    assert_eq!(Some(Ok(())), h.send("VMULT4=0.25"));

    let settings = h.settings.get();
    assert_eq!(0.5, settings.thermistor_coefficients[1].c);
    assert_eq!(0.25, settings.voltage_multipliers[3]);
    assert_eq!(2, h.store.saves);
}

#[test]
fn log_level_is_stored() {
    let mut h = Harness::new();

    assert_eq!(Some(Ok(())), h.send("LOGLEVEL=3"));
    assert_eq!(LogLevel::Error, h.settings.get().log_level);

    assert_eq!(Some(Err(ConsoleError::InvalidValue)), h.send("LOGLEVEL=5"));
    assert_eq!(Some(Ok(())), h.send("LOGLEVEL=1"));
}

#[test]
fn command_errors_are_reported() {
    let mut h = Harness::new();

    assert_eq!(Some(Err(ConsoleError::UnknownCommand)), h.send("TORQ=3000"));
    assert_eq!(Some(Err(ConsoleError::MissingValue)), h.send("CANSPEED="));
    assert_eq!(Some(Err(ConsoleError::MissingValue)), h.send("CANSPEED"));

    assert!(h.out.contains("Unknown command"));
    assert!(h.out.contains("Command needs a value"));
    assert_eq!(0, h.store.saves);
}

#[test]
fn overlong_lines_are_truncated() {
    let mut h = Harness::new();
    let line = "X".repeat(120);

    assert_eq!(Some(Err(ConsoleError::UnknownCommand)), h.send(&line));
    // the console is usable afterwards
    assert_eq!(Some(Ok(())), h.send("BALTHR=120"));
}

#[test]
fn menu_shows_current_values() {
    let mut h = Harness::new();

    assert_eq!(Some(Ok(())), h.send("h"));
    assert!(h.out.contains("System Menu:"));
    assert!(h.out.contains("CANSPEED=500000"));
    assert!(h.out.contains("CABADDR=962"));
    assert!(h.out.contains("TMULT4D="));

    h.out.clear();
    assert_eq!(Some(Ok(())), h.send("?"));
    assert!(h.out.contains("LOGLEVEL=1"));
}

#[test]
fn factory_reset_marks_settings() {
    let mut h = Harness::new();
    h.send("BALTHR=300");
    assert_eq!(300, load_settings(&mut h.store).balance_threshold_mv);

    assert_eq!(Some(Ok(())), h.send("R"));

    assert_eq!(0xFF, h.store.blob()[0]);
    assert_eq!(PackSettings::factory_default(), load_settings(&mut h.store));
    assert!(h.out.contains("Power cycle"));
}

#[test]
fn charge_commands_update_counter() {
    let mut h = Harness::new();

    assert_eq!(Some(Ok(())), h.send("CURAH=2000"));
    assert_eq!(2000, h.charge.get_current_pack_ah());
    assert_eq!(2000, load_settings(&mut h.store).current_pack_ah);

    assert_eq!(Some(Ok(())), h.send("MAXAH=1000"));
    let state = h.charge.get_state();
    assert_eq!(1000, state.max_pack_ah);
    assert_eq!(1000, state.current_pack_ah);

    assert_eq!(Some(Err(ConsoleError::InvalidValue)), h.send("CURAH=5000"));
    assert_eq!(Some(Err(ConsoleError::InvalidValue)), h.send("MAXAH=0"));
    assert_eq!(1000, h.charge.get_current_pack_ah());
}

#[test]
fn voltage_calibration_scales_each_bank() {
    let mut h = Harness::new();
    h.means.publish(BankMeans {
        voltage: [1024; 4],
        thermistor: [0; 4],
    });
    let old = h.settings.get().voltage_multipliers;

    assert_eq!(Some(Ok(())), h.send("V"));
    assert!(h.console.is_calibrating());
    assert!(h.out.contains("Reported voltage of subpack 1"));

    // garbage asks for bank 1 again
    assert_eq!(Some(Ok(())), h.send("abc"));
    assert!(h.console.is_calibrating());

    for bank in 0..4 {
        let reported = 1024.0 * old[bank];
        let measured = reported * 2.0;
        assert_eq!(Some(Ok(())), h.send(&format!("{}", measured)));
    }

    assert!(!h.console.is_calibrating());
    assert_eq!(1, h.store.saves);

    let new = h.settings.get().voltage_multipliers;
    for bank in 0..4 {
        assert!((new[bank] - old[bank] * 2.0).abs() < 1e-6);
    }
    assert!(h.out.contains("calibration saved"));
}

#[test]
fn calibration_skips_banks_without_reading() {
    let mut h = Harness::new();
    let old = h.settings.get().voltage_multipliers;

    h.send("V");
    for _ in 0..4 {
        h.send("12.5");
    }

    assert!(!h.console.is_calibrating());
    assert_eq!(old, h.settings.get().voltage_multipliers);
    assert!(h.out.contains("has no reading"));
}
