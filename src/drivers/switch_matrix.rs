use embedded_hal::digital::{OutputPin, PinState};

use crate::config::NUM_BANKS;

/// Analog switch select lines routing the banks onto the two converters.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SwitchLine {
    VBat1H = 0,
    VBat2L = 1,
    VBat2H = 2,
    VBat3L = 3,
    VBat3H = 4,
    VBat4L = 5,
    VBat4H = 6,
    VBatRtn = 7,
    Therm1 = 8,
    Therm2 = 9,
    Therm3 = 10,
    Therm4 = 11,
}

pub const NUM_SWITCH_LINES: usize = 12;

pub const VOLTAGE_LINES: [SwitchLine; 8] = [
    SwitchLine::VBat1H,
    SwitchLine::VBat2L,
    SwitchLine::VBat2H,
    SwitchLine::VBat3L,
    SwitchLine::VBat3H,
    SwitchLine::VBat4L,
    SwitchLine::VBat4H,
    SwitchLine::VBatRtn,
];

pub const THERMISTOR_LINES: [SwitchLine; NUM_BANKS] = [
    SwitchLine::Therm1,
    SwitchLine::Therm2,
    SwitchLine::Therm3,
    SwitchLine::Therm4,
];

/// A bank is measured across its own high tap and the low tap of the bank
/// above it; the top bank returns through VBATRTN.
pub const VOLTAGE_BANK_ROUTES: [[SwitchLine; 2]; NUM_BANKS] = [
    [SwitchLine::VBat1H, SwitchLine::VBat2L],
    [SwitchLine::VBat2H, SwitchLine::VBat3L],
    [SwitchLine::VBat3H, SwitchLine::VBat4L],
    [SwitchLine::VBat4H, SwitchLine::VBatRtn],
];

pub trait SwitchMatrix {
    fn set_line(&mut self, line: SwitchLine, active: bool);

    fn all_voltage_off(&mut self) {
        for line in VOLTAGE_LINES {
            self.set_line(line, false);
        }
    }

    fn all_thermistor_off(&mut self) {
        for line in THERMISTOR_LINES {
            self.set_line(line, false);
        }
    }

    /// Route `bank` to the voltage converter. Every voltage line is released
    /// before the new pair is asserted. Unknown banks are ignored.
    fn select_voltage_bank(&mut self, bank: usize) {
        let Some(route) = VOLTAGE_BANK_ROUTES.get(bank) else {
            return;
        };

        self.all_voltage_off();
        for line in route {
            self.set_line(*line, true);
        }
    }

    /// Route thermistor `bank` to the thermistor converter.
    fn select_thermistor(&mut self, bank: usize) {
        let Some(line) = THERMISTOR_LINES.get(bank) else {
            return;
        };

        self.all_thermistor_off();
        self.set_line(*line, true);
    }
}

/// Switch matrix driven directly from MCU outputs, indexed by [`SwitchLine`].
pub struct GpioSwitchMatrix<P: OutputPin> {
    pins: [P; NUM_SWITCH_LINES],
}

impl<P: OutputPin> GpioSwitchMatrix<P> {
    pub fn new(pins: [P; NUM_SWITCH_LINES]) -> Self {
        let mut matrix = GpioSwitchMatrix { pins };
        matrix.all_voltage_off();
        matrix.all_thermistor_off();
        matrix
    }
}

impl<P: OutputPin> SwitchMatrix for GpioSwitchMatrix<P> {
    fn set_line(&mut self, line: SwitchLine, active: bool) {
        if self.pins[line as usize].set_state(PinState::from(active)).is_err() {
            error!("failed to drive switch line {}", line as u8);
        }
    }
}
