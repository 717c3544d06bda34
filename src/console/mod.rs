//! Line oriented serial console.
//!
//! A line of a single character is a short command (`h`, `?`, `R`, `V`).
//! Anything longer is a `TOKEN=value` config command looked up in
//! [`commands::COMMANDS`]. Lines end on CR or LF.

use core::fmt::Write;

use heapless::Vec;

use crate::can::BusLink;
use crate::charge_state::SharedChargeState;
use crate::config::{CONSOLE_LINE_MAX, NUM_BANKS};
use crate::readings::SharedBankMeans;
use crate::settings::{save_settings, SettingsError, SettingsStore, SharedSettings};

pub mod commands;

use commands::{find_command, parse_float, COMMANDS};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleError {
    MissingValue,
    InvalidValue,
    UnknownCommand,
    Persist(SettingsError),
}

impl ConsoleError {
    pub fn message(&self) -> &'static str {
        match self {
            ConsoleError::MissingValue => "Command needs a value..ie CANSPEED=500000",
            ConsoleError::InvalidValue => "Invalid value",
            ConsoleError::UnknownCommand => "Unknown command",
            ConsoleError::Persist(_) => "Failed to save settings",
        }
    }
}

/// Everything the console reads or changes.
pub struct ConsoleContext<'a> {
    pub settings: &'a SharedSettings,
    pub charge: &'a SharedChargeState,
    pub means: &'a SharedBankMeans,
    pub store: &'a mut dyn SettingsStore,
    pub bus: &'a mut dyn BusLink,
}

impl ConsoleContext<'_> {
    /// Copy the live charge counters into the settings and save them.
    pub fn persist(&mut self) -> Result<(), ConsoleError> {
        let charge = self.charge.get_state();
        let settings = self.settings.update(|s| {
            s.current_pack_ah = charge.current_pack_ah;
            s.max_pack_ah = charge.max_pack_ah;
            *s
        });

        save_settings(&mut *self.store, &settings).map_err(ConsoleError::Persist)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ConsoleState {
    RootMenu,
    /// waiting for the measured voltage of `bank`
    Calibrating { bank: usize },
}

pub struct Console {
    line: Vec<u8, CONSOLE_LINE_MAX>,
    state: ConsoleState,
}

impl Console {
    pub const fn new() -> Self {
        Console {
            line: Vec::new(),
            state: ConsoleState::RootMenu,
        }
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.state, ConsoleState::Calibrating { .. })
    }

    /// Feed one received byte. Returns the result of the command when the
    /// byte completes a non-empty line.
    pub fn receive(&mut self, byte: u8, ctx: &mut ConsoleContext<'_>, out: &mut dyn Write) -> Option<Result<(), ConsoleError>> {
        if byte == b'\r' || byte == b'\n' {
            if self.line.is_empty() {
                return None;
            }

            let line = core::mem::take(&mut self.line);
            let result = match core::str::from_utf8(&line) {
                Ok(text) => self.handle_line(text.trim(), ctx, out),
                Err(_) => Err(ConsoleError::InvalidValue),
            };

            if let Err(err) = result {
                let _ = writeln!(out, "{}", err.message());
            }
            return Some(result);
        }

        // overlong lines are truncated, the tail is dropped
        let _ = self.line.push(byte);
        None
    }

    pub fn handle_line(&mut self, line: &str, ctx: &mut ConsoleContext<'_>, out: &mut dyn Write) -> Result<(), ConsoleError> {
        match self.state {
            ConsoleState::Calibrating { bank } => self.calibrate_bank(bank, line, ctx, out),
            ConsoleState::RootMenu if line.len() == 1 => self.handle_short_command(line.as_bytes()[0], ctx, out),
            ConsoleState::RootMenu => self.handle_config_command(line, ctx, out),
        }
    }

    fn handle_short_command(&mut self, cmd: u8, ctx: &mut ConsoleContext<'_>, out: &mut dyn Write) -> Result<(), ConsoleError> {
        match cmd {
            b'h' | b'H' | b'?' => {
                print_menu(ctx, out);
                Ok(())
            }
            b'R' => {
                ctx.settings.update(|s| s.mark_factory_reset());
                ctx.persist()?;
                let _ = writeln!(out, "Power cycle to reset to factory defaults");
                Ok(())
            }
            b'V' => {
                self.state = ConsoleState::Calibrating { bank: 0 };
                prompt_calibration(0, ctx, out);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn handle_config_command(&mut self, line: &str, ctx: &mut ConsoleContext<'_>, out: &mut dyn Write) -> Result<(), ConsoleError> {
        let (token, value) = match line.split_once('=') {
            Some((token, value)) => (token.trim(), value.trim()),
            None => (line, ""),
        };

        let command = find_command(token).ok_or(ConsoleError::UnknownCommand)?;
        if value.is_empty() {
            return Err(ConsoleError::MissingValue);
        }

        let value = command.set(ctx, value)?;
        let _ = writeln!(out, "Setting {} to {}", command.token, value);

        ctx.persist()
    }

    fn calibrate_bank(&mut self, bank: usize, line: &str, ctx: &mut ConsoleContext<'_>, out: &mut dyn Write) -> Result<(), ConsoleError> {
        let measured = match parse_float(line) {
            Ok(v) => v,
            Err(err) => {
                // ask again for the same bank
                let _ = writeln!(out, "{}", err.message());
                prompt_calibration(bank, ctx, out);
                return Ok(());
            }
        };

        let settings = ctx.settings.get();
        let reported = ctx.means.get().voltage(bank, &settings);

        if reported != 0.0 && measured > 0.0 {
            let scale = measured / reported;
            ctx.settings.update(|s| s.voltage_multipliers[bank] *= scale);
            info!("bank {} voltage multiplier scaled by {}", bank + 1, scale);
        } else {
            let _ = writeln!(out, "Bank {} has no reading, multiplier unchanged", bank + 1);
        }

        let next = bank + 1;
        if next < NUM_BANKS {
            self.state = ConsoleState::Calibrating { bank: next };
            prompt_calibration(next, ctx, out);
            return Ok(());
        }

        self.state = ConsoleState::RootMenu;
        ctx.persist()?;
        let _ = writeln!(out, "Voltages have been calibrated and calibration saved");
        Ok(())
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

fn prompt_calibration(bank: usize, ctx: &ConsoleContext<'_>, out: &mut dyn Write) {
    let settings = ctx.settings.get();
    let reported = ctx.means.get().voltage(bank, &settings);

    let _ = writeln!(out, "Reported voltage of subpack {}: {}", bank + 1, reported);
    let _ = write!(out, "Enter measured voltage: ");
}

pub fn print_menu(ctx: &ConsoleContext<'_>, out: &mut dyn Write) {
    let _ = writeln!(out, "System Menu:");
    let _ = writeln!(out);
    let _ = writeln!(out, "Enable line endings of some sort (LF, CR, CRLF)");
    let _ = writeln!(out);
    let _ = writeln!(out, "Short Commands:");
    let _ = writeln!(out, "h = help (displays this message)");
    let _ = writeln!(out, "V = Calibrate voltage multipliers");
    let _ = writeln!(out, "R = reset to factory defaults");
    let _ = writeln!(out);
    let _ = writeln!(out, "Config Commands (enter command=newvalue). Current values shown in parenthesis:");
    let _ = writeln!(out);

    for command in COMMANDS.iter() {
        let _ = writeln!(out, "{}={} - {}", command.token, (command.current)(ctx), command.help);
    }
}
