use core::fmt;

use crate::config::{MAX_CAN_BITRATE, MAX_SENSOR_ADDRESS};
use crate::fmt::{set_log_level, LogLevel};
use crate::settings::PackSettings;

use super::{ConsoleContext, ConsoleError};

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Value {
    Int(i64),
    Float(f32),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

pub enum Setter {
    /// Integer in `min..=max`, then handed to `apply` for any further checks
    /// and side effects.
    Int {
        min: i64,
        max: i64,
        apply: fn(&mut ConsoleContext<'_>, i64) -> Result<(), ConsoleError>,
    },
    /// Finite float written straight into the settings.
    Float { apply: fn(&mut PackSettings, f32) },
}

pub struct ConfigCommand {
    pub token: &'static str,
    pub help: &'static str,
    pub setter: Setter,
    pub current: fn(&ConsoleContext<'_>) -> Value,
}

impl ConfigCommand {
    pub fn set(&self, ctx: &mut ConsoleContext<'_>, raw: &str) -> Result<Value, ConsoleError> {
        match self.setter {
            Setter::Int { min, max, apply } => {
                let value = parse_int(raw)?;
                if value < min || value > max {
                    return Err(ConsoleError::InvalidValue);
                }
                apply(ctx, value)?;
                Ok(Value::Int(value))
            }
            Setter::Float { apply } => {
                let value = parse_float(raw)?;
                ctx.settings.update(|s| apply(s, value));
                Ok(Value::Float(value))
            }
        }
    }
}

/// Decimal or `0x` prefixed hex, optionally signed with a single leading `-`
/// or `+`.
pub fn parse_int(raw: &str) -> Result<i64, ConsoleError> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };

    let (radix, body) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, digits),
    };

    // from_str_radix takes its own sign, only the one stripped above is allowed
    if body.starts_with(['+', '-']) {
        return Err(ConsoleError::InvalidValue);
    }

    let magnitude = u64::from_str_radix(body, radix).map_err(|_| ConsoleError::InvalidValue)?;
    if negative {
        0i64.checked_sub_unsigned(magnitude).ok_or(ConsoleError::InvalidValue)
    } else {
        i64::try_from(magnitude).map_err(|_| ConsoleError::InvalidValue)
    }
}

pub fn parse_float(raw: &str) -> Result<f32, ConsoleError> {
    match raw.trim().parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ConsoleError::InvalidValue),
    }
}

pub fn find_command(token: &str) -> Option<&'static ConfigCommand> {
    COMMANDS.iter().find(|c| c.token.eq_ignore_ascii_case(token))
}

fn apply_log_level(ctx: &mut ConsoleContext<'_>, value: i64) -> Result<(), ConsoleError> {
    let level = LogLevel::from_u8(value as u8).ok_or(ConsoleError::InvalidValue)?;
    set_log_level(level);
    ctx.settings.update(|s| s.log_level = level);
    Ok(())
}

fn apply_can_enabled(ctx: &mut ConsoleContext<'_>, value: i64) -> Result<(), ConsoleError> {
    let enabled = value.clamp(0, 1) == 1;
    let bitrate = ctx.settings.update(|s| {
        s.can_enabled = enabled;
        s.can_bitrate
    });

    if enabled {
        ctx.bus.enable(bitrate);
    } else {
        ctx.bus.disable();
    }
    Ok(())
}

fn apply_can_bitrate(ctx: &mut ConsoleContext<'_>, value: i64) -> Result<(), ConsoleError> {
    let bitrate = value as u32;
    let enabled = ctx.settings.update(|s| {
        s.can_bitrate = bitrate;
        s.can_enabled
    });

    if enabled {
        ctx.bus.enable(bitrate);
    }
    Ok(())
}

fn apply_sensor_address(ctx: &mut ConsoleContext<'_>, value: i64) -> Result<(), ConsoleError> {
    ctx.settings.update(|s| s.sensor_address = value as u16);
    Ok(())
}

fn apply_balance_threshold(ctx: &mut ConsoleContext<'_>, value: i64) -> Result<(), ConsoleError> {
    ctx.settings.update(|s| s.balance_threshold_mv = value as i32);
    Ok(())
}

fn apply_max_pack_ah(ctx: &mut ConsoleContext<'_>, value: i64) -> Result<(), ConsoleError> {
    let current = ctx.charge.get_current_pack_ah();
    ctx.charge.set_charge(current, value as i32);
    Ok(())
}

fn apply_current_pack_ah(ctx: &mut ConsoleContext<'_>, value: i64) -> Result<(), ConsoleError> {
    let max = ctx.charge.get_state().max_pack_ah;
    if value > max as i64 {
        return Err(ConsoleError::InvalidValue);
    }
    ctx.charge.set_charge(value as i32, max);
    Ok(())
}

macro_rules! vmult {
    ($token:literal, $bank:literal, $help:literal) => {
        ConfigCommand {
            token: $token,
            help: $help,
            setter: Setter::Float {
                apply: |s, v| s.voltage_multipliers[$bank] = v,
            },
            current: |ctx| Value::Float(ctx.settings.get().voltage_multipliers[$bank]),
        }
    };
}

macro_rules! tmult {
    ($token:literal, $bank:literal, $field:ident, $help:literal) => {
        ConfigCommand {
            token: $token,
            help: $help,
            setter: Setter::Float {
                apply: |s, v| s.thermistor_coefficients[$bank].$field = v,
            },
            current: |ctx| Value::Float(ctx.settings.get().thermistor_coefficients[$bank].$field),
        }
    };
}

pub static COMMANDS: [ConfigCommand; 27] = [
    ConfigCommand {
        token: "LOGLEVEL",
        help: "set log level (0=debug, 1=info, 2=warn, 3=error, 4=off)",
        setter: Setter::Int { min: 0, max: 4, apply: apply_log_level },
        current: |ctx| Value::Int(ctx.settings.get().log_level as i64),
    },
    ConfigCommand {
        token: "CANEN",
        help: "Enable/Disable CAN (0 = Disable, 1 = Enable)",
        setter: Setter::Int { min: i64::MIN, max: i64::MAX, apply: apply_can_enabled },
        current: |ctx| Value::Int(ctx.settings.get().can_enabled as i64),
    },
    ConfigCommand {
        token: "CANSPEED",
        help: "Set speed of CAN in baud (125000, 250000, etc)",
        setter: Setter::Int { min: 1, max: MAX_CAN_BITRATE as i64, apply: apply_can_bitrate },
        current: |ctx| Value::Int(ctx.settings.get().can_bitrate as i64),
    },
    ConfigCommand {
        token: "CABADDR",
        help: "Set address of the current sensor (1 - 0x7FF)",
        setter: Setter::Int { min: 1, max: MAX_SENSOR_ADDRESS as i64, apply: apply_sensor_address },
        current: |ctx| Value::Int(ctx.settings.get().sensor_address as i64),
    },
    ConfigCommand {
        token: "BALTHR",
        help: "Set balancing threshold (millivolts)",
        setter: Setter::Int { min: 1, max: i32::MAX as i64, apply: apply_balance_threshold },
        current: |ctx| Value::Int(ctx.settings.get().balance_threshold_mv as i64),
    },
    ConfigCommand {
        token: "MAXAH",
        help: "Set pack capacity (tenths of uAh)",
        setter: Setter::Int { min: 1, max: i32::MAX as i64, apply: apply_max_pack_ah },
        current: |ctx| Value::Int(ctx.charge.get_state().max_pack_ah as i64),
    },
    ConfigCommand {
        token: "CURAH",
        help: "Set remaining pack charge (tenths of uAh)",
        setter: Setter::Int { min: 0, max: i32::MAX as i64, apply: apply_current_pack_ah },
        current: |ctx| Value::Int(ctx.charge.get_current_pack_ah() as i64),
    },
    vmult!("VMULT1", 0, "Set voltage multiplier for bank 1"),
    vmult!("VMULT2", 1, "Set voltage multiplier for bank 2"),
    vmult!("VMULT3", 2, "Set voltage multiplier for bank 3"),
    vmult!("VMULT4", 3, "Set voltage multiplier for bank 4"),
    tmult!("TMULT1A", 0, a, "Set temperature coefficient A for bank 1"),
    tmult!("TMULT1B", 0, b, "Set temperature coefficient B for bank 1"),
    tmult!("TMULT1C", 0, c, "Set temperature coefficient C for bank 1"),
    tmult!("TMULT1D", 0, adc_to_volts, "Set temperature conversion factor for bank 1"),
    tmult!("TMULT2A", 1, a, "Set temperature coefficient A for bank 2"),
    tmult!("TMULT2B", 1, b, "Set temperature coefficient B for bank 2"),
    tmult!("TMULT2C", 1, c, "Set temperature coefficient C for bank 2"),
    tmult!("TMULT2D", 1, adc_to_volts, "Set temperature conversion factor for bank 2"),
    tmult!("TMULT3A", 2, a, "Set temperature coefficient A for bank 3"),
    tmult!("TMULT3B", 2, b, "Set temperature coefficient B for bank 3"),
    tmult!("TMULT3C", 2, c, "Set temperature coefficient C for bank 3"),
    tmult!("TMULT3D", 2, adc_to_volts, "Set temperature conversion factor for bank 3"),
    tmult!("TMULT4A", 3, a, "Set temperature coefficient A for bank 4"),
    tmult!("TMULT4B", 3, b, "Set temperature coefficient B for bank 4"),
    tmult!("TMULT4C", 3, c, "Set temperature coefficient C for bank 4"),
    tmult!("TMULT4D", 3, adc_to_volts, "Set temperature conversion factor for bank 4"),
];
