//! Decoder for the CAB300 fluxgate current sensor.
//!
//! The sensor broadcasts one frame per measurement on its configured standard
//! id. Byte 4 bit 0 flags an error, in which case `byte4 >> 1` is a fault
//! code. Otherwise bytes 0..4 carry the current in mA as a big-endian u32
//! offset by 0x8000_0000.

use crate::can::BusFrame;
use crate::charge_state::SharedChargeState;
use crate::config::{CHARGE_DELTA_DIVISOR, FIRST_FRAME_ELAPSED_MS};

const STATUS_BYTE: usize = 4;
const MIN_FRAME_LEN: usize = STATUS_BYTE + 1;
const CURRENT_OFFSET: i64 = 0x8000_0000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorFault {
    FlashCrc,
    FluxgateHighFrequency,
    FluxgateNotOscillating,
    Failsafe,
    SignalUnavailable,
    BridgeVoltageProtection,
    Unknown(u8),
}

impl SensorFault {
    pub fn from_code(code: u8) -> SensorFault {
        match code {
            0x41 => SensorFault::FlashCrc,
            0x42 => SensorFault::FluxgateHighFrequency,
            0x43 => SensorFault::FluxgateNotOscillating,
            0x44 => SensorFault::Failsafe,
            0x46 => SensorFault::SignalUnavailable,
            0x47 => SensorFault::BridgeVoltageProtection,
            _ => SensorFault::Unknown(code),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SensorFault::FlashCrc => "dataflash CRC error",
            SensorFault::FluxgateHighFrequency => "fluxgate running high frequency",
            SensorFault::FluxgateNotOscillating => "fluxgate not oscillating",
            SensorFault::Failsafe => "sensor entered failsafe mode",
            SensorFault::SignalUnavailable => "signal not available",
            SensorFault::BridgeVoltageProtection => "bridge voltage protection",
            SensorFault::Unknown(_) => "unrecognized fault",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentReading {
    pub current_ma: i32,
    pub elapsed_ms: u64,
    /// charge removed from the pack, tenths of uAh (negative charges it)
    pub delta: i64,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameOutcome {
    /// not from the current sensor
    Ignored,
    Fault(SensorFault),
    Reading(CurrentReading),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    ShortFrame { len: u8 },
}

/// Signed current in mA from the first four payload bytes.
pub fn decode_current_ma(data: &[u8; 4]) -> i32 {
    let raw = u32::from_be_bytes(*data) as i64;
    (raw - CURRENT_OFFSET) as i32
}

/// Charge moved by `current_ma` flowing for `elapsed_ms`, in tenths of uAh.
///
/// mA * ms * 10_000 / 3_600_000 reduces to mA * ms / 360. Truncates toward zero.
pub fn charge_delta(current_ma: i32, elapsed_ms: u64) -> i64 {
    let elapsed = i64::try_from(elapsed_ms).unwrap_or(i64::MAX);
    (current_ma as i64).saturating_mul(elapsed) / CHARGE_DELTA_DIVISOR
}

/// Coulomb counter fed by sensor frames.
///
/// Holds only the timestamp of the last accepted data frame; the charge itself
/// lives in [`SharedChargeState`] so other contexts can read it.
pub struct CurrentSensorDecoder {
    last_reading_ms: Option<u64>,
}

impl CurrentSensorDecoder {
    pub const fn new() -> Self {
        CurrentSensorDecoder {
            last_reading_ms: None,
        }
    }

    pub fn last_reading_ms(&self) -> Option<u64> {
        self.last_reading_ms
    }

    /// Classify `frame` and, for data frames, integrate its current into `charge`.
    ///
    /// `now_ms` must come from a monotonic millisecond clock.
    pub fn process_frame(
        &mut self,
        frame: &BusFrame,
        sensor_address: u16,
        now_ms: u64,
        charge: &SharedChargeState,
    ) -> Result<FrameOutcome, DecodeError> {
        if frame.id() != sensor_address {
            return Ok(FrameOutcome::Ignored);
        }

        let data = frame.data();
        if data.len() < MIN_FRAME_LEN {
            warn!("current sensor frame too short ({} bytes)", data.len());
            return Err(DecodeError::ShortFrame { len: data.len() as u8 });
        }

        let status = data[STATUS_BYTE];
        if status & 0x01 != 0 {
            let fault = SensorFault::from_code(status >> 1);
            error!("current sensor fault {:#x}: {}", status >> 1, fault.description());
            return Ok(FrameOutcome::Fault(fault));
        }

        let current_ma = decode_current_ma(&[data[0], data[1], data[2], data[3]]);

        let elapsed_ms = match self.last_reading_ms {
            Some(last) => now_ms.saturating_sub(last),
            None => FIRST_FRAME_ELAPSED_MS,
        };
        self.last_reading_ms = Some(now_ms);

        let delta = charge_delta(current_ma, elapsed_ms);

        let remaining = charge.update(|state| {
            state.last_current_ma = current_ma;
            state.apply_delta(delta);
            state.current_pack_ah
        });

        debug!("current sensor: {} mA, delta {}, remaining {}", current_ma, delta, remaining);

        Ok(FrameOutcome::Reading(CurrentReading {
            current_ma,
            elapsed_ms,
            delta,
        }))
    }
}

impl Default for CurrentSensorDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_offset_decoding() {
        assert_eq!(decode_current_ma(&[0x80, 0x00, 0x00, 0x00]), 0);
        assert_eq!(decode_current_ma(&[0x80, 0x00, 0x03, 0xE8]), 1000);
        assert_eq!(decode_current_ma(&[0x7F, 0xFF, 0xFE, 0x0C]), -500);
    }

    #[test]
    fn delta_truncates_toward_zero() {
        assert_eq!(charge_delta(1000, 3600), 10_000);
        assert_eq!(charge_delta(1, 359), 0);
        assert_eq!(charge_delta(-1, 359), 0);
        assert_eq!(charge_delta(-500, 3600), -5_000);
    }

    #[test]
    fn fault_codes() {
        assert_eq!(SensorFault::from_code(0x44), SensorFault::Failsafe);
        assert_eq!(SensorFault::from_code(0x45), SensorFault::Unknown(0x45));
    }
}
