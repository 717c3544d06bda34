use crate::charge_state::SharedChargeState;
use crate::config::MAX_SENSOR_ADDRESS;
use crate::current_sensor::{CurrentSensorDecoder, FrameOutcome};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::settings::SharedSettings;

pub const MAX_FRAME_LEN: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    IdOutOfRange(u16),
    PayloadTooLong(usize),
}

/// Standard (11-bit) CAN frame with up to eight data bytes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusFrame {
    id: u16,
    len: u8,
    data: [u8; MAX_FRAME_LEN],
}

impl BusFrame {
    pub fn new(id: u16, data: &[u8]) -> Result<BusFrame, FrameError> {
        if id > MAX_SENSOR_ADDRESS {
            return Err(FrameError::IdOutOfRange(id));
        }
        if data.len() > MAX_FRAME_LEN {
            return Err(FrameError::PayloadTooLong(data.len()));
        }

        let mut buf = [0u8; MAX_FRAME_LEN];
        buf[..data.len()].copy_from_slice(data);

        Ok(BusFrame {
            id,
            len: data.len() as u8,
            data: buf,
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// Control of the physical bus controller.
pub trait BusLink {
    fn enable(&mut self, bitrate: u32);

    fn disable(&mut self);
}

/// Hands received frames to the current sensor decoder.
///
/// Delivery can be muted from the console (`CANEN=0`) and the sensor id is
/// read from the settings on every frame, so changes apply to the next frame.
pub struct FrameRouter<'a> {
    settings: &'a SharedSettings,
    charge: &'a SharedChargeState,
    decoder: CurrentSensorDecoder,
}

impl<'a> FrameRouter<'a> {
    pub fn new(settings: &'a SharedSettings, charge: &'a SharedChargeState) -> Self {
        FrameRouter {
            settings,
            charge,
            decoder: CurrentSensorDecoder::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.get_can_enabled()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.settings.update(|s| s.can_enabled = enabled);
    }

    pub fn sensor_address(&self) -> u16 {
        self.settings.get_sensor_address()
    }

    pub fn set_sensor_address(&self, address: u16) -> Result<(), FrameError> {
        if address > MAX_SENSOR_ADDRESS {
            return Err(FrameError::IdOutOfRange(address));
        }

        self.settings.update(|s| s.sensor_address = address);
        Ok(())
    }

    /// Deliver one frame. Returns `None` when delivery is disabled or the
    /// frame could not be decoded.
    pub fn deliver(&mut self, frame: &BusFrame, now_ms: u64, sink: &mut dyn DiagnosticSink) -> Option<FrameOutcome> {
        let settings = self.settings.get();
        if !settings.can_enabled {
            return None;
        }

        match self.decoder.process_frame(frame, settings.sensor_address, now_ms, self.charge) {
            Ok(FrameOutcome::Fault(fault)) => {
                sink.report(Diagnostic::SensorFault(fault));
                Some(FrameOutcome::Fault(fault))
            }
            Ok(outcome) => Some(outcome),
            Err(_) => {
                sink.report(Diagnostic::MalformedFrame {
                    id: frame.id(),
                    len: frame.data().len() as u8,
                });
                None
            }
        }
    }
}
