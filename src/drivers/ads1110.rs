//! TI ADS1110 16-bit delta-sigma converter.
//!
//! Used in single-shot mode: writing the config byte with ST/DRDY set starts
//! one conversion. A read returns the two data bytes followed by the config
//! register, whose ST/DRDY bit stays set until the result is ready.

use embedded_hal::i2c::I2c;

use crate::config::{ADS1110_CONFIG, ADS1110_NOT_READY};
use crate::sampler::Converter;

pub struct Ads1110<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Ads1110<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Ads1110 { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Kick off a single conversion. At 15 SPS the result is ready after ~67ms.
    pub fn start(&mut self) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[ADS1110_CONFIG])
    }

    /// Fetch the last conversion, `None` if it is still running.
    pub fn read(&mut self) -> Result<Option<i16>, I2C::Error> {
        let mut buf = [0u8; 3];
        self.i2c.read(self.address, &mut buf)?;

        if buf[2] & ADS1110_NOT_READY != 0 {
            return Ok(None);
        }

        Ok(Some(i16::from_be_bytes([buf[0], buf[1]])))
    }
}

impl<I2C: I2c> Converter for Ads1110<I2C> {
    fn start_conversion(&mut self) {
        if self.start().is_err() {
            warn!("ads1110 {:#x}: start conversion failed", self.address);
        }
    }

    fn read_conversion(&mut self) -> Option<i16> {
        match self.read() {
            Ok(value) => value,
            Err(_) => {
                warn!("ads1110 {:#x}: read failed", self.address);
                None
            }
        }
    }
}
