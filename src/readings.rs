use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::config::NUM_BANKS;
use crate::settings::PackSettings;

/// Averaged raw converter codes, one per bank.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BankMeans {
    pub voltage: [i32; NUM_BANKS],
    pub thermistor: [i32; NUM_BANKS],
}

impl BankMeans {
    pub const fn new() -> Self {
        BankMeans {
            voltage: [0; NUM_BANKS],
            thermistor: [0; NUM_BANKS],
        }
    }

    pub fn raw_voltage(&self, bank: usize) -> i32 {
        self.voltage.get(bank).copied().unwrap_or(0)
    }

    pub fn raw_temperature(&self, bank: usize) -> i32 {
        self.thermistor.get(bank).copied().unwrap_or(0)
    }

    /// Bank voltage in volts, 0.0 for an unknown bank.
    pub fn voltage(&self, bank: usize, settings: &PackSettings) -> f32 {
        match settings.voltage_multipliers.get(bank) {
            Some(mult) => self.raw_voltage(bank) as f32 * mult,
            None => 0.0,
        }
    }

    /// Thermistor reading for a bank, scaled by its `adc_to_volts` factor.
    /// 0.0 for an unknown bank.
    pub fn temperature(&self, bank: usize, settings: &PackSettings) -> f32 {
        match settings.thermistor_coefficients.get(bank) {
            Some(coeff) => self.raw_temperature(bank) as f32 * coeff.adc_to_volts,
            None => 0.0,
        }
    }

    pub fn pack_voltage(&self, settings: &PackSettings) -> f32 {
        (0..NUM_BANKS).map(|bank| self.voltage(bank, settings)).sum()
    }

    /// Calibrated bank voltages in millivolts.
    pub fn voltages_mv(&self, settings: &PackSettings) -> [i32; NUM_BANKS] {
        let mut mv = [0; NUM_BANKS];
        for (bank, v) in mv.iter_mut().enumerate() {
            *v = (self.voltage(bank, settings) * 1000.0) as i32;
        }
        mv
    }
}

/// Latest bank means, published by the sampler once per tick.
pub struct SharedBankMeans {
    inner: Mutex<CriticalSectionRawMutex, Cell<BankMeans>>,
}

impl SharedBankMeans {
    pub const fn new() -> Self {
        SharedBankMeans {
            inner: Mutex::new(Cell::new(BankMeans::new())),
        }
    }

    pub fn get(&self) -> BankMeans {
        self.inner.lock(|m| m.get())
    }

    pub fn publish(&self, means: BankMeans) {
        self.inner.lock(|m| m.set(means));
    }
}

impl Default for SharedBankMeans {
    fn default() -> Self {
        Self::new()
    }
}
