//! Round-robin sampling of the four voltage banks and four thermistors.
//!
//! Two converters are shared across eight logical channels through the switch
//! matrix. Each tick collects the conversion started on the previous tick,
//! routes the next channel and starts a new conversion, so a result always
//! belongs to the channel that was routed when its conversion began.

use crate::config::{NUM_BANKS, SAMPLE_WINDOW_SIZE};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::drivers::switch_matrix::SwitchMatrix;
use crate::filter::{Filter, WindowAveragingFilter};
use crate::math::spread;
use crate::readings::BankMeans;
use crate::settings::PackSettings;

/// A converter that can start a conversion and later be polled for it.
pub trait Converter {
    fn start_conversion(&mut self);

    /// `None` if the conversion is not finished (or the bus failed).
    fn read_conversion(&mut self) -> Option<i16>;
}

pub type SampleWindow = WindowAveragingFilter<SAMPLE_WINDOW_SIZE, false, i32>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogicalChannel {
    Voltage(usize),
    Thermistor(usize),
}

pub struct PackSampler<V: Converter, T: Converter, S: SwitchMatrix> {
    voltage_adc: V,
    thermistor_adc: T,
    switches: S,

    voltage_windows: [SampleWindow; NUM_BANKS],
    thermistor_windows: [SampleWindow; NUM_BANKS],

    // bank whose conversion is running on each converter
    voltage_in_flight: Option<usize>,
    thermistor_in_flight: Option<usize>,

    next_voltage: usize,
    next_thermistor: usize,
}

impl<V: Converter, T: Converter, S: SwitchMatrix> PackSampler<V, T, S> {
    pub fn new(voltage_adc: V, thermistor_adc: T, mut switches: S) -> Self {
        switches.all_voltage_off();
        switches.all_thermistor_off();

        PackSampler {
            voltage_adc,
            thermistor_adc,
            switches,
            voltage_windows: core::array::from_fn(|_| SampleWindow::new()),
            thermistor_windows: core::array::from_fn(|_| SampleWindow::new()),
            voltage_in_flight: None,
            thermistor_in_flight: None,
            next_voltage: 0,
            next_thermistor: 0,
        }
    }

    /// One sampling step. Never blocks on a converter.
    pub fn tick(&mut self, settings: &PackSettings, sink: &mut dyn DiagnosticSink) {
        if let Some(bank) = self.voltage_in_flight.take() {
            if let Some(code) = self.voltage_adc.read_conversion() {
                self.voltage_windows[bank].push(code as i32);
            }
        }

        if let Some(bank) = self.thermistor_in_flight.take() {
            if let Some(code) = self.thermistor_adc.read_conversion() {
                self.thermistor_windows[bank].push(code as i32);
            }
        }

        let voltage_bank = self.next_voltage;
        self.switches.select_voltage_bank(voltage_bank);
        self.voltage_adc.start_conversion();
        self.voltage_in_flight = Some(voltage_bank);

        let thermistor_bank = self.next_thermistor;
        self.switches.select_thermistor(thermistor_bank);
        self.thermistor_adc.start_conversion();
        self.thermistor_in_flight = Some(thermistor_bank);

        self.next_thermistor = (self.next_thermistor + 1) % NUM_BANKS;
        self.next_voltage = (self.next_voltage + 1) % NUM_BANKS;

        if self.next_voltage == 0 {
            if let Some(spread_mv) = self.check_balance(settings) {
                warn!(
                    "pack imbalance: {} mV spread exceeds {} mV",
                    spread_mv,
                    settings.balance_threshold_mv
                );
                sink.report(Diagnostic::PackImbalance {
                    spread_mv,
                    threshold_mv: settings.balance_threshold_mv,
                });
            }
        }

        let means = self.means();
        trace!(
            "V1: {} V2: {} V3: {} V4: {}",
            means.voltage[0],
            means.voltage[1],
            means.voltage[2],
            means.voltage[3]
        );
    }

    /// Spread between the highest and lowest calibrated bank voltage, if it
    /// exceeds the balance threshold. Quiet until every voltage window has
    /// filled, so warm-up doesn't look like an imbalance.
    pub fn check_balance(&self, settings: &PackSettings) -> Option<i32> {
        if !self.voltage_windows.iter().all(|w| w.is_warm()) {
            return None;
        }

        let voltages_mv = self.means().voltages_mv(settings);
        let spread_mv = spread(&voltages_mv)?;

        if spread_mv > settings.balance_threshold_mv {
            Some(spread_mv)
        } else {
            None
        }
    }

    pub fn means(&self) -> BankMeans {
        BankMeans {
            voltage: core::array::from_fn(|bank| self.voltage_windows[bank].mean()),
            thermistor: core::array::from_fn(|bank| self.thermistor_windows[bank].mean()),
        }
    }

    pub fn window(&self, channel: LogicalChannel) -> Option<&SampleWindow> {
        match channel {
            LogicalChannel::Voltage(bank) => self.voltage_windows.get(bank),
            LogicalChannel::Thermistor(bank) => self.thermistor_windows.get(bank),
        }
    }

    /// Channels with a conversion currently running.
    pub fn in_flight(&self) -> (Option<LogicalChannel>, Option<LogicalChannel>) {
        (
            self.voltage_in_flight.map(LogicalChannel::Voltage),
            self.thermistor_in_flight.map(LogicalChannel::Thermistor),
        )
    }

    pub fn reset_windows(&mut self) {
        for window in self.voltage_windows.iter_mut().chain(self.thermistor_windows.iter_mut()) {
            window.reset();
        }
    }

    pub fn switches(&self) -> &S {
        &self.switches
    }

    pub fn converters(&self) -> (&V, &T) {
        (&self.voltage_adc, &self.thermistor_adc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_mean_is_zero_padded() {
        let mut window = SampleWindow::new();
        for s in [320, 320, 320, 320] {
            window.push(s);
        }

        assert_eq!(window.mean(), 4 * 320 / 32);
        assert_eq!(window.filtered_value(), None);
    }

    #[test]
    fn full_window_is_mean_of_last_32() {
        let mut window = SampleWindow::new();
        for s in 0..40 {
            window.push(s);
        }

        let expected: i32 = (8..40).sum::<i32>() / 32;
        assert_eq!(window.mean(), expected);
        assert_eq!(window.filtered_value(), Some(expected));
    }
}
