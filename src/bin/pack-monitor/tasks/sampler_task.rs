use core::cell::RefCell;

use defmt::unwrap;
use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_executor::Spawner;
use embassy_stm32::{gpio::{Level, Output, Speed}, i2c::{self, I2c}, time::Hertz};
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Ticker};
use static_cell::StaticCell;

use ateam_pack_monitor::{
    config::{SAMPLE_TICK_PERIOD_MS, THERMISTOR_ADC_ADDR, VOLTAGE_ADC_ADDR},
    diagnostics::DiagnosticPublisher,
    drivers::{ads1110::Ads1110, switch_matrix::GpioSwitchMatrix},
    readings::SharedBankMeans,
    sampler::PackSampler,
    settings::SharedSettings,
};

use crate::pins::*;

static ADC_I2C_BUS: StaticCell<AdcI2cBus> = StaticCell::new();

pub struct SamplerTask {
    sampler: FirmwarePackSampler,
    settings: &'static SharedSettings,
    means: &'static SharedBankMeans,
    diagnostics: DiagnosticPublisher,
}

impl SamplerTask {
    async fn sampler_task_entry(&mut self) {
        defmt::info!("sampler task startup");

        let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_TICK_PERIOD_MS));
        loop {
            // settings are re-read each tick so console changes apply on the next one
            let settings = self.settings.get();
            self.sampler.tick(&settings, &mut self.diagnostics);
            self.means.publish(self.sampler.means());

            ticker.next().await;
        }
    }
}

#[embassy_executor::task]
async fn sampler_task_entry(mut sampler_task: SamplerTask) {
    loop {
        sampler_task.sampler_task_entry().await;
        defmt::error!("sampler task returned");
    }
}

#[allow(clippy::too_many_arguments)]
pub fn start_sampler_task(spawner: Spawner,
        settings: &'static SharedSettings,
        means: &'static SharedBankMeans,
        diagnostics: DiagnosticPublisher,
        i2c: AdcI2c, scl: AdcI2cSclPin, sda: AdcI2cSdaPin,
        vbat1_h: SwitchVBat1HPin, vbat2_l: SwitchVBat2LPin,
        vbat2_h: SwitchVBat2HPin, vbat3_l: SwitchVBat3LPin,
        vbat3_h: SwitchVBat3HPin, vbat4_l: SwitchVBat4LPin,
        vbat4_h: SwitchVBat4HPin, vbat_rtn: SwitchVBatRtnPin,
        therm1: SwitchTherm1Pin, therm2: SwitchTherm2Pin,
        therm3: SwitchTherm3Pin, therm4: SwitchTherm4Pin) {

    let i2c = I2c::new_blocking(i2c, scl, sda, Hertz(100_000), i2c::Config::default());
    let bus = ADC_I2C_BUS.init(Mutex::new(RefCell::new(i2c)));

    let voltage_adc = Ads1110::new(I2cDevice::new(bus), VOLTAGE_ADC_ADDR);
    let thermistor_adc = Ads1110::new(I2cDevice::new(bus), THERMISTOR_ADC_ADDR);

    // order must match SwitchLine
    let switches = GpioSwitchMatrix::new([
        Output::new(vbat1_h, Level::Low, Speed::Low),
        Output::new(vbat2_l, Level::Low, Speed::Low),
        Output::new(vbat2_h, Level::Low, Speed::Low),
        Output::new(vbat3_l, Level::Low, Speed::Low),
        Output::new(vbat3_h, Level::Low, Speed::Low),
        Output::new(vbat4_l, Level::Low, Speed::Low),
        Output::new(vbat4_h, Level::Low, Speed::Low),
        Output::new(vbat_rtn, Level::Low, Speed::Low),
        Output::new(therm1, Level::Low, Speed::Low),
        Output::new(therm2, Level::Low, Speed::Low),
        Output::new(therm3, Level::Low, Speed::Low),
        Output::new(therm4, Level::Low, Speed::Low),
    ]);

    let sampler_task = SamplerTask {
        sampler: PackSampler::new(voltage_adc, thermistor_adc, switches),
        settings,
        means,
        diagnostics,
    };

    unwrap!(spawner.spawn(sampler_task_entry(sampler_task)));
}
