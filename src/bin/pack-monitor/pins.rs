use core::cell::RefCell;

use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_stm32::{gpio::Output, i2c::I2c, mode::Blocking, peripherals::*};
use embassy_sync::blocking_mutex::{raw::{CriticalSectionRawMutex, NoopRawMutex}, Mutex};
use embassy_sync::signal::Signal;

use ateam_pack_monitor::drivers::{ads1110::Ads1110, switch_matrix::GpioSwitchMatrix};
use ateam_pack_monitor::sampler::PackSampler;

//////////////////////
//  switch matrix   //
//////////////////////

pub type SwitchVBat1HPin = PC0;
pub type SwitchVBat2LPin = PC1;
pub type SwitchVBat2HPin = PC2;
pub type SwitchVBat3LPin = PC3;
pub type SwitchVBat3HPin = PC4;
pub type SwitchVBat4LPin = PC5;
pub type SwitchVBat4HPin = PC6;
pub type SwitchVBatRtnPin = PC7;

pub type SwitchTherm1Pin = PB12;
pub type SwitchTherm2Pin = PB13;
pub type SwitchTherm3Pin = PB14;
pub type SwitchTherm4Pin = PB15;

//////////////////
//  converters  //
//////////////////

pub type AdcI2c = I2C1;
pub type AdcI2cSclPin = PB8;
pub type AdcI2cSdaPin = PB9;

pub type AdcI2cBus = Mutex<NoopRawMutex, RefCell<I2c<'static, Blocking>>>;
pub type AdcI2cDevice = I2cDevice<'static, NoopRawMutex, I2c<'static, Blocking>>;
pub type PackAdc = Ads1110<AdcI2cDevice>;
pub type PackSwitchMatrix = GpioSwitchMatrix<Output<'static>>;
pub type FirmwarePackSampler = PackSampler<PackAdc, PackAdc, PackSwitchMatrix>;

///////////
//  CAN  //
///////////

pub type CurrentSensorCan = CAN1;
pub type CurrentSensorCanRxPin = PA11;
pub type CurrentSensorCanTxPin = PA12;

#[derive(Clone, Copy)]
pub enum BusCommand {
    Enable(u32),
    Disable,
}

pub type BusCommandSignal = Signal<CriticalSectionRawMutex, BusCommand>;

///////////////
//  console  //
///////////////

pub type ConsoleUart = USART2;
pub type ConsoleUartTxPin = PA2;
pub type ConsoleUartRxPin = PA3;
pub type ConsoleUartTxDma = DMA1_CH6;
pub type ConsoleUartRxDma = DMA1_CH5;
