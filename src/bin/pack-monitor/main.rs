#![no_std]
#![no_main]

use embassy_executor::InterruptExecutor;
use embassy_stm32::{
    bind_interrupts, can, flash::Flash, interrupt, pac::Interrupt, peripherals, usart,
};
use embassy_sync::{pubsub::PubSubChannel, signal::Signal};
use embassy_time::Timer;
use static_cell::StaticCell;

use defmt_rtt as _;
// provide embedded panic probe
use panic_probe as _;

use ateam_pack_monitor::{
    charge_state::{ChargeState, SharedChargeState},
    diagnostics::DiagnosticPubSub,
    fmt::set_log_level,
    readings::SharedBankMeans,
    settings::{load_settings, SharedSettings},
};

mod flash_store;
mod pins;
mod tasks;

use flash_store::FlashSettingsStore;
use pins::BusCommandSignal;
use tasks::{can_task::start_can_task, console_task::start_console_task, sampler_task::start_sampler_task};

bind_interrupts!(pub struct SystemIrqs {
    CAN1_RX0 => can::Rx0InterruptHandler<peripherals::CAN1>;
    CAN1_RX1 => can::Rx1InterruptHandler<peripherals::CAN1>;
    CAN1_SCE => can::SceInterruptHandler<peripherals::CAN1>;
    CAN1_TX => can::TxInterruptHandler<peripherals::CAN1>;
    USART2 => usart::InterruptHandler<peripherals::USART2>;
});

static SETTINGS: StaticCell<SharedSettings> = StaticCell::new();
static CHARGE_STATE: StaticCell<SharedChargeState> = StaticCell::new();
static BANK_MEANS: SharedBankMeans = SharedBankMeans::new();

static DIAGNOSTICS_CHANNEL: DiagnosticPubSub = PubSubChannel::new();
static BUS_COMMANDS: BusCommandSignal = Signal::new();

static CAN_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn UART5() {
    CAN_EXECUTOR.on_interrupt();
}

#[embassy_executor::main]
async fn main(main_spawner: embassy_executor::Spawner) {
    let p = embassy_stm32::init(Default::default());

    defmt::info!("embassy HAL configured.");

    ////////////////
    //  settings  //
    ////////////////

    let mut store = FlashSettingsStore::new(Flash::new_blocking(p.FLASH));
    let pack_settings = load_settings(&mut store);
    set_log_level(pack_settings.log_level);

    let settings: &'static SharedSettings = SETTINGS.init(SharedSettings::new(pack_settings));
    let charge: &'static SharedChargeState = CHARGE_STATE.init(SharedChargeState::new(
        ChargeState::new(pack_settings.current_pack_ah, pack_settings.max_pack_ah)));

    defmt::info!("settings loaded: sensor {:#x}, CAN {}", pack_settings.sensor_address, pack_settings.can_enabled);

    ////////////////////////
    //  setup task pools  //
    ////////////////////////

    // frame delivery preempts the sampler tick
    interrupt::InterruptExt::set_priority(embassy_stm32::interrupt::UART5, embassy_stm32::interrupt::Priority::P6);
    let can_spawner = CAN_EXECUTOR.start(Interrupt::UART5);

    //////////////////////////////////////
    //  setup inter-task coms channels  //
    //////////////////////////////////////

    let sampler_diagnostics = DIAGNOSTICS_CHANNEL.immediate_publisher();
    let can_diagnostics = DIAGNOSTICS_CHANNEL.immediate_publisher();
    let console_diagnostics = defmt::unwrap!(DIAGNOSTICS_CHANNEL.subscriber());

    ///////////////////
    //  start tasks  //
    ///////////////////

    start_can_task(can_spawner,
        settings, charge, &BUS_COMMANDS, can_diagnostics,
        p.CAN1, p.PA11, p.PA12);

    start_sampler_task(main_spawner,
        settings, &BANK_MEANS, sampler_diagnostics,
        p.I2C1, p.PB8, p.PB9,
        p.PC0, p.PC1, p.PC2, p.PC3, p.PC4, p.PC5, p.PC6, p.PC7,
        p.PB12, p.PB13, p.PB14, p.PB15);

    start_console_task(main_spawner,
        settings, charge, &BANK_MEANS, store, &BUS_COMMANDS, console_diagnostics,
        p.USART2, p.PA3, p.PA2, p.DMA1_CH6, p.DMA1_CH5);

    loop {
        Timer::after_millis(1000).await;
    }
}
