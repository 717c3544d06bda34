use defmt::unwrap;
use embassy_executor::SendSpawner;
use embassy_futures::select::{select, Either};
use embassy_stm32::can::{filter::Mask32, Can, Fifo, Id};
use embassy_time::Instant;

use ateam_pack_monitor::{
    can::{BusFrame, BusLink, FrameRouter},
    charge_state::SharedChargeState,
    diagnostics::DiagnosticPublisher,
    settings::SharedSettings,
};

use crate::{pins::*, SystemIrqs};

/// Bus link handed to the console, forwards requests to the CAN task.
pub struct SignalBusLink {
    commands: &'static BusCommandSignal,
}

impl SignalBusLink {
    pub fn new(commands: &'static BusCommandSignal) -> Self {
        SignalBusLink { commands }
    }
}

impl BusLink for SignalBusLink {
    fn enable(&mut self, bitrate: u32) {
        self.commands.signal(BusCommand::Enable(bitrate));
    }

    fn disable(&mut self) {
        self.commands.signal(BusCommand::Disable);
    }
}

pub struct CanTask {
    can: Can<'static>,
    router: FrameRouter<'static>,
    commands: &'static BusCommandSignal,
    diagnostics: DiagnosticPublisher,
}

impl CanTask {
    async fn apply_command(&mut self, command: BusCommand) {
        match command {
            BusCommand::Enable(bitrate) => {
                defmt::info!("CAN enabled at {} bit/s", bitrate);
                self.can.modify_config().set_bitrate(bitrate);
                self.can.enable().await;
            }
            BusCommand::Disable => {
                defmt::info!("CAN disabled");
                self.can.sleep().await;
            }
        }
    }

    async fn can_task_entry(&mut self) {
        defmt::info!("can task startup");

        loop {
            match select(self.can.read(), self.commands.wait()).await {
                Either::First(Ok(envelope)) => {
                    let id = match envelope.frame.header().id() {
                        Id::Standard(sid) => sid.as_raw(),
                        // the sensor only speaks standard ids
                        Id::Extended(_) => continue,
                    };

                    match BusFrame::new(id, envelope.frame.data()) {
                        Ok(frame) => {
                            let now_ms = Instant::now().as_millis();
                            self.router.deliver(&frame, now_ms, &mut self.diagnostics);
                        }
                        Err(err) => defmt::warn!("dropping CAN frame: {}", err),
                    }
                }
                Either::First(Err(err)) => {
                    defmt::warn!("CAN bus error: {}", err);
                }
                Either::Second(command) => self.apply_command(command).await,
            }
        }
    }
}

#[embassy_executor::task]
async fn can_task_entry(mut can_task: CanTask) {
    loop {
        can_task.can_task_entry().await;
        defmt::error!("can task returned");
    }
}

pub fn start_can_task(can_spawner: SendSpawner,
        settings: &'static SharedSettings,
        charge: &'static SharedChargeState,
        commands: &'static BusCommandSignal,
        diagnostics: DiagnosticPublisher,
        can: CurrentSensorCan,
        rx_pin: CurrentSensorCanRxPin,
        tx_pin: CurrentSensorCanTxPin) {

    let mut can = Can::new(can, rx_pin, tx_pin, SystemIrqs);

    // the router does the address filtering, so take everything
    can.modify_filters().enable_bank(0, Fifo::Fifo0, Mask32::accept_all());
    can.modify_config()
        .set_loopback(false)
        .set_silent(false)
        .set_bitrate(settings.get().can_bitrate);

    let pack_settings = settings.get();
    if pack_settings.can_enabled {
        commands.signal(BusCommand::Enable(pack_settings.can_bitrate));
    }

    let can_task = CanTask {
        can,
        router: FrameRouter::new(settings, charge),
        commands,
        diagnostics,
    };

    unwrap!(can_spawner.spawn(can_task_entry(can_task)));
}
