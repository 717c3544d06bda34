use core::fmt;

use defmt::unwrap;
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_stm32::{mode::Async, usart::{self, DataBits, Parity, StopBits, Uart, UartRx, UartTx}};

use ateam_pack_monitor::{
    can::BusLink,
    charge_state::SharedChargeState,
    console::{Console, ConsoleContext},
    diagnostics::{Diagnostic, DiagnosticSubscriber},
    readings::SharedBankMeans,
    settings::{SettingsStore, SharedSettings},
};

use crate::{flash_store::FlashSettingsStore, pins::*, tasks::can_task::SignalBusLink, SystemIrqs};

pub const CONSOLE_BAUDRATE: u32 = 115_200;

struct ConsoleWriter<'a> {
    tx: &'a mut UartTx<'static, Async>,
}

impl fmt::Write for ConsoleWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for chunk in s.split_inclusive('\n') {
            let (body, newline) = match chunk.strip_suffix('\n') {
                Some(body) => (body, true),
                None => (chunk, false),
            };

            self.tx.blocking_write(body.as_bytes()).map_err(|_| fmt::Error)?;
            if newline {
                self.tx.blocking_write(b"\r\n").map_err(|_| fmt::Error)?;
            }
        }
        Ok(())
    }
}

pub struct ConsoleTask {
    console: Console,
    tx: UartTx<'static, Async>,
    rx: UartRx<'static, Async>,
    settings: &'static SharedSettings,
    charge: &'static SharedChargeState,
    means: &'static SharedBankMeans,
    store: FlashSettingsStore,
    bus: SignalBusLink,
    diagnostics: DiagnosticSubscriber,
}

impl ConsoleTask {
    async fn console_task_entry(&mut self) {
        defmt::info!("console task startup");

        let mut rx_buf = [0u8; 32];
        loop {
            match select(self.rx.read_until_idle(&mut rx_buf), self.diagnostics.next_message_pure()).await {
                Either::First(Ok(len)) => {
                    let mut ctx = ConsoleContext {
                        settings: self.settings,
                        charge: self.charge,
                        means: self.means,
                        store: &mut self.store as &mut dyn SettingsStore,
                        bus: &mut self.bus as &mut dyn BusLink,
                    };
                    let mut out = ConsoleWriter { tx: &mut self.tx };

                    for byte in &rx_buf[..len] {
                        self.console.receive(*byte, &mut ctx, &mut out);
                    }
                }
                Either::First(Err(err)) => {
                    defmt::warn!("console uart error: {}", err);
                }
                Either::Second(diagnostic) => self.print_diagnostic(diagnostic),
            }
        }
    }

    fn print_diagnostic(&mut self, diagnostic: Diagnostic) {
        use core::fmt::Write;

        let mut out = ConsoleWriter { tx: &mut self.tx };
        let _ = match diagnostic {
            Diagnostic::SensorFault(fault) => writeln!(out, "current sensor fault: {}", fault.description()),
            Diagnostic::PackImbalance { spread_mv, threshold_mv } => {
                writeln!(out, "pack imbalance: {} mV spread (threshold {} mV)", spread_mv, threshold_mv)
            }
            Diagnostic::MalformedFrame { id, len } => writeln!(out, "malformed frame 0x{:03X} ({} bytes)", id, len),
        };
    }
}

pub fn console_uart_config() -> usart::Config {
    let mut console_uart_config = usart::Config::default();
    console_uart_config.baudrate = CONSOLE_BAUDRATE;
    console_uart_config.data_bits = DataBits::DataBits8;
    console_uart_config.stop_bits = StopBits::STOP1;
    console_uart_config.parity = Parity::ParityNone;

    console_uart_config
}

#[embassy_executor::task]
async fn console_task_entry(mut console_task: ConsoleTask) {
    loop {
        console_task.console_task_entry().await;
        defmt::error!("console task returned");
    }
}

#[allow(clippy::too_many_arguments)]
pub fn start_console_task(spawner: Spawner,
        settings: &'static SharedSettings,
        charge: &'static SharedChargeState,
        means: &'static SharedBankMeans,
        store: FlashSettingsStore,
        commands: &'static BusCommandSignal,
        diagnostics: DiagnosticSubscriber,
        uart: ConsoleUart,
        rx_pin: ConsoleUartRxPin,
        tx_pin: ConsoleUartTxPin,
        tx_dma: ConsoleUartTxDma,
        rx_dma: ConsoleUartRxDma) {

    let uart = unwrap!(Uart::new(uart, rx_pin, tx_pin, SystemIrqs, tx_dma, rx_dma, console_uart_config()));
    let (tx, rx) = uart.split();

    let console_task = ConsoleTask {
        console: Console::new(),
        tx,
        rx,
        settings,
        charge,
        means,
        store,
        bus: SignalBusLink::new(commands),
        diagnostics,
    };

    unwrap!(spawner.spawn(console_task_entry(console_task)));
}
