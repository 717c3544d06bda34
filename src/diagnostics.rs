use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, pubsub::{ImmediatePublisher, PubSubChannel, Subscriber}};

use crate::current_sensor::SensorFault;

/// Conditions the monitor reports but never acts on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Diagnostic {
    SensorFault(SensorFault),
    PackImbalance { spread_mv: i32, threshold_mv: i32 },
    MalformedFrame { id: u16, len: u8 },
}

pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

pub const DIAGNOSTIC_DEPTH: usize = 8;
pub const DIAGNOSTIC_SUBS: usize = 2;
pub const DIAGNOSTIC_PUBS: usize = 2;

pub type DiagnosticPubSub = PubSubChannel<CriticalSectionRawMutex, Diagnostic, DIAGNOSTIC_DEPTH, DIAGNOSTIC_SUBS, DIAGNOSTIC_PUBS>;
pub type DiagnosticPublisher = ImmediatePublisher<'static, CriticalSectionRawMutex, Diagnostic, DIAGNOSTIC_DEPTH, DIAGNOSTIC_SUBS, DIAGNOSTIC_PUBS>;
pub type DiagnosticSubscriber = Subscriber<'static, CriticalSectionRawMutex, Diagnostic, DIAGNOSTIC_DEPTH, DIAGNOSTIC_SUBS, DIAGNOSTIC_PUBS>;

impl<'a> DiagnosticSink for ImmediatePublisher<'a, CriticalSectionRawMutex, Diagnostic, DIAGNOSTIC_DEPTH, DIAGNOSTIC_SUBS, DIAGNOSTIC_PUBS> {
    fn report(&mut self, diagnostic: Diagnostic) {
        // a slow subscriber loses the oldest event, producers never wait
        self.publish_immediate(diagnostic);
    }
}

impl<const N: usize> DiagnosticSink for heapless::Vec<Diagnostic, N> {
    fn report(&mut self, diagnostic: Diagnostic) {
        if self.push(diagnostic).is_err() {
            warn!("diagnostic buffer full, dropping event");
        }
    }
}

/// Sink for contexts that only want the log output.
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}
