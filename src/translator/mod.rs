//! The translator context: signal table, diagnostic requests and CAN buses, driven by one scheduling loop.
//!
//! All state lives in a [`Translator`] value that is passed explicitly, so independent instances can coexist. [`Translator::poll`] runs one iteration of the loop against a [`CanAdapter`], and [`AsyncTranslator`] runs that loop on a background thread.

mod async_translator;

pub use async_translator::AsyncTranslator;

use crate::can::{CanAdapter, CanBus, Frame};
use crate::diagnostics::{DiagnosticRequest, DiagnosticsConfig, DiagnosticsManager, RequestHandle, RequestOptions};
use crate::error::Error;
use crate::output::OutputSink;
use crate::signals::{Signal, SignalTable, SignalValue};
use crate::Result;

use std::time::Instant;
use tracing::{debug, warn};

const DEFAULT_BUS_COUNT: u8 = 2;
const DEFAULT_SEND_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct TranslatorConfig {
    /// Number of CAN buses, indexed from 0
    pub bus_count: u8,
    /// Capacity of the outbound queue of each bus
    pub send_queue_capacity: usize,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        TranslatorConfig {
            bus_count: DEFAULT_BUS_COUNT,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

pub struct Translator {
    signals: SignalTable,
    diagnostics: DiagnosticsManager,
    buses: Vec<CanBus>,
}

impl Translator {
    pub fn new(config: TranslatorConfig, signals: Vec<Signal>) -> Self {
        let buses = (0..config.bus_count)
            .map(|index| CanBus::new(index, config.send_queue_capacity))
            .collect();

        Self {
            signals: SignalTable::new(signals),
            diagnostics: DiagnosticsManager::new(config.diagnostics, config.bus_count as usize),
            buses,
        }
    }

    pub fn signals(&self) -> &SignalTable {
        &self.signals
    }

    pub fn diagnostics(&self) -> &DiagnosticsManager {
        &self.diagnostics
    }

    pub fn bus(&self, index: u8) -> Option<&CanBus> {
        self.buses.get(index as usize)
    }

    pub fn bus_mut(&mut self, index: u8) -> Option<&mut CanBus> {
        self.buses.get_mut(index as usize)
    }

    pub fn add_request(&mut self, bus: u8, request: DiagnosticRequest, options: RequestOptions) -> Result<RequestHandle> {
        let bus = self.buses.get(bus as usize).ok_or(Error::NotFound)?;
        self.diagnostics.add_request(bus, request, options)
    }

    pub fn cancel_request(&mut self, handle: RequestHandle) -> Result<()> {
        self.diagnostics.cancel_request(handle)
    }

    /// Drop every diagnostic request and every queued frame.
    pub fn reset(&mut self) {
        self.diagnostics.reset();
        self.buses.iter_mut().for_each(CanBus::clear);
    }

    /// Encode a value into the named signal and queue the frame on the signal's bus.
    pub fn write_signal(&mut self, name: &str, value: &SignalValue) -> Result<bool> {
        let bus = self
            .signals
            .lookup(name)
            .ok_or_else(|| crate::signals::Error::UnknownSignal(name.to_string()))?
            .bus;
        let bus = self.buses.get_mut(bus as usize).ok_or(Error::NotFound)?;
        self.signals.write(name, value, bus)
    }

    /// Handle one received frame: match it against in-flight diagnostic requests and translate the signals it carries.
    pub fn receive<S: OutputSink + ?Sized>(&mut self, frame: &Frame, sink: &mut S, now: Instant) -> Result<()> {
        let Some(bus) = self.buses.get_mut(frame.bus as usize) else {
            debug!("Ignoring frame from unknown bus {:?}", frame);
            return Ok(());
        };

        self.diagnostics.receive_can_message(bus, frame, sink, now)?;
        self.signals.translate(frame, sink);
        Ok(())
    }

    /// Schedule due diagnostic requests on every bus. Returns the number of frames queued.
    pub fn send_requests(&mut self, now: Instant) -> usize {
        let mut sent = 0;
        for bus in self.buses.iter_mut() {
            match self.diagnostics.send_requests(bus, now) {
                Ok(count) => sent += count,
                Err(e) => warn!("Failed to send requests on bus {}: {}", bus.address, e),
            }
        }
        sent
    }

    /// One iteration of the scheduling loop: receive, translate, send due requests, flush the send queues.
    pub fn poll<A: CanAdapter + ?Sized, S: OutputSink + ?Sized>(&mut self, adapter: &mut A, sink: &mut S, now: Instant) -> Result<()> {
        for frame in adapter.recv()? {
            if frame.loopback {
                continue;
            }
            if let Err(e) = self.receive(&frame, sink, now) {
                warn!("Failed to handle {:?}: {}", frame, e);
            }
        }

        self.send_requests(now);

        // Frames that failed to flush stay queued for the next iteration
        for bus in self.buses.iter_mut() {
            if let Err(e) = bus.flush(adapter) {
                warn!("Failed to flush send queue of bus {}: {}", bus.address, e);
            }
        }
        Ok(())
    }
}
