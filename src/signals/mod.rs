//! Signal definitions and the codec translating between raw frame bits and scaled values.
//! ## Example
//! ```rust
//! use cantranslator::signals::{decode_signal, Signal};
//!
//! let mut signal = Signal::new(0, 0x10, "powertrain_torque", 2, 4).with_scaling(1001.0, -30000.0);
//! let value = decode_signal(&mut signal, &[0xEB, 0, 0, 0, 0, 0, 0, 0]).unwrap();
//! assert_eq!(value, -19990.0);
//! ```

mod error;
pub mod handlers;

pub use error::Error;
pub use handlers::{DecodeHandler, SignalValue, WriteHandler};

use crate::can::{bitfield, CanBus, Frame};
use crate::output::{OutputMessage, OutputSink};

use tracing::{debug, warn};

/// One named value of an enumerated signal.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalState {
    pub value: u64,
    pub name: String,
}

impl SignalState {
    pub fn new(value: u64, name: &str) -> Self {
        Self {
            value,
            name: name.to_string(),
        }
    }
}

/// Definition of one field of a CAN message.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signal {
    /// Bus index the message is received on and written to
    pub bus: u8,
    /// Arbitration ID of the owning message
    pub message_id: u32,
    pub name: String,
    /// Start bit, 0 is the most significant bit of the first byte
    pub bit_position: u8,
    pub bit_size: u8,
    pub factor: f64,
    pub offset: f64,
    /// Expected range of the scaled value. Not enforced by the codec.
    pub min_value: f64,
    pub max_value: f64,
    pub states: Vec<SignalState>,
    /// Publish every decoded value, even when it didn't change
    pub send_same: bool,
    pub writable: bool,
    pub handler: DecodeHandler,
    pub write_handler: WriteHandler,
    /// Most recently decoded value
    #[cfg_attr(feature = "serde", serde(skip))]
    pub last_value: f64,
    /// Whether a value has been published since startup
    #[cfg_attr(feature = "serde", serde(skip))]
    pub received: bool,
}

impl Signal {
    pub fn new(bus: u8, message_id: u32, name: &str, bit_position: u8, bit_size: u8) -> Self {
        Self {
            bus,
            message_id,
            name: name.to_string(),
            bit_position,
            bit_size,
            factor: 1.0,
            offset: 0.0,
            min_value: 0.0,
            max_value: 0.0,
            states: vec![],
            send_same: true,
            writable: false,
            handler: DecodeHandler::Passthrough,
            write_handler: WriteHandler::Number,
            last_value: 0.0,
            received: false,
        }
    }

    pub fn with_scaling(mut self, factor: f64, offset: f64) -> Self {
        self.factor = factor;
        self.offset = offset;
        self
    }

    pub fn with_range(mut self, min_value: f64, max_value: f64) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }

    /// Attach an enumerated state table. Selects the state handlers for decoding and writing.
    pub fn with_states(mut self, states: Vec<SignalState>) -> Self {
        self.states = states;
        self.handler = DecodeHandler::State;
        self.write_handler = WriteHandler::State;
        self
    }

    pub fn with_handler(mut self, handler: DecodeHandler) -> Self {
        self.handler = handler;
        self
    }

    /// Allow writing this signal through `write_handler`.
    pub fn writable(mut self, write_handler: WriteHandler) -> Self {
        self.writable = true;
        self.write_handler = write_handler;
        self
    }

    pub fn state_for_value(&self, value: u64) -> Option<&SignalState> {
        self.states.iter().find(|state| state.value == value)
    }

    pub fn state_for_name(&self, name: &str) -> Option<&SignalState> {
        self.states.iter().find(|state| state.name == name)
    }
}

/// Find a signal by its exact (case-sensitive) name.
pub fn lookup_signal<'a>(name: &str, signals: &'a [Signal]) -> Option<&'a Signal> {
    signals.iter().find(|signal| signal.name == name)
}

/// Extract and scale the signal's bits from `data`. The result is also stored in `last_value`.
pub fn decode_signal(signal: &mut Signal, data: &[u8; 8]) -> Result<f64, Error> {
    let raw = bitfield::extract(data, signal.bit_position, signal.bit_size)?;
    let value = raw as f64 * signal.factor + signal.offset;
    signal.last_value = value;
    Ok(value)
}

/// Inverse scale `value` into the raw bit pattern of the signal, not yet shifted into position.
pub fn encode_signal(signal: &Signal, value: f64) -> Result<u64, Error> {
    bitfield::check_bounds(signal.bit_position, signal.bit_size)?;
    if signal.factor == 0.0 {
        return Err(Error::DivisionByZero);
    }

    let raw = ((value - signal.offset) / signal.factor).round() as i64;
    Ok(raw as u64 & bitfield::mask(signal.bit_size))
}

/// Ordered collection of every signal the translator knows about. Entries are never removed, so indices stay valid for the lifetime of the table.
#[derive(Debug, Clone, Default)]
pub struct SignalTable {
    signals: Vec<Signal>,
}

impl SignalTable {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self { signals }
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Signal> {
        self.signals.get(index)
    }

    pub fn lookup(&self, name: &str) -> Option<&Signal> {
        lookup_signal(name, &self.signals)
    }

    /// Index of the signal named `name`, usable with [`SignalTable::get`].
    pub fn position(&self, name: &str) -> Option<usize> {
        self.signals.iter().position(|signal| signal.name == name)
    }

    /// Decode every signal carried by `frame` and publish the handled values. Returns the number of published values.
    ///
    /// A signal that fails to decode is skipped, the others in the frame are still translated.
    pub fn translate<S: OutputSink + ?Sized>(&mut self, frame: &Frame, sink: &mut S) -> usize {
        let id: u32 = frame.id.into();
        let data = frame.payload();
        let mut published = 0;

        for idx in 0..self.signals.len() {
            if self.signals[idx].bus != frame.bus || self.signals[idx].message_id != id {
                continue;
            }

            let previous = self.signals[idx].last_value;
            let value = match decode_signal(&mut self.signals[idx], &data) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Failed to decode {}: {}", self.signals[idx].name, e);
                    continue;
                }
            };

            let signal = &self.signals[idx];
            let mut send = true;
            let output = signal.handler.handle(signal, &self.signals, value, &mut send);

            if send && (signal.send_same || !signal.received || value != previous) {
                sink.publish(OutputMessage::named(&signal.name, output));
                published += 1;
                self.signals[idx].received = true;
            }
        }

        published
    }

    /// Encode `value` into the signal named `name` and queue the resulting frame on `bus`.
    ///
    /// Returns `Ok(false)` when the write handler suppressed the write or the send queue is full.
    pub fn write(&self, name: &str, value: &SignalValue, bus: &mut CanBus) -> crate::Result<bool> {
        let signal = self
            .lookup(name)
            .ok_or_else(|| Error::UnknownSignal(name.to_string()))?;

        if !signal.writable {
            return Err(Error::NotWritable(name.to_string()).into());
        }

        let mut data = [0u8; 8];
        let mut send = true;
        signal
            .write_handler
            .write(signal, &self.signals, value, &mut send, &mut data)?;

        if !send {
            return Ok(false);
        }

        let frame = Frame::new(bus.index, signal.message_id.into(), &data)?;
        debug!("Writing {} = {:?} as {:?}", name, value, frame);
        Ok(bus.enqueue(frame))
    }
}
