//! Value handlers applied after decoding and before encoding a signal.
//!
//! Every handler receives the target signal, the full signal table for cross-signal lookups, and a `send` flag that is `true` on entry. A handler clears the flag to suppress the output (or the write) instead of failing.

use strum_macros::{Display, EnumString};
use tracing::debug;

use super::{encode_signal, Error, Signal};
use crate::can::bitfield;

/// A value travelling in or out of the translator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(untagged))]
pub enum SignalValue {
    Number(f64),
    Boolean(bool),
    String(String),
}

impl From<f64> for SignalValue {
    fn from(val: f64) -> SignalValue {
        SignalValue::Number(val)
    }
}

impl From<bool> for SignalValue {
    fn from(val: bool) -> SignalValue {
        SignalValue::Boolean(val)
    }
}

impl From<&str> for SignalValue {
    fn from(val: &str) -> SignalValue {
        SignalValue::String(val.to_string())
    }
}

impl From<String> for SignalValue {
    fn from(val: String) -> SignalValue {
        SignalValue::String(val)
    }
}

/// Transform applied to a freshly decoded value before it is published.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum DecodeHandler {
    /// Publish the scaled value as is
    #[default]
    Passthrough,
    /// Publish `true` for any nonzero value
    Boolean,
    /// Never publish
    Ignore,
    /// Publish the name of the state matching the rounded value
    State,
}

impl DecodeHandler {
    pub fn handle(&self, signal: &Signal, _signals: &[Signal], value: f64, send: &mut bool) -> SignalValue {
        match self {
            DecodeHandler::Passthrough => SignalValue::Number(value),
            DecodeHandler::Boolean => SignalValue::Boolean(value != 0.0),
            DecodeHandler::Ignore => {
                *send = false;
                SignalValue::Number(value)
            }
            DecodeHandler::State => {
                let rounded = value.round();
                let state = if rounded >= 0.0 {
                    signal.state_for_value(rounded as u64)
                } else {
                    None
                };

                match state {
                    Some(state) => SignalValue::String(state.name.clone()),
                    None => {
                        debug!("No state of {} matches {}", signal.name, value);
                        *send = false;
                        SignalValue::String(String::new())
                    }
                }
            }
        }
    }
}

/// Transform applied to an externally supplied value before it is packed into a frame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum WriteHandler {
    /// Inverse scale a number
    #[default]
    Number,
    /// Truthy values are written as 1, falsy as 0
    Boolean,
    /// Write the raw value of the state with the given name
    State,
}

impl WriteHandler {
    /// Encode `value` for `signal` and merge it into `data`. When the send flag is cleared, `data` is left untouched.
    pub fn write(
        &self,
        signal: &Signal,
        _signals: &[Signal],
        value: &SignalValue,
        send: &mut bool,
        data: &mut [u8; 8],
    ) -> Result<(), Error> {
        let raw = match (self, value) {
            (WriteHandler::Number, SignalValue::Number(number)) => Some(encode_signal(signal, *number)?),
            (WriteHandler::Number, SignalValue::Boolean(b)) => Some(encode_signal(signal, f64::from(u8::from(*b)))?),
            (WriteHandler::Boolean, SignalValue::Boolean(b)) => Some(encode_signal(signal, f64::from(u8::from(*b)))?),
            (WriteHandler::Boolean, SignalValue::Number(number)) => {
                Some(encode_signal(signal, if *number != 0.0 { 1.0 } else { 0.0 })?)
            }
            (WriteHandler::State, SignalValue::String(name)) => signal.state_for_name(name).map(|state| state.value),
            _ => None,
        };

        match raw {
            Some(raw) => bitfield::merge(data, signal.bit_position, signal.bit_size, raw),
            None => {
                debug!("Can't write {:?} to {} with the {} writer", value, signal.name, self);
                *send = false;
                Ok(())
            }
        }
    }
}
