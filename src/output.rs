//! Messages handed to the output side of the translator, and the sink trait receiving them.
//!
//! Serialization and transport framing are up to the sink. With the `serde` feature enabled the messages serialize to the usual flat layout, e.g. `{"name":"mypid","value":69.0}` or `{"bus":1,"id":2016,"mode":1,"success":true,"pid":2,"payload":"0x45"}`.

use crate::signals::SignalValue;

/// Response to a diagnostic request that has no output name.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DiagnosticResponseRecord {
    /// Bus address (1-based) the response was received on
    pub bus: u8,
    /// Arbitration ID of the request
    pub id: u32,
    pub mode: u8,
    pub success: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub pid: Option<u16>,
    /// Negative response code, only set when `success` is false
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub negative_response_code: Option<u8>,
    /// Raw payload, set when there is no decoded value to report
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_payload")
    )]
    pub payload: Option<Vec<u8>>,
    /// Decoded value, when the request has a decoder
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub value: Option<f64>,
}

impl DiagnosticResponseRecord {
    /// Payload formatted as `0x` prefixed hex, e.g. `0x45`.
    pub fn payload_hex(&self) -> Option<String> {
        self.payload.as_ref().map(|payload| format!("0x{}", hex::encode(payload)))
    }
}

#[cfg(feature = "serde")]
fn serialize_payload<S: serde::Serializer>(payload: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
    match payload {
        Some(payload) => serializer.serialize_str(&format!("0x{}", hex::encode(payload))),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(untagged))]
pub enum OutputMessage {
    /// A named value, from a signal or a named diagnostic request
    Simple { name: String, value: SignalValue },
    DiagnosticResponse(DiagnosticResponseRecord),
}

impl OutputMessage {
    pub fn named(name: &str, value: SignalValue) -> Self {
        OutputMessage::Simple {
            name: name.to_string(),
            value,
        }
    }
}

/// Receiver of fully resolved output messages.
pub trait OutputSink {
    fn publish(&mut self, message: OutputMessage);
}

impl OutputSink for Vec<OutputMessage> {
    fn publish(&mut self, message: OutputMessage) {
        self.push(message);
    }
}
