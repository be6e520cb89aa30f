//! Types used to describe diagnostic requests and their responses.
use crate::can::Identifier;

use super::constants::{
    NegativeResponseCode, FUNCTIONAL_BROADCAST_ID, FUNCTIONAL_RESPONSE_END, FUNCTIONAL_RESPONSE_START,
    NEGATIVE_RESPONSE, POSITIVE_RESPONSE, RESPONSE_ID_OFFSET,
};

/// Parameter ID, 1 byte for OBD-II modes or 2 bytes for enhanced diagnostics.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Pid {
    Short(u8),
    Long(u16),
}

impl Pid {
    pub fn value(&self) -> u16 {
        match self {
            Pid::Short(pid) => *pid as u16,
            Pid::Long(pid) => *pid,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Pid::Short(pid) => vec![*pid],
            Pid::Long(pid) => pid.to_be_bytes().to_vec(),
        }
    }
}

/// What a diagnostic request puts on the bus. Two requests with the same arbitration id, mode and PID are the same request.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiagnosticRequest {
    pub arbitration_id: Identifier,
    pub mode: u8,
    pub pid: Option<Pid>,
    /// Send the frame with its minimal length instead of padding it to 8 bytes
    pub no_frame_padding: bool,
}

impl DiagnosticRequest {
    pub fn new(arbitration_id: u32, mode: u8) -> Self {
        Self {
            arbitration_id: arbitration_id.into(),
            mode,
            pid: None,
            no_frame_padding: false,
        }
    }

    pub fn with_pid(mut self, pid: u8) -> Self {
        self.pid = Some(Pid::Short(pid));
        self
    }

    pub fn with_long_pid(mut self, pid: u16) -> Self {
        self.pid = Some(Pid::Long(pid));
        self
    }

    pub fn without_padding(mut self) -> Self {
        self.no_frame_padding = true;
        self
    }

    /// Mode followed by the PID bytes, i.e. the ISO-TP payload of the request.
    pub fn payload(&self) -> Vec<u8> {
        let mut buf = vec![self.mode];
        if let Some(pid) = self.pid {
            buf.extend(pid.to_bytes());
        }
        buf
    }

    /// Sent to the functional broadcast address, any emissions ECU may answer
    pub fn is_broadcast(&self) -> bool {
        self.arbitration_id == Identifier::Standard(FUNCTIONAL_BROADCAST_ID)
    }

    /// Arbitration id the response to a physically addressed request arrives on
    pub fn response_id(&self) -> Identifier {
        match self.arbitration_id {
            Identifier::Standard(id) => Identifier::Standard(id + RESPONSE_ID_OFFSET),
            Identifier::Extended(id) => {
                let bytes = id.to_be_bytes();
                let id = u32::from_be_bytes([bytes[0], bytes[1], bytes[3], bytes[2]]); // Swap last two bytes
                Identifier::Extended(id)
            }
        }
    }

    pub fn matches_response_id(&self, id: Identifier) -> bool {
        if self.is_broadcast() {
            matches!(id, Identifier::Standard(id) if (FUNCTIONAL_RESPONSE_START..=FUNCTIONAL_RESPONSE_END).contains(&id))
        } else {
            id == self.response_id()
        }
    }

    /// Same arbitration id, mode and PID
    pub fn same_target(&self, other: &DiagnosticRequest) -> bool {
        self.arbitration_id == other.arbitration_id && self.mode == other.mode && self.pid == other.pid
    }
}

/// Custom decoder, called with the response and its payload parsed as a number (0 if the payload isn't numeric).
pub type DecoderFn = fn(&DiagnosticResponse, f64) -> f64;

/// How the value published for a response is computed.
#[derive(Debug, Copy, Clone, Default)]
pub enum ResponseDecoder {
    /// Publish the parsed payload, or the raw payload for unnamed requests
    #[default]
    NoTransform,
    /// `payload * factor + offset`
    LinearScale { factor: f64, offset: f64 },
    Custom(DecoderFn),
}

impl ResponseDecoder {
    pub fn decode(&self, response: &DiagnosticResponse) -> Option<f64> {
        let parsed = response.parsed_payload();
        match self {
            ResponseDecoder::NoTransform => parsed,
            ResponseDecoder::LinearScale { factor, offset } => parsed.map(|value| value * factor + offset),
            ResponseDecoder::Custom(decoder) => Some(decoder(response, parsed.unwrap_or(0.0))),
        }
    }
}

/// A parsed response to a diagnostic request.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticResponse {
    /// Arbitration id the response was received on
    pub arbitration_id: Identifier,
    /// Mode of the request, without the positive response offset
    pub mode: u8,
    pub pid: Option<Pid>,
    pub success: bool,
    pub negative_response_code: Option<NegativeResponseCode>,
    pub payload: Vec<u8>,
}

impl DiagnosticResponse {
    /// Parse a reassembled ISO-TP packet as the response to `request`. Returns `None` if the packet belongs to another request.
    pub fn parse(request: &DiagnosticRequest, arbitration_id: Identifier, packet: &[u8]) -> Option<Self> {
        let (&sid, rest) = packet.split_first()?;

        if sid == NEGATIVE_RESPONSE {
            if rest.len() < 2 || rest[0] != request.mode {
                return None;
            }
            return Some(Self {
                arbitration_id,
                mode: request.mode,
                pid: request.pid,
                success: false,
                negative_response_code: Some(rest[1].into()),
                payload: vec![],
            });
        }

        if sid != request.mode.wrapping_add(POSITIVE_RESPONSE) {
            return None;
        }

        let payload = match request.pid {
            Some(pid) => {
                let echo = pid.to_bytes();
                if !rest.starts_with(&echo) {
                    return None;
                }
                &rest[echo.len()..]
            }
            None => rest,
        };

        Some(Self {
            arbitration_id,
            mode: request.mode,
            pid: request.pid,
            success: true,
            negative_response_code: None,
            payload: payload.to_vec(),
        })
    }

    /// Payload as a big-endian unsigned integer, if it has between 1 and 8 bytes.
    pub fn parsed_payload(&self) -> Option<f64> {
        if self.payload.is_empty() || self.payload.len() > 8 {
            return None;
        }
        let value = self.payload.iter().fold(0u64, |acc, &x| (acc << 8) | x as u64);
        Some(value as f64)
    }
}
