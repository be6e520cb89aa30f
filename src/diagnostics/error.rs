//! Error types for registering and managing diagnostic requests.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Active Request List Full")]
    ActiveListFull,
    #[error("Request Frequency Too High: {0} Hz")]
    FrequencyTooHigh(f32),
    #[error("Bus Frequency Exceeded: {0} Hz")]
    BusFrequencyExceeded(f32),
    #[error("Invalid Output Name")]
    InvalidName,
    #[error("Invalid Request")]
    InvalidRequest,
    #[error("Unknown Bus: {0}")]
    UnknownBus(u8),
    #[error("Unknown Request")]
    UnknownRequest,
}
