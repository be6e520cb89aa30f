//! Error types for signal decoding and encoding.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Bit span out of bounds: position {position}, size {size}")]
    OutOfBounds { position: u8, size: u8 },
    #[error("Division By Zero")]
    DivisionByZero,
    #[error("Unknown Signal: {0}")]
    UnknownSignal(String),
    #[error("Signal Not Writable: {0}")]
    NotWritable(String),
}
