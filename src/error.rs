//! Contains the main error type for the library.
use thiserror::Error;

/// The main error type for the library. Each module has it's own error type that is contained by this error.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Not Found")]
    NotFound,
    #[error("Malformed Frame")]
    MalformedFrame,
    #[error("Disconnected")]
    Disconnected,
    #[error(transparent)]
    SignalError(#[from] crate::signals::Error),
    #[error(transparent)]
    DiagnosticsError(#[from] crate::diagnostics::Error),
    #[error(transparent)]
    IsoTPError(#[from] crate::isotp::error::Error),
}
