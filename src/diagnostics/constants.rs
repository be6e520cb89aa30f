//! Constants for OBD-II (SAE J1979 / ISO 15031) diagnostic requests.
use strum_macros::{Display, FromRepr};

/// Added to the request mode in a positive response
pub const POSITIVE_RESPONSE: u8 = 0x40;
/// First byte of a negative response
pub const NEGATIVE_RESPONSE: u8 = 0x7f;

/// Standard ids respond at the request id plus this offset
pub const RESPONSE_ID_OFFSET: u32 = 0x8;
/// 11-bit functional broadcast id, answered by every emissions related ECU
pub const FUNCTIONAL_BROADCAST_ID: u32 = 0x7df;
/// Range of 11-bit ids answering a functional broadcast
pub const FUNCTIONAL_RESPONSE_START: u32 = 0x7e8;
pub const FUNCTIONAL_RESPONSE_END: u32 = 0x7ef;

/// Diagnostic modes (services) as defined in SAE J1979
#[derive(Debug, PartialEq, Copy, Clone, FromRepr, Display)]
#[repr(u8)]
pub enum ObdMode {
    PowertrainDiagnosticRequest = 0x01,
    PowertrainFreezeFrameRequest = 0x02,
    EmissionsDtcRequest = 0x03,
    EmissionsDtcClear = 0x04,
    OxygenSensorTestResults = 0x05,
    OnBoardMonitoringTestResults = 0x06,
    PendingEmissionsDtcRequest = 0x07,
    ControlOnBoardSystem = 0x08,
    VehicleInformationRequest = 0x09,
    PermanentEmissionsDtcRequest = 0x0a,
}

/// Negative response codes shared by OBD-II and ISO 14229
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum NegativeResponseCode {
    GeneralReject = 0x10,
    ServiceNotSupported = 0x11,
    SubFunctionNotSupported = 0x12,
    IncorrectMessageLengthOrInvalidFormat = 0x13,
    ResponseTooLong = 0x14,
    BusyRepeatRequest = 0x21,
    ConditionsNotCorrect = 0x22,
    RequestSequenceError = 0x24,
    RequestOutOfRange = 0x31,
    SecurityAccessDenied = 0x33,
    RequestCorrectlyReceivedResponsePending = 0x78,
    SubFunctionNotSupportedInActiveSession = 0x7e,
    ServiceNotSupportedInActiveSession = 0x7f,

    NonStandard(u8),
}

impl From<u8> for NegativeResponseCode {
    fn from(val: u8) -> NegativeResponseCode {
        match val {
            0x10 => NegativeResponseCode::GeneralReject,
            0x11 => NegativeResponseCode::ServiceNotSupported,
            0x12 => NegativeResponseCode::SubFunctionNotSupported,
            0x13 => NegativeResponseCode::IncorrectMessageLengthOrInvalidFormat,
            0x14 => NegativeResponseCode::ResponseTooLong,
            0x21 => NegativeResponseCode::BusyRepeatRequest,
            0x22 => NegativeResponseCode::ConditionsNotCorrect,
            0x24 => NegativeResponseCode::RequestSequenceError,
            0x31 => NegativeResponseCode::RequestOutOfRange,
            0x33 => NegativeResponseCode::SecurityAccessDenied,
            0x78 => NegativeResponseCode::RequestCorrectlyReceivedResponsePending,
            0x7e => NegativeResponseCode::SubFunctionNotSupportedInActiveSession,
            0x7f => NegativeResponseCode::ServiceNotSupportedInActiveSession,
            _ => NegativeResponseCode::NonStandard(val),
        }
    }
}

impl From<NegativeResponseCode> for u8 {
    fn from(val: NegativeResponseCode) -> u8 {
        match val {
            NegativeResponseCode::GeneralReject => 0x10,
            NegativeResponseCode::ServiceNotSupported => 0x11,
            NegativeResponseCode::SubFunctionNotSupported => 0x12,
            NegativeResponseCode::IncorrectMessageLengthOrInvalidFormat => 0x13,
            NegativeResponseCode::ResponseTooLong => 0x14,
            NegativeResponseCode::BusyRepeatRequest => 0x21,
            NegativeResponseCode::ConditionsNotCorrect => 0x22,
            NegativeResponseCode::RequestSequenceError => 0x24,
            NegativeResponseCode::RequestOutOfRange => 0x31,
            NegativeResponseCode::SecurityAccessDenied => 0x33,
            NegativeResponseCode::RequestCorrectlyReceivedResponsePending => 0x78,
            NegativeResponseCode::SubFunctionNotSupportedInActiveSession => 0x7e,
            NegativeResponseCode::ServiceNotSupportedInActiveSession => 0x7f,
            NegativeResponseCode::NonStandard(val) => val,
        }
    }
}
