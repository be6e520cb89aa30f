use std::time::Duration;

const DEFAULT_MAX_ACTIVE_REQUESTS: usize = 20;
const DEFAULT_MAX_IN_FLIGHT_REQUESTS: usize = 8;
const DEFAULT_MAX_REQUEST_FREQUENCY_HZ: f32 = 10.0;
const DEFAULT_MAX_BUS_FREQUENCY_HZ: f32 = 50.0;
const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 100;

/// Limits and timing of the diagnostic request manager. Applies to every bus.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct DiagnosticsConfig {
    /// Capacity of the active request list of each bus
    pub max_active_requests: usize,
    /// Capacity of the in-flight list of each bus
    pub max_in_flight_requests: usize,
    /// Highest frequency a single recurring request may use
    pub max_request_frequency_hz: f32,
    /// Highest summed frequency of all recurring requests on one bus
    pub max_bus_frequency_hz: f32,
    /// Time after which an unanswered request is no longer in flight
    pub response_timeout: Duration,
    /// Byte used to pad request frames to 8 bytes
    pub padding_byte: u8,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        DiagnosticsConfig {
            max_active_requests: DEFAULT_MAX_ACTIVE_REQUESTS,
            max_in_flight_requests: DEFAULT_MAX_IN_FLIGHT_REQUESTS,
            max_request_frequency_hz: DEFAULT_MAX_REQUEST_FREQUENCY_HZ,
            max_bus_frequency_hz: DEFAULT_MAX_BUS_FREQUENCY_HZ,
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            padding_byte: 0x00,
        }
    }
}
