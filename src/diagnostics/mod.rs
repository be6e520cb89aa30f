//! Scheduled OBD-II diagnostic requests: registration, sending, response matching and decoding.
//!
//! Every bus has a bounded list of active requests and a bounded list of in-flight requests. A request is sent when it is due, stays in flight until its response is matched or it times out, and is then either rescheduled (recurring) or retired (one-shot).
//! ## Example
//! ```rust
//! use std::time::Instant;
//! use cantranslator::can::{CanBus, Frame};
//! use cantranslator::diagnostics::{DiagnosticRequest, DiagnosticsConfig, DiagnosticsManager, RequestOptions};
//! use cantranslator::output::OutputMessage;
//! use cantranslator::signals::SignalValue;
//!
//! let mut bus = CanBus::new(0, 16);
//! let mut manager = DiagnosticsManager::new(DiagnosticsConfig::default(), 1);
//! let request = DiagnosticRequest::new(0x7e0, 0x01).with_pid(0x0d);
//! manager.add_request(&bus, request, RequestOptions::one_shot().with_name("vehicle_speed")).unwrap();
//!
//! let now = Instant::now();
//! manager.send_requests(&mut bus, now).unwrap();
//! let sent = bus.pop().unwrap();
//! assert_eq!(sent.data, vec![0x02, 0x01, 0x0d, 0, 0, 0, 0, 0]);
//!
//! let mut output: Vec<OutputMessage> = vec![];
//! let response = Frame::new(0, 0x7e8.into(), &[0x03, 0x41, 0x0d, 0x32, 0, 0, 0, 0]).unwrap();
//! assert!(manager.receive_can_message(&mut bus, &response, &mut output, now).unwrap());
//! assert_eq!(output, vec![OutputMessage::named("vehicle_speed", SignalValue::Number(50.0))]);
//! ```

mod config;
mod constants;
mod error;
mod types;

pub use config::DiagnosticsConfig;
pub use constants::*;
pub use error::Error;
pub use types::*;

use crate::can::{CanBus, Frame, Identifier};
use crate::isotp::{self, IsoTPReceiver, RxStatus};
use crate::output::{DiagnosticResponseRecord, OutputMessage, OutputSink};
use crate::Result;

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Output and scheduling options of a request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Publish the response as a named value instead of a response record
    pub name: Option<String>,
    pub decoder: ResponseDecoder,
    /// Send frequency of a recurring request, 0 for a one-shot request
    pub frequency_hz: f32,
}

impl RequestOptions {
    pub fn one_shot() -> Self {
        Self::default()
    }

    pub fn recurring(frequency_hz: f32) -> Self {
        Self {
            frequency_hz,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_scaling(mut self, factor: f64, offset: f64) -> Self {
        self.decoder = ResponseDecoder::LinearScale { factor, offset };
        self
    }

    pub fn with_decoder(mut self, decoder: DecoderFn) -> Self {
        self.decoder = ResponseDecoder::Custom(decoder);
        self
    }
}

/// Stable reference to a registered request. Goes stale once the request is retired or cancelled.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RequestHandle {
    pub bus: u8,
    slot: usize,
    generation: u32,
}

/// Send interval of a recurring request, `None` if it doesn't fit a [`Duration`].
fn interval(frequency_hz: f32) -> Option<Duration> {
    Duration::try_from_secs_f64(1.0 / frequency_hz as f64).ok()
}

/// A registered request and its scheduling state.
#[derive(Debug, Clone)]
pub struct ActiveRequest {
    request: DiagnosticRequest,
    options: RequestOptions,
    generation: u32,
    stagger: Duration,
    armed_at: Option<Instant>,
    last_sent: Option<Instant>,
    response_count: u32,
}

impl ActiveRequest {
    pub fn request(&self) -> &DiagnosticRequest {
        &self.request
    }

    pub fn name(&self) -> Option<&str> {
        self.options.name.as_deref()
    }

    pub fn frequency_hz(&self) -> f32 {
        self.options.frequency_hz
    }

    pub fn is_recurring(&self) -> bool {
        self.options.frequency_hz > 0.0
    }

    /// Delay of the first send, counted from the first scheduling pass after registration
    pub fn stagger(&self) -> Duration {
        self.stagger
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    pub fn response_count(&self) -> u32 {
        self.response_count
    }

    fn interval(&self) -> Duration {
        interval(self.options.frequency_hz).unwrap_or(Duration::MAX)
    }

    fn is_due(&self, now: Instant) -> bool {
        let due_at = match (self.last_sent, self.armed_at) {
            (Some(last_sent), _) if self.is_recurring() => last_sent.checked_add(self.interval()),
            (Some(_), _) => None,
            (None, Some(armed_at)) => armed_at.checked_add(self.stagger),
            (None, None) => None,
        };
        due_at.is_some_and(|due_at| now >= due_at)
    }
}

#[derive(Debug)]
struct InFlightRequest {
    slot: usize,
    sent_at: Instant,
    /// One reassembly buffer per responding ECU
    receivers: Vec<(Identifier, IsoTPReceiver)>,
}

impl InFlightRequest {
    fn receiver(&mut self, id: Identifier) -> &mut IsoTPReceiver {
        let idx = match self.receivers.iter().position(|(rx_id, _)| *rx_id == id) {
            Some(idx) => idx,
            None => {
                self.receivers.push((id, IsoTPReceiver::new()));
                self.receivers.len() - 1
            }
        };
        &mut self.receivers[idx].1
    }
}

/// Active and in-flight requests of one bus.
#[derive(Debug)]
pub struct BusRequestSet {
    active: Vec<Option<ActiveRequest>>,
    in_flight: Vec<InFlightRequest>,
    next_generation: u32,
}

impl BusRequestSet {
    fn new(capacity: usize) -> Self {
        Self {
            active: (0..capacity).map(|_| None).collect(),
            in_flight: vec![],
            next_generation: 0,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn requests(&self) -> impl Iterator<Item = &ActiveRequest> {
        self.active.iter().flatten()
    }

    fn find(&self, request: &DiagnosticRequest) -> Option<usize> {
        self.active
            .iter()
            .position(|slot| matches!(slot, Some(active) if active.request.same_target(request)))
    }

    fn is_in_flight(&self, slot: usize) -> bool {
        self.in_flight.iter().any(|in_flight| in_flight.slot == slot)
    }

    fn retire(&mut self, slot: usize) {
        self.in_flight.retain(|in_flight| in_flight.slot != slot);
        if let Some(active) = self.active[slot].take() {
            debug!("Retired request {:?}", active.request);
        }
    }

    fn clear(&mut self) {
        self.active.iter_mut().for_each(|slot| *slot = None);
        self.in_flight.clear();
    }
}

/// Diagnostic request state of every bus.
#[derive(Debug)]
pub struct DiagnosticsManager {
    config: DiagnosticsConfig,
    buses: Vec<BusRequestSet>,
}

impl DiagnosticsManager {
    pub fn new(config: DiagnosticsConfig, bus_count: usize) -> Self {
        let buses = (0..bus_count)
            .map(|_| BusRequestSet::new(config.max_active_requests))
            .collect();
        Self { config, buses }
    }

    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    pub fn bus(&self, bus: u8) -> Option<&BusRequestSet> {
        self.buses.get(bus as usize)
    }

    fn bus_mut(&mut self, bus: u8) -> std::result::Result<&mut BusRequestSet, Error> {
        self.buses.get_mut(bus as usize).ok_or(Error::UnknownBus(bus))
    }

    pub fn get(&self, handle: RequestHandle) -> Option<&ActiveRequest> {
        self.bus(handle.bus)?
            .active
            .get(handle.slot)?
            .as_ref()
            .filter(|active| active.generation == handle.generation)
    }

    fn validate(&self, set: &BusRequestSet, request: &DiagnosticRequest, options: &RequestOptions) -> std::result::Result<(), Error> {
        if let Some(name) = &options.name {
            if name.trim().is_empty() {
                return Err(Error::InvalidName);
            }
        }

        if !options.frequency_hz.is_finite() || options.frequency_hz < 0.0 {
            return Err(Error::InvalidRequest);
        }

        // The stagger of the last slot must stay representable
        if options.frequency_hz > 0.0
            && interval(options.frequency_hz)
                .and_then(|interval| interval.checked_mul(self.config.max_active_requests.max(1) as u32))
                .is_none()
        {
            return Err(Error::InvalidRequest);
        }

        if options.frequency_hz > self.config.max_request_frequency_hz {
            return Err(Error::FrequencyTooHigh(options.frequency_hz));
        }

        // Recurring load of the bus, not counting the entry being updated
        let load: f32 = set
            .requests()
            .filter(|active| !active.request.same_target(request))
            .map(|active| active.frequency_hz())
            .sum();
        if load + options.frequency_hz > self.config.max_bus_frequency_hz {
            return Err(Error::BusFrequencyExceeded(load + options.frequency_hz));
        }

        Ok(())
    }

    /// Register a request on `bus`, or update the request with the same arbitration id, mode and PID.
    ///
    /// Fails without changing anything if the active list is full, the frequency is above the per request or per bus limit, or the output name is empty.
    pub fn add_request(&mut self, bus: &CanBus, request: DiagnosticRequest, options: RequestOptions) -> Result<RequestHandle> {
        let max_active = self.config.max_active_requests;
        let set = self.buses.get(bus.index as usize).ok_or(Error::UnknownBus(bus.index))?;

        if let Err(e) = self.validate(set, &request, &options) {
            warn!("Rejected diagnostic request {:?}: {}", request, e);
            return Err(e.into());
        }

        let existing = set.find(&request);
        let slot = match existing.or_else(|| set.active.iter().position(|slot| slot.is_none())) {
            Some(slot) => slot,
            None => {
                warn!("Rejected diagnostic request {:?}: active list full", request);
                return Err(Error::ActiveListFull.into());
            }
        };

        let set = self.bus_mut(bus.index)?;
        let generation = match existing {
            // An update keeps the handle of the original registration
            Some(slot) => set.active[slot].as_ref().map_or(0, |active| active.generation),
            None => {
                set.next_generation = set.next_generation.wrapping_add(1);
                set.next_generation
            }
        };

        let mut active = ActiveRequest {
            request,
            options,
            generation,
            stagger: Duration::ZERO,
            armed_at: None,
            last_sent: None,
            response_count: 0,
        };
        if active.is_recurring() {
            active.stagger = active.interval() * slot as u32 / max_active.max(1) as u32;
        }

        if existing.is_some() {
            info!("Updated diagnostic request {:?} at {} Hz", active.request, active.frequency_hz());
            // A response to the previous version of the request is no longer expected
            set.in_flight.retain(|in_flight| in_flight.slot != slot);
        } else {
            info!("Added diagnostic request {:?} at {} Hz", active.request, active.frequency_hz());
        }
        set.active[slot] = Some(active);

        Ok(RequestHandle {
            bus: bus.index,
            slot,
            generation,
        })
    }

    /// Remove a request from its bus. Any response still on its way is ignored.
    pub fn cancel_request(&mut self, handle: RequestHandle) -> Result<()> {
        if self.get(handle).is_none() {
            return Err(Error::UnknownRequest.into());
        }

        let set = self.bus_mut(handle.bus)?;
        set.retire(handle.slot);
        info!("Cancelled diagnostic request on bus {}", handle.bus);
        Ok(())
    }

    /// Remove the request with the same arbitration id, mode and PID as `request`.
    pub fn cancel_matching(&mut self, bus: &CanBus, request: &DiagnosticRequest) -> Result<()> {
        let set = self.bus_mut(bus.index)?;
        let slot = set.find(request).ok_or(Error::UnknownRequest)?;
        set.retire(slot);
        info!("Cancelled diagnostic request {:?}", request);
        Ok(())
    }

    /// Drop every request on every bus.
    pub fn reset(&mut self) {
        self.buses.iter_mut().for_each(BusRequestSet::clear);
    }

    /// Send every request on `bus` that is due at `now`. Returns the number of frames queued.
    ///
    /// In-flight requests older than the response timeout are expired first. An expired one-shot request is retired without being sent again.
    pub fn send_requests(&mut self, bus: &mut CanBus, now: Instant) -> Result<usize> {
        let timeout = self.config.response_timeout;
        let max_in_flight = self.config.max_in_flight_requests;
        let padding = self.config.padding_byte;
        let set = self.bus_mut(bus.index)?;

        let mut expired = vec![];
        set.in_flight.retain(|in_flight| {
            let alive = now.saturating_duration_since(in_flight.sent_at) < timeout;
            if !alive {
                expired.push(in_flight.slot);
            }
            alive
        });
        for slot in expired {
            let one_shot = match &set.active[slot] {
                Some(active) => {
                    debug!("Request {:?} timed out", active.request);
                    !active.is_recurring()
                }
                None => false,
            };
            if one_shot {
                set.retire(slot);
            }
        }

        let mut sent = 0;
        for slot in 0..set.active.len() {
            let id = match set.active[slot].as_mut() {
                Some(active) => {
                    active.armed_at.get_or_insert(now);
                    if !active.is_due(now) {
                        continue;
                    }
                    active.request.arbitration_id
                }
                None => continue,
            };

            if set.is_in_flight(slot) {
                continue;
            }
            if set.in_flight.len() >= max_in_flight {
                debug!("In-flight list of bus {} full, deferring request to {:?}", bus.address, id);
                continue;
            }
            let conflict = set.in_flight.iter().any(|in_flight| {
                matches!(&set.active[in_flight.slot], Some(other) if other.request.arbitration_id == id)
            });
            if conflict {
                debug!("Request to {:?} already in flight, deferring", id);
                continue;
            }

            let Some(active) = set.active[slot].as_mut() else {
                continue;
            };
            let padding = if active.request.no_frame_padding { None } else { Some(padding) };
            let frame = isotp::encode_single_frame(&active.request.payload(), padding)
                .map_err(crate::Error::from)
                .and_then(|data| Frame::new(bus.index, id, &data));
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Can't encode request {:?}: {}", active.request, e);
                    continue;
                }
            };

            debug!("TX {:?} mode {:?}", frame, ObdMode::from_repr(active.request.mode));
            if !bus.enqueue(frame) {
                continue;
            }

            active.last_sent = Some(now);
            set.in_flight.push(InFlightRequest {
                slot,
                sent_at: now,
                receivers: vec![],
            });
            sent += 1;
        }

        Ok(sent)
    }

    /// Match `frame` against the in-flight requests of `bus` and publish the decoded response. Returns whether the frame belonged to a request.
    ///
    /// Frames that don't match any in-flight request are ignored.
    pub fn receive_can_message<S: OutputSink + ?Sized>(
        &mut self,
        bus: &mut CanBus,
        frame: &Frame,
        sink: &mut S,
        now: Instant,
    ) -> Result<bool> {
        let padding = self.config.padding_byte;
        let timeout = self.config.response_timeout;
        let set = self.bus_mut(bus.index)?;
        if frame.bus != bus.index || frame.loopback {
            return Ok(false);
        }

        for idx in 0..set.in_flight.len() {
            let slot = set.in_flight[idx].slot;
            let Some(active) = set.active[slot].as_ref() else {
                continue;
            };
            if !active.request.matches_response_id(frame.id) {
                continue;
            }
            // Late responses are handled by the next timeout pass
            if now.saturating_duration_since(set.in_flight[idx].sent_at) >= timeout {
                continue;
            }

            let packet = match set.in_flight[idx].receiver(frame.id).receive(&frame.data) {
                Ok(RxStatus::Complete(packet)) => packet,
                Ok(RxStatus::SendFlowControl) => {
                    let tx_id = match frame.id {
                        Identifier::Standard(id) => Identifier::Standard(id - RESPONSE_ID_OFFSET),
                        Identifier::Extended(_) => active.request.arbitration_id,
                    };
                    let flow_control = Frame::new(bus.index, tx_id, &isotp::flow_control_frame(Some(padding)))?;
                    debug!("TX FC {:?}", flow_control);
                    bus.enqueue(flow_control);
                    return Ok(true);
                }
                Ok(RxStatus::InProgress) => return Ok(true),
                Err(e) => {
                    debug!("Ignoring {:?}: {}", frame, e);
                    continue;
                }
            };

            let Some(response) = DiagnosticResponse::parse(&active.request, frame.id, &packet) else {
                continue;
            };

            if response.negative_response_code == Some(NegativeResponseCode::RequestCorrectlyReceivedResponsePending) {
                info!("Received Response Pending");
                set.in_flight[idx].sent_at = now;
                return Ok(true);
            }

            sink.publish(Self::output(bus, active, &response));

            let broadcast = active.request.is_broadcast();
            let recurring = active.is_recurring();
            if let Some(active) = set.active[slot].as_mut() {
                active.response_count += 1;
            }

            // A broadcast stays in flight until its timeout, other ECUs may still answer
            if !broadcast {
                set.in_flight.remove(idx);
                if !recurring {
                    set.retire(slot);
                }
            }
            return Ok(true);
        }

        Ok(false)
    }

    fn output(bus: &CanBus, active: &ActiveRequest, response: &DiagnosticResponse) -> OutputMessage {
        let value = active.options.decoder.decode(response);

        if let (Some(name), true, Some(value)) = (active.name(), response.success, value) {
            return OutputMessage::named(name, value.into());
        }

        let request = &active.request;
        let id = match response.arbitration_id {
            // Tell the answering ECUs of a broadcast apart
            Identifier::Standard(id) if request.is_broadcast() => id - RESPONSE_ID_OFFSET,
            _ => request.arbitration_id.into(),
        };

        let raw = matches!(active.options.decoder, ResponseDecoder::NoTransform);
        OutputMessage::DiagnosticResponse(DiagnosticResponseRecord {
            bus: bus.address,
            id,
            mode: request.mode,
            success: response.success,
            pid: request.pid.map(|pid| pid.value()),
            negative_response_code: response.negative_response_code.map(u8::from),
            value: if raw || !response.success { None } else { value },
            // Raw payload whenever there is no decoded value to report
            payload: if response.success && (raw || value.is_none()) {
                Some(response.payload.clone())
            } else {
                None
            },
        })
    }
}
