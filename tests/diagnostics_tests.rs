use std::time::{Duration, Instant};

use cantranslator::can::{CanBus, Frame, Identifier};
use cantranslator::diagnostics::{
    DiagnosticRequest, DiagnosticResponse, DiagnosticsConfig, DiagnosticsManager, Error, RequestHandle,
    RequestOptions,
};
use cantranslator::output::{DiagnosticResponseRecord, OutputMessage};
use cantranslator::signals::SignalValue;

struct Fixture {
    manager: DiagnosticsManager,
    bus: CanBus,
    output: Vec<OutputMessage>,
    start: Instant,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(DiagnosticsConfig::default())
    }

    fn with_config(config: DiagnosticsConfig) -> Self {
        Self::on_bus(config, 0)
    }

    fn on_bus(config: DiagnosticsConfig, bus: u8) -> Self {
        Self {
            manager: DiagnosticsManager::new(config, 2),
            bus: CanBus::new(bus, 16),
            output: vec![],
            start: Instant::now(),
        }
    }

    fn at(&self, ms: u64) -> Instant {
        self.start + Duration::from_millis(ms)
    }

    fn add(&mut self, request: DiagnosticRequest, options: RequestOptions) -> cantranslator::Result<RequestHandle> {
        self.manager.add_request(&self.bus, request, options)
    }

    fn send(&mut self, ms: u64) -> usize {
        let now = self.at(ms);
        self.manager.send_requests(&mut self.bus, now).unwrap()
    }

    fn receive(&mut self, id: u32, data: &[u8], ms: u64) -> bool {
        let now = self.at(ms);
        let frame = Frame::new(self.bus.index, id.into(), data).unwrap();
        self.manager
            .receive_can_message(&mut self.bus, &frame, &mut self.output, now)
            .unwrap()
    }

    fn sent_frames(&mut self) -> Vec<Frame> {
        std::iter::from_fn(|| self.bus.pop()).collect()
    }

    fn active_count(&self) -> usize {
        self.manager.bus(self.bus.index).unwrap().active_count()
    }

    fn in_flight_count(&self) -> usize {
        self.manager.bus(self.bus.index).unwrap().in_flight_count()
    }
}

const RESPONSE: [u8; 8] = [0x03, 0x41, 0x02, 0x45, 0x00, 0x00, 0x00, 0x00];

fn request() -> DiagnosticRequest {
    DiagnosticRequest::new(0x7e0, 0x01).with_pid(0x02)
}

fn double(_response: &DiagnosticResponse, value: f64) -> f64 {
    value * 2.0
}

fn diagnostics_error(e: Error) -> cantranslator::Error {
    cantranslator::Error::DiagnosticsError(e)
}

fn record(bus: u8, id: u32) -> DiagnosticResponseRecord {
    DiagnosticResponseRecord {
        bus,
        id,
        mode: 0x01,
        success: true,
        pid: Some(0x02),
        negative_response_code: None,
        payload: Some(vec![0x45]),
        value: None,
    }
}

#[test]
fn add_basic_request() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::one_shot()).unwrap();
    assert_eq!(fixture.active_count(), 1);

    assert_eq!(fixture.send(0), 1);
    let sent = fixture.sent_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, Identifier::Standard(0x7e0));
    assert_eq!(sent[0].data, vec![0x02, 0x01, 0x02, 0, 0, 0, 0, 0]);

    assert!(fixture.receive(0x7e8, &RESPONSE, 0));
    assert_eq!(fixture.output, vec![OutputMessage::DiagnosticResponse(record(1, 0x7e0))]);

    let OutputMessage::DiagnosticResponse(record) = &fixture.output[0] else {
        panic!("expected a response record");
    };
    assert_eq!(record.payload_hex(), Some("0x45".to_string()));
}

#[test]
fn add_request_other_bus() {
    let mut fixture = Fixture::on_bus(DiagnosticsConfig::default(), 1);
    fixture.add(request(), RequestOptions::one_shot()).unwrap();

    assert_eq!(fixture.send(0), 1);
    assert_eq!(fixture.sent_frames()[0].bus, 1);
    assert!(fixture.receive(0x7e8, &RESPONSE, 0));
    assert_eq!(fixture.output, vec![OutputMessage::DiagnosticResponse(record(2, 0x7e0))]);
}

#[test]
fn add_request_unknown_bus() {
    let mut manager = DiagnosticsManager::new(DiagnosticsConfig::default(), 1);
    let bus = CanBus::new(3, 16);
    assert_eq!(
        manager.add_request(&bus, request(), RequestOptions::one_shot()),
        Err(diagnostics_error(Error::UnknownBus(3)))
    );
}

#[test]
fn add_request_with_name() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::one_shot().with_name("mypid")).unwrap();

    fixture.send(0);
    assert!(fixture.receive(0x7e8, &RESPONSE, 0));
    assert_eq!(fixture.output, vec![OutputMessage::named("mypid", SignalValue::Number(69.0))]);
}

#[test]
fn add_request_with_name_and_scaling() {
    let mut fixture = Fixture::new();
    let options = RequestOptions::one_shot().with_name("mypid").with_scaling(2.0, 14.0);
    fixture.add(request(), options).unwrap();

    fixture.send(0);
    fixture.receive(0x7e8, &RESPONSE, 0);
    assert_eq!(fixture.output, vec![OutputMessage::named("mypid", SignalValue::Number(152.0))]);
}

#[test]
fn add_request_with_name_and_decoder() {
    let mut fixture = Fixture::new();
    let options = RequestOptions::one_shot().with_name("mypid").with_decoder(double);
    fixture.add(request(), options).unwrap();

    fixture.send(0);
    fixture.receive(0x7e8, &RESPONSE, 0);
    assert_eq!(fixture.output, vec![OutputMessage::named("mypid", SignalValue::Number(138.0))]);
}

#[test]
fn add_request_with_decoder_no_name() {
    let mut fixture = Fixture::new();
    fixture
        .add(request(), RequestOptions::one_shot().with_decoder(double))
        .unwrap();

    fixture.send(0);
    fixture.receive(0x7e8, &RESPONSE, 0);
    assert_eq!(
        fixture.output,
        vec![OutputMessage::DiagnosticResponse(DiagnosticResponseRecord {
            payload: None,
            value: Some(138.0),
            ..record(1, 0x7e0)
        })]
    );
}

#[test]
fn add_request_empty_name() {
    let mut fixture = Fixture::new();
    assert_eq!(
        fixture.add(request(), RequestOptions::one_shot().with_name("")),
        Err(diagnostics_error(Error::InvalidName))
    );
    assert_eq!(fixture.active_count(), 0);
}

#[test]
fn padding_on_by_default() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::one_shot()).unwrap();
    fixture.send(0);
    assert_eq!(fixture.sent_frames()[0].data.len(), 8);
}

#[test]
fn padding_disabled() {
    let mut fixture = Fixture::new();
    fixture
        .add(request().without_padding(), RequestOptions::one_shot())
        .unwrap();
    fixture.send(0);
    assert_eq!(fixture.sent_frames()[0].data, vec![0x02, 0x01, 0x02]);
}

#[test]
fn custom_padding_byte() {
    let mut fixture = Fixture::with_config(DiagnosticsConfig {
        padding_byte: 0xaa,
        ..DiagnosticsConfig::default()
    });
    fixture.add(request(), RequestOptions::one_shot()).unwrap();
    fixture.send(0);
    assert_eq!(
        fixture.sent_frames()[0].data,
        vec![0x02, 0x01, 0x02, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa]
    );
}

#[test]
fn add_recurring_request() {
    let mut fixture = Fixture::new();
    let handle = fixture.add(request(), RequestOptions::recurring(1.0)).unwrap();
    assert!(fixture.manager.get(handle).unwrap().is_recurring());

    assert_eq!(fixture.send(0), 1);
    assert!(fixture.receive(0x7e8, &RESPONSE, 0));
    assert_eq!(fixture.output.len(), 1);

    // Still active after the response, but not due yet
    assert_eq!(fixture.active_count(), 1);
    assert_eq!(fixture.send(0), 0);

    assert_eq!(fixture.send(2000), 1);
    assert_eq!(fixture.send(2900), 0);
    assert_eq!(fixture.send(3000), 1);
    assert_eq!(fixture.sent_frames().len(), 3);
}

#[test]
fn recurring_request_after_timeout() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::recurring(10.0)).unwrap();

    assert_eq!(fixture.send(0), 1);
    assert_eq!(fixture.send(50), 0);
    assert_eq!(fixture.in_flight_count(), 1);

    // Timed out and due again in the same pass
    assert_eq!(fixture.send(100), 1);
    assert_eq!(fixture.active_count(), 1);
}

#[test]
fn request_too_frequent() {
    let mut fixture = Fixture::new();
    let handle = fixture.add(request(), RequestOptions::recurring(1.0)).unwrap();
    assert_eq!(fixture.add(request(), RequestOptions::recurring(10.0)), Ok(handle));
    assert_eq!(
        fixture.add(request(), RequestOptions::recurring(11.0)),
        Err(diagnostics_error(Error::FrequencyTooHigh(11.0)))
    );

    assert_eq!(fixture.manager.get(handle).unwrap().frequency_hz(), 10.0);
    assert_eq!(fixture.active_count(), 1);
}

#[test]
fn invalid_frequency() {
    let mut fixture = Fixture::new();
    assert_eq!(
        fixture.add(request(), RequestOptions::recurring(-1.0)),
        Err(diagnostics_error(Error::InvalidRequest))
    );
    assert_eq!(
        fixture.add(request(), RequestOptions::recurring(f32::NAN)),
        Err(diagnostics_error(Error::InvalidRequest))
    );

    // Intervals too long to schedule
    assert_eq!(
        fixture.add(request(), RequestOptions::recurring(1e-20)),
        Err(diagnostics_error(Error::InvalidRequest))
    );
    assert_eq!(
        fixture.add(request(), RequestOptions::recurring(1e-18)),
        Err(diagnostics_error(Error::InvalidRequest))
    );
    assert_eq!(fixture.active_count(), 0);

    // Slow but representable
    let handle = fixture.add(request(), RequestOptions::recurring(1e-6)).unwrap();
    assert_eq!(fixture.send(0), 1);
    assert_eq!(fixture.send(1000), 0);
    assert!(fixture.manager.get(handle).is_some());
}

#[test]
fn bus_frequency_ceiling() {
    let mut fixture = Fixture::with_config(DiagnosticsConfig {
        max_bus_frequency_hz: 15.0,
        ..DiagnosticsConfig::default()
    });
    let other = DiagnosticRequest::new(0x7e0, 0x01).with_pid(0x03);

    fixture.add(request(), RequestOptions::recurring(10.0)).unwrap();
    assert_eq!(
        fixture.add(other.clone(), RequestOptions::recurring(6.0)),
        Err(diagnostics_error(Error::BusFrequencyExceeded(16.0)))
    );
    fixture.add(other, RequestOptions::recurring(5.0)).unwrap();

    // The entry being updated doesn't count towards the load
    fixture.add(request(), RequestOptions::recurring(10.0)).unwrap();
    assert_eq!(fixture.active_count(), 2);
}

#[test]
fn active_list_full() {
    let mut fixture = Fixture::with_config(DiagnosticsConfig {
        max_active_requests: 2,
        ..DiagnosticsConfig::default()
    });

    let pid = |pid| DiagnosticRequest::new(0x7e0, 0x01).with_pid(pid);
    fixture.add(pid(1), RequestOptions::one_shot()).unwrap();
    fixture.add(pid(2), RequestOptions::one_shot()).unwrap();
    assert_eq!(
        fixture.add(pid(3), RequestOptions::one_shot()),
        Err(diagnostics_error(Error::ActiveListFull))
    );

    // Updating an existing request doesn't need a free slot
    fixture.add(pid(1), RequestOptions::recurring(1.0)).unwrap();
    assert_eq!(fixture.active_count(), 2);
}

#[test]
fn update_existing_request() {
    let mut fixture = Fixture::new();
    let handle = fixture.add(request(), RequestOptions::recurring(1.0)).unwrap();
    assert_eq!(fixture.send(0), 1);

    let updated = fixture
        .add(request(), RequestOptions::recurring(5.0).with_name("mypid"))
        .unwrap();
    assert_eq!(updated, handle);
    assert_eq!(fixture.active_count(), 1);
    assert_eq!(fixture.in_flight_count(), 0);

    let active = fixture.manager.get(handle).unwrap();
    assert_eq!(active.frequency_hz(), 5.0);
    assert_eq!(active.name(), Some("mypid"));
    assert_eq!(active.last_sent(), None);

    // Rescheduled from scratch
    assert_eq!(fixture.send(0), 1);
    assert!(fixture.receive(0x7e8, &RESPONSE, 0));
    assert_eq!(fixture.output, vec![OutputMessage::named("mypid", SignalValue::Number(69.0))]);
}

#[test]
fn recurring_converted_to_one_shot() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::recurring(1.0)).unwrap();
    assert_eq!(fixture.send(0), 1);
    assert!(fixture.receive(0x7e8, &RESPONSE, 0));

    let handle = fixture.add(request(), RequestOptions::one_shot()).unwrap();
    assert!(!fixture.manager.get(handle).unwrap().is_recurring());

    // Sent on the next pass, then retired
    assert_eq!(fixture.send(10), 1);
    assert!(fixture.receive(0x7e8, &RESPONSE, 10));
    assert_eq!(fixture.active_count(), 0);
    assert_eq!(fixture.send(2000), 0);
}

#[test]
fn receive_one_shot_twice() {
    let mut fixture = Fixture::new();
    let handle = fixture.add(request(), RequestOptions::one_shot()).unwrap();

    fixture.send(0);
    assert!(fixture.receive(0x7e8, &RESPONSE, 0));
    assert_eq!(fixture.active_count(), 0);
    assert!(fixture.manager.get(handle).is_none());

    assert!(!fixture.receive(0x7e8, &RESPONSE, 0));
    assert_eq!(fixture.output.len(), 1);

    // Not sent again
    assert_eq!(fixture.send(1000), 0);
}

#[test]
fn one_shot_timeout() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::one_shot()).unwrap();

    assert_eq!(fixture.send(0), 1);
    assert_eq!(fixture.send(99), 0);
    assert_eq!(fixture.active_count(), 1);

    assert_eq!(fixture.send(100), 0);
    assert_eq!(fixture.active_count(), 0);
    assert_eq!(fixture.in_flight_count(), 0);
    assert_eq!(fixture.sent_frames().len(), 1);

    assert!(!fixture.receive(0x7e8, &RESPONSE, 100));
    assert!(fixture.output.is_empty());
}

#[test]
fn late_response_ignored() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::one_shot()).unwrap();

    fixture.send(0);
    assert!(!fixture.receive(0x7e8, &RESPONSE, 150));
    assert!(fixture.output.is_empty());
}

#[test]
fn staggered_recurring_requests() {
    let mut fixture = Fixture::new();
    let first = fixture.add(request(), RequestOptions::recurring(1.0)).unwrap();
    let second = fixture
        .add(
            DiagnosticRequest::new(0x7e1, 0x01).with_pid(0x02),
            RequestOptions::recurring(1.0),
        )
        .unwrap();

    assert_eq!(fixture.manager.get(first).unwrap().stagger(), Duration::ZERO);
    assert_eq!(
        fixture.manager.get(second).unwrap().stagger(),
        Duration::from_millis(1000 / 20)
    );

    assert_eq!(fixture.send(0), 1);
    assert_eq!(fixture.send(49), 0);
    assert_eq!(fixture.send(50), 1);

    let sent = fixture.sent_frames();
    assert_eq!(sent[0].id, Identifier::Standard(0x7e0));
    assert_eq!(sent[1].id, Identifier::Standard(0x7e1));
}

#[test]
fn one_request_in_flight_per_ecu() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::one_shot()).unwrap();
    fixture
        .add(
            DiagnosticRequest::new(0x7e0, 0x01).with_pid(0x03),
            RequestOptions::one_shot(),
        )
        .unwrap();

    assert_eq!(fixture.send(0), 1);
    assert_eq!(fixture.send(0), 0);

    assert!(fixture.receive(0x7e8, &RESPONSE, 10));
    assert_eq!(fixture.send(10), 1);

    let sent = fixture.sent_frames();
    assert_eq!(sent[0].data[2], 0x02);
    assert_eq!(sent[1].data[2], 0x03);
}

#[test]
fn in_flight_list_full() {
    let mut fixture = Fixture::with_config(DiagnosticsConfig {
        max_in_flight_requests: 1,
        ..DiagnosticsConfig::default()
    });
    fixture.add(request(), RequestOptions::one_shot()).unwrap();
    fixture
        .add(
            DiagnosticRequest::new(0x7e1, 0x01).with_pid(0x02),
            RequestOptions::one_shot(),
        )
        .unwrap();

    assert_eq!(fixture.send(0), 1);
    assert_eq!(fixture.send(0), 0);

    // The first one times out, making room for the second
    assert_eq!(fixture.send(100), 1);
    assert_eq!(fixture.active_count(), 1);
}

#[test]
fn full_send_queue_defers_request() {
    let mut fixture = Fixture::new();
    fixture.bus = CanBus::new(0, 0);
    fixture.add(request(), RequestOptions::one_shot()).unwrap();

    assert_eq!(fixture.send(0), 0);
    assert_eq!(fixture.in_flight_count(), 0);
    assert_eq!(fixture.active_count(), 1);
}

#[test]
fn negative_response() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::one_shot().with_name("mypid")).unwrap();

    fixture.send(0);
    assert!(fixture.receive(0x7e8, &[0x03, 0x7f, 0x01, 0x31, 0, 0, 0, 0], 0));

    // Failures are always reported as a record
    assert_eq!(
        fixture.output,
        vec![OutputMessage::DiagnosticResponse(DiagnosticResponseRecord {
            success: false,
            negative_response_code: Some(0x31),
            payload: None,
            ..record(1, 0x7e0)
        })]
    );
    assert_eq!(fixture.active_count(), 0);
}

#[test]
fn response_pending() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::one_shot()).unwrap();

    fixture.send(0);
    assert!(fixture.receive(0x7e8, &[0x03, 0x7f, 0x01, 0x78, 0, 0, 0, 0], 90));
    assert!(fixture.output.is_empty());

    // The timeout restarts from the pending response
    assert_eq!(fixture.send(150), 0);
    assert_eq!(fixture.in_flight_count(), 1);

    assert!(fixture.receive(0x7e8, &RESPONSE, 150));
    assert_eq!(fixture.output, vec![OutputMessage::DiagnosticResponse(record(1, 0x7e0))]);
}

#[test]
fn unrelated_frames_ignored() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::one_shot()).unwrap();
    fixture.send(0);

    assert!(!fixture.receive(0x123, &RESPONSE, 0));
    // Right ECU, wrong mode
    assert!(!fixture.receive(0x7e8, &[0x03, 0x42, 0x02, 0x45, 0, 0, 0, 0], 0));
    // Right ECU, wrong PID
    assert!(!fixture.receive(0x7e8, &[0x03, 0x41, 0x03, 0x45, 0, 0, 0, 0], 0));

    assert!(fixture.output.is_empty());
    assert_eq!(fixture.in_flight_count(), 1);
}

#[test]
fn functional_broadcast() {
    let mut fixture = Fixture::new();
    fixture
        .add(
            DiagnosticRequest::new(0x7df, 0x01).with_pid(0x02),
            RequestOptions::one_shot(),
        )
        .unwrap();

    fixture.send(0);
    assert_eq!(fixture.sent_frames()[0].id, Identifier::Standard(0x7df));

    assert!(fixture.receive(0x7e8, &RESPONSE, 10));
    assert!(fixture.receive(0x7e9, &RESPONSE, 20));
    assert!(!fixture.receive(0x7f0, &RESPONSE, 20));
    assert_eq!(
        fixture.output,
        vec![
            OutputMessage::DiagnosticResponse(record(1, 0x7e0)),
            OutputMessage::DiagnosticResponse(record(1, 0x7e1)),
        ]
    );

    // Stays in flight until the timeout
    assert_eq!(fixture.in_flight_count(), 1);
    fixture.send(100);
    assert_eq!(fixture.active_count(), 0);
}

#[test]
fn extended_id_request() {
    let mut fixture = Fixture::new();
    let request = DiagnosticRequest::new(0x18da10f1, 0x22).with_long_pid(0xf190);
    fixture
        .add(request, RequestOptions::one_shot().with_name("part_number"))
        .unwrap();

    fixture.send(0);
    let sent = fixture.sent_frames();
    assert!(sent[0].id.is_extended());
    assert_eq!(sent[0].data, vec![0x03, 0x22, 0xf1, 0x90, 0, 0, 0, 0]);

    assert!(!fixture.receive(0x18da10f1, &[0x06, 0x62, 0xf1, 0x90, 0x12, 0x34, 0x56, 0], 0));
    assert!(fixture.receive(0x18daf110, &[0x06, 0x62, 0xf1, 0x90, 0x12, 0x34, 0x56, 0], 0));
    assert_eq!(
        fixture.output,
        vec![OutputMessage::named("part_number", SignalValue::Number(0x123456 as f64))]
    );
}

#[test]
fn multi_frame_response() {
    let mut fixture = Fixture::new();
    fixture
        .add(
            DiagnosticRequest::new(0x7e0, 0x09).with_pid(0x02),
            RequestOptions::one_shot(),
        )
        .unwrap();
    fixture.send(0);
    fixture.sent_frames();

    assert!(fixture.receive(0x7e8, &[0x10, 0x14, 0x49, 0x02, 0x01, b'W', b'P', b'0'], 0));

    let flow_control = fixture.sent_frames();
    assert_eq!(flow_control.len(), 1);
    assert_eq!(flow_control[0].id, Identifier::Standard(0x7e0));
    assert_eq!(flow_control[0].data, vec![0x30, 0, 0, 0, 0, 0, 0, 0]);

    assert!(fixture.receive(0x7e8, &[0x21, b'Z', b'Z', b'Z', b'9', b'9', b'Z', b'T'], 5));
    assert!(fixture.output.is_empty());
    assert!(fixture.receive(0x7e8, &[0x22, b'S', b'3', b'9', b'2', b'1', b'2', b'4'], 10));

    let mut vin = vec![0x01];
    vin.extend(b"WP0ZZZ99ZTS392124");
    assert_eq!(
        fixture.output,
        vec![OutputMessage::DiagnosticResponse(DiagnosticResponseRecord {
            mode: 0x09,
            payload: Some(vin),
            ..record(1, 0x7e0)
        })]
    );
    assert_eq!(fixture.active_count(), 0);
}

#[test]
fn named_response_without_numeric_value() {
    let mut fixture = Fixture::new();
    fixture
        .add(
            DiagnosticRequest::new(0x7e0, 0x09).with_pid(0x02),
            RequestOptions::one_shot().with_name("vin").with_scaling(2.0, 0.0),
        )
        .unwrap();
    fixture.send(0);

    assert!(fixture.receive(0x7e8, &[0x10, 0x14, 0x49, 0x02, 0x01, b'1', b'G', b'1'], 0));
    assert!(fixture.receive(0x7e8, &[0x21, b'J', b'C', b'5', b'4', b'4', b'4', b'R'], 5));
    assert!(fixture.receive(0x7e8, &[0x22, b'7', b'2', b'5', b'2', b'3', b'6', b'7'], 10));

    // Too long to scale, published as a record carrying the raw payload
    let mut vin = vec![0x01];
    vin.extend(b"1G1JC5444R7252367");
    assert_eq!(
        fixture.output,
        vec![OutputMessage::DiagnosticResponse(DiagnosticResponseRecord {
            mode: 0x09,
            payload: Some(vin),
            value: None,
            ..record(1, 0x7e0)
        })]
    );
}

#[test]
fn cancel_request() {
    let mut fixture = Fixture::new();
    let handle = fixture.add(request(), RequestOptions::recurring(1.0)).unwrap();
    fixture.send(0);

    fixture.manager.cancel_request(handle).unwrap();
    assert!(fixture.manager.get(handle).is_none());
    assert_eq!(fixture.active_count(), 0);
    assert_eq!(fixture.in_flight_count(), 0);

    // A response still on its way is ignored
    assert!(!fixture.receive(0x7e8, &RESPONSE, 10));
    assert_eq!(
        fixture.manager.cancel_request(handle),
        Err(diagnostics_error(Error::UnknownRequest))
    );

    // Reusing the slot doesn't revive the old handle
    let new_handle = fixture.add(request(), RequestOptions::one_shot()).unwrap();
    assert_ne!(new_handle, handle);
    assert!(fixture.manager.get(handle).is_none());
}

#[test]
fn cancel_matching_request() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::recurring(1.0)).unwrap();

    let bus = fixture.bus.clone();
    fixture.manager.cancel_matching(&bus, &request()).unwrap();
    assert_eq!(fixture.active_count(), 0);
    assert_eq!(
        fixture.manager.cancel_matching(&bus, &request()),
        Err(diagnostics_error(Error::UnknownRequest))
    );
}

#[test]
fn reset() {
    let mut fixture = Fixture::new();
    fixture.add(request(), RequestOptions::recurring(1.0)).unwrap();
    fixture.send(0);

    fixture.manager.reset();
    assert_eq!(fixture.active_count(), 0);
    assert_eq!(fixture.in_flight_count(), 0);
    assert_eq!(fixture.send(5000), 0);
}
