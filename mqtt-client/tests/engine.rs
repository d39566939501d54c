use std::cell::RefCell;
use std::rc::Rc;

use matches::matches;
use mqtt_client::{
    ClientSink, Command, ConnAck, ConnectOptions, ConnectReturnCode, Engine, Event, Frame,
    TimerHandle, TimerScheduler, Transport, TransportEvents,
};

#[derive(Default)]
struct Recorder {
    written: Vec<Vec<u8>>,
    connected: bool,
    closed: bool,
    aborted: bool,
}

#[derive(Clone, Default)]
struct FakeTransport(Rc<RefCell<Recorder>>);

impl Transport for FakeTransport {
    fn connect(&mut self) {
        self.0.borrow_mut().connected = true;
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.borrow_mut().written.push(bytes.to_vec());
    }

    fn close(&mut self) {
        self.0.borrow_mut().closed = true;
    }

    fn abort(&mut self) {
        self.0.borrow_mut().aborted = true;
    }
}

#[derive(Default)]
struct FakeTimer {
    next_id: u64,
}

impl TimerScheduler for FakeTimer {
    fn schedule_once(&mut self, _ms: u64) -> TimerHandle {
        self.next_id += 1;
        TimerHandle(self.next_id)
    }

    fn cancel(&mut self, _handle: TimerHandle) {}
}

#[derive(Clone, Default)]
struct FakeSink(Rc<RefCell<Vec<Event>>>);

impl ClientSink for FakeSink {
    fn emit(&mut self, event: Event) {
        self.0.borrow_mut().push(event);
    }
}

fn connack_bytes(code: ConnectReturnCode) -> Vec<u8> {
    let mut buf = bytes::BytesMut::new();
    mqtt_codec::encode_frame(
        &Frame::ConnAck(ConnAck { session_present: false, return_code: code }),
        &mut buf,
    )
    .unwrap();
    buf.to_vec()
}

#[test]
fn full_connect_publish_disconnect_flow() -> anyhow::Result<()> {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::new(
        Box::new(FakeTransport(recorder.clone())),
        Box::new(FakeTimer::default()),
        Box::new(FakeSink(events.clone())),
    );

    engine.handle_command(Command::Connect(ConnectOptions::new("test-client")));
    assert!(recorder.borrow().connected);
    assert_eq!(engine.state(), mqtt_client::State::Connecting);

    engine.connected();
    assert_eq!(recorder.borrow().written.len(), 1, "connect frame should be written");

    let ack = connack_bytes(ConnectReturnCode::Accepted);
    engine.received(&ack);
    assert_eq!(engine.state(), mqtt_client::State::Connected);
    assert!(events.borrow().contains(&Event::Connected));

    engine.handle_command(Command::Publish {
        topic: "sensors/temp".into(),
        payload: b"21.5".to_vec(),
        qos: mqtt_client::QoS::AtMostOnce,
        retain: false,
    });
    assert_eq!(recorder.borrow().written.len(), 2, "publish frame should be written");

    engine.handle_command(Command::Disconnect);
    assert!(recorder.borrow().aborted, "disconnect aborts the transport, per spec");
    assert_eq!(engine.state(), mqtt_client::State::NotConnected);

    Ok(())
}

#[test]
fn rejected_connect_emits_failure_and_resets() {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::new(
        Box::new(FakeTransport(recorder.clone())),
        Box::new(FakeTimer::default()),
        Box::new(FakeSink(events.clone())),
    );

    engine.handle_command(Command::Connect(ConnectOptions::new("test-client")));
    engine.connected();

    let ack = connack_bytes(ConnectReturnCode::NotAuthorized);
    engine.received(&ack);

    assert_eq!(engine.state(), mqtt_client::State::NotConnected);
    assert!(recorder.borrow().aborted);
}

#[test]
fn commands_while_not_connected_are_rejected() {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::new(
        Box::new(FakeTransport(recorder)),
        Box::new(FakeTimer::default()),
        Box::new(FakeSink(events.clone())),
    );

    engine.handle_command(Command::Publish {
        topic: "x".into(),
        payload: vec![],
        qos: mqtt_client::QoS::AtMostOnce,
        retain: false,
    });

    assert!(events
        .borrow()
        .iter()
        .any(|e| matches!(e, Event::Error(mqtt_client::ErrorKind::NotConnected))));
}
