use bytes::BytesMut;

use mqtt_core::Frame;

use crate::action::Action;
use crate::command::Command;
use crate::event::{ConnectionFailureReason, ErrorKind, Event};
use crate::handlers::{self, ConnectedCommand};
use crate::options::ConnectOptions;
use crate::registers::Registers;
use crate::transport::{ClientSink, TimerScheduler, Transport, TransportEvents};

/// The engine's connection state (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    NotConnected,
    Connecting,
    Connected,
}

/// Drives the protocol state machine: owns the live transport/timer/client-sink collaborators,
/// runs inbound bytes through the reassembler and handlers, and executes the `Action`s handlers
/// return.
///
/// Grounded on rumq's `EventLoop` (`examples/other_examples/.../rumq-client-src-eventloop.rs.rs`)
/// for the state-plus-collaborators shape, and on `mqtt-sync-client::session::Session` for the
/// keep-alive/in-flight bookkeeping it delegates to `Registers`/`handlers`.
pub struct Engine {
    state: State,
    registers: Registers,
    pending_connect: Option<ConnectOptions>,
    transport: Box<dyn Transport>,
    timer: Box<dyn TimerScheduler>,
    sink: Box<dyn ClientSink>,
}

impl Engine {
    pub fn new(
        transport: Box<dyn Transport>,
        timer: Box<dyn TimerScheduler>,
        sink: Box<dyn ClientSink>,
    ) -> Self {
        Engine {
            state: State::NotConnected,
            registers: Registers::default(),
            pending_connect: None,
            transport,
            timer,
            sink,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Handles an application command (spec §4.3/§4.4's API-command rows).
    pub fn handle_command(&mut self, command: Command) {
        match (self.state, command) {
            (_, Command::Status) => {
                let event = if self.state == State::Connected {
                    Event::Connected
                } else {
                    Event::Disconnected
                };
                self.sink.emit(event);
            }
            (State::NotConnected, Command::Connect(options)) => {
                self.pending_connect = Some(options);
                self.state = State::Connecting;
                self.transport.connect();
            }
            (_, Command::Connect(_)) => {
                self.dispatch(handlers::reject_not_connected());
            }
            (State::Connected, Command::Publish { topic, payload, qos, retain }) => {
                let action = handlers::handle_command_connected(
                    &mut self.registers,
                    ConnectedCommand::Publish { topic, payload, qos, retain },
                );
                self.dispatch(action);
            }
            (State::Connected, Command::Subscribe(topics)) => {
                let action = handlers::handle_command_connected(
                    &mut self.registers,
                    ConnectedCommand::Subscribe(topics),
                );
                self.dispatch(action);
            }
            (State::Connected, Command::Unsubscribe(topics)) => {
                let action = handlers::handle_command_connected(
                    &mut self.registers,
                    ConnectedCommand::Unsubscribe(topics),
                );
                self.dispatch(action);
            }
            (State::Connected, Command::Disconnect) => {
                let action = handlers::handle_command_connected(
                    &mut self.registers,
                    ConnectedCommand::Disconnect,
                );
                self.dispatch(action);
                // Spec §4.3/§4.4: send Disconnect, then abort the transport (not a graceful
                // close). No `Event::Disconnected` is emitted on this path — it's reserved for
                // transport-initiated closes (`closed`) and forced closes
                // (`ForciblyCloseTransport`), not this user-initiated one.
                self.cancel_timer();
                self.transport.abort();
                self.state = State::NotConnected;
                self.registers.reset();
            }
            (_, _) => {
                self.dispatch(handlers::reject_not_connected());
            }
        }
    }

    /// Called by a timer scheduler implementation when a scheduled wakeup fires.
    pub fn handle_timer_tick(&mut self, now_ms: u64) {
        if self.state != State::Connected {
            return;
        }
        let action = handlers::handle_timer_tick(&mut self.registers, now_ms);
        self.dispatch(action);
    }

    fn dispatch(&mut self, action: Action) {
        for action in action.flatten() {
            self.execute(action);
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::Noop | Action::Sequence(_) => unreachable!("flattened before execute"),
            Action::SendToNetwork(frame) => self.send_frame(&frame),
            Action::SendToClient(event) => self.sink.emit(event),
            Action::SetKeepAlive(ms) => self.registers.set_keep_alive(ms),
            Action::StartPingRespTimer(ms) => {
                self.cancel_timer();
                let handle = self.timer.schedule_once(ms);
                self.registers.set_timer_handle(Some(handle));
            }
            Action::SetPendingPingResponse(pending) => self.registers.set_ping_pending(pending),
            Action::ForciblyCloseTransport => {
                self.cancel_timer();
                self.transport.abort();
                self.state = State::NotConnected;
                self.registers.reset();
                self.sink.emit(Event::Disconnected);
            }
            Action::StoreSentInFlightFrame(id, frame) => {
                self.registers.store_sent_in_flight(id, frame)
            }
            Action::RemoveSentInFlightFrame(id) => {
                self.registers.remove_sent_in_flight(id);
            }
            Action::StoreRecvInFlightFrameId(id) => self.registers.store_recv_in_flight(id),
            Action::RemoveRecvInFlightFrameId(id) => {
                self.registers.remove_recv_in_flight(id);
            }
        }
    }

    fn send_frame(&mut self, frame: &Frame) {
        let mut buf = BytesMut::new();
        match mqtt_codec::encode_frame(frame, &mut buf) {
            Ok(()) => {
                self.transport.write(&buf);
                self.registers.set_last_sent_at(self.last_sent_at_hint());
            }
            Err(err) => {
                log::error!("failed to encode outbound frame: {}", err);
                self.sink.emit(Event::Error(ErrorKind::ProtocolError));
            }
        }
    }

    /// The engine has no wall clock of its own; keep-alive elapsed-time checks are driven by the
    /// timestamps passed into `handle_timer_tick`, so `last_sent_at_ms` is only meaningfully
    /// updated there. Writes between ticks keep the previous value, which is conservative: it
    /// can only make the next tick decide to ping sooner, never later.
    fn last_sent_at_hint(&self) -> u64 {
        self.registers.last_sent_at_ms
    }

    /// Cancels any outstanding keep-alive wakeup (spec §4.5's `cancel-timer` mutator, §6.4's
    /// `Cancel(handle)`). Called before re-arming and on every transition out of `Connected` so a
    /// stale wakeup never survives a disconnect and ticks never accumulate across pings.
    fn cancel_timer(&mut self) {
        if let Some(handle) = self.registers.timer_handle.take() {
            self.timer.cancel(handle);
        }
    }
}

impl TransportEvents for Engine {
    fn connected(&mut self) {
        if self.state != State::Connecting {
            return;
        }
        // `pending_connect` stays stored (not taken) until the ConnAck resolves: the keep-alive
        // interval it carries is still needed once the ack arrives, in `handle_inbound_frame`.
        let frame = match self.pending_connect.as_ref() {
            Some(options) => handlers::build_connect_frame(options),
            None => return,
        };
        self.send_frame(&frame);
    }

    fn connect_failed(&mut self) {
        if self.state != State::Connecting {
            return;
        }
        self.state = State::NotConnected;
        self.pending_connect = None;
        self.sink
            .emit(Event::ConnectionFailure(ConnectionFailureReason::TransportNotReady));
    }

    fn received(&mut self, bytes: &[u8]) {
        let read_buffer = self.registers.read_buffer.take();
        let (frames, remainder) = match crate::reassembler::reassemble(bytes, read_buffer) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("frame reassembly failed: {}", err);
                self.cancel_timer();
                self.transport.abort();
                self.state = State::NotConnected;
                self.registers.reset();
                self.sink.emit(Event::Error(ErrorKind::ProtocolError));
                return;
            }
        };
        self.registers.read_buffer = remainder;

        for frame in frames {
            self.handle_inbound_frame(frame);
        }
    }

    fn closed(&mut self) {
        let was_connected = self.state == State::Connected;
        self.cancel_timer();
        self.state = State::NotConnected;
        self.registers.reset();
        if was_connected {
            self.sink.emit(Event::Disconnected);
        }
    }
}

impl Engine {
    fn handle_inbound_frame(&mut self, frame: Frame) {
        match (self.state, frame) {
            (State::Connecting, Frame::ConnAck(connack)) => {
                let keep_alive_ms = self
                    .pending_connect
                    .as_ref()
                    .map(|o| o.keep_alive_ms())
                    .unwrap_or(0);
                let was_accepted = connack.return_code.ok().is_ok();
                let action = handlers::handle_connack(&mut self.registers, connack, keep_alive_ms);
                if was_accepted {
                    self.state = State::Connected;
                    self.pending_connect = None;
                }
                self.dispatch(action);
            }
            (State::Connected, frame) => {
                let action = handlers::handle_frame(&mut self.registers, frame);
                self.dispatch(action);
            }
            (_, _) => {
                log::warn!("dropping frame received outside a live session");
            }
        }
    }
}
