//! MQTT 3.1 client protocol engine: reassembly, QoS handshakes, keep-alive, and the connection
//! state machine, decoupled from any particular transport or runtime.
//!
//! The engine itself ([`Engine`]) is `Send` but not thread-safe on its own; callers drive it from
//! a single stimulus loop (commands, transport events, timer ticks) the way spec §5 describes.
//! Everything that touches real I/O is behind the [`Transport`], [`TimerScheduler`], and
//! [`ClientSink`] traits so the protocol logic in [`handlers`] can be tested without a socket.

mod action;
mod command;
mod engine;
mod event;
mod handlers;
mod options;
mod packet_id;
mod reassembler;
mod registers;
mod transport;

pub use action::Action;
pub use command::Command;
pub use engine::{Engine, State};
pub use event::{ConnectionFailureReason, ErrorKind, Event};
pub use options::ConnectOptions;
pub use registers::{PartialFrame, Registers};
pub use transport::{ClientSink, TimerHandle, TimerScheduler, Transport, TransportEvents};

pub use mqtt_core::{
    ConnAck, Connect, ConnectReturnCode, Frame, LastWill, PacketId, PubAck, PubComp, PubRec,
    PubRel, Publish, QoS, SubAck, Subscribe, SubscribeReturnCode, Unsubscribe, UnsubAck,
};
pub use mqtt_codec::CodecError;
