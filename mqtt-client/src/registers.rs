use std::collections::{HashMap, HashSet};

use mqtt_core::{Frame, PacketId};

use crate::packet_id::PacketIdAllocator;
use crate::transport::TimerHandle;

/// A decoded-but-incomplete frame, kept across `Received` stimuli until the rest of its body
/// arrives (spec §3's `PartialFrame`, §4.2).
///
/// Two variants cover the two places reassembly can stall: before the fixed header's
/// remaining-length field is fully known (`AwaitingHeader`, just the raw bytes seen so far — in
/// practice 1-5 bytes, since that's the widest a type byte plus a 4-byte varint can be), and
/// after the header is known but the body is still arriving (`AwaitingBody`).
#[derive(Debug, Clone, PartialEq)]
pub enum PartialFrame {
    AwaitingHeader(Vec<u8>),
    AwaitingBody {
        fixed_header: mqtt_core::FixedHeader,
        payload: Vec<u8>,
    },
}

/// The engine's mutable protocol state (spec §3).
///
/// The transport, timer, and client-sink *handles* described in the spec live on `Engine`
/// instead of here: they are I/O capabilities, not data, and keeping them out of `Registers`
/// lets handlers stay pure functions over plain data that tests can construct, compare, and
/// assert on without a live transport — exactly the property the design notes in spec.md ask
/// for. `Registers` here covers the data half of that split: keep-alive bookkeeping, in-flight
/// tables, and the reassembly buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Registers {
    pub keep_alive_ms: u64,
    pub last_sent_at_ms: u64,
    pub ping_response_pending: bool,
    pub timer_handle: Option<TimerHandle>,
    pub sent_in_flight: HashMap<PacketId, Frame>,
    pub recv_in_flight: HashSet<PacketId>,
    pub read_buffer: Option<PartialFrame>,
    pub packet_ids: PacketIdAllocator,
}

impl Default for Registers {
    fn default() -> Self {
        Registers {
            keep_alive_ms: 0,
            last_sent_at_ms: 0,
            ping_response_pending: false,
            timer_handle: None,
            sent_in_flight: HashMap::new(),
            recv_in_flight: HashSet::new(),
            read_buffer: None,
            packet_ids: PacketIdAllocator::default(),
        }
    }
}

impl Registers {
    pub fn set_keep_alive(&mut self, ms: u64) {
        self.keep_alive_ms = ms;
    }

    pub fn set_last_sent_at(&mut self, now_ms: u64) {
        self.last_sent_at_ms = now_ms;
    }

    pub fn set_ping_pending(&mut self, pending: bool) {
        self.ping_response_pending = pending;
    }

    pub fn set_timer_handle(&mut self, handle: Option<TimerHandle>) {
        self.timer_handle = handle;
    }

    pub fn store_sent_in_flight(&mut self, id: PacketId, frame: Frame) {
        log::debug!("sent_in_flight += {} ({} now tracked)", id, self.sent_in_flight.len() + 1);
        self.sent_in_flight.insert(id, frame);
    }

    pub fn remove_sent_in_flight(&mut self, id: PacketId) -> Option<Frame> {
        let removed = self.sent_in_flight.remove(&id);
        if removed.is_some() {
            log::debug!("sent_in_flight -= {} ({} left)", id, self.sent_in_flight.len());
        }
        removed
    }

    pub fn store_recv_in_flight(&mut self, id: PacketId) {
        log::debug!("recv_in_flight += {} ({} now tracked)", id, self.recv_in_flight.len() + 1);
        self.recv_in_flight.insert(id);
    }

    pub fn remove_recv_in_flight(&mut self, id: PacketId) -> bool {
        let removed = self.recv_in_flight.remove(&id);
        if removed {
            log::debug!("recv_in_flight -= {} ({} left)", id, self.recv_in_flight.len());
        }
        removed
    }

    /// Discards all QoS bookkeeping and the keep-alive timer; called on disconnect (spec §4.4's
    /// transitions into `NotConnected`).
    pub fn reset(&mut self) {
        self.keep_alive_ms = 0;
        self.ping_response_pending = false;
        self.timer_handle = None;
        self.sent_in_flight.clear();
        self.recv_in_flight.clear();
        self.read_buffer = None;
    }
}
