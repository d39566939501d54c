use std::collections::HashMap;

use mqtt_core::{Frame, PacketId};

/// Allocates message ids for QoS &gt; 0 messages.
///
/// Grounded on `mqtt-sync-client::session::Session`'s `AtomicU16::fetch_add(1, SeqCst)`
/// allocator, simplified to a plain counter since the engine owns its registers exclusively and
/// runs single-threaded (spec §5). Two behaviors the original didn't need are added here because
/// the spec leaves packet-id allocation as an open question (spec.md §9): `0` is skipped (MQTT
/// reserves it), and on wraparound the allocator probes forward past ids already present in
/// `sent_in_flight` so two in-flight messages never collide.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketIdAllocator {
    next: PacketId,
}

impl Default for PacketIdAllocator {
    fn default() -> Self {
        PacketIdAllocator { next: 1 }
    }
}

impl PacketIdAllocator {
    /// Returns the next unused id, or `None` if all 65535 ids are currently in flight.
    pub fn allocate(&mut self, sent_in_flight: &HashMap<PacketId, Frame>) -> Option<PacketId> {
        if sent_in_flight.len() >= usize::from(PacketId::max_value()) {
            return None;
        }

        loop {
            let candidate = self.next;
            self.next = self.next.wrapping_add(1);
            if self.next == 0 {
                self.next = 1;
            }

            if candidate != 0 && !sent_in_flight.contains_key(&candidate) {
                return Some(candidate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_reserved_zero_and_increments() {
        let mut alloc = PacketIdAllocator::default();
        let in_flight = HashMap::new();
        assert_eq!(alloc.allocate(&in_flight), Some(1));
        assert_eq!(alloc.allocate(&in_flight), Some(2));
    }

    #[test]
    fn wraps_around_and_avoids_collisions() {
        let mut alloc = PacketIdAllocator { next: u16::MAX };
        let mut in_flight = HashMap::new();
        in_flight.insert(1u16, Frame::PingReq);

        let first = alloc.allocate(&in_flight).unwrap();
        assert_eq!(first, u16::MAX);

        // wraps to 1, which is taken, so the next free id is 2.
        let second = alloc.allocate(&in_flight).unwrap();
        assert_eq!(second, 2);
    }
}
