use mqtt_core::{
    ConnAck, Connect, ConnectReturnCode, Frame, PacketId, PubAck, PubComp, PubRec, PubRel,
    Publish, QoS, SubAck, Subscribe, Unsubscribe,
};

use crate::action::Action;
use crate::event::{ConnectionFailureReason, ErrorKind, Event};
use crate::options::ConnectOptions;
use crate::registers::Registers;

/// Builds the `Connect` frame for a `Command::Connect`, grounded on
/// `mqtt-sync-client::connect::Connector::connect` assembling a `proto::Connect` from its
/// builder fields before dialing.
pub fn build_connect_frame(options: &ConnectOptions) -> Frame {
    Frame::Connect(Connect {
        clean_session: options.clean_session,
        keep_alive: options.keep_alive_secs(),
        client_id: options.client_id.clone(),
        last_will: options.last_will.clone(),
        username: options.username.clone(),
        password: options.password.clone(),
    })
}

/// Any API command other than `Connect`/`Status` issued while not connected (spec §4.4, P9).
pub fn reject_not_connected() -> Action {
    Action::SendToClient(Event::Error(ErrorKind::NotConnected))
}

/// Handles a `ConnAck` arriving while `Connecting` (spec §4.4's `Connecting -> Connected` row).
pub fn handle_connack(registers: &mut Registers, connack: ConnAck, keep_alive_ms: u64) -> Action {
    match connack.return_code.ok() {
        Ok(()) => {
            registers.set_keep_alive(keep_alive_ms);
            registers.set_ping_pending(false);
            let mut actions = vec![Action::SendToClient(Event::Connected)];
            if keep_alive_ms > 0 {
                actions.push(Action::SetKeepAlive(keep_alive_ms));
                actions.push(Action::StartPingRespTimer(keep_alive_ms));
            }
            Action::seq(actions)
        }
        Err(code) => Action::seq(vec![
            Action::SendToClient(Event::ConnectionFailure(
                ConnectionFailureReason::from_return_code(code),
            )),
            Action::ForciblyCloseTransport,
        ]),
    }
}

/// Handles an API command while `Connected` (spec §4.3's API-command handling).
pub fn handle_command_connected(
    registers: &mut Registers,
    command: ConnectedCommand,
) -> Action {
    match command {
        ConnectedCommand::Publish { topic, payload, qos, retain } => {
            if qos == QoS::AtMostOnce {
                Action::SendToNetwork(Frame::Publish(Publish {
                    dup: false,
                    qos,
                    retain,
                    topic,
                    packet_id: None,
                    payload,
                }))
            } else {
                match registers.packet_ids.allocate(&registers.sent_in_flight) {
                    Some(id) => {
                        let frame = Frame::Publish(Publish {
                            dup: false,
                            qos,
                            retain,
                            topic,
                            packet_id: Some(id),
                            payload,
                        });
                        registers.store_sent_in_flight(id, frame.clone());
                        Action::seq(vec![
                            Action::SendToNetwork(frame.clone()),
                            Action::StoreSentInFlightFrame(id, frame),
                        ])
                    }
                    None => Action::SendToClient(Event::Error(ErrorKind::ProtocolError)),
                }
            }
        }
        ConnectedCommand::Subscribe(topics) => {
            match registers.packet_ids.allocate(&registers.sent_in_flight) {
                Some(id) => {
                    let frame = Frame::Subscribe(Subscribe {
                        packet_id: id,
                        subscriptions: topics,
                    });
                    registers.store_sent_in_flight(id, frame.clone());
                    Action::seq(vec![
                        Action::SendToNetwork(frame.clone()),
                        Action::StoreSentInFlightFrame(id, frame),
                    ])
                }
                None => Action::SendToClient(Event::Error(ErrorKind::ProtocolError)),
            }
        }
        ConnectedCommand::Unsubscribe(topics) => {
            match registers.packet_ids.allocate(&registers.sent_in_flight) {
                Some(id) => {
                    let frame = Frame::Unsubscribe(Unsubscribe {
                        packet_id: id,
                        topic_filters: topics,
                    });
                    registers.store_sent_in_flight(id, frame.clone());
                    Action::seq(vec![
                        Action::SendToNetwork(frame.clone()),
                        Action::StoreSentInFlightFrame(id, frame),
                    ])
                }
                None => Action::SendToClient(Event::Error(ErrorKind::ProtocolError)),
            }
        }
        // The transport is aborted by the engine itself after this frame is written (spec
        // §4.3/§4.4), not via `ForciblyCloseTransport` — that action also emits
        // `Event::Disconnected`, which a user-initiated disconnect must not.
        ConnectedCommand::Disconnect => Action::SendToNetwork(Frame::Disconnect),
    }
}

/// The subset of `Command` that is meaningful while `Connected`; `Connect`/`Status` are handled
/// by the engine's state machine directly.
pub enum ConnectedCommand {
    Publish { topic: String, payload: Vec<u8>, qos: QoS, retain: bool },
    Subscribe(Vec<(String, QoS)>),
    Unsubscribe(Vec<String>),
    Disconnect,
}

/// Handles a fully decoded frame arriving while `Connected` (spec §4.3's frame-arrival rules).
pub fn handle_frame(registers: &mut Registers, frame: Frame) -> Action {
    match frame {
        Frame::Publish(publish) => handle_publish(registers, publish),
        Frame::PubAck(PubAck { packet_id }) => {
            registers.remove_sent_in_flight(packet_id);
            Action::Noop
        }
        Frame::PubRec(PubRec { packet_id }) => {
            let rel = Frame::PubRel(PubRel { packet_id });
            registers.store_sent_in_flight(packet_id, rel.clone());
            Action::seq(vec![
                Action::SendToNetwork(rel.clone()),
                Action::StoreSentInFlightFrame(packet_id, rel),
            ])
        }
        Frame::PubRel(PubRel { packet_id }) => {
            registers.remove_recv_in_flight(packet_id);
            Action::seq(vec![
                Action::SendToNetwork(Frame::PubComp(PubComp { packet_id })),
                Action::RemoveRecvInFlightFrameId(packet_id),
            ])
        }
        Frame::PubComp(PubComp { packet_id }) => {
            registers.remove_sent_in_flight(packet_id);
            Action::RemoveSentInFlightFrame(packet_id)
        }
        Frame::SubAck(SubAck { packet_id, status }) => {
            registers.remove_sent_in_flight(packet_id);
            Action::seq(vec![
                Action::RemoveSentInFlightFrame(packet_id),
                Action::SendToClient(Event::Subscribed(status)),
            ])
        }
        Frame::UnsubAck(ack) => {
            registers.remove_sent_in_flight(ack.packet_id);
            Action::seq(vec![
                Action::RemoveSentInFlightFrame(ack.packet_id),
                Action::SendToClient(Event::Unsubscribed),
            ])
        }
        Frame::PingResp => {
            registers.set_ping_pending(false);
            Action::SetPendingPingResponse(false)
        }
        Frame::ConnAck(_) | Frame::Connect(_) | Frame::Subscribe(_) | Frame::Unsubscribe(_)
        | Frame::PingReq | Frame::Disconnect => {
            // Not legal for a client to receive while connected; the spec has no client-side
            // behavior defined for these, so they're treated like any other protocol violation.
            Action::seq(vec![
                Action::SendToClient(Event::Error(ErrorKind::ProtocolError)),
                Action::ForciblyCloseTransport,
            ])
        }
    }
}

fn handle_publish(registers: &mut Registers, publish: Publish) -> Action {
    let message = Action::SendToClient(Event::Message {
        topic: publish.topic.clone(),
        payload: publish.payload.clone(),
    });

    match publish.qos {
        QoS::AtMostOnce => message,
        QoS::AtLeastOnce => {
            let packet_id = publish.packet_id.expect("QoS 1 publish carries a packet id");
            Action::seq(vec![
                message,
                Action::SendToNetwork(Frame::PubAck(PubAck { packet_id })),
            ])
        }
        QoS::ExactlyOnce => {
            let packet_id = publish.packet_id.expect("QoS 2 publish carries a packet id");
            let already_seen = registers.recv_in_flight.contains(&packet_id);
            let ack = Action::SendToNetwork(Frame::PubRec(PubRec { packet_id }));
            if already_seen {
                ack
            } else {
                registers.store_recv_in_flight(packet_id);
                Action::seq(vec![
                    message,
                    Action::StoreRecvInFlightFrameId(packet_id),
                    ack,
                ])
            }
        }
    }
}

/// Keep-alive timer tick logic (spec §4.3).
pub fn handle_timer_tick(registers: &mut Registers, now_ms: u64) -> Action {
    if registers.ping_response_pending {
        log::warn!("PINGRESP not received before keep-alive timeout, closing transport");
        return Action::ForciblyCloseTransport;
    }

    let elapsed = now_ms.saturating_sub(registers.last_sent_at_ms);
    if elapsed >= registers.keep_alive_ms {
        log::debug!("keep-alive elapsed ({}ms >= {}ms), sending PINGREQ", elapsed, registers.keep_alive_ms);
        registers.set_ping_pending(true);
        Action::seq(vec![
            Action::SendToNetwork(Frame::PingReq),
            Action::SetPendingPingResponse(true),
            Action::StartPingRespTimer(registers.keep_alive_ms),
        ])
    } else {
        Action::StartPingRespTimer(registers.keep_alive_ms - elapsed)
    }
}

/// Used by tests and the engine to look up a packet id without going through `Action`.
pub fn is_in_flight(registers: &Registers, packet_id: PacketId) -> bool {
    registers.sent_in_flight.contains_key(&packet_id)
}

#[cfg(test)]
mod tests {
    use matches::matches;

    use super::*;

    fn registers_connected(keep_alive_ms: u64) -> Registers {
        let mut r = Registers::default();
        r.set_keep_alive(keep_alive_ms);
        r
    }

    #[test]
    fn qos1_publish_is_tracked_until_puback() {
        let mut r = registers_connected(0);
        let action = handle_command_connected(
            &mut r,
            ConnectedCommand::Publish {
                topic: "t".into(),
                payload: vec![1, 2, 3],
                qos: QoS::AtLeastOnce,
                retain: false,
            },
        );
        assert_eq!(r.sent_in_flight.len(), 1);
        let id = *r.sent_in_flight.keys().next().unwrap();
        assert!(matches!(action, Action::Sequence(_)));

        let action = handle_frame(&mut r, Frame::PubAck(PubAck { packet_id: id }));
        assert_eq!(action, Action::Noop);
        assert_eq!(r.sent_in_flight.len(), 0);
    }

    #[test]
    fn qos2_outbound_handshake() {
        let mut r = registers_connected(0);
        handle_command_connected(
            &mut r,
            ConnectedCommand::Publish {
                topic: "t".into(),
                payload: vec![],
                qos: QoS::ExactlyOnce,
                retain: false,
            },
        );
        let id = *r.sent_in_flight.keys().next().unwrap();

        handle_frame(&mut r, Frame::PubRec(PubRec { packet_id: id }));
        assert_eq!(r.sent_in_flight.get(&id), Some(&Frame::PubRel(PubRel { packet_id: id })));

        handle_frame(&mut r, Frame::PubComp(PubComp { packet_id: id }));
        assert!(r.sent_in_flight.is_empty());
    }

    #[test]
    fn qos2_inbound_dedup() {
        let mut r = registers_connected(0);
        let publish = Publish {
            dup: false,
            qos: QoS::ExactlyOnce,
            retain: false,
            topic: "t".into(),
            packet_id: Some(5),
            payload: vec![9],
        };

        let first = handle_frame(&mut r, Frame::Publish(publish.clone()));
        let flattened = first.flatten();
        assert!(flattened.iter().any(|a| matches!(a, Action::SendToClient(Event::Message { .. }))));
        assert!(r.recv_in_flight.contains(&5));

        let second = handle_frame(&mut r, Frame::Publish(publish));
        let flattened2 = second.flatten();
        assert!(!flattened2.iter().any(|a| matches!(a, Action::SendToClient(Event::Message { .. }))));

        handle_frame(&mut r, Frame::PubRel(PubRel { packet_id: 5 }));
        assert!(!r.recv_in_flight.contains(&5));
    }

    #[test]
    fn ping_sent_after_keep_alive_silence() {
        let mut r = registers_connected(1000);
        r.set_last_sent_at(0);
        let action = handle_timer_tick(&mut r, 1000);
        let actions = action.flatten();
        assert!(actions.contains(&Action::SendToNetwork(Frame::PingReq)));
        assert!(r.ping_response_pending);
    }

    #[test]
    fn timer_rearms_when_not_yet_due() {
        let mut r = registers_connected(1000);
        r.set_last_sent_at(500);
        let action = handle_timer_tick(&mut r, 800);
        assert_eq!(action, Action::StartPingRespTimer(700));
    }

    #[test]
    fn pending_ping_timeout_forces_close() {
        let mut r = registers_connected(1000);
        r.set_ping_pending(true);
        let action = handle_timer_tick(&mut r, 2000);
        assert_eq!(action, Action::ForciblyCloseTransport);
    }

    #[test]
    fn connack_success_starts_keep_alive() {
        let mut r = Registers::default();
        let action = handle_connack(
            &mut r,
            ConnAck { session_present: false, return_code: ConnectReturnCode::Accepted },
            60_000,
        );
        let actions = action.flatten();
        assert!(actions.contains(&Action::SendToClient(Event::Connected)));
        assert!(actions.contains(&Action::SetKeepAlive(60_000)));
        assert_eq!(r.keep_alive_ms, 60_000);
    }

    #[test]
    fn connack_failure_closes_transport() {
        let mut r = Registers::default();
        let action = handle_connack(
            &mut r,
            ConnAck {
                session_present: false,
                return_code: ConnectReturnCode::NotAuthorized,
            },
            60_000,
        );
        let actions = action.flatten();
        assert!(actions.contains(&Action::ForciblyCloseTransport));
    }
}
