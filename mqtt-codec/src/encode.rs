use std::mem;

use bytes::BytesMut;
use mqtt_core::{
    ConnAck, ConnAckFlags, Connect, ConnectFlags, Frame, FixedHeader, LastWill, PacketId,
    PROTOCOL_LEVEL, PROTOCOL_NAME, PubAck, PubComp, PubRec, PubRel, Publish, Subscribe, SubAck,
    Type, Unsubscribe, UnsubAck,
};
use bytes::BufMut;

use crate::error::CodecError;

const LENGTH_FIELD_SIZE: usize = mem::size_of::<u16>();

trait BufMutExt: BufMut {
    fn put_utf8_str(&mut self, s: &str) {
        self.put_binary(s.as_bytes())
    }

    fn put_binary(&mut self, s: &[u8]) {
        self.put_u16(s.len() as u16);
        self.put_slice(s)
    }

    fn put_varint(&mut self, mut n: usize) {
        loop {
            let b = (n % 0x80) as u8;
            n >>= 7;
            if n > 0 {
                self.put_u8(0x80 | b);
            } else {
                self.put_u8(b);
                break;
            }
        }
    }
}

impl<T: BufMut> BufMutExt for T {}

fn size_of_varint(n: usize) -> Result<usize, CodecError> {
    match n {
        n if n <= 127 => Ok(1),
        n if n <= 16_383 => Ok(2),
        n if n <= 2_097_151 => Ok(3),
        n if n <= 268_435_455 => Ok(4),
        n => Err(CodecError::RemainingLengthOutOfRange(n)),
    }
}

fn write_fixed_header<T: BufMut>(buf: &mut T, header: &FixedHeader) {
    buf.put_u8(((header.packet_type as u8) << 4) + header.packet_flags);
    buf.put_varint(header.remaining_length);
}

fn packet_flags(frame: &Frame) -> u8 {
    match frame {
        Frame::Publish(publish) => publish.flags().bits(),
        Frame::PubRel(_) | Frame::Subscribe(_) | Frame::Unsubscribe(_) => 0x02,
        _ => 0,
    }
}

fn body_size(frame: &Frame) -> usize {
    match frame {
        Frame::Connect(connect) => connect_size(connect),
        Frame::ConnAck(_) => mem::size_of::<ConnAckFlags>() + mem::size_of::<u8>(),
        Frame::Publish(publish) => publish_size(publish),
        Frame::PubAck(_) | Frame::PubRec(_) | Frame::PubRel(_) | Frame::PubComp(_) => {
            mem::size_of::<PacketId>()
        }
        Frame::Subscribe(subscribe) => subscribe_size(subscribe),
        Frame::SubAck(suback) => mem::size_of::<PacketId>() + suback.status.len(),
        Frame::Unsubscribe(unsubscribe) => unsubscribe_size(unsubscribe),
        Frame::UnsubAck(_) => mem::size_of::<PacketId>(),
        Frame::PingReq | Frame::PingResp | Frame::Disconnect => 0,
    }
}

fn connect_size(connect: &Connect) -> usize {
    PROTOCOL_NAME.len()
        + mem::size_of::<u8>() // protocol level
        + mem::size_of::<u8>() // flags
        + mem::size_of::<u16>() // keep alive
        + LENGTH_FIELD_SIZE + connect.client_id.len()
        + connect.last_will.as_ref().map_or(0, |will| {
            LENGTH_FIELD_SIZE + will.topic.len() + LENGTH_FIELD_SIZE + will.message.len()
        })
        + connect.username.as_ref().map_or(0, |s| LENGTH_FIELD_SIZE + s.len())
        + connect.password.as_ref().map_or(0, |s| LENGTH_FIELD_SIZE + s.len())
}

fn publish_size(publish: &Publish) -> usize {
    LENGTH_FIELD_SIZE
        + publish.topic.len()
        + publish.packet_id.map_or(0, |_| mem::size_of::<PacketId>())
        + publish.payload.len()
}

fn subscribe_size(subscribe: &Subscribe) -> usize {
    mem::size_of::<PacketId>()
        + subscribe
            .subscriptions
            .iter()
            .map(|(topic, _)| LENGTH_FIELD_SIZE + topic.len() + mem::size_of::<u8>())
            .sum::<usize>()
}

fn unsubscribe_size(unsubscribe: &Unsubscribe) -> usize {
    mem::size_of::<PacketId>()
        + unsubscribe
            .topic_filters
            .iter()
            .map(|topic| LENGTH_FIELD_SIZE + topic.len())
            .sum::<usize>()
}

/// Total encoded size of `frame`, including its fixed header. Fails if the body is too large for
/// a 4-byte remaining-length field (see `RemainingLengthOutOfRange`).
pub fn encoded_size(frame: &Frame) -> Result<usize, CodecError> {
    let remaining_length = body_size(frame);
    Ok(1 + size_of_varint(remaining_length)? + remaining_length)
}

/// Encodes `frame` into `buf`. Returns an error instead of writing anything if the frame's body
/// does not fit in a valid remaining-length field.
pub fn encode_frame(frame: &Frame, buf: &mut BytesMut) -> Result<(), CodecError> {
    let remaining_length = body_size(frame);
    size_of_varint(remaining_length)?;

    write_fixed_header(
        buf,
        &FixedHeader {
            packet_type: frame.packet_type(),
            packet_flags: packet_flags(frame),
            remaining_length,
        },
    );

    match frame {
        Frame::Connect(connect) => write_connect(buf, connect),
        Frame::ConnAck(connack) => write_connack(buf, connack),
        Frame::Publish(publish) => write_publish(buf, publish),
        Frame::PubAck(p) => buf.put_u16(p.packet_id),
        Frame::PubRec(p) => buf.put_u16(p.packet_id),
        Frame::PubRel(p) => buf.put_u16(p.packet_id),
        Frame::PubComp(p) => buf.put_u16(p.packet_id),
        Frame::Subscribe(subscribe) => write_subscribe(buf, subscribe),
        Frame::SubAck(suback) => write_suback(buf, suback),
        Frame::Unsubscribe(unsubscribe) => write_unsubscribe(buf, unsubscribe),
        Frame::UnsubAck(p) => buf.put_u16(p.packet_id),
        Frame::PingReq | Frame::PingResp | Frame::Disconnect => {}
    }

    log::trace!("encoded {:?} ({} body bytes)", frame.packet_type(), remaining_length);
    Ok(())
}

fn write_connect(buf: &mut BytesMut, connect: &Connect) {
    let mut flags = ConnectFlags::empty();
    if let Some(ref will) = connect.last_will {
        flags.remove(ConnectFlags::WILL_QOS);
        flags |= ConnectFlags::LAST_WILL | will.qos.into();
        if will.retain {
            flags.insert(ConnectFlags::WILL_RETAIN);
        }
    }
    if connect.username.is_some() {
        flags |= ConnectFlags::USERNAME;
    }
    if connect.password.is_some() {
        flags |= ConnectFlags::PASSWORD;
    }
    if connect.clean_session {
        flags |= ConnectFlags::CLEAN_SESSION;
    }

    buf.put_slice(PROTOCOL_NAME);
    buf.put_u8(PROTOCOL_LEVEL);
    buf.put_u8(flags.bits());
    buf.put_u16(connect.keep_alive);
    buf.put_utf8_str(&connect.client_id);
    if let Some(ref will) = connect.last_will {
        write_last_will(buf, will);
    }
    if let Some(ref username) = connect.username {
        buf.put_utf8_str(username);
    }
    if let Some(ref password) = connect.password {
        buf.put_binary(password);
    }
}

fn write_last_will(buf: &mut BytesMut, will: &LastWill) {
    buf.put_utf8_str(&will.topic);
    buf.put_binary(&will.message);
}

fn write_connack(buf: &mut BytesMut, connack: &ConnAck) {
    buf.put_u8(if connack.session_present {
        ConnAckFlags::SESSION_PRESENT.bits()
    } else {
        0
    });
    buf.put_u8(connack.return_code as u8);
}

fn write_publish(buf: &mut BytesMut, publish: &Publish) {
    buf.put_utf8_str(&publish.topic);
    if let Some(packet_id) = publish.packet_id {
        buf.put_u16(packet_id);
    }
    buf.put_slice(&publish.payload);
}

fn write_subscribe(buf: &mut BytesMut, subscribe: &Subscribe) {
    buf.put_u16(subscribe.packet_id);
    for (topic, qos) in &subscribe.subscriptions {
        buf.put_utf8_str(topic);
        buf.put_u8(*qos as u8);
    }
}

fn write_suback(buf: &mut BytesMut, suback: &SubAck) {
    buf.put_u16(suback.packet_id);
    for status in &suback.status {
        buf.put_u8((*status).into());
    }
}

fn write_unsubscribe(buf: &mut BytesMut, unsubscribe: &Unsubscribe) {
    buf.put_u16(unsubscribe.packet_id);
    for topic in &unsubscribe.topic_filters {
        buf.put_utf8_str(topic);
    }
}

#[cfg(test)]
mod tests {
    use mqtt_core::QoS;

    use super::*;

    fn encode(frame: &Frame) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(frame, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn remaining_length_boundaries() {
        let cases: &[(usize, &[u8])] = &[
            (0, b"\x00"),
            (127, b"\x7f"),
            (128, b"\x80\x01"),
            (16_383, b"\xff\x7f"),
            (16_384, b"\x80\x80\x01"),
            (2_097_151, b"\xff\xff\x7f"),
            (2_097_152, b"\x80\x80\x80\x01"),
            (268_435_455, b"\xff\xff\xff\x7f"),
        ];
        for &(value, expected) in cases {
            let mut buf = BytesMut::new();
            buf.put_varint(value);
            assert_eq!(&buf[..], expected, "encoding {}", value);
        }
    }

    #[test]
    fn remaining_length_out_of_range_is_rejected() {
        assert_eq!(
            size_of_varint(268_435_456),
            Err(CodecError::RemainingLengthOutOfRange(268_435_456))
        );
    }

    #[test]
    fn connect_capture() {
        let frame = Frame::Connect(Connect {
            clean_session: false,
            keep_alive: 60,
            client_id: "test".to_owned(),
            last_will: Some(LastWill {
                qos: QoS::AtLeastOnce,
                retain: true,
                topic: "test/topic".to_owned(),
                message: b"test death".to_vec(),
            }),
            username: None,
            password: None,
        });

        let expected: &[u8] = &[
            0x10, 0x2a, 0x00, 0x06, 0x4d, 0x51, 0x49, 0x73, 0x64, 0x70, 0x03, 0x2c, 0x00, 0x3c,
            0x00, 0x04, 0x74, 0x65, 0x73, 0x74, 0x00, 0x0a, 0x74, 0x65, 0x73, 0x74, 0x2f, 0x74,
            0x6f, 0x70, 0x69, 0x63, 0x00, 0x0a, 0x74, 0x65, 0x73, 0x74, 0x20, 0x64, 0x65, 0x61,
            0x74, 0x68,
        ];

        assert_eq!(encode(&frame), expected);
        assert_eq!(encoded_size(&frame).unwrap(), expected.len());
    }

    #[test]
    fn ping_req_has_no_body() {
        assert_eq!(encode(&Frame::PingReq), vec![0xc0, 0x00]);
    }
}
