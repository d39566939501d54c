use mqtt_codec::{decode_frame, try_read_fixed_header, CodecError};
use mqtt_core::Frame;

use crate::registers::PartialFrame;

/// Turns one inbound transport chunk plus the current reassembly state into zero or more whole
/// frames and an updated reassembly state (spec §4.2).
///
/// Grounded on `mqtt-sync-client::framed::Framed::parse_packet`/`fill_buf`, restructured as a
/// pure function of `(chunk, read_buffer)` rather than a type wrapping a live stream — the
/// teacher's version needs a real `Read` to retry against; this one only needs bytes, which is
/// what makes it testable without a socket.
pub fn reassemble(
    chunk: &[u8],
    mut read_buffer: Option<PartialFrame>,
) -> Result<(Vec<Frame>, Option<PartialFrame>), CodecError> {
    let mut frames = Vec::new();
    let mut rest = chunk;

    loop {
        match read_buffer.take() {
            None => {
                if rest.is_empty() {
                    break;
                }
                match try_read_fixed_header(rest)? {
                    None => {
                        read_buffer = Some(PartialFrame::AwaitingHeader(rest.to_vec()));
                        break;
                    }
                    Some((header, consumed)) => {
                        let body_avail = rest.len() - consumed;
                        let need = header.remaining_length;
                        if body_avail >= need {
                            let frame = decode_frame(&header, &rest[consumed..consumed + need])?;
                            frames.push(frame);
                            rest = &rest[consumed + need..];
                        } else {
                            read_buffer = Some(PartialFrame::AwaitingBody {
                                fixed_header: header,
                                payload: rest[consumed..].to_vec(),
                            });
                            break;
                        }
                    }
                }
            }
            Some(PartialFrame::AwaitingHeader(mut prior)) => {
                prior.extend_from_slice(rest);
                rest = &[][..];
                match try_read_fixed_header(&prior)? {
                    None => {
                        read_buffer = Some(PartialFrame::AwaitingHeader(prior));
                        break;
                    }
                    Some((header, consumed)) => {
                        let need = header.remaining_length;
                        let body = prior[consumed..].to_vec();
                        if body.len() >= need {
                            let frame = decode_frame(&header, &body[..need])?;
                            frames.push(frame);
                            let leftover = body[need..].to_vec();
                            read_buffer = None;
                            rest = &[][..];
                            if !leftover.is_empty() {
                                let (more, next_buffer) = reassemble(&leftover, None)?;
                                frames.extend(more);
                                read_buffer = next_buffer;
                            }
                            break;
                        } else {
                            read_buffer = Some(PartialFrame::AwaitingBody {
                                fixed_header: header,
                                payload: body,
                            });
                            break;
                        }
                    }
                }
            }
            Some(PartialFrame::AwaitingBody {
                fixed_header,
                mut payload,
            }) => {
                let need = fixed_header.remaining_length;
                let have = payload.len() + rest.len();

                if have < need {
                    payload.extend_from_slice(rest);
                    read_buffer = Some(PartialFrame::AwaitingBody { fixed_header, payload });
                    break;
                }

                let missing = need - payload.len();
                payload.extend_from_slice(&rest[..missing]);
                let leftover = &rest[missing..];

                let frame = decode_frame(&fixed_header, &payload)?;
                frames.push(frame);

                if leftover.is_empty() {
                    read_buffer = None;
                    break;
                }

                rest = leftover;
                read_buffer = None;
            }
        }
    }

    Ok((frames, read_buffer))
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use mqtt_core::{ConnAck, ConnectReturnCode, PubAck, Publish, QoS};

    use super::*;

    fn encode(frame: &Frame) -> Vec<u8> {
        let mut buf = BytesMut::new();
        mqtt_codec::encode_frame(frame, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn whole_frame_in_one_chunk() {
        let frame = Frame::PingResp;
        let bytes = encode(&frame);
        let (frames, remainder) = reassemble(&bytes, None).unwrap();
        assert_eq!(frames, vec![frame]);
        assert_eq!(remainder, None);
    }

    #[test]
    fn split_across_two_chunks() {
        let frame = Frame::Publish(Publish {
            dup: false,
            qos: QoS::AtLeastOnce,
            retain: false,
            topic: "a/b".to_owned(),
            packet_id: Some(7),
            payload: vec![0u8; 4096],
        });
        let bytes = encode(&frame);
        let split = bytes.len() / 2;

        let (frames1, buf1) = reassemble(&bytes[..split], None).unwrap();
        assert!(frames1.is_empty());
        assert!(buf1.is_some());

        let (frames2, buf2) = reassemble(&bytes[split..], buf1).unwrap();
        assert_eq!(frames2, vec![frame]);
        assert_eq!(buf2, None);
    }

    #[test]
    fn header_split_across_chunks() {
        let frame = Frame::ConnAck(ConnAck {
            session_present: false,
            return_code: ConnectReturnCode::Accepted,
        });
        let bytes = encode(&frame);
        // split after just the first byte, before the remaining-length field is readable.
        let (frames1, buf1) = reassemble(&bytes[..1], None).unwrap();
        assert!(frames1.is_empty());
        assert!(matches::matches!(buf1, Some(PartialFrame::AwaitingHeader(_))));

        let (frames2, buf2) = reassemble(&bytes[1..], buf1).unwrap();
        assert_eq!(frames2, vec![frame]);
        assert_eq!(buf2, None);
    }

    #[test]
    fn two_frames_in_one_chunk() {
        let ping = Frame::PingResp;
        let ack = Frame::PubAck(PubAck { packet_id: 7 });
        let mut bytes = encode(&ping);
        bytes.extend(encode(&ack));

        let (frames, remainder) = reassemble(&bytes, None).unwrap();
        assert_eq!(frames, vec![ping, ack]);
        assert_eq!(remainder, None);
    }

    #[test]
    fn one_and_a_half_frames_in_one_chunk() {
        let ping = Frame::PingResp;
        let ack = Frame::PubAck(PubAck { packet_id: 7 });
        let mut bytes = encode(&ping);
        bytes.extend(encode(&ack));
        let split = bytes.len() - 1;

        let (frames, remainder) = reassemble(&bytes[..split], None).unwrap();
        assert_eq!(frames, vec![ping]);
        assert!(remainder.is_some());

        let (frames2, remainder2) = reassemble(&bytes[split..], remainder).unwrap();
        assert_eq!(frames2, vec![ack]);
        assert_eq!(remainder2, None);
    }
}
