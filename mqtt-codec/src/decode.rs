use std::convert::TryFrom;
use std::str;

use mqtt_core::{
    ConnAck, ConnAckFlags, Connect, ConnectFlags, ConnectReturnCode, FixedHeader, Frame, LastWill,
    PacketId, PROTOCOL_LEVEL, PROTOCOL_NAME, PubAck, PubComp, PubRec, PubRel, Publish,
    PublishFlags, QoS, SubAck, Subscribe, SubscribeReturnCode, Type, UnsubAck, Unsubscribe,
};
use nom::{
    bytes::complete::{tag, take},
    combinator::{map, map_opt, map_res},
    error::{context, ParseError, VerboseError},
    multi::{length_data, many1},
    number::complete::{be_u16, be_u8},
    sequence::tuple,
    IResult,
};

use crate::error::CodecError;

const CONTINUATION_BIT: u8 = 0x80;

/// Scans as much of `buf` as is available and reports the fixed header plus the number of bytes
/// it occupies, or `Ok(None)` if `buf` doesn't yet contain a whole fixed header.
///
/// Unlike the rest of the decoder this does not use `nom`: the remaining-length field has a
/// genuinely streaming shape (read one byte, decide whether to read another) that's easier to
/// express as a small loop than to coax out of `nom`'s complete-input combinators.
pub fn try_read_fixed_header(buf: &[u8]) -> Result<Option<(FixedHeader, usize)>, CodecError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let b0 = buf[0];
    let packet_type = Type::try_from((b0 >> 4) & 0x0f)
        .map_err(|_| CodecError::Malformed(format!("unknown packet type {:#04x}", b0 >> 4)))?;
    let packet_flags = b0 & 0x0f;

    let mut value: usize = 0;
    let mut multiplier: usize = 1;
    let mut idx = 1;
    let mut continuation_bytes = 0;

    loop {
        if idx >= buf.len() {
            return Ok(None);
        }
        continuation_bytes += 1;
        if continuation_bytes > 4 {
            return Err(CodecError::RemainingLengthTooLong);
        }
        let byte = buf[idx];
        value += usize::from(byte & !CONTINUATION_BIT) * multiplier;
        idx += 1;
        if byte & CONTINUATION_BIT == 0 {
            break;
        }
        multiplier *= 128;
    }

    Ok(Some((
        FixedHeader {
            packet_type,
            packet_flags,
            remaining_length: value,
        },
        idx,
    )))
}

/// Decodes a complete frame from exactly `fixed_header.remaining_length` bytes of body.
pub fn decode_frame(fixed_header: &FixedHeader, body: &[u8]) -> Result<Frame, CodecError> {
    if body.len() != fixed_header.remaining_length {
        return Err(CodecError::Malformed(format!(
            "expected {} body bytes, got {}",
            fixed_header.remaining_length,
            body.len()
        )));
    }

    let result: IResult<&[u8], Frame, VerboseError<&[u8]>> = match fixed_header.packet_type {
        Type::CONNECT => map(parse_connect, Frame::Connect)(body),
        Type::CONNACK => map(parse_connack, Frame::ConnAck)(body),
        Type::PUBLISH => map(
            |i| parse_publish(PublishFlags::from_bits_truncate(fixed_header.packet_flags), i),
            Frame::Publish,
        )(body),
        Type::PUBACK => map(parse_packet_id, |packet_id| Frame::PubAck(PubAck { packet_id }))(body),
        Type::PUBREC => map(parse_packet_id, |packet_id| Frame::PubRec(PubRec { packet_id }))(body),
        Type::PUBREL => map(parse_packet_id, |packet_id| Frame::PubRel(PubRel { packet_id }))(body),
        Type::PUBCOMP => {
            map(parse_packet_id, |packet_id| Frame::PubComp(PubComp { packet_id }))(body)
        }
        Type::SUBSCRIBE => map(parse_subscribe, Frame::Subscribe)(body),
        Type::SUBACK => map(parse_suback, Frame::SubAck)(body),
        Type::UNSUBSCRIBE => map(parse_unsubscribe, Frame::Unsubscribe)(body),
        Type::UNSUBACK => {
            map(parse_packet_id, |packet_id| Frame::UnsubAck(UnsubAck { packet_id }))(body)
        }
        Type::PINGREQ => {
            log::trace!("decoded PINGREQ (0 body bytes)");
            return Ok(Frame::PingReq);
        }
        Type::PINGRESP => {
            log::trace!("decoded PINGRESP (0 body bytes)");
            return Ok(Frame::PingResp);
        }
        Type::DISCONNECT => {
            log::trace!("decoded DISCONNECT (0 body bytes)");
            return Ok(Frame::Disconnect);
        }
    };

    match result {
        Ok((rest, frame)) => {
            if rest.is_empty() {
                log::trace!("decoded {:?} ({} body bytes)", frame.packet_type(), body.len());
                Ok(frame)
            } else {
                Err(CodecError::TrailingBytes)
            }
        }
        Err(err) => Err(CodecError::Malformed(format!("{:?}", err))),
    }
}

fn variable_string<'a, E: ParseError<&'a [u8]>>(
    input: &'a [u8],
) -> IResult<&'a [u8], &'a str, E> {
    context("utf8 string", map_res(length_data(be_u16), str::from_utf8))(input)
}

fn parse_packet_id<'a, E: ParseError<&'a [u8]>>(
    input: &'a [u8],
) -> IResult<&'a [u8], PacketId, E> {
    context("packet id", be_u16)(input)
}

fn parse_connect<'a, E: ParseError<&'a [u8]>>(input: &'a [u8]) -> IResult<&'a [u8], Connect, E> {
    let (input, (_, _, flags, keep_alive)) = tuple((
        context("protocol name", tag(PROTOCOL_NAME)),
        context("protocol level", map_res(be_u8, |level: u8| {
            if level == PROTOCOL_LEVEL {
                Ok(level)
            } else {
                Err(())
            }
        })),
        context("connect flags", map_opt(be_u8, ConnectFlags::from_bits)),
        context("keep alive", be_u16),
    ))(input)?;
    let (input, client_id) = variable_string(input)?;
    let (input, last_will) = if flags.contains(ConnectFlags::LAST_WILL) {
        let (input, (topic, message)) = tuple((
            context("will topic", variable_string),
            context("will message", length_data(be_u16)),
        ))(input)?;
        (
            input,
            Some(LastWill {
                qos: flags.qos(),
                retain: flags.contains(ConnectFlags::WILL_RETAIN),
                topic: topic.to_owned(),
                message: message.to_vec(),
            }),
        )
    } else {
        (input, None)
    };
    let (input, username) = if flags.contains(ConnectFlags::USERNAME) {
        let (input, username) = context("username", variable_string)(input)?;
        (input, Some(username.to_owned()))
    } else {
        (input, None)
    };
    let (input, password) = if flags.contains(ConnectFlags::PASSWORD) {
        let (input, password) = context("password", length_data(be_u16))(input)?;
        (input, Some(password.to_vec()))
    } else {
        (input, None)
    };

    Ok((
        input,
        Connect {
            clean_session: flags.contains(ConnectFlags::CLEAN_SESSION),
            keep_alive,
            client_id: client_id.to_owned(),
            last_will,
            username,
            password,
        },
    ))
}

fn parse_connack<'a, E: ParseError<&'a [u8]>>(input: &'a [u8]) -> IResult<&'a [u8], ConnAck, E> {
    map(
        tuple((
            context("connack flags", map_opt(be_u8, ConnAckFlags::from_bits)),
            context("return code", map_res(be_u8, ConnectReturnCode::try_from)),
        )),
        |(flags, return_code)| ConnAck {
            session_present: flags.contains(ConnAckFlags::SESSION_PRESENT),
            return_code,
        },
    )(input)
}

fn parse_publish<'a, E: ParseError<&'a [u8]>>(
    flags: PublishFlags,
    input: &'a [u8],
) -> IResult<&'a [u8], Publish, E> {
    let dup = flags.contains(PublishFlags::DUP);
    let qos = flags.qos();
    let retain = flags.contains(PublishFlags::RETAIN);
    let (input, topic) = context("topic name", variable_string)(input)?;
    let (input, packet_id) = if qos >= QoS::AtLeastOnce {
        let (input, id) = parse_packet_id(input)?;
        (input, Some(id))
    } else {
        (input, None)
    };

    Ok((
        &[][..],
        Publish {
            dup,
            qos,
            retain,
            topic: topic.to_owned(),
            packet_id,
            payload: input.to_vec(),
        },
    ))
}

fn parse_subscribe<'a, E: ParseError<&'a [u8]>>(
    input: &'a [u8],
) -> IResult<&'a [u8], Subscribe, E> {
    map(
        tuple((
            parse_packet_id,
            many1(tuple((
                variable_string,
                context("qos", map_res(be_u8, QoS::try_from)),
            ))),
        )),
        |(packet_id, subscriptions)| Subscribe {
            packet_id,
            subscriptions: subscriptions
                .into_iter()
                .map(|(topic, qos)| (topic.to_owned(), qos))
                .collect(),
        },
    )(input)
}

fn parse_suback<'a, E: ParseError<&'a [u8]>>(input: &'a [u8]) -> IResult<&'a [u8], SubAck, E> {
    const QOS_MASK: u8 = 0x3;
    map(
        tuple((
            parse_packet_id,
            many1(context(
                "return code",
                map(be_u8, |b| {
                    if b & SubAck::FAILURE == 0 {
                        SubscribeReturnCode::Success(unsafe {
                            QoS::from_unchecked(b & QOS_MASK)
                        })
                    } else {
                        SubscribeReturnCode::Failure
                    }
                }),
            )),
        )),
        |(packet_id, status)| SubAck { packet_id, status },
    )(input)
}

fn parse_unsubscribe<'a, E: ParseError<&'a [u8]>>(
    input: &'a [u8],
) -> IResult<&'a [u8], Unsubscribe, E> {
    map(
        tuple((parse_packet_id, many1(variable_string))),
        |(packet_id, topic_filters)| Unsubscribe {
            packet_id,
            topic_filters: topic_filters.into_iter().map(str::to_owned).collect(),
        },
    )(input)
}
