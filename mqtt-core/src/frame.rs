use derive_more::Display;
use num_enum::{TryFromPrimitive, UnsafeFromPrimitive};

/// MQTT 3.1 control packets.
///
/// Unlike a wire-level parser that can borrow straight out of the socket buffer, frames here are
/// owned: they are stored in `Registers::sent_in_flight`/`recv_in_flight` and carried across
/// stimulus boundaries long after the bytes they were decoded from have been discarded by the
/// reassembler.
#[derive(Debug, PartialEq, Clone)]
pub enum Frame {
    Connect(Connect),
    ConnAck(ConnAck),
    Publish(Publish),
    PubAck(PubAck),
    PubRec(PubRec),
    PubRel(PubRel),
    PubComp(PubComp),
    Subscribe(Subscribe),
    SubAck(SubAck),
    Unsubscribe(Unsubscribe),
    UnsubAck(UnsubAck),
    PingReq,
    PingResp,
    Disconnect,
}

/// Fixed header shared by every MQTT control packet.
#[derive(Debug, PartialEq, Clone)]
pub struct FixedHeader {
    pub packet_type: Type,
    pub packet_flags: u8,
    pub remaining_length: usize,
}

/// MQTT control packet type, as encoded in the top nibble of the fixed header byte.
#[repr(u8)]
#[derive(Debug, Eq, PartialEq, Copy, Clone, TryFromPrimitive)]
pub enum Type {
    CONNECT = 1,
    CONNACK = 2,
    PUBLISH = 3,
    PUBACK = 4,
    PUBREC = 5,
    PUBREL = 6,
    PUBCOMP = 7,
    SUBSCRIBE = 8,
    SUBACK = 9,
    UNSUBSCRIBE = 10,
    UNSUBACK = 11,
    PINGREQ = 12,
    PINGRESP = 13,
    DISCONNECT = 14,
}

/// MQTT 3.1 protocol name token, `"MQIsdp"`. Not `"MQTT"` — that's 3.1.1+.
pub const PROTOCOL_NAME: &[u8] = b"MQIsdp";
pub const PROTOCOL_LEVEL: u8 = 3;

/// Quality-of-service level.
#[repr(u8)]
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, TryFromPrimitive, UnsafeFromPrimitive,
)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl std::fmt::Display for QoS {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QoS::AtMostOnce => write!(f, "at-most-once"),
            QoS::AtLeastOnce => write!(f, "at-least-once"),
            QoS::ExactlyOnce => write!(f, "exactly-once"),
        }
    }
}

impl Default for QoS {
    fn default() -> Self {
        QoS::AtMostOnce
    }
}

/// Packet identifier used by QoS &gt; 0 messages.
pub type PacketId = u16;

#[derive(Debug, PartialEq, Clone)]
pub struct Connect {
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub last_will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

bitflags::bitflags! {
    /// Connect flags byte.
    #[derive(Default)]
    pub struct ConnectFlags: u8 {
        const USERNAME      = 0b1000_0000;
        const PASSWORD      = 0b0100_0000;
        const WILL_RETAIN   = 0b0010_0000;
        const WILL_QOS      = 0b0001_1000;
        const LAST_WILL     = 0b0000_0100;
        const CLEAN_SESSION = 0b0000_0010;
    }
}

const WILL_QOS_SHIFT: usize = 3;

impl ConnectFlags {
    pub fn qos(self) -> QoS {
        unsafe { QoS::from_unchecked((self & Self::WILL_QOS).bits() >> WILL_QOS_SHIFT) }
    }
}

impl From<QoS> for ConnectFlags {
    fn from(qos: QoS) -> Self {
        Self::from_bits_truncate((qos as u8) << WILL_QOS_SHIFT)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct LastWill {
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    pub message: Vec<u8>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ConnAck {
    pub session_present: bool,
    pub return_code: ConnectReturnCode,
}

bitflags::bitflags! {
    #[derive(Default)]
    pub struct ConnAckFlags: u8 {
        const SESSION_PRESENT = 0b0000_0001;
    }
}

/// Connect return code, also used as the crate's error type for failed handshakes.
#[repr(u8)]
#[derive(Debug, Eq, PartialEq, Copy, Clone, TryFromPrimitive, Display)]
pub enum ConnectReturnCode {
    #[display(fmt = "connection accepted")]
    Accepted = 0,
    #[display(fmt = "connection refused: unacceptable protocol version")]
    UnacceptableProtocolVersion = 1,
    #[display(fmt = "connection refused: identifier rejected")]
    IdentifierRejected = 2,
    #[display(fmt = "connection refused: server unavailable")]
    ServerUnavailable = 3,
    #[display(fmt = "connection refused: bad user name or password")]
    BadUserNameOrPassword = 4,
    #[display(fmt = "connection refused: not authorized")]
    NotAuthorized = 5,
}

impl std::error::Error for ConnectReturnCode {}

impl ConnectReturnCode {
    /// Turns a non-accepted code into an `Err`.
    pub fn ok(self) -> Result<(), Self> {
        if self == ConnectReturnCode::Accepted {
            Ok(())
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Publish {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    pub packet_id: Option<PacketId>,
    pub payload: Vec<u8>,
}

bitflags::bitflags! {
    #[derive(Default)]
    pub struct PublishFlags: u8 {
        const DUP = 0b0000_1000;
        const QOS = 0b0000_0110;
        const RETAIN = 0b0000_0001;
    }
}

const PUBLISH_QOS_SHIFT: usize = 1;

impl Publish {
    pub fn flags(&self) -> PublishFlags {
        let mut flags = PublishFlags::from(self.qos);
        if self.dup {
            flags |= PublishFlags::DUP;
        }
        if self.retain {
            flags |= PublishFlags::RETAIN;
        }
        flags
    }
}

impl PublishFlags {
    pub fn qos(self) -> QoS {
        unsafe { QoS::from_unchecked((self & Self::QOS).bits() >> PUBLISH_QOS_SHIFT) }
    }
}

impl From<QoS> for PublishFlags {
    fn from(qos: QoS) -> Self {
        Self::from_bits_truncate((qos as u8) << PUBLISH_QOS_SHIFT)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct PubAck {
    pub packet_id: PacketId,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PubRec {
    pub packet_id: PacketId,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PubRel {
    pub packet_id: PacketId,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PubComp {
    pub packet_id: PacketId,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Subscribe {
    pub packet_id: PacketId,
    pub subscriptions: Vec<(String, QoS)>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SubAck {
    pub packet_id: PacketId,
    pub status: Vec<SubscribeReturnCode>,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum SubscribeReturnCode {
    Success(QoS),
    Failure,
}

impl SubAck {
    pub const FAILURE: u8 = 0x80;
}

impl From<SubscribeReturnCode> for u8 {
    fn from(code: SubscribeReturnCode) -> u8 {
        match code {
            SubscribeReturnCode::Success(qos) => qos as u8,
            SubscribeReturnCode::Failure => SubAck::FAILURE,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Unsubscribe {
    pub packet_id: PacketId,
    pub topic_filters: Vec<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct UnsubAck {
    pub packet_id: PacketId,
}

impl Frame {
    /// The control-packet type of this frame, used to pick the fixed-header byte on encode.
    pub fn packet_type(&self) -> Type {
        match self {
            Frame::Connect(_) => Type::CONNECT,
            Frame::ConnAck(_) => Type::CONNACK,
            Frame::Publish(_) => Type::PUBLISH,
            Frame::PubAck(_) => Type::PUBACK,
            Frame::PubRec(_) => Type::PUBREC,
            Frame::PubRel(_) => Type::PUBREL,
            Frame::PubComp(_) => Type::PUBCOMP,
            Frame::Subscribe(_) => Type::SUBSCRIBE,
            Frame::SubAck(_) => Type::SUBACK,
            Frame::Unsubscribe(_) => Type::UNSUBSCRIBE,
            Frame::UnsubAck(_) => Type::UNSUBACK,
            Frame::PingReq => Type::PINGREQ,
            Frame::PingResp => Type::PINGRESP,
            Frame::Disconnect => Type::DISCONNECT,
        }
    }
}
