use derive_more::Display;
use mqtt_core::SubscribeReturnCode;

/// The application-facing outbound event port (spec §6.2).
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected,
    Disconnected,
    ConnectionFailure(ConnectionFailureReason),
    Message { topic: String, payload: Vec<u8> },
    Subscribed(Vec<SubscribeReturnCode>),
    Unsubscribed,
    Error(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionFailureReason {
    #[display(fmt = "the transport could not be established")]
    TransportNotReady,
    #[display(fmt = "server rejected unacceptable protocol version")]
    BadProtocolVersion,
    #[display(fmt = "server rejected the client identifier")]
    IdentifierRejected,
    #[display(fmt = "server unavailable")]
    ServerUnavailable,
    #[display(fmt = "server rejected user name or password")]
    BadUserNameOrPassword,
    #[display(fmt = "client not authorized")]
    NotAuthorized,
}

impl ConnectionFailureReason {
    pub fn from_return_code(code: mqtt_core::ConnectReturnCode) -> Self {
        use mqtt_core::ConnectReturnCode::*;

        match code {
            Accepted => unreachable!("Accepted is not a failure"),
            UnacceptableProtocolVersion => ConnectionFailureReason::BadProtocolVersion,
            IdentifierRejected => ConnectionFailureReason::IdentifierRejected,
            ServerUnavailable => ConnectionFailureReason::ServerUnavailable,
            BadUserNameOrPassword => ConnectionFailureReason::BadUserNameOrPassword,
            NotAuthorized => ConnectionFailureReason::NotAuthorized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    #[display(fmt = "not connected")]
    NotConnected,
    #[display(fmt = "protocol error")]
    ProtocolError,
    #[display(fmt = "transport not ready")]
    TransportNotReady,
}
