use mqtt_core::QoS;

use crate::options::ConnectOptions;

/// The application-facing inbound command port (spec §6.1).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Query the current connection status; always answered with `Event::Connected` or
    /// `Event::Disconnected`.
    Status,
    Connect(ConnectOptions),
    Disconnect,
    Subscribe(Vec<(String, QoS)>),
    Unsubscribe(Vec<String>),
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    },
}
