use std::time::Duration;

use mqtt_core::{LastWill, QoS};

/// Parameters for a `Command::Connect`, assembled through a small builder the way
/// `mqtt-sync-client::connect::Connector` assembles a `proto::Connect` before dialing out.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub client_id: String,
    pub clean_session: bool,
    pub keep_alive: Duration,
    pub last_will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl ConnectOptions {
    pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(60);

    pub fn new(client_id: impl Into<String>) -> Self {
        ConnectOptions {
            client_id: client_id.into(),
            clean_session: true,
            keep_alive: Self::DEFAULT_KEEPALIVE,
            last_will: None,
            username: None,
            password: None,
        }
    }

    pub fn clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = clean_session;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn last_will(mut self, topic: impl Into<String>, message: impl Into<Vec<u8>>, qos: QoS, retain: bool) -> Self {
        self.last_will = Some(LastWill {
            qos,
            retain,
            topic: topic.into(),
            message: message.into(),
        });
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<Vec<u8>>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn keep_alive_ms(&self) -> u64 {
        self.keep_alive.as_millis() as u64
    }

    /// The keep-alive value in whole seconds, clamped to `u16`, as it appears on the wire.
    pub fn keep_alive_secs(&self) -> u16 {
        self.keep_alive.as_secs().min(u64::from(u16::MAX)) as u16
    }
}
