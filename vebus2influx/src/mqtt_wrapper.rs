use std::sync::mpsc::Receiver;

use crate::mqtt_config::MqttConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// A publish received from the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Events an implementation forwards to the receive loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// The broker acknowledged a (re)connect. Subscriptions must be renewed.
    Connected,
    Publish(Message),
}

pub trait MqttWrapper: Clone + Send + 'static {
    // This trait decouples the library from a concrete MQTT client. The
    // binary wraps its client in a new type implementing it. Clones share
    // one connection, so the poll loop and the receive loop can both talk
    // to the broker at the same time.

    fn subscribe(&mut self, topic: &str, qos: QoS) -> anyhow::Result<()>;

    fn publish<S, V>(&mut self, topic: S, qos: QoS, retain: bool, payload: V) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>;

    /// Connects and returns the client together with the stream of inbound
    /// events. The stream ends when the connection is torn down for good.
    fn new(config: &MqttConfig, suffix: &str) -> (Self, Receiver<Inbound>);
}
