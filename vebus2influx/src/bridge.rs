use std::sync::mpsc::Receiver;

use log::{debug, error, info, warn};

use crate::decoder::{DataPoint, Decoder};
use crate::mqtt_wrapper::{Inbound, Message, MqttWrapper, QoS};
use crate::storage::Storage;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub received: u64,
    pub decoded: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// The receive side: decodes every inbound publish and writes it to storage.
pub struct Bridge<MQTT: MqttWrapper, DB: Storage> {
    decoder: Decoder,
    storage: DB,
    client: MQTT,
    subscriptions: Vec<String>,
    stats: BridgeStats,
}

impl<MQTT: MqttWrapper, DB: Storage> Bridge<MQTT, DB> {
    pub fn new(decoder: Decoder, storage: DB, client: MQTT, subscriptions: Vec<String>) -> Self {
        Self {
            decoder,
            storage,
            client,
            subscriptions,
            stats: BridgeStats::default(),
        }
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    pub fn storage(&self) -> &DB {
        &self.storage
    }

    fn subscribe_all(&mut self) {
        for topic in &self.subscriptions {
            match self.client.subscribe(topic, QoS::AtMostOnce) {
                Ok(()) => info!("subscribed to {topic}"),
                Err(e) => warn!("subscription to {topic} failed: {e:?}"),
            }
        }
    }

    fn forward(&mut self, message: &Message) -> Option<DataPoint> {
        self.stats.received += 1;
        let point = self.decoder.decode(&message.topic, &message.payload)?;
        self.stats.decoded += 1;

        match self.storage.write(&point) {
            Ok(()) => {
                self.stats.delivered += 1;
                Some(point)
            }
            Err(e) => {
                // no retry, the reading is lost
                self.stats.failed += 1;
                error!("failed to store {}={}: {e}", point.field, point.value);
                None
            }
        }
    }

    /// Handles one event. Returns the point that was stored, if any.
    pub fn handle(&mut self, inbound: Inbound) -> Option<DataPoint> {
        match inbound {
            Inbound::Connected => {
                self.subscribe_all();
                None
            }
            Inbound::Publish(message) => self.forward(&message),
        }
    }

    /// Processes events one at a time until the sender side hangs up.
    pub fn run(mut self, receiver: Receiver<Inbound>) -> BridgeStats {
        for inbound in receiver {
            if let Some(point) = self.handle(inbound) {
                debug!(
                    "stored {} {}={} ({:?})",
                    point.measurement, point.field, point.value, self.stats
                );
            }
        }
        info!("inbound stream closed after {:?}", self.stats);
        self.stats
    }
}
