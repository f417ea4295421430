use std::sync::mpsc::{self, Receiver, Sender};
use std::{thread, time::Duration};

use log::{debug, warn};
use rumqttc::{
    tokio_rustls::{self, rustls::ClientConfig},
    Client, Connection, Event, MqttOptions, Packet, Transport,
};
use vebus2influx::{
    mqtt_config::MqttConfig,
    mqtt_wrapper::{self, Inbound, Message},
};

static CLIENT_ID_DEFAULT: &str = "MQTTInfluxDBBridge";
static RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct RumqttcWrapper {
    client: Client,
}

fn match_qos(qos: mqtt_wrapper::QoS) -> rumqttc::QoS {
    match qos {
        mqtt_wrapper::QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        mqtt_wrapper::QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        mqtt_wrapper::QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

fn tls_transport() -> Transport {
    // Use rustls-native-certs to load root certificates from the operating system.
    let mut roots = tokio_rustls::rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        warn!("could not load platform cert: {e}");
    }
    for cert in native.certs {
        if let Err(e) = roots.add(cert) {
            warn!("ignoring unusable platform cert: {e}");
        }
    }

    let client_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Transport::tls_with_config(client_config.into())
}

/// Drives the rumqttc event loop and hands connection acks and publishes to
/// the receive loop. Ends once the receiver is dropped.
fn forward_events(mut connection: Connection, sender: Sender<Inbound>) {
    for notification in connection.iter() {
        let inbound = match notification {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                debug!("connected: {ack:?}");
                Inbound::Connected
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => Inbound::Publish(Message::new(
                publish.topic,
                publish.payload.to_vec(),
            )),
            Ok(_) => continue,
            Err(e) => {
                // the next iteration reconnects
                warn!("mqtt connection error: {e}");
                thread::sleep(RECONNECT_DELAY);
                continue;
            }
        };
        if sender.send(inbound).is_err() {
            break;
        }
    }
}

impl mqtt_wrapper::MqttWrapper for RumqttcWrapper {
    fn subscribe(&mut self, topic: &str, qos: mqtt_wrapper::QoS) -> anyhow::Result<()> {
        Ok(self.client.subscribe(topic, match_qos(qos))?)
    }

    fn publish<S, V>(
        &mut self,
        topic: S,
        qos: mqtt_wrapper::QoS,
        retain: bool,
        payload: V,
    ) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>,
    {
        // try publishing up to three times
        for _ in 0..2 {
            if self
                .client
                .try_publish(topic.clone(), match_qos(qos), retain, payload.clone())
                .is_ok()
            {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(100));
        }
        Ok(self
            .client
            .try_publish(topic, match_qos(qos), retain, payload)?)
    }

    fn new(config: &MqttConfig, suffix: &str) -> (Self, Receiver<Inbound>) {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| CLIENT_ID_DEFAULT.to_string())
            + suffix;
        let mut mqttoptions = MqttOptions::new(client_id, &config.host, config.port());
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if config.use_tls() {
            mqttoptions.set_transport(tls_transport());
        }

        //parse the mqtt authentication options
        if let Some((username, password)) = match (&config.username, &config.password) {
            (None, None) => None,
            (None, Some(_)) => None,
            (Some(username), None) => Some((username.clone(), "".into())),
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
        } {
            mqttoptions.set_credentials(username, password);
        }

        let (client, connection) = Client::new(mqttoptions, 512);
        let (sender, receiver) = mpsc::channel();

        thread::spawn(move || forward_events(connection, sender));

        (Self { client }, receiver)
    }
}
