use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use vebus2influx::{
    bridge::Bridge,
    decoder::{DataPoint, Decoder},
    device::DeviceConfig,
    mqtt_config::MqttConfig,
    mqtt_wrapper::{Inbound, Message, MqttWrapper, QoS},
    poller::PollScheduler,
    storage::{line_protocol, DeliveryError, Storage},
};

#[derive(Clone)]
struct MqttTester {
    published_values: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl MqttTester {
    pub fn published_topics(&self) -> Vec<String> {
        self.published_values
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }
}

impl MqttWrapper for MqttTester {
    fn subscribe(&mut self, topic: &str, _qos: QoS) -> anyhow::Result<()> {
        self.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    fn publish<S, V>(
        &mut self,
        topic: S,
        _qos: QoS,
        _retain: bool,
        payload: V,
    ) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>,
    {
        self.published_values
            .lock()
            .unwrap()
            .push((topic.into(), payload.into()));
        Ok(())
    }

    fn new(_config: &MqttConfig, _suffix: &str) -> (Self, Receiver<Inbound>) {
        let (_sender, receiver) = mpsc::channel();
        (
            Self {
                published_values: Arc::new(Mutex::new(Vec::new())),
                subscriptions: Arc::new(Mutex::new(Vec::new())),
            },
            receiver,
        )
    }
}

/// Records the rows an InfluxDB write would have received.
#[derive(Default)]
struct MemoryStorage {
    rows: Vec<String>,
}

impl Storage for MemoryStorage {
    fn write(&mut self, point: &DataPoint) -> Result<(), DeliveryError> {
        self.rows.push(line_protocol(point));
        Ok(())
    }
}

fn mqtt_config() -> MqttConfig {
    MqttConfig {
        host: "frob".to_owned(),
        port: Some(1234),
        username: None,
        password: None,
        tls: None,
        client_id: Some("myclient".to_string()),
    }
}

fn bridge_for(device: &DeviceConfig) -> (Bridge<MqttTester, MemoryStorage>, MqttTester) {
    let decoder = Decoder::new(
        "dc",
        device.topic_patterns().unwrap(),
        device.excluded_fields.clone(),
    );
    let (client, _) = MqttTester::new(&mqtt_config(), "-test");
    let bridge = Bridge::new(
        decoder,
        MemoryStorage::default(),
        client.clone(),
        device.subscriptions(),
    );
    (bridge, client)
}

fn publish(sender: &Sender<Inbound>, topic: &str, payload: &str) {
    sender
        .send(Inbound::Publish(Message::new(topic, payload)))
        .unwrap();
}

#[test]
fn dc_voltage_is_rounded_and_stored() {
    let (mut bridge, _) = bridge_for(&DeviceConfig::new("ABC123"));
    let point = bridge
        .handle(Inbound::Publish(Message::new(
            "N/ABC123/vebus/275/Dc/0/Voltage",
            r#"{"value": 52.12345}"#,
        )))
        .unwrap();
    assert_eq!(point.measurement, "dc");
    assert_eq!(point.field, "Voltage");
    assert_eq!(point.value, 52.1235);
    assert_eq!(bridge.storage().rows, vec!["dc Voltage=52.1235"]);
}

#[test]
fn temperature_is_never_stored() {
    let (mut bridge, _) = bridge_for(&DeviceConfig::new("ABC123"));
    for payload in [r#"{"value": 31.2}"#, r#"{"value": null}"#, "junk"] {
        assert!(bridge
            .handle(Inbound::Publish(Message::new(
                "N/ABC123/vebus/275/Dc/0/Temperature",
                payload,
            )))
            .is_none());
    }
    assert!(bridge.storage().rows.is_empty());
}

#[test]
fn soc_is_stored_as_float() {
    let (mut bridge, _) = bridge_for(&DeviceConfig::new("ABC123"));
    let point = bridge
        .handle(Inbound::Publish(Message::new(
            "N/ABC123/vebus/275/Soc",
            r#"{"value": 87}"#,
        )))
        .unwrap();
    assert_eq!(point.field, "Soc");
    assert_eq!(point.value, 87.0);
    assert_eq!(bridge.storage().rows, vec!["dc Soc=87"]);
}

#[test]
fn ac_input_readings_keep_their_own_field() {
    let mut device = DeviceConfig::new("ABC123");
    device.ac_input = true;
    let (mut bridge, _) = bridge_for(&device);
    let point = bridge
        .handle(Inbound::Publish(Message::new(
            "N/ABC123/vebus/275/Ac/ActiveIn/L1/P",
            r#"{"value": 230.5}"#,
        )))
        .unwrap();
    assert_eq!(point.field, "P");
}

#[test]
fn receive_loop_processes_in_order_and_subscribes_on_connect() {
    let device = DeviceConfig::new("ABC123");
    let (bridge, client) = bridge_for(&device);
    let (sender, receiver) = mpsc::channel();

    sender.send(Inbound::Connected).unwrap();
    publish(&sender, "N/ABC123/vebus/275/Dc/0/Current", r#"{"value": -12.0}"#);
    publish(&sender, "N/ABC123/vebus/275/Dc/0/Voltage", r#"{"value": 51.9}"#);
    publish(&sender, "N/ABC123/vebus/275/Dc/0/MaxChargeCurrent", r#"{"value": 70}"#);
    publish(&sender, "N/ABC123/settings/0/Settings/CGwacs/AcPowerSetPoint", r#"{"value": 0}"#);
    publish(&sender, "N/ABC123/vebus/275/Dc/0/Power", r#"{"value": null}"#);
    publish(&sender, "N/ABC123/vebus/275/Soc", r#"{"value": 55.5}"#);
    drop(sender);

    let stats = bridge.run(receiver);
    assert_eq!(stats.received, 6);
    assert_eq!(stats.decoded, 3);
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(*client.subscriptions.lock().unwrap(), device.subscriptions());
}

#[test]
fn poller_requests_soc_every_tenth_tick() {
    let device = DeviceConfig::new("ABC123");
    let (mut client, _) = MqttTester::new(&mqtt_config(), "-test");
    let mut scheduler = PollScheduler::new(device.poll_targets(), 10);

    let mut soc_ticks = Vec::new();
    for tick in 0..20 {
        let before = client.published_topics().len();
        scheduler.tick(&mut client);
        let sent = client.published_topics().split_off(before);
        assert_eq!(sent[0], "R/ABC123/vebus/275/Dc/0");
        if sent.iter().any(|topic| topic == "R/ABC123/vebus/275/Soc") {
            soc_ticks.push(tick);
        }
    }
    assert_eq!(soc_ticks, vec![0, 10]);

    assert!(client
        .published_values
        .lock()
        .unwrap()
        .iter()
        .all(|(_, payload)| payload.is_empty()));
}

#[test]
fn only_object_payloads_reach_storage() {
    let (mut bridge, _) = bridge_for(&DeviceConfig::new("ABC123"));
    for payload in ["[52.5]", "[1]", "52.1", r#""52.1""#, r#"[{"value": 3}]"#] {
        assert!(bridge
            .handle(Inbound::Publish(Message::new(
                "N/ABC123/vebus/275/Dc/0/Current",
                payload,
            )))
            .is_none());
    }
    assert!(bridge.storage().rows.is_empty());
    assert_eq!(bridge.stats().received, 5);
    assert_eq!(bridge.stats().decoded, 0);
}

#[test]
fn huge_readings_are_stored_as_finite_numbers() {
    let (mut bridge, _) = bridge_for(&DeviceConfig::new("ABC123"));
    let point = bridge
        .handle(Inbound::Publish(Message::new(
            "N/ABC123/vebus/275/Dc/0/Current",
            r#"{"value": 1e305}"#,
        )))
        .unwrap();
    assert!(point.value.is_finite());
    assert!(!bridge.storage().rows[0].contains("inf"));
}
