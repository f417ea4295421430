use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::mqtt_wrapper::{MqttWrapper, QoS};

/// How often a request topic is polled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    EveryTick,
    /// Only on ticks where the counter wraps to zero.
    Reduced,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollTarget {
    pub topic: String,
    pub cadence: Cadence,
}

impl PollTarget {
    pub fn new(topic: impl Into<String>, cadence: Cadence) -> Self {
        Self {
            topic: topic.into(),
            cadence,
        }
    }
}

/// Keeps the device reporting by publishing empty read requests.
///
/// The GX device only emits readings on `N/...` topics after a request on the
/// matching `R/...` topic. Responses are not correlated to requests in any
/// way, so a late response is indistinguishable from a fresh one.
pub struct PollScheduler {
    targets: Vec<PollTarget>,
    divisor: u32,
    counter: u32,
}

impl PollScheduler {
    pub fn new(targets: Vec<PollTarget>, divisor: u32) -> Self {
        Self {
            targets,
            divisor: divisor.max(1),
            counter: 0,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Runs one tick and returns the topics a request was sent to, failed
    /// ones included.
    pub fn tick<MQTT: MqttWrapper>(&mut self, client: &mut MQTT) -> Vec<String> {
        let reduced_due = self.counter == 0;
        let mut requested = Vec::new();

        for target in self
            .targets
            .iter()
            .filter(|target| target.cadence == Cadence::EveryTick || reduced_due)
        {
            if let Err(e) = client.publish(target.topic.as_str(), QoS::AtMostOnce, false, "") {
                warn!("poll request to {} failed: {e:?}", target.topic);
            }
            requested.push(target.topic.clone());
        }

        debug!("poll tick {}: requested {requested:?}", self.counter);
        self.counter = (self.counter + 1) % self.divisor;
        requested
    }

    pub fn run<MQTT: MqttWrapper>(mut self, mut client: MQTT, interval: Duration) {
        info!(
            "polling {} topics every {:.2}s, reduced cadence every {} ticks",
            self.targets.len(),
            interval.as_secs_f64(),
            self.divisor
        );
        loop {
            self.tick(&mut client);
            thread::sleep(interval);
        }
    }
}
