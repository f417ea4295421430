use serde_derive::Deserialize;

use crate::decoder::TopicPattern;
use crate::poller::{Cadence, PollTarget};

// VE.Bus instance of the Multiplus on a GX device
static VEBUS_INSTANCE: u16 = 275;

fn default_excluded_fields() -> Vec<String> {
    vec!["Temperature".to_string(), "MaxChargeCurrent".to_string()]
}

fn path(prefix: char, serial: &str, rest: &str) -> String {
    format!("{prefix}/{serial}/vebus/{VEBUS_INSTANCE}{rest}")
}

/// The device being bridged. Every topic is derived from its serial.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub serial: String,
    /// Also poll and record the AC input (L1) readings.
    #[serde(default)]
    pub ac_input: bool,
    #[serde(default = "default_excluded_fields")]
    pub excluded_fields: Vec<String>,
}

impl DeviceConfig {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            ac_input: false,
            excluded_fields: default_excluded_fields(),
        }
    }

    /// Topic filters to subscribe to on every (re)connect.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics = vec![
            path('N', &self.serial, "/Dc/0/+"),
            path('N', &self.serial, "/Soc"),
        ];
        if self.ac_input {
            topics.push(path('N', &self.serial, "/Ac/ActiveIn/L1/+"));
        }
        topics
    }

    /// Field extraction rules, most specific first. The catch-all for direct
    /// children of the vebus node (e.g. `Soc`) has to come last.
    pub fn topic_patterns(&self) -> anyhow::Result<Vec<TopicPattern>> {
        let serial = regex::escape(&self.serial);
        let mut patterns = vec![path('N', &serial, "/Dc/0/([^/]+)")];
        if self.ac_input {
            patterns.push(path('N', &serial, "/Ac/ActiveIn/L1/([^/]+)"));
        }
        patterns.push(path('N', &serial, "/([^/]+)$"));

        patterns
            .iter()
            .map(|pattern| TopicPattern::new(pattern))
            .collect()
    }

    pub fn poll_targets(&self) -> Vec<PollTarget> {
        let mut targets = vec![PollTarget::new(
            path('R', &self.serial, "/Dc/0"),
            Cadence::EveryTick,
        )];
        if self.ac_input {
            targets.push(PollTarget::new(
                path('R', &self.serial, "/Ac/ActiveIn/L1"),
                Cadence::EveryTick,
            ));
        }
        targets.push(PollTarget::new(
            path('R', &self.serial, "/Soc"),
            Cadence::Reduced,
        ));
        targets
    }
}
