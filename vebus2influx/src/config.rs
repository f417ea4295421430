use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde_derive::Deserialize;

use crate::device::DeviceConfig;
use crate::influx_config::InfluxConfig;
use crate::mqtt_config::MqttConfig;

static POLL_INTERVAL_DEFAULT: u64 = 1_000;
static SOC_DIVISOR_DEFAULT: u32 = 10;

fn default_interval_ms() -> u64 {
    POLL_INTERVAL_DEFAULT
}

fn default_soc_divisor() -> u32 {
    SOC_DIVISOR_DEFAULT
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// state of charge is requested on every n-th tick only
    #[serde(default = "default_soc_divisor")]
    pub soc_divisor: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: POLL_INTERVAL_DEFAULT,
            soc_divisor: SOC_DIVISOR_DEFAULT,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub influxdb: InfluxConfig,
    pub device: DeviceConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents).context("toml config unparsable")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.device.serial.trim().is_empty() {
            bail!("device.serial must not be empty");
        }
        if self.influxdb.database.is_empty() {
            bail!("influxdb.database must not be empty");
        }
        // a row without measurement is not valid line protocol
        if self.influxdb.measurement.trim().is_empty() {
            bail!("influxdb.measurement must not be empty");
        }
        if self.poll.soc_divisor == 0 {
            bail!("poll.soc_divisor must be at least 1");
        }
        if self.poll.interval_ms == 0 {
            bail!("poll.interval_ms must be at least 1");
        }
        Ok(())
    }
}
