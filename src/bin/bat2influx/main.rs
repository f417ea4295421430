mod logging;
mod rumqttc_wrapper;

use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use log::info;
use rumqttc_wrapper::RumqttcWrapper;
use vebus2influx::bridge::Bridge;
use vebus2influx::config::Config;
use vebus2influx::decoder::Decoder;
use vebus2influx::mqtt_wrapper::MqttWrapper;
use vebus2influx::poller::PollScheduler;
use vebus2influx::storage::InfluxDb;

static CONFIG_FILE: &str = "config.toml";

// explicit argument first, then the current working dir, then next to the executable
fn config_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::args_os().nth(1) {
        return Ok(PathBuf::from(path));
    }

    let mut path = std::env::current_dir().context("can't retrieve current dir")?;
    path.push(CONFIG_FILE);
    if !path.exists() {
        info!("{} does not exist. Trying relative path", path.display());
        path = std::env::current_exe().context("unable to get current executable path")?;
        path.pop();
        path.push(CONFIG_FILE);
    }
    Ok(path)
}

fn main() -> anyhow::Result<()> {
    logging::init_logger();
    info!("Running revision: {}", env!("GIT_HASH"));

    let path = config_path()?;
    info!("loading configuration from {}", path.display());
    let config = Config::load(&path)?;

    info!("device serial: {}", config.device.serial);
    info!(
        "storing into {}/{} as measurement {:?}",
        config.influxdb.base_url(),
        config.influxdb.database,
        config.influxdb.measurement
    );

    let storage = InfluxDb::new(&config.influxdb)?;
    storage
        .ensure_database()
        .context("could not prepare influxdb database")?;

    let decoder = Decoder::new(
        config.influxdb.measurement.clone(),
        config.device.topic_patterns()?,
        config.device.excluded_fields.clone(),
    );

    info!("connecting to mqtt broker {}:{}", config.mqtt.host, config.mqtt.port());
    let (client, inbound) = RumqttcWrapper::new(&config.mqtt, "");

    let scheduler = PollScheduler::new(config.device.poll_targets(), config.poll.soc_divisor);
    let poll_client = client.clone();
    let interval = config.poll.interval();
    thread::spawn(move || scheduler.run(poll_client, interval));

    Bridge::new(decoder, storage, client, config.device.subscriptions()).run(inbound);
    Ok(())
}
