// externally visible interfaces
pub mod bridge;
pub mod config;
pub mod decoder;
pub mod device;
pub mod influx_config;
pub mod mqtt_config;
pub mod mqtt_wrapper;
pub mod poller;
pub mod storage;
