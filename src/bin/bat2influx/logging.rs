use env_logger::{Builder, Env};

// rumqttc logs every reconnect attempt at info
static DEFAULT_FILTER: &str = "info,rumqttc=warn,reqwest=warn";

pub fn init_logger() {
    Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
        .format_target(false)
        .init();
}
