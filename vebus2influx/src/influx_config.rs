use serde_derive::Deserialize;

fn default_port() -> u16 {
    8086
}

fn default_database() -> String {
    "bat".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfluxConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    /// grouping label every row is written under
    pub measurement: String,
    #[serde(default)]
    pub tls: bool,
}

impl InfluxConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}
