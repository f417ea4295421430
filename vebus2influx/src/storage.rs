use std::time::Duration;

use log::{debug, info, warn};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde_derive::Deserialize;
use thiserror::Error;

use crate::decoder::DataPoint;
use crate::influx_config::InfluxConfig;

static REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("storage unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("write rejected with {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Destination for decoded readings. Every point is written on its own.
pub trait Storage {
    fn write(&mut self, point: &DataPoint) -> Result<(), DeliveryError>;
}

fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Renders a point as a single InfluxDB line protocol row without timestamp.
pub fn line_protocol(point: &DataPoint) -> String {
    format!(
        "{} {}={}",
        escape(&point.measurement, &[',', ' ']),
        escape(&point.field, &[',', '=', ' ']),
        point.value
    )
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
}

#[derive(Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct Series {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

fn database_listed(response: &QueryResponse, database: &str) -> bool {
    response
        .results
        .iter()
        .flat_map(|result| result.series.iter())
        .flat_map(|series| series.values.iter())
        .any(|row| row.first().and_then(|name| name.as_str()) == Some(database))
}

/// InfluxDB 1.x over its HTTP API.
pub struct InfluxDb {
    client: Client,
    base_url: String,
    database: String,
    credentials: Option<(String, Option<String>)>,
}

impl InfluxDb {
    pub fn new(config: &InfluxConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let credentials = config
            .username
            .as_ref()
            .map(|username| (username.clone(), config.password.clone()));
        Ok(Self {
            client,
            base_url: config.base_url(),
            database: config.database.clone(),
            credentials,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, password.as_ref()),
            None => request,
        }
    }

    fn query(&self, statement: &str) -> anyhow::Result<QueryResponse> {
        let request = self
            .client
            .post(format!("{}/query", self.base_url))
            .form(&[("q", statement)]);
        let response = self.authorized(request).send()?.error_for_status()?;
        let response: QueryResponse = response.json()?;
        if let Some(error) = response.results.iter().find_map(|r| r.error.as_ref()) {
            anyhow::bail!("influxdb query {statement:?} failed: {error}");
        }
        Ok(response)
    }

    /// Creates the configured database unless it already exists.
    pub fn ensure_database(&self) -> anyhow::Result<()> {
        let databases = self.query("SHOW DATABASES")?;
        if database_listed(&databases, &self.database) {
            debug!("database {} exists", self.database);
            return Ok(());
        }
        info!("creating database {}", self.database);
        self.query(&format!(
            "CREATE DATABASE \"{}\"",
            escape(&self.database, &['"', '\\'])
        ))?;
        Ok(())
    }
}

impl Storage for InfluxDb {
    fn write(&mut self, point: &DataPoint) -> Result<(), DeliveryError> {
        let line = line_protocol(point);
        debug!("writing {line}");
        let request = self
            .client
            .post(format!("{}/write", self.base_url))
            .query(&[("db", self.database.as_str())])
            .body(line);
        let response = self.authorized(request).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().unwrap_or_else(|e| {
            warn!("could not read influxdb error response: {e}");
            String::new()
        });
        Err(DeliveryError::Rejected { status, body })
    }
}
