use anyhow::bail;
use log::{debug, trace};
use regex::Regex;
use serde_json::Value;

/// One decoded reading, ready to be written to storage.
#[derive(Clone, Debug, PartialEq)]
pub struct DataPoint {
    pub measurement: String,
    pub field: String,
    pub value: f64,
}

/// A compiled topic rule. The single capture group yields the field name.
#[derive(Clone, Debug)]
pub struct TopicPattern {
    regex: Regex,
}

impl TopicPattern {
    /// Compiles `pattern`, anchored at the start of the topic.
    pub fn new(pattern: &str) -> anyhow::Result<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})"))?;
        // group 0 is the whole match
        if regex.captures_len() != 2 {
            bail!(
                "topic pattern {pattern} must have exactly one capture group, found {}",
                regex.captures_len() - 1
            );
        }
        Ok(Self { regex })
    }

    pub fn field<'t>(&self, topic: &'t str) -> Option<&'t str> {
        self.regex
            .captures(topic)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

// past this the f64 spacing is coarser than four decimals
static ROUNDING_LIMIT: f64 = 1e15;

/// Rounds to four decimal places, half away from zero.
pub fn round4(value: f64) -> f64 {
    if value.abs() >= ROUNDING_LIMIT {
        return value;
    }
    (value * 10_000.0).round() / 10_000.0
}

fn coerce(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        // Venus OS publishes a few numeric values as strings
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Maps `(topic, payload)` to a [`DataPoint`].
///
/// Patterns are tried in the order given, the first one matching wins. Fields
/// in the exclusion list are dropped before the payload is looked at. Holds no
/// mutable state, so one decoder can be shared freely.
pub struct Decoder {
    measurement: String,
    patterns: Vec<TopicPattern>,
    excluded_fields: Vec<String>,
}

impl Decoder {
    pub fn new(
        measurement: impl Into<String>,
        patterns: Vec<TopicPattern>,
        excluded_fields: Vec<String>,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            patterns,
            excluded_fields,
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    fn match_field<'t>(&self, topic: &'t str) -> Option<&'t str> {
        self.patterns.iter().find_map(|pattern| pattern.field(topic))
    }

    pub fn decode(&self, topic: &str, payload: &[u8]) -> Option<DataPoint> {
        let Some(field) = self.match_field(topic) else {
            trace!("ignoring unmatched topic {topic}");
            return None;
        };

        if self.excluded_fields.iter().any(|excluded| excluded == field) {
            trace!("dropping excluded field {field}");
            return None;
        }

        let reading: Value = match serde_json::from_slice(payload) {
            Ok(reading) => reading,
            Err(e) => {
                debug!("malformed payload on {topic}: {e}");
                return None;
            }
        };
        let Some(reading) = reading.as_object() else {
            debug!("payload on {topic} is not an object");
            return None;
        };

        let Some(value) = reading.get("value").and_then(coerce) else {
            debug!("no numeric value on {topic}");
            return None;
        };

        Some(DataPoint {
            measurement: self.measurement.clone(),
            field: field.to_string(),
            value: round4(value),
        })
    }
}
