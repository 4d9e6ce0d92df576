use crate::types::{Celsius, Percent, Thermostat, WeatherReading};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response of `GET {endpoint}/status`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default)]
    pub cpu_temp: Celsius,
    #[serde(default)]
    pub memory_used: Percent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_data: Option<SensorData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thermostat: Option<Thermostat>,
}

/// Nested sensor reading of a status response
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SensorData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default)]
    pub temperature: Celsius,
    #[serde(default)]
    pub humidity: Percent,
}

/// Response of the `power` and `temp` commands
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommandResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl StatusResponse {
    /// Top-level error detail, if the flag is set
    pub fn error_message(&self) -> Option<String> {
        error_detail(self.error.as_ref())
    }

    /// Sensor error detail, if the nested flag is set or the reading is missing
    pub fn sensor_error_message(&self) -> Option<String> {
        match &self.sensor_data {
            Some(sensor) => error_detail(sensor.error.as_ref()),
            None => Some("no sensor data".to_string()),
        }
    }
}

impl CommandResponse {
    /// Error detail, if the flag is set
    pub fn error_message(&self) -> Option<String> {
        error_detail(self.error.as_ref())
    }
}

/// Interpret an `error` field the way the units emit it: any truthy value
/// is an error, a string carries its own detail
pub fn error_detail(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("error".to_string()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

/// Response of the open-meteo forecast endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub current: CurrentConditions,
}

/// `current` block of a forecast response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_2m: Celsius,
    pub relative_humidity_2m: Percent,
}

impl From<ForecastResponse> for WeatherReading {
    fn from(response: ForecastResponse) -> Self {
        WeatherReading {
            temperature: response.current.temperature_2m,
            relative_humidity: response.current.relative_humidity_2m,
        }
    }
}

fn base(endpoint: &str) -> &str {
    endpoint.trim_end_matches('/')
}

/// `{endpoint}/status?t={cache_bust}`
pub fn status_url(endpoint: &str, cache_bust: i64) -> String {
    format!("{}/status?t={}", base(endpoint), cache_bust)
}

/// `{endpoint}/power/{target}`
pub fn power_url(endpoint: &str, target: Celsius) -> String {
    format!("{}/power/{}", base(endpoint), target)
}

/// `{endpoint}/temp/{target}`
pub fn temperature_url(endpoint: &str, target: Celsius) -> String {
    format!("{}/temp/{}", base(endpoint), target)
}
