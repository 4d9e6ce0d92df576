use crate::error::{ClimateError, Result};
use crate::types::{Celsius, Degrees, Room, RoomId, Thermostat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure, read from a TOML file
///
/// Every section is optional and falls back to the values the wall panel
/// ships with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub rooms: Vec<RoomConfig>,
    pub dial: DialConfig,
    pub polling: PollingConfig,
    pub retry: RetryConfig,
    pub weather: WeatherConfig,
    pub logging: LoggingConfig,
}

/// One configured room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub id: RoomId,
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub thermostat_on: bool,
    #[serde(default = "default_target")]
    pub target_temperature: Celsius,
}

fn default_target() -> Celsius {
    26.0
}

impl RoomConfig {
    /// Seed room built from this entry
    pub fn to_room(&self) -> Room {
        Room::new(
            self.id,
            self.name.clone(),
            self.endpoint.clone(),
            Thermostat::new(self.thermostat_on, self.target_temperature),
        )
    }
}

/// Thermostat dial geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialConfig {
    /// Degrees of rotation per whole degree of temperature
    pub degrees_per_unit: Degrees,
    pub min_temperature: Celsius,
    pub max_temperature: Celsius,
    /// Commit / label step
    pub major_step: Degrees,
    /// Haptic tick step
    pub minor_step: Degrees,
    /// Degrees of rotation per pixel of vertical drag
    pub sensitivity: f64,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            degrees_per_unit: 15.0,
            min_temperature: 11.0,
            max_temperature: 34.0,
            major_step: 15.0,
            minor_step: 3.0,
            sensitivity: 0.17,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub status_interval_secs: u64,
    pub weather_interval_secs: u64,
    pub ambient_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl PollingConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn weather_interval(&self) -> Duration {
        Duration::from_secs(self.weather_interval_secs)
    }

    pub fn ambient_interval(&self) -> Duration {
        Duration::from_secs(self.ambient_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            status_interval_secs: 10 * 60,
            weather_interval_secs: 30 * 60,
            ambient_interval_secs: 5 * 60,
            request_timeout_secs: crate::transport::REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// Retry policy for failed status polls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Delay before retry number `retry` (starting at 0): doubles each time,
    /// capped at `max_delay_ms`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let millis = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub enabled: bool,
    pub base_url: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            latitude: 9.004831,
            longitude: 79.579566,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `climate_dash=debug`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Load and validate configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DashboardConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the first readable default location, or fall back to
    /// built-in defaults
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("dashboard.toml"),
            PathBuf::from("dashboard.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::warn!("No config file found, using defaults");
        Self::default().with_default_room()
    }

    /// Add the stock living room when no rooms are configured
    pub fn with_default_room(mut self) -> Self {
        if self.rooms.is_empty() {
            self.rooms.push(RoomConfig {
                id: 1,
                name: "Living Room".to_string(),
                endpoint: "http://climate.local".to_string(),
                thermostat_on: false,
                target_temperature: default_target(),
            });
        }
        self
    }

    /// Check room ids, dial geometry and polling intervals
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for room in &self.rooms {
            if !seen.insert(room.id) {
                return Err(ClimateError::DuplicateRoom(room.id));
            }
            if room.endpoint.trim().is_empty() {
                return Err(ClimateError::InvalidConfig(format!(
                    "room {} has an empty endpoint",
                    room.id
                )));
            }
        }

        let dial = &self.dial;
        if dial.degrees_per_unit <= 0.0 || dial.major_step <= 0.0 || dial.minor_step <= 0.0 {
            return Err(ClimateError::InvalidConfig(
                "dial steps must be positive".to_string(),
            ));
        }
        if dial.min_temperature > dial.max_temperature {
            return Err(ClimateError::InvalidConfig(
                "dial min_temperature is above max_temperature".to_string(),
            ));
        }

        let polling = &self.polling;
        for (name, secs) in [
            ("status_interval_secs", polling.status_interval_secs),
            ("weather_interval_secs", polling.weather_interval_secs),
            ("ambient_interval_secs", polling.ambient_interval_secs),
            ("request_timeout_secs", polling.request_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ClimateError::InvalidConfig(format!(
                    "polling {} must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Seed rooms for the store
    pub fn seed_rooms(&self) -> Vec<Room> {
        self.rooms.iter().map(RoomConfig::to_room).collect()
    }
}
