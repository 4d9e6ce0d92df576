use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Room identifier
pub type RoomId = u32;

/// Temperature in degrees Celsius
pub type Celsius = f64;

/// Relative value in percent (humidity, memory usage)
pub type Percent = f64;

/// Dial rotation in degrees
pub type Degrees = f64;

/// Thermostat state embedded in a room
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thermostat {
    pub on: bool,

    /// Target temperature; the endpoints call this field `temperature`
    #[serde(rename = "temperature")]
    pub target_temperature: Celsius,
}

impl Thermostat {
    pub fn new(on: bool, target_temperature: Celsius) -> Self {
        Self {
            on,
            target_temperature,
        }
    }

    pub fn with_power(self, on: bool) -> Self {
        Self { on, ..self }
    }

    pub fn with_target(self, target_temperature: Celsius) -> Self {
        Self {
            target_temperature,
            ..self
        }
    }
}

/// A physical room with a sensor/thermostat unit behind an HTTP endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,

    /// Base URL of the room's unit, without trailing slash
    pub endpoint: String,

    // Last sensor reading
    pub temperature: Celsius,
    pub humidity: Percent,

    pub connected: bool,

    // Unit diagnostics
    pub cpu_temp: Celsius,
    pub memory_used: Percent,

    pub thermostat: Thermostat,
}

impl Room {
    /// Create a room with no readings yet
    pub fn new(
        id: RoomId,
        name: impl Into<String>,
        endpoint: impl Into<String>,
        thermostat: Thermostat,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            endpoint: endpoint.into(),
            temperature: 0.0,
            humidity: 0.0,
            connected: true,
            cpu_temp: 0.0,
            memory_used: 0.0,
            thermostat,
        }
    }

    /// Whether a sensor reading has arrived yet
    pub fn has_reading(&self) -> bool {
        self.temperature != 0.0 && self.humidity != 0.0
    }
}

/// Partial update of a room
///
/// Carries no `id`, so a patch can never change a room's identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomPatch {
    pub name: Option<String>,
    pub temperature: Option<Celsius>,
    pub humidity: Option<Percent>,
    pub connected: Option<bool>,
    pub cpu_temp: Option<Celsius>,
    pub memory_used: Option<Percent>,
    pub thermostat: Option<Thermostat>,
}

impl RoomPatch {
    /// Patch replacing only the thermostat
    pub fn thermostat(thermostat: Thermostat) -> Self {
        Self {
            thermostat: Some(thermostat),
            ..Self::default()
        }
    }

    /// Patch replacing only the connection flag
    pub fn connected(connected: bool) -> Self {
        Self {
            connected: Some(connected),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge this patch into `room`, returning the updated copy
    pub fn apply_to(&self, room: &Room) -> Room {
        let mut room = room.clone();
        if let Some(name) = &self.name {
            room.name = name.clone();
        }
        if let Some(temperature) = self.temperature {
            room.temperature = temperature;
        }
        if let Some(humidity) = self.humidity {
            room.humidity = humidity;
        }
        if let Some(connected) = self.connected {
            room.connected = connected;
        }
        if let Some(cpu_temp) = self.cpu_temp {
            room.cpu_temp = cpu_temp;
        }
        if let Some(memory_used) = self.memory_used {
            room.memory_used = memory_used;
        }
        if let Some(thermostat) = self.thermostat {
            room.thermostat = thermostat;
        }
        room
    }
}

/// The "updated:" indicator shown on every room card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStamp {
    #[default]
    Never,
    Syncing,
    At(DateTime<Local>),
    /// The request could not be completed
    RequestError,
    /// The endpoint answered with an error flag
    ResponseError,
}

impl SyncStamp {
    pub fn now() -> Self {
        SyncStamp::At(Local::now())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SyncStamp::RequestError | SyncStamp::ResponseError)
    }
}

impl fmt::Display for SyncStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStamp::Never => write!(f, "syncing"),
            SyncStamp::Syncing => write!(f, "syncing..."),
            SyncStamp::At(time) => write!(f, "{}", time.format("%H:%M:%S")),
            SyncStamp::RequestError => write!(f, "Request error"),
            SyncStamp::ResponseError => write!(f, "Response error"),
        }
    }
}

/// Current outdoor conditions
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature: Celsius,
    pub relative_humidity: Percent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn living_room() -> Room {
        Room::new(1, "Living Room", "http://10.0.0.5", Thermostat::new(false, 26.0))
    }

    #[test]
    fn test_patch_merges_only_present_fields() {
        let room = living_room();
        let patch = RoomPatch {
            temperature: Some(29.5),
            humidity: Some(71.0),
            ..RoomPatch::default()
        };

        let updated = patch.apply_to(&room);
        assert_eq!(updated.temperature, 29.5);
        assert_eq!(updated.humidity, 71.0);
        assert_eq!(updated.id, room.id);
        assert_eq!(updated.name, room.name);
        assert_eq!(updated.thermostat, room.thermostat);
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let room = living_room();
        assert!(RoomPatch::default().is_empty());
        assert_eq!(RoomPatch::default().apply_to(&room), room);
    }

    #[test]
    fn test_thermostat_wire_name() {
        let json = serde_json::to_value(Thermostat::new(true, 24.0)).unwrap();
        assert_eq!(json, serde_json::json!({ "on": true, "temperature": 24.0 }));
    }

    #[test]
    fn test_sync_stamp_strings() {
        assert_eq!(SyncStamp::Syncing.to_string(), "syncing...");
        assert_eq!(SyncStamp::RequestError.to_string(), "Request error");
        assert_eq!(SyncStamp::ResponseError.to_string(), "Response error");
        assert!(SyncStamp::ResponseError.is_error());
        assert!(!SyncStamp::now().is_error());
    }
}
