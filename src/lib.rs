//! Rust library for a wall-mounted climate control dashboard
//!
//! This library monitors and controls room climate units that expose a small
//! HTTP API. It supports:
//!
//! - Periodic status polling of each room's sensor and thermostat
//! - Optimistic thermostat power and target changes with rollback
//! - A rotary dial gesture model that maps drags to target temperatures
//! - A shared room store with change subscriptions
//! - Outdoor weather from open-meteo and a time-of-day accent color
//! - TOML configuration
//!
//! # Quick Start
//!
//! ```no_run
//! use climate_dash::{Dashboard, DashboardConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DashboardConfig::load_or_default();
//!     let mut dashboard = Dashboard::new(config)?;
//!
//!     // Poll every room now and every 10 minutes after that
//!     dashboard.start().await;
//!     tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
//!
//!     for room in dashboard.store().rooms().iter() {
//!         println!("{}: {}° {}%", room.name, room.temperature, room.humidity);
//!     }
//!
//!     // Turn the first room's dial down one degree
//!     if let Some(room) = dashboard.store().rooms().first() {
//!         dashboard.select(room.id);
//!         let mut control = dashboard.control(room.id)?;
//!         control.touch_start(0.0);
//!         control.touch_move(-88.0);
//!         control.release().await?;
//!     }
//!
//!     dashboard.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Direct Control
//!
//! A single room can be driven without the dashboard:
//!
//! ```no_run
//! use climate_dash::{
//!     HttpTransport, RetryConfig, Room, RoomStore, RoomSync, Thermostat, REQUEST_TIMEOUT,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RoomStore::new(vec![Room::new(
//!         1,
//!         "Living Room",
//!         "http://192.168.1.40",
//!         Thermostat::new(false, 26.0),
//!     )])?;
//!     let transport = Arc::new(HttpTransport::new(REQUEST_TIMEOUT)?);
//!     let sync = RoomSync::new(1, store.clone(), transport, RetryConfig::default());
//!
//!     sync.poll_status().await?;
//!     sync.set_power(true).await?;
//!     println!("updated: {}", sync.sync_stamp());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Dashboard**: Application root wiring everything below
//! - **Sync**: Per-room polling and optimistic commands
//! - **Store**: Room list, active selection and change notifications
//! - **Gesture / Codec**: Dial drag tracking and angle/temperature mapping
//! - **Transport**: HTTP seam to the room units
//! - **Protocol**: JSON bodies and URLs
//! - **Types**: Domain types and data structures

mod ambient;
mod codec;
mod command;
mod config;
mod dashboard;
mod error;
mod gesture;
mod periodic;
mod protocol;
mod store;
mod subscription;
mod sync;
mod transport;
mod types;
mod weather;

// Public exports
pub use ambient::AmbientColor;
pub use codec::{snap, DialCodec, DialLabel};
pub use command::ThermostatCommand;
pub use config::{
    DashboardConfig, DialConfig, LoggingConfig, PollingConfig, RetryConfig, RoomConfig,
    WeatherConfig,
};
pub use dashboard::{Dashboard, RoomControl};
pub use error::{ClimateError, Result};
pub use gesture::{
    DialCommit, DialPhase, DialTracker, DialUpdate, Haptics, NoHaptics, TapDetector,
    SETTLE_DURATION, TAP_MAX, TICK_PULSE,
};
pub use periodic::PeriodicTask;
pub use protocol::{CommandResponse, ForecastResponse, SensorData, StatusResponse};
pub use store::{RoomList, RoomStore};
pub use subscription::{StoreEvent, StoreReceiver};
pub use sync::{RoomSync, StatusPoller};
pub use transport::{HttpTransport, RoomTransport, REQUEST_TIMEOUT};
pub use types::{
    Celsius, Degrees, Percent, Room, RoomId, RoomPatch, SyncStamp, Thermostat, WeatherReading,
};
pub use weather::{WeatherClient, WeatherMonitor, WeatherSource};
