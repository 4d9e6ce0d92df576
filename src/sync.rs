use crate::command::ThermostatCommand;
use crate::config::RetryConfig;
use crate::error::{ClimateError, Result};
use crate::periodic::PeriodicTask;
use crate::protocol::CommandResponse;
use crate::store::RoomStore;
use crate::transport::RoomTransport;
use crate::types::{Celsius, Room, RoomId, RoomPatch, SyncStamp};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Keeps one room in the store in step with its unit
///
/// Commands are optimistic: the store changes before the request is sent
/// and is rolled back if the request fails or the unit reports an error.
/// Calls are not serialized; overlapping calls apply in completion order.
pub struct RoomSync {
    room_id: RoomId,
    store: RoomStore,
    transport: Arc<dyn RoomTransport>,
    retry: RetryConfig,
    stamp: Mutex<SyncStamp>,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight counter when dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RoomSync {
    pub fn new(
        room_id: RoomId,
        store: RoomStore,
        transport: Arc<dyn RoomTransport>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            room_id,
            store,
            transport,
            retry,
            stamp: Mutex::new(SyncStamp::Never),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// The "updated:" indicator
    pub fn sync_stamp(&self) -> SyncStamp {
        *self.stamp.lock()
    }

    /// Whether any request for this room is outstanding
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    fn room(&self) -> Result<Room> {
        self.store
            .room(self.room_id)
            .ok_or(ClimateError::RoomNotFound(self.room_id))
    }

    fn set_stamp(&self, stamp: SyncStamp) {
        *self.stamp.lock() = stamp;
    }

    fn begin(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.set_stamp(SyncStamp::Syncing);
        InFlight(&self.in_flight)
    }

    /// Fetch the unit's status and apply it
    ///
    /// Readings flagged as errors are never applied. Failed polls are
    /// retried with doubling delays up to the configured limit; on giving
    /// up the last error is returned.
    pub async fn poll_status(&self) -> Result<()> {
        let room = self.room()?;
        let _in_flight = self.begin();

        let mut retry = 0;
        loop {
            match self.fetch_status(&room.endpoint).await {
                Ok(patch) => {
                    self.store.update_room(self.room_id, &patch);
                    self.set_stamp(SyncStamp::now());
                    tracing::debug!("Synced room {} ({})", room.name, self.room_id);
                    return Ok(());
                }
                Err(e) if retry < self.retry.max_retries => {
                    let delay = self.retry.delay_for(retry);
                    tracing::warn!(
                        "Error getting status of {}: {}. Trying again in {:?}",
                        room.name,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "Giving up on status of {} after {} attempt(s): {}",
                        room.name,
                        retry + 1,
                        e
                    );
                    if e.is_transport() {
                        self.store
                            .update_room(self.room_id, &RoomPatch::connected(false));
                        self.set_stamp(SyncStamp::RequestError);
                    } else {
                        self.set_stamp(SyncStamp::ResponseError);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// One status request, turned into a patch if the reading is usable
    async fn fetch_status(&self, endpoint: &str) -> Result<RoomPatch> {
        let cache_bust = chrono::Utc::now().timestamp_millis();
        let status = self.transport.status(endpoint, cache_bust).await?;

        if let Some(detail) = status.error_message() {
            return Err(ClimateError::ApiError { detail });
        }
        if let Some(detail) = status.sensor_error_message() {
            return Err(ClimateError::SensorError { detail });
        }
        let sensor = status.sensor_data.unwrap_or_default();

        Ok(RoomPatch {
            temperature: Some(sensor.temperature),
            humidity: Some(sensor.humidity),
            connected: Some(true),
            cpu_temp: Some(status.cpu_temp),
            memory_used: Some(status.memory_used),
            thermostat: status.thermostat,
            ..RoomPatch::default()
        })
    }

    /// Switch the thermostat on or off
    ///
    /// The power command carries the current target temperature.
    pub async fn set_power(&self, on: bool) -> Result<()> {
        let room = self.room()?;
        let _in_flight = self.begin();

        let command = ThermostatCommand::power(self.room_id, room.thermostat, on);
        command.apply(&self.store);
        tracing::info!("Turning {} {}", room.name, if on { "on" } else { "off" });

        let result = self
            .transport
            .power(&room.endpoint, room.thermostat.target_temperature)
            .await;
        self.settle(&command, result)
    }

    /// Change the target temperature
    ///
    /// Returns `Ok(false)` without touching anything when `target` is
    /// already the target.
    pub async fn set_temperature(&self, target: Celsius) -> Result<bool> {
        let room = self.room()?;
        let command = ThermostatCommand::target(self.room_id, room.thermostat, target);
        if command.is_noop() {
            return Ok(false);
        }

        let _in_flight = self.begin();
        command.apply(&self.store);
        tracing::info!("Setting {} to {}", room.name, target);

        let result = self.transport.temperature(&room.endpoint, target).await;
        self.settle(&command, result).map(|_| true)
    }

    /// Confirm or roll back an applied command
    fn settle(&self, command: &ThermostatCommand, result: Result<CommandResponse>) -> Result<()> {
        let outcome = result.and_then(|response| match response.error_message() {
            Some(detail) => Err(ClimateError::ApiError { detail }),
            None => Ok(()),
        });

        match outcome {
            Ok(()) => {
                self.set_stamp(SyncStamp::now());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Command for room {} failed: {}", self.room_id, e);
                command.revert(&self.store);
                self.set_stamp(if e.is_transport() {
                    SyncStamp::RequestError
                } else {
                    SyncStamp::ResponseError
                });
                Err(e)
            }
        }
    }
}

/// Background polling of one room
///
/// Polls once right away, then every `interval`.
pub struct StatusPoller {
    sync: Arc<RoomSync>,
    interval: Duration,
    task: Option<PeriodicTask>,
}

impl StatusPoller {
    pub fn new(sync: Arc<RoomSync>, interval: Duration) -> Self {
        Self {
            sync,
            interval,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(PeriodicTask::is_running)
    }

    /// Start polling. A running poller is restarted.
    pub async fn start(&mut self) {
        self.stop().await;

        let sync = self.sync.clone();
        let label = format!("Status polling of room {}", sync.room_id());
        self.task = Some(PeriodicTask::spawn(label, self.interval, move || {
            let sync = sync.clone();
            async move {
                if let Err(e) = sync.poll_status().await {
                    tracing::warn!("Scheduled poll of room {} failed: {}", sync.room_id(), e);
                }
            }
        }));
    }

    pub async fn stop(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StatusResponse;
    use crate::transport::mock::{command_failed, command_ok, healthy_status, Call, MockTransport};
    use crate::types::Thermostat;

    const ENDPOINT: &str = "http://10.0.0.5";

    fn setup(thermostat: Thermostat) -> (RoomStore, Arc<MockTransport>, Arc<RoomSync>) {
        let store = RoomStore::new(vec![Room::new(1, "Living Room", ENDPOINT, thermostat)]).unwrap();
        let transport = Arc::new(MockTransport::new());
        let sync = Arc::new(RoomSync::new(
            1,
            store.clone(),
            transport.clone(),
            RetryConfig::default(),
        ));
        (store, transport, sync)
    }

    fn bad_status(value: serde_json::Value) -> StatusResponse {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_poll_applies_reading() {
        let (store, transport, sync) = setup(Thermostat::new(false, 26.0));
        transport.push_status(Ok(healthy_status(28.5, 74.0, Thermostat::new(true, 24.0))));
        let mut rx = store.subscribe();

        sync.poll_status().await.unwrap();

        let room = store.room(1).unwrap();
        assert_eq!(room.temperature, 28.5);
        assert_eq!(room.humidity, 74.0);
        assert_eq!(room.cpu_temp, 51.2);
        assert_eq!(room.memory_used, 43.0);
        assert_eq!(room.thermostat, Thermostat::new(true, 24.0));
        assert!(matches!(sync.sync_stamp(), SyncStamp::At(_)));
        assert!(!sync.is_syncing());
        assert_eq!(transport.calls(), vec![Call::Status(ENDPOINT.to_string())]);

        // one atomic update
        assert_eq!(rx.drain().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_is_not_applied_and_retried() {
        let (store, transport, sync) = setup(Thermostat::new(false, 26.0));
        transport.push_status(Ok(bad_status(serde_json::json!({
            "error": "i2c bus busy",
            "cpu_temp": 99.0,
            "memory_used": 99.0,
            "sensor_data": { "temperature": 99.0, "humidity": 99.0 },
            "thermostat": { "on": true, "temperature": 30 }
        }))));
        transport.push_status(Ok(bad_status(serde_json::json!({
            "sensor_data": { "error": "checksum", "temperature": 98.0, "humidity": 98.0 }
        }))));
        transport.push_status(Ok(healthy_status(27.0, 70.0, Thermostat::new(false, 26.0))));

        let started = tokio::time::Instant::now();
        sync.poll_status().await.unwrap();

        assert_eq!(transport.call_count(), 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
        let room = store.room(1).unwrap();
        assert_eq!(room.temperature, 27.0);
        assert_eq!(room.thermostat, Thermostat::new(false, 26.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_gives_up_after_retries() {
        let (store, transport, sync) = setup(Thermostat::new(false, 26.0));
        for _ in 0..4 {
            transport.push_status(Ok(bad_status(serde_json::json!({ "error": true }))));
        }
        let before = store.rooms();

        let started = tokio::time::Instant::now();
        let err = sync.poll_status().await.unwrap_err();

        assert!(matches!(err, ClimateError::ApiError { .. }));
        assert_eq!(transport.call_count(), 4);
        assert!(started.elapsed() >= Duration::from_secs(7));
        assert_eq!(sync.sync_stamp(), SyncStamp::ResponseError);
        assert!(Arc::ptr_eq(&before, &store.rooms()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_unit_is_marked_disconnected() {
        let (store, transport, sync) = setup(Thermostat::new(false, 26.0));
        for _ in 0..4 {
            transport.push_status(Err(ClimateError::Timeout));
        }

        assert!(sync.poll_status().await.is_err());
        assert_eq!(sync.sync_stamp(), SyncStamp::RequestError);
        assert!(!store.room(1).unwrap().connected);

        transport.push_status(Ok(healthy_status(27.0, 70.0, Thermostat::new(false, 26.0))));
        sync.poll_status().await.unwrap();
        assert!(store.room(1).unwrap().connected);
    }

    #[tokio::test]
    async fn test_set_power_success() {
        let (store, transport, sync) = setup(Thermostat::new(false, 26.0));
        transport.push_command(Ok(command_ok()));

        sync.set_power(true).await.unwrap();

        assert_eq!(store.room(1).unwrap().thermostat, Thermostat::new(true, 26.0));
        assert!(matches!(sync.sync_stamp(), SyncStamp::At(_)));
        assert_eq!(transport.calls(), vec![Call::Power(ENDPOINT.to_string(), 26.0)]);
    }

    #[tokio::test]
    async fn test_set_power_request_error_reverts() {
        let (store, transport, sync) = setup(Thermostat::new(false, 26.0));
        transport.push_command(Err(ClimateError::ConnectionClosed));

        let err = sync.set_power(true).await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(store.room(1).unwrap().thermostat, Thermostat::new(false, 26.0));
        assert_eq!(sync.sync_stamp(), SyncStamp::RequestError);
        assert_eq!(sync.sync_stamp().to_string(), "Request error");
    }

    #[tokio::test]
    async fn test_set_power_response_error_reverts() {
        let (store, transport, sync) = setup(Thermostat::new(true, 24.0));
        transport.push_command(Ok(command_failed()));

        assert!(sync.set_power(false).await.is_err());

        assert_eq!(store.room(1).unwrap().thermostat, Thermostat::new(true, 24.0));
        assert_eq!(sync.sync_stamp().to_string(), "Response error");
    }

    #[tokio::test]
    async fn test_set_temperature_same_value_is_noop() {
        let (store, transport, sync) = setup(Thermostat::new(false, 26.0));
        let before = store.rooms();

        assert!(!sync.set_temperature(26.0).await.unwrap());

        assert_eq!(transport.call_count(), 0);
        assert!(Arc::ptr_eq(&before, &store.rooms()));
        assert_eq!(sync.sync_stamp(), SyncStamp::Never);
    }

    #[tokio::test]
    async fn test_set_temperature_success() {
        let (store, transport, sync) = setup(Thermostat::new(true, 26.0));

        assert!(sync.set_temperature(22.0).await.unwrap());

        assert_eq!(store.room(1).unwrap().thermostat, Thermostat::new(true, 22.0));
        assert_eq!(transport.calls(), vec![Call::Temperature(ENDPOINT.to_string(), 22.0)]);
        assert!(matches!(sync.sync_stamp(), SyncStamp::At(_)));
    }

    #[tokio::test]
    async fn test_set_temperature_failure_restores_thermostat() {
        for failure in [Err(ClimateError::Timeout), Ok(command_failed())] {
            let (store, transport, sync) = setup(Thermostat::new(true, 26.0));
            transport.push_command(failure);

            assert!(sync.set_temperature(19.0).await.is_err());
            assert_eq!(store.room(1).unwrap().thermostat, Thermostat::new(true, 26.0));
            assert!(sync.sync_stamp().is_error());
        }
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let (store, transport, _) = setup(Thermostat::new(false, 26.0));
        let sync = RoomSync::new(9, store, transport.clone(), RetryConfig::default());
        assert!(matches!(sync.set_power(true).await, Err(ClimateError::RoomNotFound(9))));
        assert!(matches!(sync.poll_status().await, Err(ClimateError::RoomNotFound(9))));
        assert_eq!(transport.call_count(), 0);
        assert_eq!(sync.sync_stamp(), SyncStamp::Never);
        assert!(!sync.is_syncing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_runs_on_interval() {
        let (_store, transport, sync) = setup(Thermostat::new(false, 26.0));
        for _ in 0..3 {
            transport.push_status(Ok(healthy_status(27.0, 70.0, Thermostat::new(false, 26.0))));
        }

        let mut poller = StatusPoller::new(sync, Duration::from_secs(600));
        poller.start().await;

        sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.call_count(), 1);

        sleep(Duration::from_secs(600)).await;
        assert_eq!(transport.call_count(), 2);

        poller.stop().await;
        assert!(!poller.is_running());

        sleep(Duration::from_secs(1200)).await;
        assert_eq!(transport.call_count(), 2);
    }
}
