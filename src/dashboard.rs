use crate::ambient::AmbientColor;
use crate::codec::DialCodec;
use crate::config::DashboardConfig;
use crate::error::{ClimateError, Result};
use crate::gesture::{
    DialCommit, DialTracker, DialUpdate, Haptics, NoHaptics, TapDetector, SETTLE_DURATION,
    TICK_PULSE,
};
use crate::periodic::PeriodicTask;
use crate::store::RoomStore;
use crate::subscription::StoreReceiver;
use crate::sync::{RoomSync, StatusPoller};
use crate::transport::{HttpTransport, RoomTransport};
use crate::types::{Room, RoomId, SyncStamp, WeatherReading};
use crate::weather::{WeatherClient, WeatherMonitor, WeatherSource};
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// The climate control wall panel
///
/// Owns the room store, one sync client per room, the weather monitor and
/// the ambient color. Nothing runs in the background until [`start`] is
/// called.
///
/// # Example
///
/// ```no_run
/// use climate_dash::{Dashboard, DashboardConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DashboardConfig::load("config/dashboard.toml")?;
///     let mut dashboard = Dashboard::new(config)?;
///     dashboard.start().await;
///
///     let mut events = dashboard.subscribe();
///     while let Ok(event) = events.recv().await {
///         println!("{:?}", event);
///     }
///
///     dashboard.stop().await;
///     Ok(())
/// }
/// ```
///
/// [`start`]: Dashboard::start
pub struct Dashboard {
    config: DashboardConfig,
    codec: DialCodec,
    store: RoomStore,
    syncs: BTreeMap<RoomId, Arc<RoomSync>>,
    pollers: Vec<StatusPoller>,
    weather: Option<WeatherMonitor>,
    ambient: Arc<Mutex<AmbientColor>>,
    ambient_task: Option<PeriodicTask>,
    haptics: Arc<dyn Haptics>,
    tap: TapDetector,
    pressed_room: Option<RoomId>,
}

impl Dashboard {
    /// Build a dashboard talking to the configured units over HTTP
    pub fn new(config: DashboardConfig) -> Result<Self> {
        let timeout = config.polling.request_timeout();
        let transport: Arc<dyn RoomTransport> = Arc::new(HttpTransport::new(timeout)?);
        let weather: Option<Arc<dyn WeatherSource>> = if config.weather.enabled {
            Some(Arc::new(WeatherClient::new(config.weather.clone(), timeout)?))
        } else {
            None
        };
        Self::with_sources(config, transport, weather)
    }

    /// Build a dashboard on top of the given transport and weather source
    pub fn with_sources(
        config: DashboardConfig,
        transport: Arc<dyn RoomTransport>,
        weather: Option<Arc<dyn WeatherSource>>,
    ) -> Result<Self> {
        config.validate()?;
        let store = RoomStore::new(config.seed_rooms())?;

        let mut syncs = BTreeMap::new();
        let mut pollers = Vec::new();
        for room in &config.rooms {
            let sync = Arc::new(RoomSync::new(
                room.id,
                store.clone(),
                transport.clone(),
                config.retry,
            ));
            pollers.push(StatusPoller::new(sync.clone(), config.polling.status_interval()));
            syncs.insert(room.id, sync);
        }

        tracing::info!("Dashboard with {} room(s)", syncs.len());

        Ok(Self {
            codec: DialCodec::new(config.dial),
            config,
            store,
            syncs,
            pollers,
            weather: weather.map(WeatherMonitor::new),
            ambient: Arc::new(Mutex::new(AmbientColor::now())),
            ambient_task: None,
            haptics: Arc::new(NoHaptics),
            tap: TapDetector::new(),
            pressed_room: None,
        })
    }

    /// Use a real vibration motor
    pub fn with_haptics(mut self, haptics: Arc<dyn Haptics>) -> Self {
        self.haptics = haptics;
        self
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn codec(&self) -> &DialCodec {
        &self.codec
    }

    pub fn store(&self) -> &RoomStore {
        &self.store
    }

    pub fn subscribe(&self) -> StoreReceiver {
        self.store.subscribe()
    }

    /// Sync client of one room
    pub fn room_sync(&self, id: RoomId) -> Option<Arc<RoomSync>> {
        self.syncs.get(&id).cloned()
    }

    fn sync_for(&self, id: RoomId) -> Result<Arc<RoomSync>> {
        self.room_sync(id).ok_or(ClimateError::RoomNotFound(id))
    }

    /// "updated:" indicator of a room
    pub fn sync_stamp(&self, id: RoomId) -> Option<SyncStamp> {
        self.syncs.get(&id).map(|sync| sync.sync_stamp())
    }

    pub fn is_syncing(&self, id: RoomId) -> bool {
        self.syncs.get(&id).is_some_and(|sync| sync.is_syncing())
    }

    /// Latest outdoor reading, if any arrived yet
    pub fn weather(&self) -> Option<WeatherReading> {
        self.weather.as_ref().and_then(WeatherMonitor::latest)
    }

    pub fn weather_loading(&self) -> bool {
        self.weather.as_ref().is_some_and(WeatherMonitor::is_loading)
    }

    pub fn ambient(&self) -> AmbientColor {
        *self.ambient.lock()
    }

    /// Start room polling, weather polling and the ambient color timer
    pub async fn start(&mut self) {
        for poller in &mut self.pollers {
            poller.start().await;
        }

        let weather_interval = self.config.polling.weather_interval();
        if let Some(weather) = &mut self.weather {
            weather.start(weather_interval).await;
        }

        if let Some(mut task) = self.ambient_task.take() {
            task.stop().await;
        }
        let ambient = self.ambient.clone();
        self.ambient_task = Some(PeriodicTask::spawn(
            "Ambient color",
            self.config.polling.ambient_interval(),
            move || {
                let ambient = ambient.clone();
                async move {
                    let color = AmbientColor::now();
                    tracing::debug!("Ambient color {}", color);
                    *ambient.lock() = color;
                }
            },
        ));

        tracing::info!("Dashboard started");
    }

    /// Stop every background task
    pub async fn stop(&mut self) {
        for poller in &mut self.pollers {
            poller.stop().await;
        }
        if let Some(weather) = &mut self.weather {
            weather.stop().await;
        }
        if let Some(mut task) = self.ambient_task.take() {
            task.stop().await;
        }
        tracing::info!("Dashboard stopped");
    }

    pub fn is_running(&self) -> bool {
        self.pollers.iter().any(StatusPoller::is_running)
            || self.ambient_task.as_ref().is_some_and(PeriodicTask::is_running)
    }

    /// Poll one room now
    pub async fn refresh(&self, id: RoomId) -> Result<()> {
        self.sync_for(id)?.poll_status().await
    }

    /// Poll one room on a background task
    pub fn refresh_in_background(&self, id: RoomId) -> Result<()> {
        let sync = self.sync_for(id)?;
        tokio::spawn(async move {
            if let Err(e) = sync.poll_status().await {
                tracing::warn!("Refresh of room {} failed: {}", sync.room_id(), e);
            }
        });
        Ok(())
    }

    /// Poll every room concurrently, returning each room's outcome
    pub async fn refresh_all(&self) -> Vec<(RoomId, Result<()>)> {
        let polls = self.syncs.iter().map(|(id, sync)| {
            let sync = sync.clone();
            let id = *id;
            async move { (id, sync.poll_status().await) }
        });
        join_all(polls).await
    }

    /// Flip a room's thermostat power
    pub async fn toggle_power(&self, id: RoomId) -> Result<()> {
        let room = self.store.room(id).ok_or(ClimateError::RoomNotFound(id))?;
        self.sync_for(id)?.set_power(!room.thermostat.on).await
    }

    /// Touch down on a room card
    pub fn press_room(&mut self, id: RoomId, at: Instant) {
        if self.store.active_room_id() == Some(id) {
            return;
        }
        self.pressed_room = Some(id);
        self.tap.press(at);
    }

    /// Touch up on a room card. A tap on an inactive card makes it the
    /// active room; returns whether that happened.
    pub fn release_room(&mut self, id: RoomId, at: Instant) -> bool {
        let pressed = self.pressed_room.take();
        let tapped = self.tap.release(at);
        if pressed != Some(id) || !tapped || self.store.active_room_id() == Some(id) {
            return false;
        }
        self.select(id)
    }

    /// Make `id` the active room without a gesture
    pub fn select(&self, id: RoomId) -> bool {
        match self.store.select_room(Some(id)) {
            Some(room) => {
                self.haptics.pulse(TICK_PULSE);
                tracing::debug!("Selected {}", room.name);
                true
            }
            None => false,
        }
    }

    /// Leave the full-screen room
    pub fn back(&self) {
        self.store.select_room(None);
    }

    pub fn active_room(&self) -> Option<Room> {
        self.store.active_room()
    }

    /// Dial control for a room
    pub fn control(&self, id: RoomId) -> Result<RoomControl> {
        let sync = self.sync_for(id)?;
        let room = self.store.room(id).ok_or(ClimateError::RoomNotFound(id))?;
        let mut tracker = DialTracker::new(self.codec, room.thermostat.target_temperature);
        tracker.set_active(self.store.active_room_id() == Some(id));
        Ok(RoomControl {
            tracker,
            sync,
            store: self.store.clone(),
            haptics: self.haptics.clone(),
            released_at: None,
        })
    }
}

/// The thermostat dial of one room, wired to its sync client
///
/// Drag ticks vibrate; a release commits the snapped temperature.
pub struct RoomControl {
    tracker: DialTracker,
    sync: Arc<RoomSync>,
    store: RoomStore,
    haptics: Arc<dyn Haptics>,
    released_at: Option<Instant>,
}

impl RoomControl {
    pub fn room_id(&self) -> RoomId {
        self.sync.room_id()
    }

    pub fn tracker(&self) -> &DialTracker {
        &self.tracker
    }

    pub fn sync(&self) -> Arc<RoomSync> {
        self.sync.clone()
    }

    pub fn set_active(&mut self, active: bool) {
        self.tracker.set_active(active);
    }

    pub fn touch_start(&mut self, y: f64) -> bool {
        self.tracker.start(y)
    }

    pub fn touch_move(&mut self, y: f64) -> Option<DialUpdate> {
        let update = self.tracker.move_to(y)?;
        for _ in 0..update.ticks {
            self.haptics.pulse(TICK_PULSE);
        }
        Some(update)
    }

    /// End the drag without sending anything
    pub fn touch_end(&mut self) -> Option<DialCommit> {
        let commit = self.tracker.end()?;
        self.released_at = Some(Instant::now());
        Some(commit)
    }

    /// End the drag and send the committed temperature
    ///
    /// When the command fails the store is rolled back and the dial
    /// follows it.
    pub async fn release(&mut self) -> Result<Option<DialCommit>> {
        let Some(commit) = self.touch_end() else {
            return Ok(None);
        };
        match self.sync.set_temperature(commit.temperature).await {
            Ok(_) => Ok(Some(commit)),
            Err(e) => {
                self.follow_store();
                Err(e)
            }
        }
    }

    /// Advance the settle animation
    pub fn tick(&mut self, now: Instant) {
        if let Some(released) = self.released_at {
            if now.saturating_duration_since(released) >= SETTLE_DURATION {
                self.tracker.settle_elapsed();
                self.released_at = None;
            }
        }
    }

    /// Reset the dial to the room's current target unless a drag is in
    /// progress. Returns whether the dial moved.
    pub fn follow_store(&mut self) -> bool {
        match self.store.room(self.room_id()) {
            Some(room) => self.tracker.sync_external(room.thermostat.target_temperature),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoomConfig;
    use crate::gesture::DialPhase;
    use crate::transport::mock::{command_failed, healthy_status, Call, MockTransport};
    use crate::types::{RoomPatch, Thermostat};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingHaptics(AtomicUsize);

    impl Haptics for CountingHaptics {
        fn pulse(&self, _duration: Duration) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config() -> DashboardConfig {
        let room = |id: RoomId, name: &str| RoomConfig {
            id,
            name: name.to_string(),
            endpoint: format!("http://10.0.0.{}", id),
            thermostat_on: false,
            target_temperature: 26.0,
        };
        DashboardConfig {
            rooms: vec![room(1, "Living Room"), room(2, "Master Bedroom")],
            ..DashboardConfig::default()
        }
    }

    fn dashboard() -> (Dashboard, Arc<MockTransport>, Arc<CountingHaptics>) {
        let transport = Arc::new(MockTransport::new());
        let haptics = Arc::new(CountingHaptics::default());
        let dashboard = Dashboard::with_sources(config(), transport.clone(), None)
            .unwrap()
            .with_haptics(haptics.clone());
        (dashboard, transport, haptics)
    }

    fn pulses(haptics: &CountingHaptics) -> usize {
        haptics.0.load(Ordering::SeqCst)
    }

    #[test]
    fn test_duplicate_rooms_rejected() {
        let mut config = config();
        config.rooms[1].id = 1;
        let result = Dashboard::with_sources(config, Arc::new(MockTransport::new()), None);
        assert!(matches!(result, Err(ClimateError::DuplicateRoom(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_polls_every_room() {
        let (mut dashboard, transport, _) = dashboard();
        transport.push_status(Ok(healthy_status(28.0, 70.0, Thermostat::new(false, 26.0))));
        transport.push_status(Ok(healthy_status(25.0, 60.0, Thermostat::new(true, 22.0))));

        dashboard.start().await;
        assert!(dashboard.is_running());
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut calls = transport.calls();
        calls.sort_by_key(|call| format!("{:?}", call));
        assert_eq!(
            calls,
            vec![
                Call::Status("http://10.0.0.1".to_string()),
                Call::Status("http://10.0.0.2".to_string()),
            ]
        );

        dashboard.stop().await;
        assert!(!dashboard.is_running());
    }

    #[tokio::test]
    async fn test_refresh_all() {
        let (dashboard, transport, _) = dashboard();
        for _ in 0..2 {
            transport.push_status(Ok(healthy_status(27.0, 65.0, Thermostat::new(false, 26.0))));
        }

        let results = dashboard.refresh_all().await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, result)| result.is_ok()));
        assert!(dashboard.store().rooms().iter().all(|room| room.temperature == 27.0));
    }

    #[tokio::test]
    async fn test_refresh_unknown_room() {
        let (dashboard, _, _) = dashboard();
        assert!(matches!(dashboard.refresh(9).await, Err(ClimateError::RoomNotFound(9))));
    }

    #[test]
    fn test_tap_selects_room() {
        let (mut dashboard, _, haptics) = dashboard();
        let t0 = Instant::now();

        dashboard.press_room(2, t0);
        assert!(dashboard.release_room(2, t0 + Duration::from_millis(100)));
        assert_eq!(dashboard.active_room().unwrap().id, 2);
        assert_eq!(pulses(&haptics), 1);

        // the active card ignores taps
        dashboard.press_room(2, t0);
        assert!(!dashboard.release_room(2, t0 + Duration::from_millis(100)));
        assert_eq!(pulses(&haptics), 1);

        dashboard.back();
        assert_eq!(dashboard.active_room(), None);
    }

    #[test]
    fn test_long_press_does_not_select() {
        let (mut dashboard, _, haptics) = dashboard();
        let t0 = Instant::now();

        dashboard.press_room(1, t0);
        assert!(!dashboard.release_room(1, t0 + Duration::from_millis(400)));

        // press on one card, release on another
        dashboard.press_room(1, t0);
        assert!(!dashboard.release_room(2, t0 + Duration::from_millis(50)));

        assert_eq!(dashboard.active_room(), None);
        assert_eq!(pulses(&haptics), 0);
    }

    #[tokio::test]
    async fn test_drag_sets_temperature() {
        let (dashboard, transport, haptics) = dashboard();
        dashboard.select(1);
        let before = pulses(&haptics);

        let mut control = dashboard.control(1).unwrap();
        assert!(control.tracker().is_active());
        assert!(control.touch_start(0.0));
        // -88px * 0.17 = -14.96 degrees, one major step down
        for y in 1..=88 {
            control.touch_move(-(y as f64));
        }
        // minor boundaries at 223.5, 220.5, 217.5, 214.5 and 211.5
        assert_eq!(pulses(&haptics), before + 5);

        let commit = control.release().await.unwrap().unwrap();
        assert_eq!(commit.temperature, 25.0);
        assert_eq!(
            transport.calls(),
            vec![Call::Temperature("http://10.0.0.1".to_string(), 25.0)]
        );
        assert_eq!(
            dashboard.store().room(1).unwrap().thermostat,
            Thermostat::new(false, 25.0)
        );

        assert_eq!(control.tracker().phase(), DialPhase::Settling);
        control.tick(Instant::now() + SETTLE_DURATION);
        assert_eq!(control.tracker().phase(), DialPhase::Idle);

        // one 9 degree jump crosses three minor boundaries
        let before = pulses(&haptics);
        assert!(control.touch_start(0.0));
        let update = control.touch_move(9.0 / 0.17).unwrap();
        assert_eq!(update.ticks, 3);
        assert_eq!(pulses(&haptics), before + 3);
    }

    #[tokio::test]
    async fn test_failed_release_restores_dial() {
        let (dashboard, transport, _) = dashboard();
        dashboard.select(1);
        transport.push_command(Ok(command_failed()));

        let mut control = dashboard.control(1).unwrap();
        control.touch_start(0.0);
        control.touch_move(-88.0);

        assert!(control.release().await.is_err());
        assert_eq!(dashboard.store().room(1).unwrap().thermostat.target_temperature, 26.0);
        assert_eq!(control.tracker().emphasized_temperature(), Some(26.0));
    }

    #[test]
    fn test_inactive_control_ignores_drag() {
        let (dashboard, _, _) = dashboard();
        let mut control = dashboard.control(2).unwrap();
        assert!(!control.touch_start(0.0));
        assert_eq!(control.touch_move(100.0), None);
        assert_eq!(control.touch_end(), None);
    }

    #[test]
    fn test_control_follows_external_change() {
        let (dashboard, _, _) = dashboard();
        let mut control = dashboard.control(1).unwrap();
        dashboard
            .store()
            .update_room(1, &RoomPatch::thermostat(Thermostat::new(true, 20.0)));
        assert!(control.follow_store());
        assert_eq!(control.tracker().emphasized_temperature(), Some(20.0));
    }

    #[tokio::test]
    async fn test_toggle_power() {
        let (dashboard, transport, _) = dashboard();
        dashboard.toggle_power(2).await.unwrap();
        assert!(dashboard.store().room(2).unwrap().thermostat.on);
        assert_eq!(transport.calls(), vec![Call::Power("http://10.0.0.2".to_string(), 26.0)]);
        assert!(matches!(dashboard.sync_stamp(2), Some(SyncStamp::At(_))));
    }
}
