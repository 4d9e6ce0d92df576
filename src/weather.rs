use crate::config::WeatherConfig;
use crate::error::Result;
use crate::periodic::PeriodicTask;
use crate::protocol::ForecastResponse;
use crate::types::WeatherReading;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of current outdoor conditions
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self) -> Result<WeatherReading>;
}

/// open-meteo forecast client
#[derive(Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    config: WeatherConfig,
}

impl WeatherClient {
    pub fn new(config: WeatherConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    /// Forecast URL asking for current temperature and humidity
    pub fn forecast_url(&self) -> String {
        format!(
            "{}?latitude={}&longitude={}&current=temperature_2m,relative_humidity_2m&timeformat=unixtime",
            self.config.base_url, self.config.latitude, self.config.longitude
        )
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn current(&self) -> Result<WeatherReading> {
        let url = self.forecast_url();
        tracing::debug!("GET {}", url);
        let response: ForecastResponse = self.client.get(&url).send().await?.json().await?;
        Ok(response.into())
    }
}

/// Keeps the latest weather reading, refreshed in the background
pub struct WeatherMonitor {
    source: Arc<dyn WeatherSource>,
    latest: Arc<Mutex<Option<WeatherReading>>>,
    loading: Arc<AtomicBool>,
    task: Option<PeriodicTask>,
}

impl WeatherMonitor {
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self {
            source,
            latest: Arc::new(Mutex::new(None)),
            loading: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Last successful reading
    pub fn latest(&self) -> Option<WeatherReading> {
        *self.latest.lock()
    }

    /// Whether a refresh is in progress
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Fetch now. A failure keeps the previous reading.
    pub async fn refresh(&self) -> Result<WeatherReading> {
        refresh(&self.source, &self.latest, &self.loading).await
    }

    /// Refresh right away and then every `interval`
    pub async fn start(&mut self, interval: Duration) {
        self.stop().await;

        let source = self.source.clone();
        let latest = self.latest.clone();
        let loading = self.loading.clone();
        self.task = Some(PeriodicTask::spawn("Weather polling", interval, move || {
            let source = source.clone();
            let latest = latest.clone();
            let loading = loading.clone();
            async move {
                let _ = refresh(&source, &latest, &loading).await;
            }
        }));
    }

    pub async fn stop(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.stop().await;
        }
    }
}

async fn refresh(
    source: &Arc<dyn WeatherSource>,
    latest: &Mutex<Option<WeatherReading>>,
    loading: &AtomicBool,
) -> Result<WeatherReading> {
    loading.store(true, Ordering::SeqCst);
    let result = source.current().await;
    loading.store(false, Ordering::SeqCst);

    match result {
        Ok(reading) => {
            tracing::debug!(
                "Weather: {}C, {}%",
                reading.temperature,
                reading.relative_humidity
            );
            *latest.lock() = Some(reading);
            Ok(reading)
        }
        Err(e) => {
            tracing::warn!("Failed to get weather: {}", e);
            Err(e)
        }
    }
}
