//! Current-position lookup for the "use my location" action.
//!
//! A [`PositionSource`] answers one question: where are we? [`locate`]
//! puts a deadline on it, and [`locate_weather`] turns the answer into a
//! snapshot the dashboard can track.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    Coordinates, GeolocationError, WeatherError, WeatherProvider, WeatherSnapshot, provider,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const IP_GEOLOCATION_URL: &str = "http://ip-api.com/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub timeout: Duration,
    pub high_accuracy: bool,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            high_accuracy: true,
        }
    }
}

#[async_trait]
pub trait PositionSource: Send + Sync + Debug {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, GeolocationError>;
}

/// Ask `source` for a position, giving up after `options.timeout`.
pub async fn locate(
    source: &dyn PositionSource,
    options: &PositionOptions,
) -> Result<Coordinates, GeolocationError> {
    match tokio::time::timeout(options.timeout, source.current_position(options)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout = ?options.timeout, "position request timed out");
            Err(GeolocationError::Timeout)
        }
    }
}

/// Locate, then fetch current conditions at that position.
pub async fn locate_weather(
    source: &dyn PositionSource,
    weather: &dyn WeatherProvider,
    options: &PositionOptions,
) -> Result<WeatherSnapshot, WeatherError> {
    let coordinates = locate(source, options).await?;
    tracing::info!(%coordinates, "located");
    weather.fetch_current_by_coordinates(coordinates).await
}

/// Position pinned in configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinates);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        Ok(self.0)
    }
}

/// Geolocation switched off by the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPosition;

#[async_trait]
impl PositionSource for DisabledPosition {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::PermissionDenied)
    }
}

/// Coarse position from the public IP address.
#[derive(Debug, Clone)]
pub struct IpGeolocation {
    url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

impl IpGeolocation {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_url(IP_GEOLOCATION_URL)
    }

    pub fn with_url(url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            url: url.to_string(),
            http: provider::http_client()?,
        })
    }
}

#[async_trait]
impl PositionSource for IpGeolocation {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        if options.high_accuracy {
            tracing::debug!("IP lookup is city-level at best; high accuracy not available");
        }

        let res = self.http.get(&self.url).send().await.map_err(|e| {
            tracing::warn!(error = %e, "IP geolocation request failed");
            GeolocationError::Unavailable
        })?;

        if !res.status().is_success() {
            tracing::warn!(status = %res.status(), "IP geolocation returned non-success status");
            return Err(GeolocationError::Unavailable);
        }

        let body: IpApiResponse = res.json().await.map_err(|e| {
            tracing::warn!(error = %e, "IP geolocation payload unreadable");
            GeolocationError::Unavailable
        })?;

        match (body.status.as_str(), body.lat, body.lon) {
            ("success", Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => {
                tracing::warn!(status = %body.status, message = ?body.message, "IP geolocation failed");
                Err(GeolocationError::Unavailable)
            }
        }
    }
}
