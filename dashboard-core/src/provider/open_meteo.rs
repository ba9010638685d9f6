use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    condition::Condition,
    error::WeatherError,
    model::{Coordinates, Forecast, ForecastDay, UNKNOWN_LOCATION_NAME, WeatherSnapshot, upcoming_days},
    provider::{ProviderId, parse_json, send, status_error},
};

use super::WeatherProvider;

pub const FORECAST_URL: &str = "https://api.open-meteo.com/v1";
pub const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1";
pub const REVERSE_GEOCODING_URL: &str = "https://nominatim.openstreetmap.org";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,pressure_msl,wind_speed_10m,weather_code";
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min";

/// Base URLs for the three services Open-Meteo lookups touch.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub forecast: String,
    pub geocoding: String,
    pub reverse_geocoding: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            forecast: FORECAST_URL.to_string(),
            geocoding: GEOCODING_URL.to_string(),
            reverse_geocoding: REVERSE_GEOCODING_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// All three services behind one host, e.g. a mock server.
    pub fn single_host(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            forecast: base.to_string(),
            geocoding: base.to_string(),
            reverse_geocoding: base.to_string(),
        }
    }
}

/// Keyless provider: geocode the name, then query by coordinates.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    endpoints: Endpoints,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_endpoints(Endpoints::default())
    }

    pub fn with_endpoints(endpoints: Endpoints) -> anyhow::Result<Self> {
        Ok(Self {
            endpoints,
            http: super::http_client()?,
        })
    }

    async fn geocode(&self, city: &str) -> Result<OmPlace, WeatherError> {
        let url = format!("{}/search", self.endpoints.geocoding);
        let request = self.http.get(url).query(&[
            ("name", city),
            ("count", "1"),
            ("language", "en"),
            ("format", "json"),
        ]);

        let (status, body) = send(request, ProviderId::OpenMeteo, "geocoding").await?;
        if !status.is_success() {
            tracing::debug!(city, %status, "geocoding rejected city");
            return Err(WeatherError::NotFound(city.to_string()));
        }

        let parsed: OmGeocodingResponse = parse_json(&body, ProviderId::OpenMeteo, "geocoding")?;
        parsed
            .results
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| WeatherError::NotFound(city.to_string()))
    }

    /// Name and country for a position; `None` on any failure.
    async fn reverse_geocode(&self, coordinates: Coordinates) -> Option<(String, String)> {
        let url = format!("{}/reverse", self.endpoints.reverse_geocoding);
        let request = self.http.get(url).query(&[
            ("lat", coordinates.latitude.to_string()),
            ("lon", coordinates.longitude.to_string()),
            ("format", "json".to_string()),
            ("zoom", "10".to_string()),
            ("addressdetails", "1".to_string()),
        ]);

        let (status, body) = match send(request, ProviderId::OpenMeteo, "reverse geocoding").await {
            Ok(res) => res,
            Err(e) => {
                tracing::warn!(%coordinates, error = %e, "reverse geocoding failed");
                return None;
            }
        };

        if !status.is_success() {
            tracing::warn!(%coordinates, %status, "reverse geocoding returned non-success status");
            return None;
        }

        let parsed: NominatimResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(%coordinates, error = %e, "reverse geocoding payload unreadable");
                return None;
            }
        };

        let address = parsed.address?;
        let country = address.country.clone().unwrap_or_default();
        let place = address
            .city
            .or(address.town)
            .or(address.village)
            .or(address.municipality)
            .or(address.county)
            .or(address.state)?;

        Some((place, country))
    }

    async fn forecast(
        &self,
        coordinates: Coordinates,
        blocks: &[(&str, &str)],
        what: &str,
    ) -> Result<OmForecastResponse, WeatherError> {
        let url = format!("{}/forecast", self.endpoints.forecast);
        let mut query = vec![
            ("latitude", coordinates.latitude.to_string()),
            ("longitude", coordinates.longitude.to_string()),
            ("timezone", "auto".to_string()),
        ];
        query.extend(blocks.iter().map(|(k, v)| (*k, v.to_string())));

        let (status, body) = send(self.http.get(url).query(&query), ProviderId::OpenMeteo, what).await?;
        if !status.is_success() {
            return Err(status_error(ProviderId::OpenMeteo, what, status, &body));
        }

        parse_json(&body, ProviderId::OpenMeteo, what)
    }

    async fn current_at(
        &self,
        coordinates: Coordinates,
        city_name: String,
        country_name: String,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let parsed = self
            .forecast(coordinates, &[("current", CURRENT_FIELDS)], "current weather")
            .await?;

        let current = parsed.current.ok_or_else(|| {
            WeatherError::upstream(
                ProviderId::OpenMeteo.as_str(),
                "current weather response has no `current` block",
            )
        })?;

        let condition = Condition::from_wmo_code(current.weather_code);

        Ok(WeatherSnapshot {
            city_name,
            country_name,
            temperature_c: current.temperature_2m,
            feels_like_c: current.apparent_temperature,
            humidity_pct: current.relative_humidity_2m.round().clamp(0.0, 100.0) as u8,
            pressure_hpa: current.pressure_msl,
            wind_kph: current.wind_speed_10m,
            condition_text: condition.text,
            icon: condition.icon,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OmGeocodingResponse {
    results: Option<Vec<OmPlace>>,
}

#[derive(Debug, Deserialize)]
struct OmPlace {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
}

impl OmPlace {
    fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    pressure_msl: Option<f64>,
    wind_speed_10m: f64,
    weather_code: i32,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<String>,
    weather_code: Vec<i32>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    current: Option<OmCurrent>,
    daily: Option<OmDaily>,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl OmDaily {
    fn into_days(self) -> Result<Vec<ForecastDay>, WeatherError> {
        let malformed = |msg: String| WeatherError::upstream(ProviderId::OpenMeteo.as_str(), msg);

        let len = self.time.len();
        if self.weather_code.len() != len
            || self.temperature_2m_max.len() != len
            || self.temperature_2m_min.len() != len
        {
            return Err(malformed("daily series have mismatched lengths".to_string()));
        }

        let mut days = Vec::with_capacity(len);
        for (i, date) in self.time.iter().enumerate() {
            let epoch_seconds = day_start_epoch(date)
                .ok_or_else(|| malformed(format!("unreadable forecast date '{date}'")))?;
            let max = self.temperature_2m_max[i];
            let min = self.temperature_2m_min[i];
            let condition = Condition::from_wmo_code(self.weather_code[i]);

            days.push(ForecastDay {
                epoch_seconds,
                temp_max_c: max,
                temp_min_c: min,
                temp_avg_c: (max + min) / 2.0,
                condition_text: condition.text,
                icon: condition.icon,
            });
        }

        Ok(days)
    }
}

/// Midnight UTC of a `YYYY-MM-DD` date.
fn day_start_epoch(date: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    async fn fetch_current(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        let place = self.geocode(city).await?;
        let coordinates = place.coordinates();
        self.current_at(coordinates, place.name, place.country.unwrap_or_default())
            .await
    }

    async fn fetch_forecast(&self, city: &str) -> Result<Forecast, WeatherError> {
        let place = self.geocode(city).await?;
        let parsed = self
            .forecast(
                place.coordinates(),
                &[("daily", DAILY_FIELDS), ("forecast_days", "4")],
                "forecast",
            )
            .await?;

        let daily = parsed.daily.ok_or_else(|| {
            WeatherError::upstream(
                ProviderId::OpenMeteo.as_str(),
                "forecast response has no `daily` block",
            )
        })?;

        let days = daily.into_days()?;
        let available = days.len();
        upcoming_days(days).ok_or_else(|| {
            WeatherError::upstream(
                ProviderId::OpenMeteo.as_str(),
                format!("forecast has {available} days, need today plus 3"),
            )
        })
    }

    async fn fetch_current_by_coordinates(
        &self,
        coordinates: Coordinates,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let mut snapshot = self
            .current_at(coordinates, UNKNOWN_LOCATION_NAME.to_string(), String::new())
            .await?;

        if let Some((name, country)) = self.reverse_geocode(coordinates).await {
            snapshot.city_name = name;
            snapshot.country_name = country;
        }

        Ok(snapshot)
    }
}
