use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    condition::IconCategory,
    error::WeatherError,
    model::{Coordinates, Forecast, ForecastDay, UNKNOWN_LOCATION_NAME, WeatherSnapshot, upcoming_days},
    provider::{ProviderId, parse_json, send, status_error},
};

use super::WeatherProvider;

pub const BASE_URL: &str = "https://api.weatherapi.com/v1";

/// WeatherAPI.com error code for "No matching location found."
const NO_MATCHING_LOCATION: i64 = 1006;

/// Today plus the three days the dashboard shows.
const FORECAST_DAYS_REQUESTED: &str = "4";

/// Free keys get at most this many forecast days, whatever `days` asks for.
const FREE_PLAN_FORECAST_DAYS: usize = 3;

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: super::http_client()?,
        })
    }

    async fn get(
        &self,
        endpoint: &str,
        query: &str,
        extra: &[(&str, &str)],
        what: &str,
    ) -> Result<String, WeatherError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let request = self
            .http
            .get(url)
            .query(&[("key", self.api_key.as_str()), ("q", query)])
            .query(extra);

        let (status, body) = send(request, ProviderId::WeatherApi, what).await?;
        if status.is_success() {
            return Ok(body);
        }

        if is_unknown_location(status, &body) {
            return Err(WeatherError::NotFound(query.to_string()));
        }
        Err(status_error(ProviderId::WeatherApi, what, status, &body))
    }

    async fn current(&self, query: &str) -> Result<WaCurrentResponse, WeatherError> {
        let body = self
            .get("current.json", query, &[("aqi", "no")], "current weather")
            .await?;
        parse_json(&body, ProviderId::WeatherApi, "current weather")
    }
}

fn is_unknown_location(status: StatusCode, body: &str) -> bool {
    if status != StatusCode::BAD_REQUEST {
        return false;
    }
    serde_json::from_str::<WaErrorResponse>(body)
        .map(|e| e.error.code == NO_MATCHING_LOCATION)
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    feelslike_c: f64,
    humidity: u8,
    pressure_mb: Option<f64>,
    wind_kph: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaCurrentResponse {
    location: WaLocation,
    current: WaCurrent,
}

impl From<WaCurrentResponse> for WeatherSnapshot {
    fn from(res: WaCurrentResponse) -> Self {
        let icon = IconCategory::from_text(&res.current.condition.text);
        WeatherSnapshot {
            city_name: res.location.name,
            country_name: res.location.country,
            temperature_c: res.current.temp_c,
            feels_like_c: res.current.feelslike_c,
            humidity_pct: res.current.humidity,
            pressure_hpa: res.current.pressure_mb,
            wind_kph: res.current.wind_kph,
            condition_text: res.current.condition.text,
            icon,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    avgtemp_c: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date_epoch: i64,
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    forecast: WaForecast,
}

impl From<WaForecastDay> for ForecastDay {
    fn from(entry: WaForecastDay) -> Self {
        let icon = IconCategory::from_text(&entry.day.condition.text);
        ForecastDay {
            epoch_seconds: entry.date_epoch,
            temp_max_c: entry.day.maxtemp_c,
            temp_min_c: entry.day.mintemp_c,
            temp_avg_c: entry.day.avgtemp_c,
            condition_text: entry.day.condition.text,
            icon,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WaApiError {
    code: i64,
}

#[derive(Debug, Deserialize)]
struct WaErrorResponse {
    error: WaApiError,
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn fetch_current(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        self.current(city).await.map(WeatherSnapshot::from)
    }

    async fn fetch_forecast(&self, city: &str) -> Result<Forecast, WeatherError> {
        let body = self
            .get(
                "forecast.json",
                city,
                &[("days", FORECAST_DAYS_REQUESTED), ("aqi", "no"), ("alerts", "no")],
                "forecast",
            )
            .await?;

        let parsed: WaForecastResponse = parse_json(&body, ProviderId::WeatherApi, "forecast")?;
        let days: Vec<ForecastDay> = parsed
            .forecast
            .forecastday
            .into_iter()
            .map(ForecastDay::from)
            .collect();

        let available = days.len();
        upcoming_days(days).ok_or_else(|| {
            let hint = if available == FREE_PLAN_FORECAST_DAYS {
                " (the free WeatherAPI.com plan stops at 3 days; a paid plan is needed)"
            } else {
                ""
            };
            WeatherError::upstream(
                ProviderId::WeatherApi.as_str(),
                format!("forecast has {available} days, need today plus 3{hint}"),
            )
        })
    }

    async fn fetch_current_by_coordinates(
        &self,
        coordinates: Coordinates,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let query = coordinates.to_string();
        let mut snapshot = match self.current(&query).await {
            Ok(res) => WeatherSnapshot::from(res),
            Err(WeatherError::NotFound(_)) => {
                return Err(WeatherError::upstream(
                    ProviderId::WeatherApi.as_str(),
                    format!("no weather for position {query}"),
                ));
            }
            Err(e) => return Err(e),
        };

        // The location block doubles as reverse geocoding; it can come back blank.
        if snapshot.city_name.trim().is_empty() {
            tracing::warn!(%coordinates, "weatherapi returned no place name");
            snapshot.city_name = UNKNOWN_LOCATION_NAME.to_string();
            snapshot.country_name.clear();
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_location_is_detected_from_error_body() {
        let body = r#"{"error":{"code":1006,"message":"No matching location found."}}"#;
        assert!(is_unknown_location(StatusCode::BAD_REQUEST, body));
    }

    #[test]
    fn other_errors_are_not_unknown_location() {
        let bad_key = r#"{"error":{"code":2006,"message":"API key is invalid."}}"#;
        assert!(!is_unknown_location(StatusCode::UNAUTHORIZED, bad_key));
        assert!(!is_unknown_location(StatusCode::BAD_REQUEST, bad_key));
        assert!(!is_unknown_location(StatusCode::BAD_REQUEST, "not json"));
    }

    #[test]
    fn forecast_day_classifies_condition_text() {
        let entry = WaForecastDay {
            date_epoch: 1_709_251_200,
            day: WaDay {
                maxtemp_c: 12.0,
                mintemp_c: 4.0,
                avgtemp_c: 7.5,
                condition: WaCondition {
                    text: "Patchy rain possible".into(),
                },
            },
        };
        let day = ForecastDay::from(entry);
        assert_eq!(day.icon, IconCategory::Rainy);
        assert_eq!(day.temp_avg_c, 7.5);
    }
}
