use crate::{
    Config, Coordinates, Forecast, WeatherError, WeatherSnapshot,
    provider::{open_meteo::OpenMeteoProvider, weatherapi::WeatherApiProvider},
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::{convert::TryFrom, fmt::Debug, sync::Arc, time::Duration};

pub mod open_meteo;
pub mod weatherapi;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("weather-dashboard/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenMeteo,
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "open-meteo",
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenMeteo, ProviderId::WeatherApi]
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::WeatherApi)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();

        match lower.as_str() {
            "open-meteo" | "openmeteo" => Ok(ProviderId::OpenMeteo),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: open-meteo, weatherapi."
            )),
        }
    }
}

/// One upstream weather API, normalized to the dashboard's shapes.
///
/// All operations are independent and side-effect free apart from the
/// outbound HTTP calls, so they can be issued concurrently.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// Current conditions for a city name.
    async fn fetch_current(&self, city: &str) -> Result<WeatherSnapshot, WeatherError>;

    /// The three days following today.
    async fn fetch_forecast(&self, city: &str) -> Result<Forecast, WeatherError>;

    /// Current conditions at a position. Naming the place is best-effort.
    async fn fetch_current_by_coordinates(
        &self,
        coordinates: Coordinates,
    ) -> Result<WeatherSnapshot, WeatherError>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::OpenMeteo => {
            let mut endpoints = open_meteo::Endpoints::default();
            if let Some(cfg) = config.provider_config(id) {
                let overrides = [
                    (&mut endpoints.forecast, &cfg.base_url),
                    (&mut endpoints.geocoding, &cfg.geocoding_url),
                    (&mut endpoints.reverse_geocoding, &cfg.reverse_geocoding_url),
                ];
                for (endpoint, url) in overrides {
                    if let Some(url) = url {
                        *endpoint = url.trim_end_matches('/').to_string();
                    }
                }
            }
            Arc::new(OpenMeteoProvider::with_endpoints(endpoints)?)
        }
        ProviderId::WeatherApi => {
            let api_key = config.provider_api_key(id).ok_or_else(|| {
                anyhow::anyhow!(
                    "No API key configured for provider '{id}'.\n\
                     Hint: run `weather-dashboard configure {id}` and enter your API key."
                )
            })?;
            let base_url = config.provider_base_url(id).unwrap_or(weatherapi::BASE_URL);
            Arc::new(WeatherApiProvider::with_base_url(api_key.to_owned(), base_url)?)
        }
    };

    Ok(provider)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

pub(crate) fn http_client() -> reqwest::Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
}

/// Send a request and read the whole body, whatever the status.
pub(crate) async fn send(
    request: RequestBuilder,
    provider: ProviderId,
    what: &str,
) -> Result<(StatusCode, String), WeatherError> {
    let res = request.send().await.map_err(|e| {
        WeatherError::upstream(provider.as_str(), format!("failed to send {what} request: {e}"))
    })?;

    let status = res.status();
    let body = res.text().await.map_err(|e| {
        WeatherError::upstream(
            provider.as_str(),
            format!("failed to read {what} response body: {e}"),
        )
    })?;

    tracing::debug!(%provider, what, %status, "upstream responded");
    Ok((status, body))
}

pub(crate) fn status_error(
    provider: ProviderId,
    what: &str,
    status: StatusCode,
    body: &str,
) -> WeatherError {
    WeatherError::upstream(
        provider.as_str(),
        format!("{what} returned status {status}: {}", truncate_body(body)),
    )
}

pub(crate) fn parse_json<T: DeserializeOwned>(
    body: &str,
    provider: ProviderId,
    what: &str,
) -> Result<T, WeatherError> {
    serde_json::from_str(body).map_err(|e| {
        WeatherError::upstream(provider.as_str(), format!("malformed {what} payload: {e}"))
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_id_is_case_insensitive() {
        assert_eq!(ProviderId::try_from("WeatherAPI").unwrap(), ProviderId::WeatherApi);
        assert_eq!(ProviderId::try_from("OpenMeteo").unwrap(), ProviderId::OpenMeteo);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn weatherapi_without_key_is_a_config_error() {
        let cfg = Config::default();
        let err = provider_from_config(ProviderId::WeatherApi, &cfg).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No API key configured for provider"));
        assert!(msg.contains("weather-dashboard configure weatherapi"));
    }

    #[test]
    fn open_meteo_needs_no_key() {
        let cfg = Config::default();
        let provider = provider_from_config(ProviderId::OpenMeteo, &cfg).expect("keyless provider");
        assert_eq!(provider.id(), ProviderId::OpenMeteo);
    }

    #[test]
    fn default_provider_is_open_meteo() {
        let cfg = Config::default();
        let provider = default_provider_from_config(&cfg).expect("default provider");
        assert_eq!(provider.id(), ProviderId::OpenMeteo);
    }

    #[test]
    fn default_provider_from_config_works_when_set_and_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "KEY".to_string());
        cfg.set_default_provider(ProviderId::WeatherApi);

        let provider = default_provider_from_config(&cfg).expect("configured provider");
        assert_eq!(provider.id(), ProviderId::WeatherApi);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(300);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
