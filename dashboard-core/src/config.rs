use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    cities::DEFAULT_CITIES,
    dashboard::{MAX_BANNER_TTL, MAX_REFRESH_INTERVAL},
    geolocation::{DisabledPosition, FixedPosition, IpGeolocation, PositionOptions, PositionSource},
    model::Coordinates,
    provider::ProviderId,
};

/// Configuration for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override for the provider's API root, e.g. a proxy. For Open-Meteo
    /// this is the forecast host only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Open-Meteo city search host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocoding_url: Option<String>,

    /// Open-Meteo reverse geocoding host (Nominatim-compatible).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_geocoding_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeolocationConfig {
    pub enabled: bool,
    pub timeout_seconds: u64,
    pub high_accuracy: bool,

    /// Fixed position; when both are set no lookup is made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_seconds: 10,
            high_accuracy: true,
            latitude: None,
            longitude: None,
        }
    }
}

impl GeolocationConfig {
    pub fn options(&self) -> PositionOptions {
        PositionOptions {
            timeout: Duration::from_secs(self.timeout_seconds),
            high_accuracy: self.high_accuracy,
        }
    }

    /// The position source this configuration describes.
    pub fn source(&self) -> Result<Box<dyn PositionSource>> {
        if !self.enabled {
            return Ok(Box::new(DisabledPosition));
        }

        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Ok(Box::new(FixedPosition(Coordinates::new(lat, lon)))),
            (None, None) => Ok(Box::new(
                IpGeolocation::new().context("Failed to build IP geolocation client")?,
            )),
            _ => Err(anyhow!(
                "Geolocation config sets only one of latitude/longitude; set both or neither."
            )),
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Optional default provider id, e.g. "open-meteo" or "weatherapi".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,

    /// Cities every session starts with. Session edits are never written back.
    pub cities: Vec<String>,

    pub refresh_interval_minutes: u64,

    pub banner_ttl_seconds: u64,

    /// Example TOML:
    /// [providers.weatherapi]
    /// api_key = "..."
    pub providers: HashMap<String, ProviderConfig>,

    pub geolocation: GeolocationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: None,
            cities: DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
            refresh_interval_minutes: 30,
            banner_ttl_seconds: 5,
            providers: HashMap::new(),
            geolocation: GeolocationConfig::default(),
        }
    }
}

impl Config {
    /// The default provider; Open-Meteo when none is configured.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        match self.default_provider.as_deref() {
            Some(s) => ProviderId::try_from(s).with_context(|| {
                "Invalid `default_provider` in config.\n\
                 Hint: run `weather-dashboard configure <provider>` to pick a supported one."
            }),
            None => Ok(ProviderId::OpenMeteo),
        }
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// At least a minute, at most [`MAX_REFRESH_INTERVAL`].
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes.max(1).saturating_mul(60))
            .min(MAX_REFRESH_INTERVAL)
    }

    pub fn banner_ttl(&self) -> Duration {
        Duration::from_secs(self.banner_ttl_seconds).min(MAX_BANNER_TTL)
    }

    /// Load config from the platform location, or defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    /// Save config to the platform location, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-dashboard", "weather-dashboard")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace a provider API key; the first configured provider becomes the default.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .entry(provider_id.as_str().to_string())
            .or_default()
            .api_key = Some(api_key);

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id)?.api_key.as_deref()
    }

    pub fn provider_base_url(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id)?.base_url.as_deref()
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        !provider_id.requires_api_key() || self.provider_api_key(provider_id).is_some()
    }
}
