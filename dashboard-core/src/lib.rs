//! Core library for the weather dashboard.
//!
//! This crate defines:
//! - Normalization of provider condition codes into icon categories
//! - Abstraction over weather providers (Open-Meteo, WeatherAPI.com)
//! - The tracked city list and the dashboard render-cycle state
//! - Geolocation lookup
//! - Configuration handling
//!
//! It is used by `dashboard-cli`, but has no terminal code of its own.

pub mod cities;
pub mod condition;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod provider;

pub use cities::CityList;
pub use condition::{Condition, IconCategory, describe_wmo_code};
pub use config::{Config, GeolocationConfig, ProviderConfig};
pub use dashboard::{
    Banner, CityOutcome, CityWeather, CycleReport, CycleState, Dashboard, RenderCycle,
    WeatherCard, render,
};
pub use error::{GeolocationError, ValidationError, WeatherError};
pub use geolocation::{
    DisabledPosition, FixedPosition, IpGeolocation, PositionOptions, PositionSource, locate,
    locate_weather,
};
pub use model::{Coordinates, Forecast, ForecastDay, WeatherSnapshot};
pub use provider::{ProviderId, WeatherProvider};
