use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::IconCategory;

/// Number of upcoming days every forecast carries.
pub const FORECAST_DAYS: usize = 3;

/// Placeholder name for a position that could not be reverse geocoded.
pub const UNKNOWN_LOCATION_NAME: &str = "Your Location";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Current conditions for one city, provider-agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city_name: String,
    pub country_name: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub pressure_hpa: Option<f64>,
    pub wind_kph: f64,
    pub condition_text: String,
    pub icon: IconCategory,
}

impl WeatherSnapshot {
    /// "London, United Kingdom", or just the city when the country is unknown.
    pub fn display_name(&self) -> String {
        if self.country_name.is_empty() {
            self.city_name.clone()
        } else {
            format!("{}, {}", self.city_name, self.country_name)
        }
    }
}

/// One upcoming day of the forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub epoch_seconds: i64,
    pub temp_max_c: f64,
    pub temp_min_c: f64,
    pub temp_avg_c: f64,
    pub condition_text: String,
    pub icon: IconCategory,
}

impl ForecastDay {
    pub fn date(&self) -> Option<NaiveDate> {
        DateTime::<Utc>::from_timestamp(self.epoch_seconds, 0).map(|dt| dt.date_naive())
    }
}

pub type Forecast = [ForecastDay; FORECAST_DAYS];

/// Drop "today" from an upstream daily series and keep the next three days.
///
/// Returns `None` when the series is too short.
pub fn upcoming_days(series: Vec<ForecastDay>) -> Option<Forecast> {
    let upcoming: Vec<ForecastDay> = series.into_iter().skip(1).take(FORECAST_DAYS).collect();
    upcoming.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(epoch_seconds: i64) -> ForecastDay {
        ForecastDay {
            epoch_seconds,
            temp_max_c: 10.0,
            temp_min_c: 2.0,
            temp_avg_c: 6.0,
            condition_text: "Overcast".into(),
            icon: IconCategory::Cloudy,
        }
    }

    #[test]
    fn upcoming_days_skips_today() {
        let series = (0..7).map(|i| day(i * 86_400)).collect();
        let forecast = upcoming_days(series).expect("enough days");
        let epochs: Vec<i64> = forecast.iter().map(|d| d.epoch_seconds).collect();
        assert_eq!(epochs, vec![86_400, 2 * 86_400, 3 * 86_400]);
    }

    #[test]
    fn upcoming_days_requires_four_entries() {
        let series = (0..3).map(|i| day(i * 86_400)).collect();
        assert!(upcoming_days(series).is_none());
        assert!(upcoming_days(Vec::new()).is_none());
    }

    #[test]
    fn forecast_day_date_is_utc() {
        // 2024-03-01T00:00:00Z
        let d = day(1_709_251_200);
        assert_eq!(d.date(), NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn display_name_without_country() {
        let snapshot = WeatherSnapshot {
            city_name: UNKNOWN_LOCATION_NAME.into(),
            country_name: String::new(),
            temperature_c: 0.0,
            feels_like_c: 0.0,
            humidity_pct: 0,
            pressure_hpa: None,
            wind_kph: 0.0,
            condition_text: String::new(),
            icon: IconCategory::Cloudy,
        };
        assert_eq!(snapshot.display_name(), "Your Location");
    }
}
