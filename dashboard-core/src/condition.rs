//! Normalization of provider condition codes and texts.
//!
//! Providers either hand us free text ("Patchy light rain") or a WMO
//! weather code (Open-Meteo). Both end up as a description plus one of a
//! fixed set of icon buckets.

use serde::{Deserialize, Serialize};

/// Visual condition bucket used for display regardless of provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IconCategory {
    Sunny,
    PartlyCloudy,
    #[default]
    Cloudy,
    Rainy,
    Snowy,
    Thunderstorm,
    Foggy,
    Windy,
}

impl IconCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sunny => "sunny",
            Self::PartlyCloudy => "partly-cloudy",
            Self::Cloudy => "cloudy",
            Self::Rainy => "rainy",
            Self::Snowy => "snowy",
            Self::Thunderstorm => "thunderstorm",
            Self::Foggy => "foggy",
            Self::Windy => "windy",
        }
    }

    /// Single-glyph rendering for terminals.
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Sunny => "☀",
            Self::PartlyCloudy => "⛅",
            Self::Cloudy => "☁",
            Self::Rainy => "☂",
            Self::Snowy => "❄",
            Self::Thunderstorm => "⚡",
            Self::Foggy => "≡",
            Self::Windy => "~",
        }
    }

    /// Classify free condition text. Case-insensitive, first match wins.
    pub fn from_text(text: &str) -> Self {
        let text = text.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

        // "partly cloudy" must never land in Cloudy or Sunny.
        if has(&["partly cloudy"]) {
            Self::PartlyCloudy
        } else if has(&["sunny", "clear"]) {
            Self::Sunny
        } else if has(&["partly"]) {
            Self::PartlyCloudy
        } else if has(&["cloudy", "overcast"]) {
            Self::Cloudy
        } else if has(&["rain", "drizzle", "shower"]) {
            Self::Rainy
        } else if has(&["snow", "sleet"]) {
            Self::Snowy
        } else if has(&["thunder", "storm"]) {
            Self::Thunderstorm
        } else if has(&["fog", "mist"]) {
            Self::Foggy
        } else if has(&["wind", "breezy"]) {
            Self::Windy
        } else {
            Self::default()
        }
    }
}

impl std::fmt::Display for IconCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description for a WMO weather code, or "Unknown".
/// See: https://open-meteo.com/en/docs#weathervariables
pub fn describe_wmo_code(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

/// Canonical condition: display text plus icon bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub text: String,
    pub icon: IconCategory,
}

impl Condition {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let icon = IconCategory::from_text(&text);
        Self { text, icon }
    }

    pub fn from_wmo_code(code: i32) -> Self {
        match describe_wmo_code(code) {
            "Unknown" => Self {
                text: "Unknown".to_string(),
                icon: IconCategory::default(),
            },
            description => Self::from_text(description),
        }
    }
}
