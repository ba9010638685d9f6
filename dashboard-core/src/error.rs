use thiserror::Error;

/// Failures raised while adding a city to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a city name")]
    Blank,
    #[error("{0} is already in your dashboard")]
    Duplicate(String),
}

/// Failures of the platform position query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("Location access denied. Please allow location access.")]
    PermissionDenied,
    #[error("Location unavailable. Please try again.")]
    Unavailable,
    #[error("Location request timed out. Please try again.")]
    Timeout,
}

/// Everything a dashboard operation can surface as a banner.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// The city (or coordinates) could not be resolved by the provider.
    #[error("City not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status, transport failure or a payload we could not read.
    #[error("{provider} request failed: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },

    #[error(transparent)]
    Geolocation(#[from] GeolocationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl WeatherError {
    pub fn upstream(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
