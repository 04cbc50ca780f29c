use serde::{Deserialize, Serialize};
use simplicity_core::NetworkError;

/// Offset between the Kelvin and Celsius scales
pub const KELVIN_OFFSET: f64 = 273.15;

/// Temperature display unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Fahrenheit for the United States, Celsius everywhere else
    /// (including readings without a country).
    pub fn for_country(country: &str) -> Self {
        if country == "US" {
            Self::Fahrenheit
        } else {
            Self::Celsius
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }

    /// Convert a Kelvin reading into this unit, unrounded
    pub fn convert_kelvin(&self, kelvin: f64) -> f64 {
        let celsius = kelvin - KELVIN_OFFSET;
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 1.8 + 32.0,
        }
    }
}

/// A rounded temperature ready for the watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Temperature {
    pub value: i64,
    pub unit: TemperatureUnit,
}

/// Round to the nearest integer, with halves going toward +∞ (-9.5 → -9).
pub fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

impl Temperature {
    pub fn from_kelvin(kelvin: f64, unit: TemperatureUnit) -> Self {
        Self {
            value: round_half_up(unit.convert_kelvin(kelvin)),
            unit,
        }
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\u{00B0}{}", self.value, self.unit.symbol())
    }
}

/// Resolved geographic position, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Current conditions as reported by the weather API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub city: String,
    /// Raw temperature in Kelvin
    pub kelvin: f64,
    /// ISO 3166-1 alpha-2 code, empty when the API omits it
    pub country: String,
}

impl WeatherReading {
    pub fn unit(&self) -> TemperatureUnit {
        TemperatureUnit::for_country(&self.country)
    }

    pub fn display_temperature(&self) -> Temperature {
        Temperature::from_kelvin(self.kelvin, self.unit())
    }
}

/// Location service errors
///
/// Codes follow the geolocation convention used by watch companion runtimes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("{0}")]
    PositionUnavailable(String),
    #[error("Location request timed out")]
    Timeout,
}

impl LocationError {
    pub fn code(&self) -> u8 {
        match self {
            Self::PermissionDenied => 1,
            Self::PositionUnavailable(_) => 2,
            Self::Timeout => 3,
        }
    }
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Weather API returned HTTP {status}")]
    Http { status: u16 },
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Malformed weather response: {0}")]
    MalformedResponse(String),
}
