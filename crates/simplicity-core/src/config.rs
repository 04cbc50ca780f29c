use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Environment variable that overrides `weather.api_key`.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Smallest device inbox that can still carry the longest error message.
pub const MIN_INBOX_SIZE: usize = 24;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    #[serde(skip, default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Weather provider settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Location service settings
    #[serde(default)]
    pub location: LocationConfig,

    /// Paired device settings
    #[serde(default)]
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL of the OpenWeatherMap-compatible API
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    /// API key sent as `appid` (can be set via environment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Interval between unsolicited refreshes in minutes (0 disables)
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,
}

fn default_weather_base_url() -> String {
    "http://api.openweathermap.org".to_string()
}

fn default_refresh_minutes() -> u32 {
    30
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            api_key: None,
            refresh_minutes: default_refresh_minutes(),
        }
    }
}

impl WeatherConfig {
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.refresh_minutes {
            0 => None,
            m => Some(Duration::from_secs(u64::from(m) * 60)),
        }
    }
}

/// Where position fixes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationSourceKind {
    /// Coordinates from `location.latitude` / `location.longitude`
    Fixed,
    /// Approximate position of the host's public IP address
    #[default]
    Ip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default)]
    pub source: LocationSourceKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    /// Base URL of the IP geolocation service
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,

    /// Give up on a position request after this many milliseconds
    #[serde(default = "default_location_timeout_ms")]
    pub timeout_ms: u64,

    /// Reuse a previous fix if it is younger than this many milliseconds
    #[serde(default = "default_maximum_age_ms")]
    pub maximum_age_ms: u64,
}

fn default_ip_lookup_url() -> String {
    "http://ip-api.com".to_string()
}

fn default_location_timeout_ms() -> u64 {
    15_000
}

fn default_maximum_age_ms() -> u64 {
    60_000
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            source: LocationSourceKind::default(),
            latitude: None,
            longitude: None,
            ip_lookup_url: default_ip_lookup_url(),
            timeout_ms: default_location_timeout_ms(),
            maximum_age_ms: default_maximum_age_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Size in bytes of the watch's AppMessage inbox
    #[serde(default = "default_inbox_size")]
    pub inbox_size: usize,

    /// Capacity of the outbound message channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_inbox_size() -> usize {
    64
}

fn default_channel_capacity() -> usize {
    8
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            inbox_size: default_inbox_size(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("simplicity")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            weather: WeatherConfig::default(),
            location: LocationConfig::default(),
            device: DeviceConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing defaults there first if it is missing.
    /// The API key environment variable takes precedence over the file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        if let Some(dir) = path.parent() {
            config.config_dir = dir.to_path_buf();
        }

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.weather.api_key = Some(key);
            }
        }

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);

        if self.weather.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            result.add_warning(
                "weather.api_key",
                format!("No API key configured (set {API_KEY_ENV}); requests may be rejected"),
            );
        }

        if self.weather.refresh_minutes == 0 {
            result.add_warning(
                "weather.refresh_minutes",
                "Periodic refresh disabled (0 minutes)",
            );
        } else if self.weather.refresh_minutes > 1440 {
            result.add_warning(
                "weather.refresh_minutes",
                "Refresh interval is more than 24 hours",
            );
        }

        match self.location.source {
            LocationSourceKind::Fixed => {
                match self.location.latitude {
                    None => result.add_error("location.latitude", "Required for the fixed source"),
                    Some(lat) if !(-90.0..=90.0).contains(&lat) => {
                        result.add_error("location.latitude", "Must be between -90 and 90")
                    }
                    Some(_) => {}
                }
                match self.location.longitude {
                    None => result.add_error("location.longitude", "Required for the fixed source"),
                    Some(lon) if !(-180.0..=180.0).contains(&lon) => {
                        result.add_error("location.longitude", "Must be between -180 and 180")
                    }
                    Some(_) => {}
                }
            }
            LocationSourceKind::Ip => {
                self.validate_url(
                    &self.location.ip_lookup_url,
                    "location.ip_lookup_url",
                    &mut result,
                );
            }
        }

        if self.location.timeout_ms == 0 {
            result.add_error("location.timeout_ms", "Timeout must be greater than 0");
        }

        if self.device.inbox_size < MIN_INBOX_SIZE {
            result.add_error(
                "device.inbox_size",
                format!("Inbox must hold at least {MIN_INBOX_SIZE} bytes"),
            );
        }

        if self.device.channel_capacity == 0 {
            result.add_error(
                "device.channel_capacity",
                "Channel capacity must be greater than 0",
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("simplicity");

        Ok(config_dir.join("config.toml"))
    }
}
