//! OpenWeatherMap current-conditions client.

use crate::types::{WeatherError, WeatherReading};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use simplicity_core::{NetworkError, ReqwestErrorExt};
use std::sync::Arc;
use tracing::instrument;

const WEATHER_PATH: &str = "data/2.5/weather";
const USER_AGENT: &str = concat!("simplicity/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct OwmResponse {
    main: Option<OwmMain>,
    name: Option<String>,
    sys: Option<OwmSys>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmSys {
    country: Option<String>,
}

/// Parse a `data/2.5/weather` body into a reading.
///
/// `main.temp` and `name` are required; `sys.country` may be absent.
pub fn parse_reading(body: &str) -> Result<WeatherReading, WeatherError> {
    let raw: OwmResponse = serde_json::from_str(body)
        .map_err(|e| WeatherError::MalformedResponse(e.to_string()))?;

    let kelvin = raw
        .main
        .and_then(|m| m.temp)
        .ok_or_else(|| WeatherError::MalformedResponse("missing main.temp".to_string()))?;

    if !kelvin.is_finite() || kelvin < 0.0 {
        return Err(WeatherError::MalformedResponse(format!(
            "implausible temperature: {kelvin}"
        )));
    }

    let city = raw
        .name
        .ok_or_else(|| WeatherError::MalformedResponse("missing name".to_string()))?;

    let country = raw.sys.and_then(|s| s.country).unwrap_or_default();

    Ok(WeatherReading {
        city,
        kelvin,
        country,
    })
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
    api_key: Option<String>,
}

impl WeatherProvider {
    /// Build a provider for `base_url` (e.g. `http://api.openweathermap.org`).
    ///
    /// The client carries no request timeout of its own.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, WEATHER_PATH)
    }

    /// Fetch current conditions for a position. Single-shot, no retry.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherReading, WeatherError> {
        let mut query = vec![
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("cnt", "1".to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("appid", key.clone()));
        }

        let response = self
            .client
            .get(self.endpoint())
            .query(&query)
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!("Weather API returned status {}", status);
            return Err(WeatherError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;
        tracing::debug!("Weather response: {}", body);

        let reading = parse_reading(&body)?;
        tracing::info!(
            "Fetched weather for {} ({}): {:.2} K",
            reading.city,
            reading.country,
            reading.kelvin
        );
        Ok(reading)
    }
}
