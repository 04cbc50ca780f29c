//! Terminal outcomes of a failed pipeline.

use simplicity_weather::{LocationError, WeatherError};
use thiserror::Error;

use crate::message::{DeviceMessage, BAD_RESPONSE, HTTP_ERROR, LOCATION_UNAVAILABLE};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Location unavailable: {0}")]
    LocationUnavailable(#[from] LocationError),

    #[error("Weather fetch failed: {0}")]
    WeatherFetchFailed(WeatherError),

    #[error("Malformed weather response: {0}")]
    MalformedResponse(String),
}

impl From<WeatherError> for BridgeError {
    fn from(e: WeatherError) -> Self {
        match e {
            WeatherError::MalformedResponse(detail) => BridgeError::MalformedResponse(detail),
            other => BridgeError::WeatherFetchFailed(other),
        }
    }
}

impl BridgeError {
    /// The one-field error payload the watch understands.
    pub fn device_message(&self) -> DeviceMessage {
        match self {
            BridgeError::LocationUnavailable(_) => DeviceMessage::error(LOCATION_UNAVAILABLE),
            BridgeError::WeatherFetchFailed(_) => DeviceMessage::error(HTTP_ERROR),
            BridgeError::MalformedResponse(_) => DeviceMessage::error(BAD_RESPONSE),
        }
    }
}
