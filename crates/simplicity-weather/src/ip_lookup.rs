//! Approximate position from the host's public IP address.
//! Uses ip-api.com's JSON endpoint - free, no API key required.

use crate::location::LocationSource;
use crate::types::{LocationError, LocationFix};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use simplicity_core::{NetworkError, ReqwestErrorExt};

const USER_AGENT: &str = concat!("simplicity/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

/// Location source backed by an ip-api.com compatible service.
#[derive(Debug, Clone)]
pub struct IpLocation {
    client: Client,
    base_url: String,
}

impl IpLocation {
    pub fn new(base_url: &str) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LocationSource for IpLocation {
    async fn current_position(&self) -> Result<LocationFix, LocationError> {
        let url = format!("{}/json", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("fields", "status,message,lat,lon")])
            .send()
            .await
            .map_err(|e| {
                tracing::debug!("IP location request failed: {}", e);
                LocationError::PositionUnavailable(e.into_network_error().to_string())
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(LocationError::PermissionDenied);
            }
            status if !status.is_success() => {
                return Err(LocationError::PositionUnavailable(format!(
                    "IP lookup returned status {}",
                    status
                )));
            }
            _ => {}
        }

        let body: IpApiResponse = response.json().await.map_err(|e| {
            LocationError::PositionUnavailable(format!("IP lookup parse error: {}", e))
        })?;

        if body.status != "success" {
            return Err(LocationError::PositionUnavailable(
                body.message
                    .unwrap_or_else(|| "IP lookup failed".to_string()),
            ));
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Ok(LocationFix::new(lat, lon)),
            _ => Err(LocationError::PositionUnavailable(
                "IP lookup returned no coordinates".to_string(),
            )),
        }
    }
}
