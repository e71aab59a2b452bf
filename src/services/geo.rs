//! Device position and street addresses.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{GeocodingConfig, GeolocationConfig};
use crate::core::{Coordinates, Effect, Transience};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("no position fix within {0:?}")]
    Timeout(Duration),
}

impl LocationError {
    pub fn transience(&self) -> Transience {
        match self {
            LocationError::PermissionDenied => Transience::Permanent,
            LocationError::Unavailable { .. } | LocationError::Timeout(_) => Transience::Retryable,
        }
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GeocodeError {
    #[error("reverse geocoding is disabled")]
    Disabled,
    #[error("geocoder request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoder has no address for this position: {reason}")]
    NoAddress { reason: String },
}

impl GeocodeError {
    pub fn transience(&self) -> Transience {
        match self {
            GeocodeError::Http(_) => Transience::Retryable,
            GeocodeError::Disabled | GeocodeError::NoAddress { .. } => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeolocationOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl From<&GeolocationConfig> for GeolocationOptions {
    fn from(config: &GeolocationConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout: Duration::from_millis(config.timeout_ms),
            maximum_age: Duration::from_millis(config.maximum_age_ms),
        }
    }
}

impl Default for GeolocationOptions {
    fn default() -> Self {
        Self::from(&GeolocationConfig::default())
    }
}

pub trait Geolocator: Send + Sync {
    fn current_position(&self, options: &GeolocationOptions)
    -> Result<Coordinates, LocationError>;
}

/// Always reports the same position. For stations without a GPS.
#[derive(Clone, Copy, Debug)]
pub struct FixedLocation(pub Coordinates);

impl Geolocator for FixedLocation {
    fn current_position(&self, _: &GeolocationOptions) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

pub trait ReverseGeocoder: Send + Sync {
    /// Street-level address for `position`.
    fn reverse(&self, position: Coordinates) -> Result<String, GeocodeError>;
}

/// Nominatim `/reverse` client.
#[derive(Clone, Debug)]
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        if !config.enabled {
            return Err(GeocodeError::Disabled);
        }
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn reverse_url(&self) -> String {
        format!("{}/reverse", self.endpoint)
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, position: Coordinates) -> Result<String, GeocodeError> {
        let body: ReverseResponse = self
            .client
            .get(self.reverse_url())
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", position.latitude.to_string()),
                ("lon", position.longitude.to_string()),
            ])
            .send()?
            .error_for_status()?
            .json()?;
        address_from(body)
    }
}

fn address_from(body: ReverseResponse) -> Result<String, GeocodeError> {
    match (body.display_name, body.error) {
        (Some(name), _) if !name.trim().is_empty() => Ok(name.trim().to_string()),
        (_, Some(reason)) => Err(GeocodeError::NoAddress { reason }),
        _ => Err(GeocodeError::NoAddress {
            reason: "empty display_name".to_string(),
        }),
    }
}
