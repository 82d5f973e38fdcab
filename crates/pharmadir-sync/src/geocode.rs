//! Address → coordinate lookup.
//!
//! [`Geocoder`] is what the collector calls: it appends the city suffix, makes
//! one attempt through a [`GeocodeBackend`], and turns every failure into "no
//! result" with a log line. [`NominatimGeocoder`] is the HTTP backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pharmadir_core::Coordinates;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Appended to every address so short local addresses resolve inside the city.
pub const DEFAULT_CITY_SUFFIX: &str = ", Abidjan, Côte d'Ivoire";

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("geocoder timed out: {0}")]
    Timeout(String),
    #[error("geocoder unavailable: {0}")]
    Unavailable(String),
    #[error("geocoder error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        if err.is_connect() {
            return Self::Unavailable(err.to_string());
        }
        match err.status() {
            Some(status) if is_unavailable(status) => Self::Unavailable(err.to_string()),
            _ => Self::Other(err.to_string()),
        }
    }
}

fn is_unavailable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
pub trait GeocodeBackend: Send + Sync {
    /// One lookup of an already-qualified query string.
    async fn lookup(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

/// The adapter the collector uses. Never fails; a miss is `None`.
#[derive(Clone)]
pub struct Geocoder {
    backend: Arc<dyn GeocodeBackend>,
    suffix: String,
}

impl Geocoder {
    pub fn new(backend: Arc<dyn GeocodeBackend>, suffix: impl Into<String>) -> Self {
        Self {
            backend,
            suffix: suffix.into(),
        }
    }

    /// Resolve `address` within the configured city. No retries.
    pub async fn resolve(&self, address: &str) -> Option<Coordinates> {
        let query = format!("{address}{}", self.suffix);
        match self.backend.lookup(&query).await {
            Ok(Some(coords)) => {
                debug!(address, lat = coords.latitude, lon = coords.longitude, "geocoded");
                Some(coords)
            }
            Ok(None) => {
                debug!(address, "geocoder returned no match");
                None
            }
            Err(e @ (GeocodeError::Timeout(_) | GeocodeError::Unavailable(_))) => {
                warn!(address, error = %e, "geocoding failed");
                None
            }
            Err(e) => {
                error!(address, error = %e, "unexpected geocoding error");
                None
            }
        }
    }
}

/// Nominatim `/search` client.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    /// `base_url` should be like `https://nominatim.openstreetmap.org` (no
    /// trailing slash needed). `timeout` bounds each lookup end to end.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pharmadir/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GeocodeError::Other(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GeocodeBackend for NominatimGeocoder {
    async fn lookup(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let url = format!("{}/search", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let msg = format!("{url} returned {status}: {body}");
            return Err(if is_unavailable(status) {
                GeocodeError::Unavailable(msg)
            } else {
                GeocodeError::Other(msg)
            });
        }

        let places: Vec<Place> = resp.json().await?;
        places.into_iter().next().map(parse_place).transpose()
    }
}

fn parse_place(place: Place) -> Result<Coordinates, GeocodeError> {
    let lat = place
        .lat
        .parse()
        .map_err(|_| GeocodeError::Other(format!("bad latitude {:?}", place.lat)))?;
    let lon = place
        .lon
        .parse()
        .map_err(|_| GeocodeError::Other(format!("bad longitude {:?}", place.lon)))?;
    Ok(Coordinates::new(lat, lon))
}
