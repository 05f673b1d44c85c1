use std::{fmt, str::FromStr};

use async_trait::async_trait;
use log::{debug, warn};
use model::{geo::Coordinate, ValidationError};
use reqwest::Url;
use serde::Deserialize;

use crate::{http::read_json, retry::RetryPolicy, NavigationError, Result};

/// Resolves a free-form place name to a coordinate.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Coordinate>;
}

/// How the value of a [`Location`] is to be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LocationKind {
    /// `"lat,lon"`
    Coordinates,
    #[default]
    Address,
}

impl FromStr for LocationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coordinates" => Ok(Self::Coordinates),
            "address" => Ok(Self::Address),
            other => Err(ValidationError::new(
                "location_type",
                format!("'{}' is not one of coordinates, address", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub value: String,
    pub kind: LocationKind,
}

impl Location {
    pub fn new(value: impl Into<String>, kind: LocationKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

pub async fn resolve(geocoder: &dyn Geocoder, location: &Location) -> Result<Coordinate> {
    let value = location.value.trim();
    if value.is_empty() {
        return Err(ValidationError::new("location", "must not be empty").into());
    }
    match location.kind {
        LocationKind::Coordinates => Ok(Coordinate::parse(value)?),
        LocationKind::Address => geocoder.geocode(value).await.map_err(|why| match why {
            NavigationError::LocationNotFound(_) => why,
            other => {
                warn!("geocoding '{}' failed: {}", value, other);
                NavigationError::LocationNotFound(value.to_owned())
            }
        }),
    }
}

pub struct TomTomGeocoder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    position: Position,
}

#[derive(Debug, Deserialize)]
struct Position {
    lat: f64,
    lon: f64,
}

impl TomTomGeocoder {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The place name becomes a percent-encoded path segment.
    fn url(&self, query: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|why| NavigationError::ExternalService {
            status_code: None,
            reason: format!("invalid geocoder url: {}", why),
        })?;
        let file = format!("{}.json", query);
        url.path_segments_mut()
            .map_err(|_| NavigationError::ExternalService {
                status_code: None,
                reason: "geocoder url cannot be a base".to_owned(),
            })?
            .pop_if_empty()
            .extend(["search", "2", "geocode", file.as_str()]);
        Ok(url)
    }

    async fn fetch(&self, url: &Url) -> Result<GeocodeResponse> {
        let response = self
            .http
            .get(url.clone())
            .query(&[("key", self.api_key.as_str()), ("limit", "1")])
            .send()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl Geocoder for TomTomGeocoder {
    async fn geocode(&self, query: &str) -> Result<Coordinate> {
        let url = self.url(query)?;
        let response = self.retry.run("geocoding", || self.fetch(&url)).await?;
        let position = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| NavigationError::LocationNotFound(query.to_owned()))?
            .position;
        let coordinate = Coordinate::new(position.lat, position.lon)?;
        debug!("geocoded '{}' to {}", query, coordinate.lat_lon());
        Ok(coordinate)
    }
}
