use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::{geo, serde::lat_lon};

use crate::{ExampleData, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate from untrusted input, rejecting out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        Self {
            latitude,
            longitude,
        }
        .validated()
    }

    pub fn validated(self) -> Result<Self, ValidationError> {
        if !geo::is_valid_latitude(self.latitude) {
            return Err(ValidationError::new(
                "latitude",
                format!("{} is not within [-90, 90]", self.latitude),
            ));
        }
        if !geo::is_valid_longitude(self.longitude) {
            return Err(ValidationError::new(
                "longitude",
                format!("{} is not within [-180, 180]", self.longitude),
            ));
        }
        Ok(self)
    }

    /// Parses the `"lat,lon"` form used in query strings.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let (latitude, longitude) = lat_lon::parse(input)
            .map_err(|why| ValidationError::new("coordinate", why.to_string()))?;
        Self::new(latitude, longitude)
    }

    pub fn lat_lon(&self) -> String {
        lat_lon::format(self.latitude, self.longitude)
    }

    pub fn distance_km_to(&self, other: &Coordinate) -> f64 {
        geo::haversine_distance(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// An axis-aligned rectangle in degrees. `min_* <= max_*` always holds for values
/// produced by this module; deserialized values must go through `validated`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// The minimal box enclosing all points.
    pub fn enclosing<'a, I>(coordinates: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = &'a Coordinate>,
    {
        let mut coordinates = coordinates.into_iter();
        let first = coordinates.next().ok_or_else(|| {
            ValidationError::new("coordinates", "at least one coordinate is required")
        })?;
        Ok(coordinates.fold(Self::around(first, 0.0), |bbox, c| Self {
            min_lat: bbox.min_lat.min(c.latitude),
            max_lat: bbox.max_lat.max(c.latitude),
            min_lon: bbox.min_lon.min(c.longitude),
            max_lon: bbox.max_lon.max(c.longitude),
        }))
    }

    /// A box of `margin` degrees in every direction around a single point,
    /// clamped to the valid coordinate range.
    pub fn around(center: &Coordinate, margin: f64) -> Self {
        let margin = margin.abs();
        Self {
            min_lat: (center.latitude - margin).max(-90.0),
            max_lat: (center.latitude + margin).min(90.0),
            min_lon: (center.longitude - margin).max(-180.0),
            max_lon: (center.longitude + margin).min(180.0),
        }
    }

    pub fn validated(self) -> Result<Self, ValidationError> {
        Coordinate::new(self.min_lat, self.min_lon)?;
        Coordinate::new(self.max_lat, self.max_lon)?;
        if self.min_lat > self.max_lat {
            return Err(ValidationError::new(
                "boundingBox",
                format!("minLat {} exceeds maxLat {}", self.min_lat, self.max_lat),
            ));
        }
        if self.min_lon > self.max_lon {
            return Err(ValidationError::new(
                "boundingBox",
                format!("minLon {} exceeds maxLon {}", self.min_lon, self.max_lon),
            ));
        }
        Ok(self)
    }

    /// Inclusive on all four sides.
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&coordinate.latitude)
            && (self.min_lon..=self.max_lon).contains(&coordinate.longitude)
    }

    pub fn south_west(&self) -> Coordinate {
        Coordinate {
            latitude: self.min_lat,
            longitude: self.min_lon,
        }
    }

    pub fn north_east(&self) -> Coordinate {
        Coordinate {
            latitude: self.max_lat,
            longitude: self.max_lon,
        }
    }
}

impl ExampleData for BoundingBox {
    fn example_data() -> Self {
        Self {
            min_lat: 48.8566,
            max_lat: 48.8606,
            min_lon: 2.3376,
            max_lon: 2.3522,
        }
    }
}
