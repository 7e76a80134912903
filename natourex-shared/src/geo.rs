/// Geospatial primitives for tour location queries
///
/// Points are stored GeoJSON-style (`[lng, lat]`), while the HTTP surface
/// accepts `lat,lng`. Distances on the sphere are computed with the haversine
/// formula, matching the `angular_distance` SQL function in the migrations.
///
/// # Units
///
/// Radius queries work in radians: a linear distance is divided by the Earth's
/// mean radius in the same unit. Distance queries return meters scaled by a
/// unit multiplier.
///
/// # Example
///
/// ```
/// use natourex_shared::geo::{DistanceUnit, GeoPoint};
///
/// let center = GeoPoint::parse_lat_lng("34.111745,-118.113491").unwrap();
/// let radius = DistanceUnit::Miles.to_radians(200.0);
/// assert!((radius - 200.0 / 3963.2).abs() < f64::EPSILON);
/// assert_eq!(center.lng, -118.113491);
/// ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Earth's mean radius in miles
pub const EARTH_RADIUS_MI: f64 = 3963.2;

/// Earth's mean radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6378.1;

/// Earth's mean radius in meters, used for raw distance results
pub const EARTH_RADIUS_M: f64 = 6_378_100.0;

/// Errors raised while parsing coordinates or units
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeoError {
    /// Latitude or longitude missing from a `lat,lng` pair
    #[error("Please provide latitude and longitude in the format lat,lng")]
    MissingCoordinates,

    /// Coordinates present but not valid numbers or out of range
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// Unit other than `mi` or `km`
    #[error("Unknown distance unit '{0}'. Use 'mi' or 'km'")]
    UnknownUnit(String),
}

/// A point on the Earth's surface in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, [-90, 90]
    pub lat: f64,

    /// Longitude in degrees, [-180, 180]
    pub lng: f64,
}

impl GeoPoint {
    /// Creates a point, rejecting out-of-range or non-finite coordinates
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::InvalidCoordinates(format!(
                "latitude {} must be between -90 and 90",
                lat
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(GeoError::InvalidCoordinates(format!(
                "longitude {} must be between -180 and 180",
                lng
            )));
        }

        Ok(Self { lat, lng })
    }

    /// Parses a `lat,lng` path segment
    ///
    /// # Errors
    ///
    /// - `GeoError::MissingCoordinates` if either side of the comma is empty
    /// - `GeoError::InvalidCoordinates` if either side is not a valid number
    pub fn parse_lat_lng(raw: &str) -> Result<Self, GeoError> {
        let mut parts = raw.split(',').map(str::trim);
        let lat = parts.next().filter(|s| !s.is_empty());
        let lng = parts.next().filter(|s| !s.is_empty());

        let (lat, lng) = match (lat, lng) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => return Err(GeoError::MissingCoordinates),
        };

        if parts.next().is_some() {
            return Err(GeoError::InvalidCoordinates(raw.to_string()));
        }

        let lat = lat
            .parse::<f64>()
            .map_err(|_| GeoError::InvalidCoordinates(raw.to_string()))?;
        let lng = lng
            .parse::<f64>()
            .map_err(|_| GeoError::InvalidCoordinates(raw.to_string()))?;

        Self::new(lat, lng)
    }

    /// Builds a point from GeoJSON `[lng, lat]` coordinates
    pub fn from_coordinates(coordinates: [f64; 2]) -> Self {
        Self {
            lat: coordinates[1],
            lng: coordinates[0],
        }
    }

    /// Central angle to another point, in radians
    pub fn angular_distance(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * a.sqrt().min(1.0).asin()
    }

    /// Great-circle distance to another point, in meters
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        self.angular_distance(other) * EARTH_RADIUS_M
    }
}

/// Linear unit accepted by the geospatial endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceUnit {
    #[serde(rename = "mi")]
    Miles,
    #[serde(rename = "km")]
    Kilometers,
}

impl DistanceUnit {
    /// Earth's mean radius expressed in this unit
    pub fn earth_radius(&self) -> f64 {
        match self {
            DistanceUnit::Miles => EARTH_RADIUS_MI,
            DistanceUnit::Kilometers => EARTH_RADIUS_KM,
        }
    }

    /// Converts a linear distance to the angular radius used by radius queries
    pub fn to_radians(&self, distance: f64) -> f64 {
        distance / self.earth_radius()
    }

    /// Multiplier turning meters into this unit
    pub fn meters_multiplier(&self) -> f64 {
        match self {
            DistanceUnit::Miles => 0.000621371,
            DistanceUnit::Kilometers => 0.001,
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mi" => Ok(DistanceUnit::Miles),
            "km" => Ok(DistanceUnit::Kilometers),
            other => Err(GeoError::UnknownUnit(other.to_string())),
        }
    }
}
