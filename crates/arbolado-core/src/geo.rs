//! Coordinates and sector boundaries.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::InvalidField;

/// A validated WGS84 position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidField> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidField::new(
                "latitude",
                format!("{latitude} is outside -90..=90"),
            ));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidField::new(
                "longitude",
                format!("{longitude} is outside -180..=180"),
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// One vertex of a sector boundary.
///
/// Stored either as `[lat, lng]` or as `{"lat": .., "lng": ..}`; it is
/// always written back in the object form.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl<'de> Deserialize<'de> for GeoPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Pair([f64; 2]),
            Object {
                #[serde(alias = "latitude")]
                lat: f64,
                #[serde(alias = "longitude", alias = "lon")]
                lng: f64,
            },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Pair([lat, lng]) => GeoPoint { lat, lng },
            Repr::Object { lat, lng } => GeoPoint { lat, lng },
        })
    }
}

impl From<Coordinates> for GeoPoint {
    fn from(c: Coordinates) -> Self {
        Self {
            lat: c.latitude,
            lng: c.longitude,
        }
    }
}

/// Ordered ring of vertices; the closing edge back to the first vertex is
/// implied.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(pub Vec<GeoPoint>);

impl Polygon {
    pub fn vertices(&self) -> &[GeoPoint] {
        &self.0
    }

    /// Even-odd point-in-polygon test. Rings with fewer than three vertices
    /// contain nothing.
    pub fn contains(&self, point: GeoPoint) -> bool {
        let ring = &self.0;
        if ring.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let (a, b) = (ring[i], ring[j]);
            if (a.lat > point.lat) != (b.lat > point.lat) {
                let cross = (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng;
                if point.lng < cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}
