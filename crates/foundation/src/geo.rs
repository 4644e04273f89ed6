use serde::{Deserialize, Serialize};

use crate::math::Geodetic;

/// WGS84 position in degrees and meters.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180].
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    pub fn to_geodetic(self) -> Geodetic {
        Geodetic::new(self.lat.to_radians(), self.lon.to_radians(), self.alt)
    }
}

#[cfg(test)]
mod tests {
    use super::GeoPoint;

    #[test]
    fn validity_follows_wgs84_ranges() {
        assert!(GeoPoint::new(57.64911, 10.40744, 0.0).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0, 0.0).is_valid());
        assert!(!GeoPoint::new(90.5, 0.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.1, 0.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0, 0.0).is_valid());
    }

    #[test]
    fn altitude_defaults_when_missing() {
        let p: GeoPoint = serde_json::from_str(r#"{"lat":1.5,"lon":-2.0}"#).unwrap();
        assert_eq!(p, GeoPoint::new(1.5, -2.0, 0.0));
    }
}
