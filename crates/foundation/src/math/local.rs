//! Local tangent-plane (East-North-Up) frames anchored at a reference point.

use super::{Ecef, Vec3, ecef_to_geodetic, geodetic_to_ecef};
use crate::geo::GeoPoint;

/// Local East-North-Up coordinates (meters).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Enu {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

impl Enu {
    pub fn new(east: f64, north: f64, up: f64) -> Self {
        Self { east, north, up }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.east, self.north, self.up)
    }
}

pub fn ecef_to_enu(point: Ecef, reference: GeoPoint) -> Enu {
    let origin = reference.to_geodetic();
    let d = point - geodetic_to_ecef(origin);

    let (sin_lat, cos_lat) = origin.lat_rad.sin_cos();
    let (sin_lon, cos_lon) = origin.lon_rad.sin_cos();

    Enu::new(
        -sin_lon * d.x + cos_lon * d.y,
        -sin_lat * cos_lon * d.x - sin_lat * sin_lon * d.y + cos_lat * d.z,
        cos_lat * cos_lon * d.x + cos_lat * sin_lon * d.y + sin_lat * d.z,
    )
}

pub fn enu_to_ecef(enu: Enu, reference: GeoPoint) -> Ecef {
    let origin = reference.to_geodetic();

    let (sin_lat, cos_lat) = origin.lat_rad.sin_cos();
    let (sin_lon, cos_lon) = origin.lon_rad.sin_cos();

    let d = Vec3::new(
        -sin_lon * enu.east - sin_lat * cos_lon * enu.north + cos_lat * cos_lon * enu.up,
        cos_lon * enu.east - sin_lat * sin_lon * enu.north + cos_lat * sin_lon * enu.up,
        cos_lat * enu.north + sin_lat * enu.up,
    );

    geodetic_to_ecef(origin) + d
}

/// Position of `point` in the tangent frame of `reference`.
pub fn geodetic_to_enu(point: GeoPoint, reference: GeoPoint) -> Enu {
    ecef_to_enu(geodetic_to_ecef(point.to_geodetic()), reference)
}

pub fn enu_to_geodetic(enu: Enu, reference: GeoPoint) -> GeoPoint {
    let geo = ecef_to_geodetic(enu_to_ecef(enu, reference));
    GeoPoint::new(geo.lat_rad.to_degrees(), geo.lon_rad.to_degrees(), geo.alt_m)
}
