//! Scene-local camera transforms built from absolute geo-poses.

use foundation::GeoPoint;
use foundation::math::{Mat3, Vec3, geodetic_to_enu};
use serde::{Deserialize, Serialize};

use crate::reconstruction::{AbsolutePose, Gpano};

const DEFAULT_WIDTH: u32 = 4;
const DEFAULT_HEIGHT: u32 = 3;
const DEFAULT_FOCAL: f64 = 1.0;

/// Acceptance window for reconstruction scale and placement.
///
/// Scales outside `(min_scale, max_scale)` come from degenerate reconstructions
/// (typically poor GPS). Poses farther than `max_reference_distance_m` from the
/// reference origin are not renderable relative to it.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleValidity {
    pub min_scale: f64,
    pub max_scale: f64,
    pub max_reference_distance_m: f64,
}

impl Default for ScaleValidity {
    fn default() -> Self {
        Self {
            min_scale: 1e-2,
            max_scale: 50.0,
            max_reference_distance_m: 10_000.0,
        }
    }
}

impl ScaleValidity {
    pub fn accepts(&self, scale: f64, reference_distance_m: f64) -> bool {
        scale.is_finite()
            && scale > self.min_scale
            && scale < self.max_scale
            && reference_distance_m.is_finite()
            && reference_distance_m <= self.max_reference_distance_m
    }
}

/// Rigid transform plus intrinsics mapping a reconstruction into the scene frame.
///
/// Camera convention: `x_cam = R * x_local + t`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTransform {
    orientation: u8,
    width: u32,
    height: u32,
    focal: f64,
    scale: f64,
    gpano: Option<Gpano>,
    rotation: Vec3,
    translation: Vec3,
    k1: f64,
    k2: f64,
    r: Mat3,
    has_valid_scale: bool,
}

/// Build the scene-local transform of `pose` relative to `reference`.
///
/// An out-of-range scale is not an error; check [`LocalTransform::has_valid_scale`].
pub fn build_transform(
    pose: &AbsolutePose,
    reference: GeoPoint,
    validity: &ScaleValidity,
) -> LocalTransform {
    let center = geodetic_to_enu(pose.position(), reference).to_vec3();
    let rotation = Vec3::from_array(pose.rotation);
    let r = Mat3::from_angle_axis(rotation);
    let translation = -r.mul_vec(center);

    let scale = pose.scale.unwrap_or(0.0);
    let has_valid_scale = validity.accepts(scale, center.length()) && translation.is_finite();

    LocalTransform {
        orientation: pose.orientation,
        width: pose.width.filter(|w| *w > 0).unwrap_or(DEFAULT_WIDTH),
        height: pose.height.filter(|h| *h > 0).unwrap_or(DEFAULT_HEIGHT),
        focal: pose.focal.unwrap_or(DEFAULT_FOCAL),
        scale,
        gpano: pose.gpano.clone(),
        rotation,
        translation,
        k1: pose.k1.unwrap_or(0.0),
        k2: pose.k2.unwrap_or(0.0),
        r,
        has_valid_scale,
    }
}

impl LocalTransform {
    pub fn has_valid_scale(&self) -> bool {
        self.has_valid_scale
    }

    pub fn orientation(&self) -> u8 {
        self.orientation
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width after applying EXIF orientation (5-8 are rotated a quarter turn).
    pub fn basic_width(&self) -> u32 {
        if self.orientation < 5 {
            self.width
        } else {
            self.height
        }
    }

    pub fn basic_height(&self) -> u32 {
        if self.orientation < 5 {
            self.height
        } else {
            self.width
        }
    }

    pub fn basic_aspect(&self) -> f64 {
        self.basic_width() as f64 / self.basic_height() as f64
    }

    pub fn focal(&self) -> f64 {
        self.focal
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn gpano(&self) -> Option<&Gpano> {
        self.gpano.as_ref()
    }

    pub fn full_pano(&self) -> bool {
        self.gpano.as_ref().is_some_and(Gpano::is_full_pano)
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn k1(&self) -> f64 {
        self.k1
    }

    pub fn k2(&self) -> f64 {
        self.k2
    }

    /// Camera position in the scene frame.
    pub fn camera_center(&self) -> Vec3 {
        -self.r.transpose().mul_vec(self.translation)
    }

    /// Map a point from reconstruction coordinates (`s * (R x + t)`) into the scene frame.
    ///
    /// `None` when the scale is not valid.
    pub fn reconstruction_to_local(&self, point: Vec3) -> Option<Vec3> {
        if !self.has_valid_scale {
            return None;
        }
        let unscaled = point.scale(1.0 / self.scale) - self.translation;
        Some(self.r.transpose().mul_vec(unscaled))
    }
}
