//! Reconstruction payload types as delivered by the tile loader.

use std::collections::BTreeMap;

use foundation::GeoPoint;
use foundation::math::Vec3;
use serde::{Deserialize, Serialize};

/// Photo-sphere crop metadata. Every field is optional in source data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Gpano {
    pub cropped_area_left_pixels: Option<u32>,
    pub cropped_area_top_pixels: Option<u32>,
    pub cropped_area_image_width_pixels: Option<u32>,
    pub cropped_area_image_height_pixels: Option<u32>,
    pub full_pano_width_pixels: Option<u32>,
    pub full_pano_height_pixels: Option<u32>,
}

impl Gpano {
    /// True when the crop covers the entire sphere.
    pub fn is_full_pano(&self) -> bool {
        let (Some(left), Some(top), Some(width), Some(height), Some(full_width), Some(full_height)) = (
            self.cropped_area_left_pixels,
            self.cropped_area_top_pixels,
            self.cropped_area_image_width_pixels,
            self.cropped_area_image_height_pixels,
            self.full_pano_width_pixels,
            self.full_pano_height_pixels,
        ) else {
            return false;
        };

        left == 0 && top == 0 && width == full_width && height == full_height
    }
}

/// Absolute geo-pose and intrinsics of the image a reconstruction belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsolutePose {
    pub key: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt: f64,
    /// Angle-axis rotation from the local frame to the camera frame.
    pub rotation: [f64; 3],
    #[serde(default = "default_orientation")]
    pub orientation: u8,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub focal: Option<f64>,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub gpano: Option<Gpano>,
    #[serde(default)]
    pub k1: Option<f64>,
    #[serde(default)]
    pub k2: Option<f64>,
}

fn default_orientation() -> u8 {
    1
}

impl AbsolutePose {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon, self.alt)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionPoint {
    pub coordinates: [f64; 3],
    #[serde(default)]
    pub color: [u8; 3],
}

impl ReconstructionPoint {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.coordinates)
    }
}

/// Sparse point cloud expressed in the frame of its main shot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction {
    pub main_shot: String,
    #[serde(default)]
    pub points: BTreeMap<String, ReconstructionPoint>,
}
