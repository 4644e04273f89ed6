use foundation::{GeoPoint, GeohashError, TileId};
use scene::Gpano;
use serde::{Deserialize, Serialize};

/// The image the viewer is currently positioned at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub key: String,
    pub computed_geo: GeoPoint,
    /// Compass angle of the image in degrees.
    #[serde(default)]
    pub ca: f64,
    #[serde(default)]
    pub merge_version: Option<u32>,
    #[serde(default)]
    pub gpano: Option<Gpano>,
}

impl Node {
    pub fn new(key: impl Into<String>, computed_geo: GeoPoint) -> Self {
        Self {
            key: key.into(),
            computed_geo,
            ca: 0.0,
            merge_version: None,
            gpano: None,
        }
    }

    /// True once the image has been merged into a reconstruction.
    pub fn merged(&self) -> bool {
        self.merge_version.is_some_and(|v| v > 0)
    }

    pub fn full_pano(&self) -> bool {
        self.gpano.as_ref().is_some_and(Gpano::is_full_pano)
    }

    /// Tile containing the node's computed position.
    pub fn tile(&self, precision: usize) -> Result<TileId, GeohashError> {
        TileId::encode(self.computed_geo, precision)
    }
}

#[cfg(test)]
mod tests {
    use foundation::{GeoPoint, TILE_PRECISION};
    use scene::Gpano;

    use super::Node;

    #[test]
    fn tile_uses_computed_position() {
        let node = Node::new("k", GeoPoint::new(57.64911, 10.40744, 0.0));
        assert_eq!(node.tile(TILE_PRECISION).unwrap().as_str(), "u4pruydq");
        assert!(node.tile(0).is_err());

        let off_globe = Node::new("x", GeoPoint::new(91.0, 0.0, 0.0));
        assert!(off_globe.tile(TILE_PRECISION).is_err());
    }

    #[test]
    fn merged_and_pano_flags() {
        let mut node: Node = serde_json::from_str(
            r#"{"key":"k","computed_geo":{"lat":1.0,"lon":2.0},"merge_version":0}"#,
        )
        .unwrap();
        assert!(!node.merged());
        assert!(!node.full_pano());

        node.merge_version = Some(3);
        node.gpano = Some(Gpano {
            cropped_area_left_pixels: Some(0),
            cropped_area_top_pixels: Some(0),
            cropped_area_image_width_pixels: Some(4),
            cropped_area_image_height_pixels: Some(2),
            full_pano_width_pixels: Some(4),
            full_pano_height_pixels: Some(2),
        });
        assert!(node.merged());
        assert!(node.full_pano());
    }
}
