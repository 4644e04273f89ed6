use foundation::{GeohashError, MAX_PRECISION, TILE_PRECISION};
use scene::ScaleValidity;
use serde::{Deserialize, Serialize};

use crate::discovery::DEFAULT_RING_DEPTH;

/// Settings of the spatial data component. Missing JSON fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialDataConfig {
    /// Name render submissions are tagged with.
    pub name: String,
    pub geohash_precision: usize,
    pub ring_depth: usize,
    pub transform: ScaleValidity,
}

impl Default for SpatialDataConfig {
    fn default() -> Self {
        Self {
            name: "spatialData".to_string(),
            geohash_precision: TILE_PRECISION,
            ring_depth: DEFAULT_RING_DEPTH,
            transform: ScaleValidity::default(),
        }
    }
}

impl SpatialDataConfig {
    pub fn validate(&self) -> Result<(), GeohashError> {
        if self.geohash_precision == 0 || self.geohash_precision > MAX_PRECISION {
            return Err(GeohashError::InvalidPrecision(self.geohash_precision));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use foundation::GeohashError;
    use pretty_assertions::assert_eq;

    use super::SpatialDataConfig;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SpatialDataConfig =
            serde_json::from_str(r#"{"ring_depth":3,"transform":{"max_scale":20.0}}"#).unwrap();
        assert_eq!(config.ring_depth, 3);
        assert_eq!(config.name, "spatialData");
        assert_eq!(config.geohash_precision, 8);
        assert_eq!(config.transform.max_scale, 20.0);
        assert_eq!(config.transform.min_scale, 1e-2);
    }

    #[test]
    fn precision_must_be_encodable() {
        assert_eq!(SpatialDataConfig::default().validate(), Ok(()));
        let bad = SpatialDataConfig {
            geohash_precision: 13,
            ..SpatialDataConfig::default()
        };
        assert_eq!(bad.validate(), Err(GeohashError::InvalidPrecision(13)));
    }
}
