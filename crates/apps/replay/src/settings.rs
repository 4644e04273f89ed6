use std::env;
use std::path::Path;

use streaming::SpatialDataConfig;

/// Load the component configuration, then apply environment overrides.
///
/// Without a file the defaults are used. `SPATIAL_RING_DEPTH` and
/// `SPATIAL_GEOHASH_PRECISION` override the corresponding fields.
pub async fn load_config(
    path: Option<&Path>,
) -> Result<SpatialDataConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => {
            let bytes = tokio::fs::read(path).await?;
            serde_json::from_slice(&bytes)?
        }
        None => SpatialDataConfig::default(),
    };

    config.ring_depth = env_var_usize("SPATIAL_RING_DEPTH", config.ring_depth);
    config.geohash_precision =
        env_var_usize("SPATIAL_GEOHASH_PRECISION", config.geohash_precision);
    Ok(config)
}

fn env_var_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
