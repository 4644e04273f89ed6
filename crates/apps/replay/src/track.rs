//! Recorded viewer tracks.
//!
//! A track is a JSON array of events, replayed in order:
//!
//! ```json
//! [
//!   {"reference": {"lat": 57.6491, "lon": 10.4074}},
//!   {"node": {"key": "a", "computed_geo": {"lat": 57.6491, "lon": 10.4074}}},
//!   {"bearing": 12.5}
//! ]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use foundation::GeoPoint;
use serde::{Deserialize, Serialize};
use streaming::Node;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackEvent {
    /// Moves the scene reference origin. Takes effect immediately.
    Reference(GeoPoint),
    Node(Node),
    Bearing(f64),
}

#[derive(Debug)]
pub enum TrackError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::Read { path, source } => {
                write!(f, "failed to read track {}: {source}", path.display())
            }
            TrackError::Parse { path, source } => {
                write!(f, "invalid track {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for TrackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrackError::Read { source, .. } => Some(source),
            TrackError::Parse { source, .. } => Some(source),
        }
    }
}

pub async fn load_track(path: &Path) -> Result<Vec<TrackEvent>, TrackError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| TrackError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| TrackError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
