//! Tile data loading.
//!
//! [`TileLoader`] is the seam between the cache and wherever reconstructions
//! live. Implementations must be `Send + Sync` so fetches can run on spawned
//! tasks; methods return boxed futures for dyn-compatibility.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use foundation::TileId;
use scene::{AbsolutePose, Reconstruction};
use serde::{Deserialize, Serialize};

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One reconstruction together with the pose of its main shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionData {
    pub data: AbsolutePose,
    pub reconstruction: Reconstruction,
}

/// Everything fetched for a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileData {
    pub tile: TileId,
    pub reconstructions: Vec<ReconstructionData>,
}

impl TileData {
    pub fn empty(tile: TileId) -> Self {
        Self {
            tile,
            reconstructions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reconstructions.is_empty()
    }
}

#[derive(Debug)]
pub enum FetchError {
    Failed {
        tile: TileId,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    /// The fetch was dropped before completing (uncache, eviction or shutdown).
    Cancelled(TileId),
}

impl FetchError {
    pub fn failed(tile: TileId, message: impl Into<String>) -> Self {
        FetchError::Failed {
            tile,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        tile: TileId,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        FetchError::Failed {
            tile,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn tile(&self) -> &TileId {
        match self {
            FetchError::Failed { tile, .. } | FetchError::Cancelled(tile) => tile,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled(_))
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Failed { tile, message, .. } => {
                write!(f, "fetch failed for tile {tile}: {message}")
            }
            FetchError::Cancelled(tile) => write!(f, "fetch cancelled for tile {tile}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Failed { source, .. } => source.as_ref().map(|e| e.as_ref() as _),
            FetchError::Cancelled(_) => None,
        }
    }
}

pub trait TileLoader: Send + Sync {
    /// Fetch the reconstructions of a tile. A tile without data resolves to
    /// an empty [`TileData`], not an error.
    fn fetch(&self, tile: TileId) -> BoxFuture<'_, Result<TileData, FetchError>>;
}

/// Reads tiles from `<root>/<geohash>.json`.
///
/// Each file holds a JSON array of [`ReconstructionData`]. A missing file is an
/// empty tile.
pub struct FilesystemLoader {
    root: PathBuf,
}

impl FilesystemLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn tile_path(&self, tile: &TileId) -> PathBuf {
        self.root.join(format!("{tile}.json"))
    }
}

impl TileLoader for FilesystemLoader {
    fn fetch(&self, tile: TileId) -> BoxFuture<'_, Result<TileData, FetchError>> {
        let path = self.tile_path(&tile);

        Box::pin(async move {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Ok(TileData::empty(tile));
                }
                Err(e) => return Err(FetchError::with_source(tile, "failed to read tile", e)),
            };

            match serde_json::from_slice::<Vec<ReconstructionData>>(&bytes) {
                Ok(reconstructions) => Ok(TileData {
                    tile,
                    reconstructions,
                }),
                Err(e) => Err(FetchError::with_source(tile, "malformed tile json", e)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use foundation::TileId;

    use super::{FetchError, FilesystemLoader, TileLoader};
    use crate::testing::reconstruction_at;

    #[tokio::test]
    async fn reads_tile_file() {
        let dir = tempfile::tempdir().unwrap();
        let tile = TileId::parse("u4pruydq").unwrap();
        let items = vec![reconstruction_at(&tile, "a", Some(1.0))];
        std::fs::write(
            dir.path().join("u4pruydq.json"),
            serde_json::to_vec(&items).unwrap(),
        )
        .unwrap();

        let loader = FilesystemLoader::new(dir.path());
        let data = loader.fetch(tile.clone()).await.unwrap();
        assert_eq!(data.tile, tile);
        assert_eq!(data.reconstructions.len(), 1);
        assert_eq!(data.reconstructions[0].reconstruction.main_shot, "a");
        assert_eq!(data.reconstructions[0].data.scale, Some(1.0));
    }

    #[tokio::test]
    async fn missing_file_is_empty_tile() {
        let dir = tempfile::tempdir().unwrap();
        let tile = TileId::parse("u4pruydr").unwrap();
        let data = FilesystemLoader::new(dir.path())
            .fetch(tile.clone())
            .await
            .unwrap();
        assert!(data.is_empty());
        assert_eq!(data.tile, tile);
    }

    #[tokio::test]
    async fn malformed_file_fails_with_source() {
        let dir = tempfile::tempdir().unwrap();
        let tile = TileId::parse("u4pruydx").unwrap();
        std::fs::write(dir.path().join("u4pruydx.json"), b"{not json").unwrap();

        let err = FilesystemLoader::new(dir.path())
            .fetch(tile.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Failed { .. }));
        assert_eq!(err.tile(), &tile);
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("fetch failed for tile u4pruydx"));
    }
}
