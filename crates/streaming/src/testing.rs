//! Fixtures shared by the cache and component tests.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use foundation::TileId;
use parking_lot::Mutex;
use scene::{AbsolutePose, Reconstruction, ReconstructionPoint};
use tokio::sync::Semaphore;

use crate::loader::{BoxFuture, FetchError, ReconstructionData, TileData, TileLoader};

/// A reconstruction whose main shot sits at the centre of `tile`.
pub(crate) fn reconstruction_at(
    tile: &TileId,
    main_shot: &str,
    scale: Option<f64>,
) -> ReconstructionData {
    let center = tile.bounds().center();
    let mut points = BTreeMap::new();
    points.insert(
        "0".to_string(),
        ReconstructionPoint {
            coordinates: [0.0, 0.0, 1.0],
            color: [255, 0, 0],
        },
    );
    ReconstructionData {
        data: AbsolutePose {
            key: main_shot.to_string(),
            lat: center.lat,
            lon: center.lon,
            alt: 0.0,
            rotation: [0.0; 3],
            orientation: 1,
            width: Some(640),
            height: Some(480),
            focal: Some(0.8),
            scale,
            gpano: None,
            k1: None,
            k2: None,
        },
        reconstruction: Reconstruction {
            main_shot: main_shot.to_string(),
            points,
        },
    }
}

/// In-memory loader yielding one reconstruction per tile.
///
/// Fetches can be held back with a gate until [`Gate::open`] is called.
#[derive(Default)]
pub(crate) struct FakeLoader {
    calls: Mutex<Vec<TileId>>,
    failing: BTreeSet<TileId>,
    unscaled: BTreeSet<TileId>,
    gate: Option<Arc<Semaphore>>,
}

pub(crate) struct Gate(Arc<Semaphore>);

impl Gate {
    pub(crate) fn open(&self) {
        self.0.close();
    }
}

fn tiles(hashes: &[&str]) -> BTreeSet<TileId> {
    hashes.iter().map(|h| TileId::parse(h).unwrap()).collect()
}

impl FakeLoader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(mut self, hashes: &[&str]) -> Self {
        self.failing = tiles(hashes);
        self
    }

    pub(crate) fn unscaled(mut self, hashes: &[&str]) -> Self {
        self.unscaled = tiles(hashes);
        self
    }

    pub(crate) fn gated(mut self) -> (Self, Gate) {
        let semaphore = Arc::new(Semaphore::new(0));
        self.gate = Some(semaphore.clone());
        (self, Gate(semaphore))
    }

    pub(crate) fn calls(&self) -> Vec<TileId> {
        self.calls.lock().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl TileLoader for FakeLoader {
    fn fetch(&self, tile: TileId) -> BoxFuture<'_, Result<TileData, FetchError>> {
        self.calls.lock().push(tile.clone());
        let gate = self.gate.clone();

        Box::pin(async move {
            if let Some(gate) = gate {
                // Closing the semaphore releases every waiter.
                let _ = gate.acquire().await;
            }
            if self.failing.contains(&tile) {
                return Err(FetchError::failed(tile, "backend unavailable"));
            }
            let scale = if self.unscaled.contains(&tile) {
                None
            } else {
                Some(1.0)
            };
            Ok(TileData {
                reconstructions: vec![reconstruction_at(&tile, tile.as_str(), scale)],
                tile,
            })
        })
    }
}

/// Let spawned tasks on the current-thread runtime make progress.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
