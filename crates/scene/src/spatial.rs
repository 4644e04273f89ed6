use std::collections::BTreeMap;

use foundation::TileId;
use foundation::math::Vec3;
use runtime::frame::Frame;

use crate::reconstruction::Reconstruction;
use crate::transform::LocalTransform;

/// Scene collaborator fed by the spatial data pipeline.
pub trait ReconstructionScene: Send + 'static {
    fn add_reconstruction(
        &mut self,
        reconstruction: &Reconstruction,
        transform: &LocalTransform,
        tile: &TileId,
    );

    fn clear(&mut self);

    fn needs_render(&self) -> bool;

    fn render(&mut self, frame: Frame);
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScenePoint {
    pub position: Vec3,
    pub color: [u8; 3],
}

/// A reconstruction placed in the scene frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedReconstruction {
    pub main_shot: String,
    pub camera_center: Vec3,
    pub points: Vec<ScenePoint>,
}

/// Point clouds grouped by the tile they were fetched for.
#[derive(Debug, Default)]
pub struct SpatialDataScene {
    tiles: BTreeMap<TileId, Vec<PlacedReconstruction>>,
    needs_render: bool,
    last_rendered_frame: Option<u64>,
}

impl SpatialDataScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_tile(&self, tile: &TileId) -> bool {
        self.tiles.contains_key(tile)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn reconstruction_count(&self) -> usize {
        self.tiles.values().map(Vec::len).sum()
    }

    pub fn point_count(&self) -> usize {
        self.tiles
            .values()
            .flatten()
            .map(|r| r.points.len())
            .sum()
    }

    pub fn reconstructions(&self, tile: &TileId) -> &[PlacedReconstruction] {
        self.tiles.get(tile).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tiles(&self) -> impl Iterator<Item = &TileId> {
        self.tiles.keys()
    }

    pub fn last_rendered_frame(&self) -> Option<u64> {
        self.last_rendered_frame
    }
}

impl ReconstructionScene for SpatialDataScene {
    /// Reconstructions are keyed by main shot within a tile; repeats are ignored.
    fn add_reconstruction(
        &mut self,
        reconstruction: &Reconstruction,
        transform: &LocalTransform,
        tile: &TileId,
    ) {
        let placed = self.tiles.entry(tile.clone()).or_default();
        if placed
            .iter()
            .any(|r| r.main_shot == reconstruction.main_shot)
        {
            return;
        }

        let points = reconstruction
            .points
            .values()
            .filter_map(|p| {
                transform
                    .reconstruction_to_local(p.position())
                    .map(|position| ScenePoint {
                        position,
                        color: p.color,
                    })
            })
            .collect();

        placed.push(PlacedReconstruction {
            main_shot: reconstruction.main_shot.clone(),
            camera_center: transform.camera_center(),
            points,
        });
        self.needs_render = true;
    }

    fn clear(&mut self) {
        self.tiles.clear();
        self.needs_render = true;
    }

    fn needs_render(&self) -> bool {
        self.needs_render
    }

    fn render(&mut self, frame: Frame) {
        self.needs_render = false;
        self.last_rendered_frame = Some(frame.id);
    }
}
