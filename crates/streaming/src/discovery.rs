//! Forward-facing tile discovery.
//!
//! Starting at the tile the viewer stands in, discovery walks outwards through
//! a wedge of three adjacent compass slots centred on the facing direction.
//! Each ring adds the wedge neighbours of every tile first reached on the
//! previous ring, so `ring_depth` bounds how far ahead tiles are requested.

use std::collections::BTreeSet;

use foundation::{Compass, TileId};

use crate::direction::Direction;

pub const DEFAULT_RING_DEPTH: usize = 2;

/// The three compass slots explored when facing `direction`.
///
/// Ordered counter-clockwise neighbour, facing slot, clockwise neighbour. An
/// unknown direction faces north.
pub fn wedge(direction: Direction) -> [Compass; 3] {
    let facing = direction.compass().unwrap_or(Compass::N);
    [facing.rotate(-1), facing, facing.rotate(1)]
}

/// Tiles to request when standing in `origin` and facing `direction`.
///
/// The result is duplicate-free, starts with `origin` and is ordered by ring,
/// so nearer tiles are fetched first. Depth 0 yields only the origin. A tile
/// reachable on several rings is expanded from the earliest one, which gives
/// the same set as expanding every path but visits each tile once.
pub fn discover_tiles(origin: &TileId, direction: Direction, ring_depth: usize) -> Vec<TileId> {
    let slots = wedge(direction);

    let mut seen = BTreeSet::new();
    seen.insert(origin.clone());
    let mut ordered = vec![origin.clone()];
    let mut ring = vec![origin.clone()];

    for _ in 0..ring_depth {
        let mut next = Vec::with_capacity(ring.len() * slots.len());
        for tile in &ring {
            let neighbours = tile.neighbours();
            for slot in slots {
                let candidate = neighbours.get(slot);
                if seen.insert(candidate.clone()) {
                    next.push(candidate.clone());
                }
            }
        }
        ordered.extend(next.iter().cloned());
        ring = next;
    }

    ordered
}

/// Upper bound on the number of tiles [`discover_tiles`] can return.
pub fn max_discovered(ring_depth: usize) -> usize {
    let mut total = 1usize;
    let mut ring = 1usize;
    for _ in 0..ring_depth {
        ring = ring.saturating_mul(3);
        total = total.saturating_add(ring);
    }
    total
}
