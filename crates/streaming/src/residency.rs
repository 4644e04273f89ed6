use std::fmt;

/// Cache lifecycle of a single tile.
///
/// `Absent -> Pending` when a fetch is dispatched, then `Ready` or `Failed`
/// when it resolves. Only an eviction or a full uncache returns a tile to
/// `Absent`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum TileState {
    #[default]
    Absent,
    Pending,
    Ready,
    Failed,
}

impl TileState {
    pub fn is_tracked(self) -> bool {
        self != TileState::Absent
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TileState::Absent => "absent",
            TileState::Pending => "pending",
            TileState::Ready => "ready",
            TileState::Failed => "failed",
        };
        f.write_str(s)
    }
}
