use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use foundation::TileId;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::loader::{FetchError, TileData, TileLoader};
use crate::residency::TileState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// `cache_tile` was called for a tile that is already tracked.
    AlreadyTracked { tile: TileId, state: TileState },
    /// Fetches are spawned on the ambient tokio runtime and none was found.
    NoRuntime,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::AlreadyTracked { tile, state } => {
                write!(f, "tile {tile} is already {state}")
            }
            CacheError::NoRuntime => write!(f, "no tokio runtime to spawn tile fetch on"),
        }
    }
}

impl std::error::Error for CacheError {}

enum Entry {
    Pending { ticket: u64, abort: AbortHandle },
    Ready(Arc<TileData>),
    Failed,
}

impl Entry {
    fn state(&self) -> TileState {
        match self {
            Entry::Pending { .. } => TileState::Pending,
            Entry::Ready(_) => TileState::Ready,
            Entry::Failed => TileState::Failed,
        }
    }
}

#[derive(Default)]
struct Slots {
    next_ticket: u64,
    entries: BTreeMap<TileId, Entry>,
}

impl Slots {
    fn is_current(&self, tile: &TileId, ticket: u64) -> bool {
        matches!(
            self.entries.get(tile),
            Some(Entry::Pending { ticket: t, .. }) if *t == ticket
        )
    }
}

/// Tile store guaranteeing at most one in-flight fetch per tile.
///
/// Each tile is `Absent`, `Pending`, `Ready` or `Failed` ([`TileState`]). A
/// tracked tile only leaves the store through [`TileCache::evict`] or
/// [`TileCache::uncache`], so a failing tile is not fetched again until then.
/// Fetches run on
/// spawned tasks so they complete whether or not the caller awaits the
/// returned [`TileFetch`]. A completion is only applied if its pending entry
/// is still the current one, so fetches that finish after [`TileCache::uncache`]
/// or [`TileCache::evict`] are discarded.
///
/// Clones share the same store.
#[derive(Clone)]
pub struct TileCache {
    loader: Arc<dyn TileLoader>,
    slots: Arc<Mutex<Slots>>,
}

impl fmt::Debug for TileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("TileCache")
            .field("tracked", &slots.entries.len())
            .finish_non_exhaustive()
    }
}

impl TileCache {
    pub fn new(loader: Arc<dyn TileLoader>) -> Self {
        Self {
            loader,
            slots: Arc::new(Mutex::new(Slots::default())),
        }
    }

    pub fn state(&self, tile: &TileId) -> TileState {
        self.slots
            .lock()
            .entries
            .get(tile)
            .map_or(TileState::Absent, Entry::state)
    }

    /// True once the tile's data has arrived.
    pub fn has_tile(&self, tile: &TileId) -> bool {
        self.state(tile) == TileState::Ready
    }

    /// True while a fetch for the tile is in flight.
    pub fn is_caching_tile(&self, tile: &TileId) -> bool {
        self.state(tile) == TileState::Pending
    }

    pub fn get_tile(&self, tile: &TileId) -> Option<Arc<TileData>> {
        match self.slots.lock().entries.get(tile) {
            Some(Entry::Ready(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().entries.is_empty()
    }

    /// Tracked tiles in key order.
    pub fn tracked(&self) -> Vec<(TileId, TileState)> {
        self.slots
            .lock()
            .entries
            .iter()
            .map(|(tile, entry)| (tile.clone(), entry.state()))
            .collect()
    }

    /// Start fetching `tile`.
    ///
    /// Only valid for an `Absent` tile; callers check [`Self::state`] first.
    /// The returned future resolves once the fetch finishes, with
    /// [`FetchError::Cancelled`] if the tile was evicted or uncached in the
    /// meantime. On failure the tile stays tracked as `Failed`.
    pub fn cache_tile(&self, tile: TileId) -> Result<TileFetch, CacheError> {
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let mut slots = self.slots.lock();
        if let Some(entry) = slots.entries.get(&tile) {
            return Err(CacheError::AlreadyTracked {
                tile,
                state: entry.state(),
            });
        }

        let ticket = slots.next_ticket;
        slots.next_ticket += 1;

        let (tx, rx) = oneshot::channel();
        let loader = self.loader.clone();
        let shared = self.slots.clone();
        let task_tile = tile.clone();

        // The entry is inserted before the lock is released, so the task can
        // never observe the tile as untracked.
        let handle = runtime.spawn(async move {
            let result = loader.fetch(task_tile.clone()).await;

            let mut slots = shared.lock();
            if !slots.is_current(&task_tile, ticket) {
                debug!(tile = %task_tile, "discarding stale tile fetch");
                return;
            }
            let outcome = match result {
                Ok(data) => {
                    let data = Arc::new(data);
                    slots
                        .entries
                        .insert(task_tile.clone(), Entry::Ready(data.clone()));
                    Ok(data)
                }
                Err(err) => {
                    slots.entries.insert(task_tile.clone(), Entry::Failed);
                    Err(err)
                }
            };
            drop(slots);

            let _ = tx.send(outcome);
        });

        slots.entries.insert(
            tile.clone(),
            Entry::Pending {
                ticket,
                abort: handle.abort_handle(),
            },
        );
        debug!(%tile, ticket, "dispatched tile fetch");

        Ok(TileFetch { tile, rx })
    }

    /// Drop one tile, cancelling its fetch if pending.
    pub fn evict(&self, tile: &TileId) -> TileState {
        let removed = self.slots.lock().entries.remove(tile);
        match removed {
            Some(entry) => {
                if let Entry::Pending { abort, .. } = &entry {
                    abort.abort();
                }
                entry.state()
            }
            None => TileState::Absent,
        }
    }

    /// Drop every tile and cancel all in-flight fetches.
    pub fn uncache(&self) {
        let entries = std::mem::take(&mut self.slots.lock().entries);
        let mut cancelled = 0usize;
        for entry in entries.values() {
            if let Entry::Pending { abort, .. } = entry {
                abort.abort();
                cancelled += 1;
            }
        }
        debug!(dropped = entries.len(), cancelled, "uncached tiles");
    }
}

/// Completion of a fetch started by [`TileCache::cache_tile`].
///
/// Dropping it does not cancel the fetch.
#[derive(Debug)]
pub struct TileFetch {
    tile: TileId,
    rx: oneshot::Receiver<Result<Arc<TileData>, FetchError>>,
}

impl Future for TileFetch {
    type Output = Result<Arc<TileData>, FetchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(FetchError::Cancelled(self.tile.clone()))),
            Poll::Pending => Poll::Pending,
        }
    }
}
