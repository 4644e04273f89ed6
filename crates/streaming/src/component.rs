//! The spatial data component.
//!
//! While active, three tasks run on the ambient tokio runtime:
//!
//! - the trigger task joins the latest node position with the latest
//!   (de-duplicated) viewing direction into [`TileTrigger`]s;
//! - the tile worker handles triggers strictly in order. For each one it
//!   discovers the forward tiles, fetches those the cache does not already
//!   hold or have in flight one at a time, and places every reconstruction
//!   with a valid scale into the scene relative to the latest reference;
//! - the render task answers every frame with a [`GlRenderHash`] submission.
//!
//! Deactivation cancels the tasks, drops every cached tile and clears the scene.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use foundation::{GeoPoint, GeohashError, TileId};
use parking_lot::Mutex;
use runtime::{Frame, GlRender, GlRenderHash, Metrics, MetricsSnapshot, RenderStage};
use scene::{ReconstructionScene, ScaleValidity, build_transform};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::TileCache;
use crate::config::SpatialDataConfig;
use crate::discovery::discover_tiles;
use crate::loader::{TileData, TileLoader};
use crate::node::Node;
use crate::trigger::{TileTrigger, TriggerState};

#[derive(Debug, Clone, PartialEq)]
pub enum ComponentError {
    AlreadyActive,
    /// `activate` must be called from within a tokio runtime.
    NoRuntime,
    InvalidConfig(GeohashError),
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentError::AlreadyActive => write!(f, "component is already active"),
            ComponentError::NoRuntime => write!(f, "no tokio runtime to activate on"),
            ComponentError::InvalidConfig(e) => write!(f, "invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ComponentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComponentError::InvalidConfig(e) => Some(e),
            _ => None,
        }
    }
}

/// Streams the component subscribes to on activation.
pub struct SpatialDataInputs {
    /// Viewer bearing in degrees.
    pub bearings: mpsc::Receiver<f64>,
    pub nodes: mpsc::Receiver<Node>,
    /// Scene reference origin. Reconstructions arriving while it is `None` are dropped.
    pub reference: watch::Receiver<Option<GeoPoint>>,
    pub frames: mpsc::Receiver<Frame>,
    /// Receives one render submission per frame.
    pub render: mpsc::Sender<GlRenderHash>,
}

struct Subscriptions {
    trigger: Option<JoinHandle<()>>,
    tiles: Option<JoinHandle<()>>,
    render: JoinHandle<()>,
}

impl Subscriptions {
    fn abort(self) {
        for handle in [self.trigger, self.tiles].into_iter().flatten() {
            handle.abort();
        }
        self.render.abort();
    }
}

pub struct SpatialDataComponent<S: ReconstructionScene> {
    config: SpatialDataConfig,
    cache: TileCache,
    scene: Arc<Mutex<S>>,
    metrics: Arc<Mutex<Metrics>>,
    /// Bumped on every deactivation; work started under an older value is discarded.
    epoch: Arc<AtomicU64>,
    subscriptions: Option<Subscriptions>,
}

impl<S: ReconstructionScene> SpatialDataComponent<S> {
    pub fn new(config: SpatialDataConfig, loader: Arc<dyn TileLoader>, scene: S) -> Self {
        Self {
            config,
            cache: TileCache::new(loader),
            scene: Arc::new(Mutex::new(scene)),
            metrics: Arc::new(Mutex::new(Metrics::new())),
            epoch: Arc::new(AtomicU64::new(0)),
            subscriptions: None,
        }
    }

    pub fn config(&self) -> &SpatialDataConfig {
        &self.config
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn scene(&self) -> &Arc<Mutex<S>> {
        &self.scene
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.lock().snapshot()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.metrics.lock().counter(name)
    }

    pub fn is_active(&self) -> bool {
        self.subscriptions.is_some()
    }

    pub fn activate(&mut self, inputs: SpatialDataInputs) -> Result<(), ComponentError> {
        if self.subscriptions.is_some() {
            return Err(ComponentError::AlreadyActive);
        }
        let runtime = Handle::try_current().map_err(|_| ComponentError::NoRuntime)?;
        self.config
            .validate()
            .map_err(ComponentError::InvalidConfig)?;

        let SpatialDataInputs {
            bearings,
            nodes,
            reference,
            frames,
            render,
        } = inputs;

        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let trigger = runtime.spawn(run_triggers(
            TriggerState::new(self.config.geohash_precision),
            bearings,
            nodes,
            trigger_tx,
        ));

        let worker = TileWorker {
            cache: self.cache.clone(),
            scene: self.scene.clone(),
            metrics: self.metrics.clone(),
            reference,
            ring_depth: self.config.ring_depth,
            validity: self.config.transform,
            epoch: self.epoch.clone(),
            activation: self.epoch.load(Ordering::SeqCst),
        };
        let tiles = runtime.spawn(worker.run(trigger_rx));

        let render = runtime.spawn(run_render(
            self.config.name.clone(),
            self.scene.clone(),
            self.metrics.clone(),
            frames,
            render,
        ));

        self.subscriptions = Some(Subscriptions {
            trigger: Some(trigger),
            tiles: Some(tiles),
            render,
        });
        info!(
            name = %self.config.name,
            precision = self.config.geohash_precision,
            ring_depth = self.config.ring_depth,
            "spatial data component activated"
        );
        Ok(())
    }

    /// Wait until the node and bearing streams have ended and every trigger
    /// they produced has been processed. Rendering keeps running.
    pub async fn finish(&mut self) {
        let Some(subscriptions) = self.subscriptions.as_mut() else {
            return;
        };
        let handles = [subscriptions.trigger.take(), subscriptions.tiles.take()];
        for handle in handles.into_iter().flatten() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!(%err, "spatial data task panicked");
                }
            }
        }
    }

    /// Cancel all subscriptions, drop cached tiles and clear the scene.
    ///
    /// Safe to call when not active.
    pub fn deactivate(&mut self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(subscriptions) = self.subscriptions.take() {
            subscriptions.abort();
            info!(name = %self.config.name, "spatial data component deactivated");
        }
        self.cache.uncache();
        self.scene.lock().clear();
    }
}

impl<S: ReconstructionScene> Drop for SpatialDataComponent<S> {
    fn drop(&mut self) {
        if let Some(subscriptions) = self.subscriptions.take() {
            subscriptions.abort();
        }
    }
}

/// Nodes are polled ahead of bearings, so when both streams have items buffered
/// a pending bearing is joined with the newest node.
async fn run_triggers(
    mut state: TriggerState,
    mut bearings: mpsc::Receiver<f64>,
    mut nodes: mpsc::Receiver<Node>,
    triggers: mpsc::UnboundedSender<TileTrigger>,
) {
    let mut nodes_open = true;
    let mut bearings_open = true;

    loop {
        let trigger = tokio::select! {
            biased;
            node = nodes.recv(), if nodes_open => match node {
                Some(node) => match state.on_node(&node) {
                    Ok(trigger) => trigger,
                    Err(err) => {
                        warn!(key = %node.key, %err, "node position cannot be tiled");
                        None
                    }
                },
                None => {
                    nodes_open = false;
                    None
                }
            },
            bearing = bearings.recv(), if bearings_open => match bearing {
                Some(bearing) => state.on_bearing(bearing),
                None => {
                    bearings_open = false;
                    None
                }
            },
            else => break,
        };

        if let Some(trigger) = trigger {
            if triggers.send(trigger).is_err() {
                break;
            }
        }
    }
    debug!("position and bearing streams ended");
}

struct TileWorker<S> {
    cache: TileCache,
    scene: Arc<Mutex<S>>,
    metrics: Arc<Mutex<Metrics>>,
    reference: watch::Receiver<Option<GeoPoint>>,
    ring_depth: usize,
    validity: ScaleValidity,
    epoch: Arc<AtomicU64>,
    activation: u64,
}

impl<S: ReconstructionScene> TileWorker<S> {
    async fn run(self, mut triggers: mpsc::UnboundedReceiver<TileTrigger>) {
        while let Some(trigger) = triggers.recv().await {
            self.process(trigger).await;
        }
    }

    async fn process(&self, trigger: TileTrigger) {
        let candidates = discover_tiles(&trigger.tile, trigger.direction, self.ring_depth);
        {
            let mut metrics = self.metrics.lock();
            metrics.inc("discovery.runs");
            metrics.record_histogram("discovery.candidates", candidates.len() as i64);
        }
        debug!(
            tile = %trigger.tile,
            direction = %trigger.direction,
            candidates = candidates.len(),
            "discovered tiles"
        );

        for tile in candidates {
            if self.cache.state(&tile).is_tracked() {
                self.metrics.lock().inc("cache.skipped");
                continue;
            }

            let fetch = match self.cache.cache_tile(tile.clone()) {
                Ok(fetch) => fetch,
                Err(err) => {
                    error!(%err, "tile cache rejected request");
                    continue;
                }
            };
            self.metrics.lock().inc("fetch.dispatched");

            match fetch.await {
                Ok(data) => self.place(&tile, &data),
                Err(err) if err.is_cancelled() => {
                    debug!(%tile, "tile fetch cancelled");
                }
                Err(err) => {
                    warn!(%err, "tile fetch failed");
                    self.metrics.lock().inc("fetch.failed");
                }
            }
        }
    }

    fn place(&self, tile: &TileId, data: &TileData) {
        for item in &data.reconstructions {
            let Some(reference) = *self.reference.borrow() else {
                debug!(%tile, shot = %item.reconstruction.main_shot, "no reference yet");
                self.metrics.lock().inc("reference.missing");
                continue;
            };

            let transform = build_transform(&item.data, reference, &self.validity);
            if !transform.has_valid_scale() {
                debug!(
                    %tile,
                    shot = %item.reconstruction.main_shot,
                    scale = transform.scale(),
                    "dropping reconstruction with invalid scale"
                );
                self.metrics.lock().inc("transform.invalid");
                continue;
            }

            let mut scene = self.scene.lock();
            if self.epoch.load(Ordering::SeqCst) != self.activation {
                return;
            }
            scene.add_reconstruction(&item.reconstruction, &transform, tile);
            drop(scene);
            self.metrics.lock().inc("scene.inserted");
        }
    }
}

async fn run_render<S: ReconstructionScene>(
    name: String,
    scene: Arc<Mutex<S>>,
    metrics: Arc<Mutex<Metrics>>,
    mut frames: mpsc::Receiver<Frame>,
    out: mpsc::Sender<GlRenderHash>,
) {
    while let Some(frame) = frames.recv().await {
        let needs_render = scene.lock().needs_render();
        let draw = scene.clone();
        let submission = GlRenderHash {
            name: name.clone(),
            render: GlRender {
                frame_id: frame.id,
                needs_render,
                render: Arc::new(move |frame: Frame| draw.lock().render(frame)),
                stage: RenderStage::Foreground,
            },
        };
        metrics.lock().inc("render.records");

        if out.send(submission).await.is_err() {
            debug!("render consumer closed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use foundation::{Compass, GeoPoint, TileId};
    use pretty_assertions::assert_eq;
    use runtime::{Frame, GlRenderHash, RenderStage};
    use scene::{ReconstructionScene, ScaleValidity, SpatialDataScene, build_transform};
    use tokio::sync::{mpsc, watch};

    use super::{ComponentError, SpatialDataComponent, SpatialDataInputs};
    use crate::config::SpatialDataConfig;
    use crate::direction::Direction;
    use crate::discovery::discover_tiles;
    use crate::node::Node;
    use crate::residency::TileState;
    use crate::testing::{FakeLoader, reconstruction_at, settle};

    struct Harness {
        bearings: Option<mpsc::Sender<f64>>,
        nodes: Option<mpsc::Sender<Node>>,
        reference: watch::Sender<Option<GeoPoint>>,
        frames: mpsc::Sender<Frame>,
        render: mpsc::Receiver<GlRenderHash>,
    }

    impl Harness {
        /// Feed a node and a bearing, then close both streams.
        async fn look(self, bearing: f64) -> Self {
            self.look_many(&[bearing]).await
        }

        async fn look_many(mut self, bearings: &[f64]) -> Self {
            let nodes = self.nodes.take().unwrap();
            nodes.send(Node::new("a", origin())).await.unwrap();
            let bearing_tx = self.bearings.take().unwrap();
            for bearing in bearings {
                bearing_tx.send(*bearing).await.unwrap();
            }
            self
        }
    }

    fn origin() -> GeoPoint {
        GeoPoint::new(57.64911, 10.40744, 0.0)
    }

    fn tile(hash: &str) -> TileId {
        TileId::parse(hash).unwrap()
    }

    fn component(loader: &Arc<FakeLoader>) -> SpatialDataComponent<SpatialDataScene> {
        SpatialDataComponent::new(
            SpatialDataConfig::default(),
            loader.clone(),
            SpatialDataScene::new(),
        )
    }

    fn inputs(reference: Option<GeoPoint>) -> (SpatialDataInputs, Harness) {
        let (bearings_tx, bearings) = mpsc::channel(16);
        let (nodes_tx, nodes) = mpsc::channel(16);
        let (reference_tx, reference) = watch::channel(reference);
        let (frames_tx, frames) = mpsc::channel(16);
        let (render, render_rx) = mpsc::channel(16);
        (
            SpatialDataInputs {
                bearings,
                nodes,
                reference,
                frames,
                render,
            },
            Harness {
                bearings: Some(bearings_tx),
                nodes: Some(nodes_tx),
                reference: reference_tx,
                frames: frames_tx,
                render: render_rx,
            },
        )
    }

    fn activate(
        component: &mut SpatialDataComponent<SpatialDataScene>,
        reference: Option<GeoPoint>,
    ) -> Harness {
        let (inputs, harness) = inputs(reference);
        component.activate(inputs).unwrap();
        harness
    }

    fn north_tiles() -> Vec<TileId> {
        discover_tiles(&tile("u4pruydq"), Direction::new(Compass::N), 2)
    }

    #[tokio::test]
    async fn places_forward_tiles_in_scene() {
        let loader = Arc::new(FakeLoader::new());
        let mut c = component(&loader);
        let _h = activate(&mut c, Some(origin())).look(0.0).await;
        c.finish().await;

        assert_eq!(loader.calls(), north_tiles());
        let scene = c.scene().lock();
        assert_eq!(scene.tile_count(), 9);
        assert_eq!(scene.reconstruction_count(), 9);
        assert!(north_tiles().iter().all(|t| scene.has_tile(t)));
        drop(scene);

        assert_eq!(c.counter("discovery.runs"), 1);
        assert_eq!(c.counter("fetch.dispatched"), 9);
        assert_eq!(c.counter("scene.inserted"), 9);
        assert!(north_tiles().iter().all(|t| c.cache().has_tile(t)));
    }

    #[tokio::test]
    async fn turning_fetches_only_new_tiles() {
        let loader = Arc::new(FakeLoader::new());
        let mut c = component(&loader);
        // 10 and 12 both face north; 95 faces east.
        let _h = activate(&mut c, Some(origin()))
            .look_many(&[10.0, 12.0, 95.0])
            .await;
        c.finish().await;

        let east = discover_tiles(&tile("u4pruydq"), Direction::new(Compass::E), 2);
        let expected: BTreeSet<TileId> = north_tiles().into_iter().chain(east).collect();
        let calls = loader.calls();
        assert_eq!(calls.len(), 15);
        assert_eq!(calls.iter().cloned().collect::<BTreeSet<_>>(), expected);

        assert_eq!(c.counter("discovery.runs"), 2);
        assert_eq!(c.counter("cache.skipped"), 3);
        assert_eq!(c.scene().lock().tile_count(), 15);
    }

    #[tokio::test]
    async fn invalid_scale_is_not_placed() {
        let loader = Arc::new(FakeLoader::new().unscaled(&["u4pruydr"]));
        let mut c = component(&loader);
        let _h = activate(&mut c, Some(origin())).look(0.0).await;
        c.finish().await;

        let r = tile("u4pruydr");
        assert!(!c.scene().lock().has_tile(&r));
        assert_eq!(c.scene().lock().tile_count(), 8);
        assert!(c.cache().has_tile(&r));
        assert_eq!(c.counter("transform.invalid"), 1);
    }

    #[tokio::test]
    async fn failed_fetch_does_not_stop_the_batch() {
        let loader = Arc::new(FakeLoader::new().failing(&["u4pruydp"]));
        let mut c = component(&loader);
        let _h = activate(&mut c, Some(origin())).look(0.0).await;
        c.finish().await;

        let p = tile("u4pruydp");
        assert_eq!(c.cache().state(&p), TileState::Failed);
        assert_eq!(c.counter("fetch.failed"), 1);
        assert_eq!(c.scene().lock().tile_count(), 8);
        assert!(c.scene().lock().has_tile(&tile("u4pruyfb")));
    }

    #[tokio::test]
    async fn failing_tile_is_not_refetched_by_later_triggers() {
        let loader = Arc::new(FakeLoader::new().failing(&["u4pruydp"]));
        let mut c = component(&loader);
        let mut h = activate(&mut c, Some(origin()));
        let nodes = h.nodes.take().unwrap();
        let bearings = h.bearings.take().unwrap();

        bearings.send(0.0).await.unwrap();
        for _ in 0..3 {
            nodes.send(Node::new("a", origin())).await.unwrap();
            settle().await;
        }
        drop(nodes);
        drop(bearings);
        c.finish().await;

        let p = tile("u4pruydp");
        assert_eq!(loader.calls().iter().filter(|t| **t == p).count(), 1);
        assert_eq!(loader.call_count(), 9);
        assert_eq!(c.counter("discovery.runs"), 3);
        assert_eq!(c.counter("fetch.failed"), 1);
        assert_eq!(c.counter("cache.skipped"), 18);
        assert_eq!(c.cache().state(&p), TileState::Failed);
    }

    #[tokio::test]
    async fn without_reference_nothing_is_placed() {
        let loader = Arc::new(FakeLoader::new());
        let mut c = component(&loader);
        let _h = activate(&mut c, None).look(0.0).await;
        c.finish().await;

        assert_eq!(c.scene().lock().tile_count(), 0);
        assert_eq!(c.counter("reference.missing"), 9);
        assert_eq!(c.cache().len(), 9);
    }

    #[tokio::test]
    async fn placement_uses_latest_reference() {
        let (loader, gate) = FakeLoader::new().gated();
        let loader = Arc::new(loader);
        let mut c = component(&loader);
        let h = activate(&mut c, Some(origin())).look(0.0).await;
        settle().await;
        assert_eq!(loader.call_count(), 1);

        let moved = GeoPoint::new(57.65, 10.41, 0.0);
        h.reference.send_replace(Some(moved));
        gate.open();
        c.finish().await;

        let q = tile("u4pruydq");
        let expected = build_transform(
            &reconstruction_at(&q, q.as_str(), Some(1.0)).data,
            moved,
            &ScaleValidity::default(),
        );
        let scene = c.scene().lock();
        assert_eq!(scene.reconstructions(&q)[0].camera_center, expected.camera_center());
    }

    #[tokio::test]
    async fn render_submission_per_frame() {
        let loader = Arc::new(FakeLoader::new());
        let mut c = component(&loader);
        let mut h = activate(&mut c, Some(origin())).look(0.0).await;
        c.finish().await;

        h.frames.send(Frame::new(5)).await.unwrap();
        let submission = h.render.recv().await.unwrap();
        assert_eq!(submission.name, "spatialData");
        assert_eq!(submission.render.frame_id, 5);
        assert_eq!(submission.render.stage, RenderStage::Foreground);
        assert!(submission.render.needs_render);

        submission.draw();
        assert!(!c.scene().lock().needs_render());
        assert_eq!(c.scene().lock().last_rendered_frame(), Some(5));

        h.frames.send(Frame::new(6)).await.unwrap();
        let idle = h.render.recv().await.unwrap();
        assert_eq!(idle.render.frame_id, 6);
        assert!(!idle.render.needs_render);
        assert_eq!(c.counter("render.records"), 2);
    }

    #[tokio::test]
    async fn deactivate_tears_everything_down() {
        let (loader, gate) = FakeLoader::new().gated();
        let loader = Arc::new(loader);
        let mut c = component(&loader);
        let mut h = activate(&mut c, Some(origin())).look(0.0).await;
        settle().await;
        assert!(c.cache().is_caching_tile(&tile("u4pruydq")));

        c.deactivate();
        assert!(!c.is_active());
        assert!(c.cache().is_empty());
        assert_eq!(c.scene().lock().tile_count(), 0);
        assert!(h.render.recv().await.is_none());

        // Fetches released after teardown must not repopulate anything.
        gate.open();
        settle().await;
        assert!(c.cache().is_empty());
        assert_eq!(c.scene().lock().tile_count(), 0);

        // The component can be activated again.
        let _h = activate(&mut c, Some(origin())).look(0.0).await;
        c.finish().await;
        assert_eq!(c.scene().lock().tile_count(), 9);
    }

    #[tokio::test]
    async fn lifecycle_errors() {
        let loader = Arc::new(FakeLoader::new());
        let mut c = component(&loader);
        c.deactivate();

        let _h = activate(&mut c, Some(origin()));
        let (again, _h2) = inputs(None);
        assert_eq!(c.activate(again), Err(ComponentError::AlreadyActive));

        let mut bad = SpatialDataComponent::new(
            SpatialDataConfig {
                geohash_precision: 0,
                ..SpatialDataConfig::default()
            },
            loader.clone(),
            SpatialDataScene::new(),
        );
        let (bad_inputs, _h3) = inputs(None);
        let err = bad.activate(bad_inputs).unwrap_err();
        assert!(matches!(err, ComponentError::InvalidConfig(_)));
        assert!(!bad.is_active());
    }

    #[test]
    fn activation_requires_runtime() {
        let loader = Arc::new(FakeLoader::new());
        let mut c = component(&loader);
        let (orphan, _h) = inputs(None);
        assert_eq!(c.activate(orphan), Err(ComponentError::NoRuntime));
    }
}
