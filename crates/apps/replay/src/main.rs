//! Replays a recorded viewer track against tiles on disk and reports what the
//! spatial data pipeline placed in the scene.

mod settings;
mod track;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use runtime::Frame;
use scene::SpatialDataScene;
use streaming::{FilesystemLoader, SpatialDataComponent, SpatialDataInputs};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::track::TrackEvent;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay a viewer track through the spatial data pipeline")]
struct Args {
    /// Directory holding `<geohash>.json` tile files
    #[arg(long)]
    tiles: PathBuf,

    /// JSON array of reference, node and bearing events
    #[arg(long)]
    track: PathBuf,

    /// Component configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the discovery ring depth
    #[arg(long)]
    ring_depth: Option<usize>,

    /// Frames to render once the track has been processed
    #[arg(long, default_value_t = 1)]
    frames: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = settings::load_config(args.config.as_deref()).await?;
    if let Some(depth) = args.ring_depth {
        config.ring_depth = depth;
    }

    let events = track::load_track(&args.track).await?;
    info!(
        events = events.len(),
        tiles = %args.tiles.display(),
        ring_depth = config.ring_depth,
        "replaying track"
    );

    let loader = Arc::new(FilesystemLoader::new(&args.tiles));
    let mut component = SpatialDataComponent::new(config, loader, SpatialDataScene::new());

    let (bearing_tx, bearings) = mpsc::channel(64);
    let (node_tx, nodes) = mpsc::channel(64);
    let (reference_tx, reference) = watch::channel(None);
    let (frame_tx, frames) = mpsc::channel(8);
    let (render, mut submissions) = mpsc::channel(8);
    component.activate(SpatialDataInputs {
        bearings,
        nodes,
        reference,
        frames,
        render,
    })?;

    for event in events {
        match event {
            TrackEvent::Reference(point) => {
                reference_tx.send_replace(Some(point));
            }
            TrackEvent::Node(node) => node_tx.send(node).await?,
            TrackEvent::Bearing(bearing) => bearing_tx.send(bearing).await?,
        }
    }
    drop(node_tx);
    drop(bearing_tx);
    component.finish().await;

    let mut frame = Frame::new(0);
    for _ in 0..args.frames {
        frame = frame.next();
        frame_tx.send(frame).await?;
        let Some(submission) = submissions.recv().await else {
            break;
        };
        debug!(
            frame = submission.render.frame_id,
            needs_render = submission.render.needs_render,
            "render submission"
        );
        if submission.render.needs_render {
            submission.draw();
        }
    }

    {
        let scene = component.scene().lock();
        println!("tiles placed: {}", scene.tile_count());
        println!("reconstructions: {}", scene.reconstruction_count());
        println!("points: {}", scene.point_count());
        if let Some(frame) = scene.last_rendered_frame() {
            println!("last rendered frame: {frame}");
        }
    }
    println!("cached tiles: {}", component.cache().len());
    print!("{}", component.metrics());

    component.deactivate();
    Ok(())
}
