//! Tile discovery, caching and the reactive spatial data pipeline.

pub mod cache;
pub mod component;
pub mod config;
pub mod direction;
pub mod discovery;
pub mod loader;
pub mod node;
pub mod residency;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::*;
pub use component::*;
pub use config::*;
pub use direction::*;
pub use discovery::*;
pub use loader::*;
pub use node::*;
pub use residency::*;
pub use trigger::*;
