pub mod geo;
pub mod geohash;
pub mod math;

// Foundation crate: small, well-tested primitives only.
pub use geo::*;
pub use geohash::*;
