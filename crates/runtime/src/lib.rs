pub mod frame;
pub mod metrics;
pub mod render;

pub use frame::*;
pub use metrics::*;
pub use render::*;
