pub mod reconstruction;
pub mod spatial;
pub mod transform;

pub use reconstruction::*;
pub use spatial::*;
pub use transform::*;
