pub mod geodesy;
pub mod local;
pub mod rotation;
pub mod vec;

pub use geodesy::*;
pub use local::*;
pub use rotation::*;
pub use vec::*;
