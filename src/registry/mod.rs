pub mod manifest;
pub mod sources;

pub use manifest::*;
pub use sources::*;
