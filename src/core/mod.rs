pub mod cleanup;
pub mod config;
pub mod environment;
pub mod error;
pub mod version;

pub use cleanup::*;
pub use config::*;
pub use environment::*;
pub use error::*;
pub use version::*;
