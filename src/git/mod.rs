pub mod command;
pub mod reconciler;

pub use command::*;
pub use reconciler::*;
