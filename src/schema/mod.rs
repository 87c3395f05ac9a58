//! Schema module - Configuration, progress and problem definition types.

mod config;
mod program;
mod progress;

pub use config::*;
pub use program::*;
pub use progress::*;
