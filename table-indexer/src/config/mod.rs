//! Configuration and dependency wiring for the table indexer.

mod dependencies;
mod pacing;
mod run_metadata;

pub use dependencies::{ConnectionMode, Dependencies};
pub use pacing::{pause, PacingPolicy};
pub use run_metadata::RunMetadata;
