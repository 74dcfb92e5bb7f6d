//! Context-level error kinds.
//!
//! Fusion, tracking, and ordering never error for well-formed inputs; they
//! degrade instead. These are the environment/misuse cases the context layer
//! surfaces to callers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    /// The mapset folder disappeared since the run started; raised on read.
    #[error("mapset path no longer exists: {0}")]
    MapsetMissing(PathBuf),
    /// A shared context was asked to create a layer before any generator
    /// attached a layer factory.
    #[error("no layer factory attached to the shared storyboard context")]
    LayerFactoryAbsent,
}
