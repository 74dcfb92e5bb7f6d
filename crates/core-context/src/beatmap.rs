//! Read-only beatmap collaborator.
//!
//! Beatmap parsing lives outside the coordinator; the context only hands out
//! references and records that the run depended on them.

use std::path::Path;

pub trait Beatmap: Send + Sync {
    fn name(&self) -> &str;
    fn audio_path(&self) -> Option<&Path> {
        None
    }
}
