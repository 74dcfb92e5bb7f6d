//! Generation settings loading and parsing.
//!
//! Parses `storyboarder.toml` (or an override path provided by the host)
//! extracting `[generation]` and `[watch]` settings with defaults when
//! absent. The raw parsed thread count is retained so a change in available
//! parallelism can re-clamp without re-reading the file; the clamp logic
//! lives in `Config::apply_context`. Unknown fields are ignored (TOML
//! deserialization tolerance) so the file format can evolve without breaking
//! older hosts. A missing or unparseable file falls back to defaults.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::info;

/// Host-provided facts the settings are applied against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationContext {
    /// Worker threads the host is willing to give multithreaded generation.
    pub available_threads: u16,
}

impl GenerationContext {
    pub const fn new(available_threads: u16) -> Self {
        Self { available_threads }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationSection {
    /// Allow generator runs to execute on worker threads.
    #[serde(default)]
    pub multithreaded: bool,
    /// Requested worker thread count; clamped to the host's parallelism.
    #[serde(default = "GenerationSection::default_threads")]
    pub threads: u16,
    /// Priority assigned to contributors that never set one.
    #[serde(default)]
    pub default_priority: i32,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            multithreaded: false,
            threads: Self::default_threads(),
            default_priority: 0,
        }
    }
}

impl GenerationSection {
    const fn default_threads() -> u16 {
        4
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchSection {
    /// Forward script dependencies to the file watcher.
    #[serde(default = "WatchSection::default_dependencies")]
    pub dependencies: bool,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            dependencies: Self::default_dependencies(),
        }
    }
}

impl WatchSection {
    const fn default_dependencies() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub watch: WatchSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>,       // original file string (optional)
    pub file: ConfigFile,          // parsed (or default) data
    pub effective_threads: u16,    // clamped to host parallelism
}

/// Best-effort config path following platform conventions (XDG / AppData
/// Roaming), preferring a local `storyboarder.toml` next to the project.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("storyboarder.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("storyboarder").join("storyboarder.toml");
    }
    PathBuf::from("storyboarder.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                raw: Some(content),
                file,
                effective_threads: 0, // computed later
            }),
            Err(_e) => {
                // On parse error fall back to defaults rather than failing
                // the whole run over a settings file.
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Apply host context to compute the clamped worker thread count.
    /// Returns the effective (possibly clamped) value. A single-threaded
    /// host disables multithreaded generation outright.
    pub fn apply_context(&mut self, ctx: GenerationContext) -> u16 {
        let raw = self.file.generation.threads;
        let max = ctx.available_threads.max(1);
        let clamped = raw.clamp(1, max);
        if clamped != raw {
            info!(
                target: "config",
                raw,
                clamped,
                max,
                multithreaded = self.file.generation.multithreaded,
                "generation_threads_clamped"
            );
        }
        self.effective_threads = clamped;
        clamped
    }

    /// Whether generator runs may execute on worker threads at all.
    pub fn multithreaded(&self) -> bool {
        self.file.generation.multithreaded && self.effective_threads > 1
    }

    /// Recompute the effective thread count after the host's parallelism
    /// changed. Returns `Some(new_value)` when the effective value changed.
    pub fn recompute_with_context(&mut self, ctx: GenerationContext) -> Option<u16> {
        let prev = self.effective_threads;
        let current = self.apply_context(ctx);
        if current != prev { Some(current) } else { None }
    }
}
