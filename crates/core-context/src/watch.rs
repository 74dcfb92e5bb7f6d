//! Dependency watching: the file-watcher collaborator a generator appends to.
//!
//! Watch-only semantics: paths are added to a set and never removed for the
//! lifetime of the watcher. The watcher is shared by reference between runs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use notify::Watcher as _;

pub trait DependencyWatcher: Send + Sync {
    /// Append `path` to the watched set. Must be a silent no-op on repeats
    /// and must not fail the caller when the path cannot be watched.
    fn watch(&self, path: &Path);
    fn watched(&self) -> Vec<PathBuf>;
}

/// In-memory recorder: the default watcher and the test double.
#[derive(Debug, Default)]
pub struct RecordingWatcher {
    paths: Mutex<BTreeSet<PathBuf>>,
}

impl RecordingWatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DependencyWatcher for RecordingWatcher {
    fn watch(&self, path: &Path) {
        self.paths
            .lock()
            .expect("watch set lock poisoned")
            .insert(path.to_path_buf());
    }

    fn watched(&self) -> Vec<PathBuf> {
        self.paths
            .lock()
            .expect("watch set lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

/// Filesystem-backed watcher forwarding change notifications into a channel.
pub struct FsDependencyWatcher {
    watcher: Mutex<notify::RecommendedWatcher>,
    paths: Mutex<BTreeSet<PathBuf>>,
}

impl FsDependencyWatcher {
    /// `events` receives raw notifications for every watched dependency.
    pub fn new(events: crossbeam_channel::Sender<notify::Event>) -> anyhow::Result<Self> {
        let watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        let _ = events.send(event);
                    }
                    Err(error) => {
                        tracing::warn!(target: "context.watch", %error, "watch_error");
                    }
                }
            })?;
        Ok(Self {
            watcher: Mutex::new(watcher),
            paths: Mutex::new(BTreeSet::new()),
        })
    }
}

impl DependencyWatcher for FsDependencyWatcher {
    fn watch(&self, path: &Path) {
        let mut paths = self.paths.lock().expect("watch set lock poisoned");
        if !paths.insert(path.to_path_buf()) {
            return;
        }
        let result = self
            .watcher
            .lock()
            .expect("notify watcher lock poisoned")
            .watch(path, notify::RecursiveMode::NonRecursive);
        if let Err(error) = result {
            // Missing files are still recorded: the dependency may appear
            // later and a re-run will watch it again.
            tracing::warn!(
                target: "context.watch",
                path = %path.display(),
                %error,
                "watch_failed"
            );
        }
    }

    fn watched(&self) -> Vec<PathBuf> {
        self.paths
            .lock()
            .expect("watch set lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}
