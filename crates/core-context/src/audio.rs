//! FFT audio sources and the per-context cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// FFT audio collaborator, constructed from an absolute file path by the
/// loader the context was configured with.
pub trait FftSource: Send + Sync {
    /// Track length in milliseconds.
    fn duration(&self) -> f64;
    /// Sample frequency in Hz.
    fn frequency(&self) -> f64;
    /// Spectrum magnitudes at `time` milliseconds. With `split_channels`,
    /// per-channel spectra are concatenated instead of mixed down.
    fn fft_at(&self, time: f64, split_channels: bool) -> Vec<f32>;
}

pub type FftLoader = Box<dyn Fn(&Path) -> anyhow::Result<Arc<dyn FftSource>> + Send + Sync>;

/// Cache keyed by absolute path, owned by a single generator context and
/// released with it.
pub(crate) struct FftCache {
    loader: Option<FftLoader>,
    entries: HashMap<PathBuf, Arc<dyn FftSource>>,
}

impl FftCache {
    pub(crate) fn new(loader: Option<FftLoader>) -> Self {
        Self {
            loader,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn get_or_load(&mut self, path: &Path) -> anyhow::Result<Arc<dyn FftSource>> {
        if let Some(entry) = self.entries.get(path) {
            return Ok(entry.clone());
        }
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no audio loader configured for this context"))?;
        let source = loader(path)?;
        tracing::debug!(
            target: "context.audio",
            path = %path.display(),
            duration = source.duration(),
            "audio_source_loaded"
        );
        self.entries.insert(path.to_path_buf(), source.clone());
        Ok(source)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
