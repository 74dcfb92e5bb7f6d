//! The per-run generator facade.
//!
//! One script run owns one `GeneratorContext`. Layers come from a local map
//! or from a shared [`StoryboardContext`]; either way the same uniform
//! [`LayerId`] addressing applies and every returned layer has the run's
//! contributor registered on its coordinator. Ambient run data (paths,
//! beatmaps, audio, cancellation, the log accumulator, the dependency
//! watcher) lives here, as does the [`GeneratorContext::activate`] ambient
//! binding.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use core_layer::{ContributorId, Layer, LayerId};
use crossbeam_channel::Receiver;

use crate::ambient::{self, ActivationScope};
use crate::audio::{FftCache, FftLoader, FftSource};
use crate::beatmap::Beatmap;
use crate::cancel::CancelToken;
use crate::error::ContextError;
use crate::shared::{LayerEvent, StoryboardContext, SubscriptionId};
use crate::watch::{DependencyWatcher, RecordingWatcher};

/// Construction parameters. Fields are public; start from `default()` and
/// set what the run needs.
pub struct GeneratorParams {
    pub contributor_id: ContributorId,
    pub contributor_name: String,
    pub priority: i32,
    pub project_path: PathBuf,
    pub asset_path: PathBuf,
    pub mapset_path: PathBuf,
    pub beatmaps: Vec<Arc<dyn Beatmap>>,
    pub multithreaded: bool,
    pub cancel: CancelToken,
    pub watcher: Arc<dyn DependencyWatcher>,
    pub fft_loader: Option<FftLoader>,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            contributor_id: ContributorId::new("generator"),
            contributor_name: "generator".to_owned(),
            priority: 0,
            project_path: PathBuf::new(),
            asset_path: PathBuf::new(),
            mapset_path: PathBuf::new(),
            beatmaps: Vec::new(),
            multithreaded: false,
            cancel: CancelToken::new(),
            watcher: Arc::new(RecordingWatcher::new()),
            fft_loader: None,
        }
    }
}

enum LayerSource {
    Local {
        order: Vec<Arc<Layer>>,
        index: HashMap<LayerId, usize>,
    },
    Shared {
        context: Arc<StoryboardContext>,
        subscription: SubscriptionId,
        events: Receiver<LayerEvent>,
    },
}

pub struct GeneratorContext {
    contributor_id: ContributorId,
    contributor_name: String,
    priority: i32,
    source: Mutex<LayerSource>,
    project_path: PathBuf,
    asset_path: PathBuf,
    mapset_path: PathBuf,
    beatmaps: Vec<Arc<dyn Beatmap>>,
    beatmap_dependent: AtomicBool,
    multithreaded: bool,
    cancel: CancelToken,
    log: Mutex<Vec<String>>,
    watcher: Arc<dyn DependencyWatcher>,
    audio: Mutex<FftCache>,
    accessed: Mutex<Vec<Arc<Layer>>>,
}

impl GeneratorContext {
    pub fn new(params: GeneratorParams) -> Arc<Self> {
        Arc::new(Self {
            contributor_id: params.contributor_id,
            contributor_name: params.contributor_name,
            priority: params.priority,
            source: Mutex::new(LayerSource::Local {
                order: Vec::new(),
                index: HashMap::new(),
            }),
            project_path: params.project_path,
            asset_path: params.asset_path,
            mapset_path: params.mapset_path,
            beatmaps: params.beatmaps,
            beatmap_dependent: AtomicBool::new(false),
            multithreaded: params.multithreaded,
            cancel: params.cancel,
            log: Mutex::new(Vec::new()),
            watcher: params.watcher,
            audio: Mutex::new(FftCache::new(params.fft_loader)),
            accessed: Mutex::new(Vec::new()),
        })
    }

    fn source_lock(&self) -> MutexGuard<'_, LayerSource> {
        self.source.lock().expect("layer source lock poisoned")
    }

    pub fn contributor_id(&self) -> &ContributorId {
        &self.contributor_id
    }

    /// Bind this context as the run-local current context until the returned
    /// scope drops.
    pub fn activate(self: Arc<Self>) -> ActivationScope {
        ambient::activate(self)
    }

    /// Point the context at a shared storyboard context, or back at a fresh
    /// local map with `None`. The previous shared subscription is unhooked;
    /// pointing at the context already in use is a no-op.
    pub fn set_shared_context(&self, shared: Option<Arc<StoryboardContext>>) {
        let mut source = self.source_lock();
        match (&*source, &shared) {
            (LayerSource::Shared { context, .. }, Some(new)) if Arc::ptr_eq(context, new) => {
                return;
            }
            (LayerSource::Local { .. }, None) => return,
            _ => {}
        }
        if let LayerSource::Shared {
            context,
            subscription,
            ..
        } = &*source
        {
            context.unsubscribe(*subscription);
        }
        *source = match shared {
            Some(context) => {
                // The layer kind this editor uses; first attachment wins so
                // every generator sharing the context agrees.
                context.attach_layer_factory(Box::new(|id| Arc::new(Layer::new(id.clone()))));
                let (subscription, events) = context.subscribe();
                LayerSource::Shared {
                    context,
                    subscription,
                    events,
                }
            }
            None => LayerSource::Local {
                order: Vec::new(),
                index: HashMap::new(),
            },
        };
    }

    pub fn shared_context(&self) -> Option<Arc<StoryboardContext>> {
        match &*self.source_lock() {
            LayerSource::Shared { context, .. } => Some(context.clone()),
            LayerSource::Local { .. } => None,
        }
    }

    /// Layer lookup/creation. The unnamed slot is addressed with
    /// [`LayerId::Unnamed`] in both modes. Every returned layer has this
    /// run's contributor registered on its coordinator.
    pub fn get_layer(&self, id: &LayerId) -> Arc<Layer> {
        let (layer, created) = {
            let mut source = self.source_lock();
            match &mut *source {
                LayerSource::Local { order, index } => match index.get(id) {
                    Some(&pos) => (order[pos].clone(), false),
                    None => {
                        let layer = Arc::new(Layer::new(id.clone()));
                        index.insert(id.clone(), order.len());
                        order.push(layer.clone());
                        (layer, true)
                    }
                },
                LayerSource::Shared { context, .. } => {
                    context.get_layer_or_else(id, &|id| Arc::new(Layer::new(id.clone())))
                }
            }
        };
        layer.coordinator().register_contributor(
            self.contributor_id.clone(),
            self.contributor_name.clone(),
            self.priority,
        );
        self.on_layer_accessed(&layer);
        if created {
            self.on_layer_created(&layer);
        }
        layer
    }

    fn on_layer_accessed(&self, layer: &Arc<Layer>) {
        tracing::trace!(
            target: "context.generator",
            layer = %layer.id(),
            contributor = %self.contributor_id,
            "layer_accessed"
        );
        let mut accessed = self.accessed.lock().expect("accessed list lock poisoned");
        if !accessed.iter().any(|l| Arc::ptr_eq(l, layer)) {
            accessed.push(layer.clone());
        }
    }

    fn on_layer_created(&self, layer: &Arc<Layer>) {
        tracing::debug!(
            target: "context.generator",
            layer = %layer.id(),
            contributor = %self.contributor_id,
            "layer_created_by_this_run"
        );
    }

    /// Every distinct layer this run obtained, in first-access order.
    pub fn accessed_layers(&self) -> Vec<Arc<Layer>> {
        self.accessed
            .lock()
            .expect("accessed list lock poisoned")
            .clone()
    }

    /// Creation events observed from the shared context since the last call,
    /// including layers created by other generators. Empty in local mode.
    pub fn take_layer_events(&self) -> Vec<LayerEvent> {
        match &*self.source_lock() {
            LayerSource::Shared { events, .. } => events.try_iter().collect(),
            LayerSource::Local { .. } => Vec::new(),
        }
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn asset_path(&self) -> &Path {
        &self.asset_path
    }

    /// The mapset folder; reading it verifies it still exists.
    pub fn mapset_path(&self) -> Result<&Path, ContextError> {
        if self.mapset_path.is_dir() {
            Ok(&self.mapset_path)
        } else {
            Err(ContextError::MapsetMissing(self.mapset_path.clone()))
        }
    }

    /// The primary beatmap. Reading it marks the run beatmap-dependent.
    pub fn beatmap(&self) -> Option<Arc<dyn Beatmap>> {
        self.beatmap_dependent.store(true, Ordering::Relaxed);
        self.beatmaps.first().cloned()
    }

    /// All beatmaps of the mapset. Reading them marks the run
    /// beatmap-dependent.
    pub fn beatmaps(&self) -> Vec<Arc<dyn Beatmap>> {
        self.beatmap_dependent.store(true, Ordering::Relaxed);
        self.beatmaps.clone()
    }

    /// Whether this run read beatmap data and must re-run when it changes.
    pub fn beatmap_dependent(&self) -> bool {
        self.beatmap_dependent.load(Ordering::Relaxed)
    }

    /// FFT data for an audio file, cached per absolute path for the life of
    /// this context. Relative paths resolve against the project path.
    pub fn audio_source(&self, path: &Path) -> anyhow::Result<Arc<dyn FftSource>> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_path.join(path)
        };
        self.audio
            .lock()
            .expect("audio cache lock poisoned")
            .get_or_load(&absolute)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn multithreaded(&self) -> bool {
        self.multithreaded
    }

    /// Append to the run log shown alongside the effect status.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "context.generator", contributor = %self.contributor_id, "{message}");
        self.log
            .lock()
            .expect("run log lock poisoned")
            .push(message);
    }

    /// Drain the accumulated run log.
    pub fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock().expect("run log lock poisoned"))
    }

    /// Forward a file dependency to the shared watcher (watch-only append).
    pub fn add_dependency(&self, path: &Path) {
        self.watcher.watch(path);
    }

    pub fn watcher(&self) -> &Arc<dyn DependencyWatcher> {
        &self.watcher
    }
}

impl Drop for GeneratorContext {
    fn drop(&mut self) {
        if let LayerSource::Shared {
            context,
            subscription,
            ..
        } = &*self.source_lock()
        {
            context.unsubscribe(*subscription);
        }
        let cached = self.audio.lock().expect("audio cache lock poisoned").len();
        if cached > 0 {
            tracing::trace!(
                target: "context.audio",
                released = cached,
                "audio_cache_released"
            );
        }
    }
}
