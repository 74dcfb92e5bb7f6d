//! The shared storyboard context: one layer registry observed by every
//! generator run pointed at it.
//!
//! Invariants:
//! * The same identifier yields the same layer reference for the context's
//!   whole lifetime, until [`StoryboardContext::reset`].
//! * `LayerCreated` fires exactly once per created layer, outside the
//!   context lock, to every subscriber registered at creation time.
//! * The unnamed slot is an ordinary [`LayerId::Unnamed`] entry, distinct
//!   from every named identifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use core_layer::{Layer, LayerId};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::ContextError;

pub type LayerFactory = Box<dyn Fn(&LayerId) -> Arc<Layer> + Send + Sync>;

#[derive(Debug, Clone)]
pub enum LayerEvent {
    Created(Arc<Layer>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct SharedState {
    /// Layers in insertion order, with an identifier index alongside.
    order: Vec<Arc<Layer>>,
    index: HashMap<LayerId, usize>,
    factory: Option<LayerFactory>,
    subscribers: Vec<(SubscriptionId, Sender<LayerEvent>)>,
}

#[derive(Default)]
pub struct StoryboardContext {
    state: Mutex<SharedState>,
    version: AtomicU64,
    next_subscription: AtomicU64,
}

impl StoryboardContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().expect("storyboard context lock poisoned")
    }

    /// Monotonic stamp, bumped on every layer creation and on reset.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    /// First factory wins; later attachments are ignored so every generator
    /// observes the same layer kind for the context's lifetime.
    pub fn attach_layer_factory(&self, factory: LayerFactory) {
        let mut state = self.lock();
        if state.factory.is_none() {
            state.factory = Some(factory);
        }
    }

    pub fn has_layer_factory(&self) -> bool {
        self.lock().factory.is_some()
    }

    /// Look up or create the layer for `id` using the attached factory.
    pub fn get_layer(&self, id: &LayerId) -> Result<Arc<Layer>, ContextError> {
        self.get_or_create(id, None).map(|(layer, _)| layer)
    }

    /// Look up or create with an inline fallback factory, used when no
    /// factory has been attached. Infallible.
    pub fn get_layer_or_else(
        &self,
        id: &LayerId,
        fallback: &dyn Fn(&LayerId) -> Arc<Layer>,
    ) -> (Arc<Layer>, bool) {
        self.get_or_create(id, Some(fallback))
            .expect("fallback factory makes creation infallible")
    }

    fn get_or_create(
        &self,
        id: &LayerId,
        fallback: Option<&dyn Fn(&LayerId) -> Arc<Layer>>,
    ) -> Result<(Arc<Layer>, bool), ContextError> {
        let (layer, created, recipients) = {
            let mut state = self.lock();
            if let Some(&pos) = state.index.get(id) {
                (state.order[pos].clone(), false, Vec::new())
            } else {
                let layer = match (&state.factory, fallback) {
                    (Some(factory), _) => factory(id),
                    (None, Some(factory)) => factory(id),
                    (None, None) => return Err(ContextError::LayerFactoryAbsent),
                };
                let pos = state.order.len();
                state.index.insert(id.clone(), pos);
                state.order.push(layer.clone());
                self.version.fetch_add(1, Ordering::Relaxed);
                let recipients: Vec<(SubscriptionId, Sender<LayerEvent>)> =
                    state.subscribers.clone();
                (layer, true, recipients)
            }
        };
        if created {
            tracing::info!(target: "context.shared", layer = %id, "layer_created");
            // Outside the lock: a subscriber reacting by calling back into
            // this context must not deadlock.
            let mut dead = Vec::new();
            for (subscription, sender) in recipients {
                if sender.send(LayerEvent::Created(layer.clone())).is_err() {
                    dead.push(subscription);
                }
            }
            if !dead.is_empty() {
                let mut state = self.lock();
                state
                    .subscribers
                    .retain(|(subscription, _)| !dead.contains(subscription));
            }
        }
        Ok((layer, created))
    }

    /// Non-creating lookup; the unnamed slot is supported like any other.
    pub fn try_get_layer(&self, id: &LayerId) -> Option<Arc<Layer>> {
        let state = self.lock();
        state.index.get(id).map(|&pos| state.order[pos].clone())
    }

    /// Point-in-time copy; later mutations do not propagate into it.
    pub fn snapshot_layers(&self) -> Vec<Arc<Layer>> {
        self.lock().order.clone()
    }

    /// Visit every layer in insertion order. With `snapshot` a copy is
    /// iterated; otherwise iteration happens under the context lock and the
    /// callback must finish promptly and must not reenter the context.
    pub fn for_each_layer(&self, snapshot: bool, mut f: impl FnMut(&Arc<Layer>)) {
        if snapshot {
            for layer in self.snapshot_layers() {
                f(&layer);
            }
        } else {
            let state = self.lock();
            for layer in &state.order {
                f(layer);
            }
        }
    }

    pub fn layer_count(&self) -> usize {
        self.lock().order.len()
    }

    /// Drop every layer, the unnamed slot included, and bump the version.
    /// Subscriptions and the attached factory survive a reset.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.order.clear();
        state.index.clear();
        self.version.fetch_add(1, Ordering::Relaxed);
        tracing::info!(target: "context.shared", "context_reset");
    }

    /// Register for `LayerCreated` events from now on.
    pub fn subscribe(&self) -> (SubscriptionId, Receiver<LayerEvent>) {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = unbounded();
        self.lock().subscribers.push((id, sender));
        (id, receiver)
    }

    /// Detach a subscription; its receiver sees no further events.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock()
            .subscribers
            .retain(|(subscription, _)| *subscription != id);
    }
}

/// Shared contexts keyed by the script's shared-context key: scripts with
/// identical keys observe the same [`StoryboardContext`].
#[derive(Default)]
pub struct SharedContextPool {
    contexts: Mutex<HashMap<String, Arc<StoryboardContext>>>,
}

impl SharedContextPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context_for(&self, key: &str) -> Arc<StoryboardContext> {
        self.contexts
            .lock()
            .expect("context pool lock poisoned")
            .entry(key.to_owned())
            .or_insert_with(|| {
                tracing::debug!(target: "context.shared", key, "shared_context_created");
                Arc::new(StoryboardContext::new())
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.contexts.lock().expect("context pool lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
