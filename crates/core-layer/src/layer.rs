//! Layers: named, ordered containers of storyboard objects.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use core_fusion::CommandFusionResult;
use core_storyboard::{lock_object, ObjectHandle};

use crate::contributor::ContributorId;
use crate::coordinator::LayerCommandCoordinator;

/// Layer identity. The unnamed slot is first-class and distinct from every
/// named identifier, including the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LayerId {
    Unnamed,
    Named(String),
}

impl LayerId {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn is_unnamed(&self) -> bool {
        matches!(self, Self::Unnamed)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unnamed => f.write_str("<unnamed>"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for LayerId {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

/// One layer: its identity, its coordinator, and the ordered object list the
/// coordinator's outputs are applied to.
#[derive(Debug, Default)]
pub struct Layer {
    id: LayerId,
    coordinator: LayerCommandCoordinator,
    objects: Mutex<Vec<ObjectHandle>>,
}

impl Default for LayerId {
    fn default() -> Self {
        Self::Unnamed
    }
}

impl Layer {
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            coordinator: LayerCommandCoordinator::new(),
            objects: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    pub fn coordinator(&self) -> &LayerCommandCoordinator {
        &self.coordinator
    }

    fn objects_lock(&self) -> MutexGuard<'_, Vec<ObjectHandle>> {
        self.objects.lock().expect("layer object list lock poisoned")
    }

    /// Append an object, attributing it to `contributor`.
    pub fn add_object(&self, object: ObjectHandle, contributor: &ContributorId) {
        self.coordinator.track(&object, contributor);
        self.objects_lock().push(object);
    }

    /// Remove an object and stop tracking it; no-op when absent.
    pub fn remove_object(&self, object: &ObjectHandle) {
        let id = lock_object(object).id();
        self.coordinator.untrack(object);
        self.objects_lock().retain(|o| lock_object(o).id() != id);
    }

    /// Point-in-time copy of the object list.
    pub fn objects(&self) -> Vec<ObjectHandle> {
        self.objects_lock().clone()
    }

    pub fn object_count(&self) -> usize {
        self.objects_lock().len()
    }

    /// The pre-export pass: apply the deterministic object order if it
    /// differs, then fuse every object's commands. Returns one fusion result
    /// per processed sprite.
    pub fn post_process(&self) -> Vec<CommandFusionResult> {
        let mut current = self.objects();
        if let Some(ordered) = self.coordinator.try_build_ordered(&current) {
            *self.objects_lock() = ordered.clone();
            current = ordered;
        }
        self.coordinator.merge_commands(&current)
    }
}
