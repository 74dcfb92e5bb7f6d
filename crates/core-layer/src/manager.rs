//! The ordered list of layers visible to the editor.
//!
//! Re-runs rebuild a script's layers wholesale; the replace forms let the
//! editor splice the fresh list in while reusing the shared references other
//! holders still point at.

use std::sync::Arc;

use crate::layer::{Layer, LayerId};

#[derive(Debug, Default)]
pub struct LayerManager {
    layers: Vec<Arc<Layer>>,
}

impl LayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[Arc<Layer>] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn add(&mut self, layer: Arc<Layer>) {
        self.layers.push(layer);
    }

    /// Remove the first layer with this identifier. Returns whether one was
    /// removed.
    pub fn remove(&mut self, id: &LayerId) -> bool {
        match self.layers.iter().position(|l| l.id() == id) {
            Some(pos) => {
                self.layers.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Replace one placeholder layer with a list, inlined at its position.
    /// Returns whether the placeholder was found.
    pub fn replace_with_many(
        &mut self,
        placeholder: &Arc<Layer>,
        replacements: Vec<Arc<Layer>>,
    ) -> bool {
        match self.layers.iter().position(|l| Arc::ptr_eq(l, placeholder)) {
            Some(pos) => {
                self.layers.splice(pos..=pos, replacements);
                true
            }
            None => false,
        }
    }

    /// Replace `old` with `new_layers` at the position of the first `old`
    /// member. New layers matching an old identifier reuse the old reference
    /// in place; ordering follows the new list; unreferenced old layers are
    /// dropped. When none of `old` is present the new list is appended.
    pub fn replace_many(&mut self, old: &[Arc<Layer>], new_layers: Vec<Arc<Layer>>) {
        let reused: Vec<Arc<Layer>> = new_layers
            .into_iter()
            .map(|layer| {
                old.iter()
                    .find(|o| o.id() == layer.id())
                    .cloned()
                    .unwrap_or(layer)
            })
            .collect();
        let first = self
            .layers
            .iter()
            .position(|l| old.iter().any(|o| Arc::ptr_eq(o, l)));
        self.layers
            .retain(|l| !old.iter().any(|o| Arc::ptr_eq(o, l)));
        match first {
            Some(pos) => {
                let pos = pos.min(self.layers.len());
                self.layers.splice(pos..pos, reused);
            }
            None => self.layers.extend(reused),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str) -> Arc<Layer> {
        Arc::new(Layer::new(LayerId::named(name)))
    }

    fn names(manager: &LayerManager) -> Vec<String> {
        manager.layers().iter().map(|l| l.id().to_string()).collect()
    }

    #[test]
    fn add_and_remove_keep_order() {
        let mut manager = LayerManager::new();
        manager.add(layer("a"));
        manager.add(layer("b"));
        manager.add(layer("c"));
        assert!(manager.remove(&LayerId::named("b")));
        assert!(!manager.remove(&LayerId::named("b")));
        assert_eq!(names(&manager), vec!["a", "c"]);
    }

    #[test]
    fn replace_with_many_inlines_in_place() {
        let mut manager = LayerManager::new();
        let placeholder = layer("placeholder");
        manager.add(layer("a"));
        manager.add(placeholder.clone());
        manager.add(layer("z"));
        assert!(manager.replace_with_many(&placeholder, vec![layer("x"), layer("y")]));
        assert_eq!(names(&manager), vec!["a", "x", "y", "z"]);
        assert!(!manager.replace_with_many(&placeholder, vec![]));
    }

    #[test]
    fn replace_many_reuses_matching_references() {
        let mut manager = LayerManager::new();
        let kept = layer("kept");
        let dropped = layer("dropped");
        manager.add(layer("head"));
        manager.add(kept.clone());
        manager.add(dropped.clone());
        manager.add(layer("tail"));

        let old = vec![kept.clone(), dropped.clone()];
        manager.replace_many(&old, vec![layer("fresh"), layer("kept")]);
        assert_eq!(names(&manager), vec!["head", "fresh", "kept", "tail"]);
        // The surviving identifier points at the original layer.
        assert!(Arc::ptr_eq(&manager.layers()[2], &kept));
    }

    #[test]
    fn replace_many_appends_when_old_absent() {
        let mut manager = LayerManager::new();
        manager.add(layer("a"));
        manager.replace_many(&[], vec![layer("b")]);
        assert_eq!(names(&manager), vec!["a", "b"]);
    }
}
