//! Layers and the per-layer command coordinator.
//!
//! A layer is a named, ordered container of storyboard objects. Its
//! [`LayerCommandCoordinator`] tracks which contributor produced each object,
//! computes the deterministic object order, and drives command fusion
//! recursively through nested segments. [`LayerManager`] maintains the
//! ordered list of layers the editor shows, with the bulk-replace forms
//! re-runs need.
//!
//! Locking: one mutex per coordinator and one per layer object list. The
//! coordinator lock is always taken before any object lock; no code path
//! takes them in the other order.

pub mod contributor;
pub mod coordinator;
pub mod layer;
pub mod manager;

pub use contributor::{Contributor, ContributorId};
pub use coordinator::LayerCommandCoordinator;
pub use layer::{Layer, LayerId};
pub use manager::LayerManager;
