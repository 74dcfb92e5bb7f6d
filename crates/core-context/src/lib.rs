//! Storyboard contexts: the shared layer registry generator runs observe,
//! the per-run generator facade, and the effect driver.
//!
//! A [`StoryboardContext`] gives multiple generator runs the same layer
//! reference for the same identifier, with creation events fanned out to
//! every subscribed run. A [`GeneratorContext`] is what one script run sees:
//! layers (local or shared), ambient run data (paths, beatmaps, audio,
//! cancellation, log), and an ambient "current context" binding scoped to
//! the run. [`EffectRunner`] drives a script through its lifecycle phases
//! and maps failures and cancellation to [`EffectStatus`] values.
//!
//! Locking: one mutex per context. `LayerCreated` events always fire outside
//! the context lock so a subscriber may re-enter the context freely.

pub mod ambient;
pub mod audio;
pub mod beatmap;
pub mod cancel;
pub mod effect;
pub mod error;
pub mod generator;
pub mod shared;
pub mod watch;

pub use ambient::{current, ActivationScope};
pub use audio::{FftLoader, FftSource};
pub use beatmap::Beatmap;
pub use cancel::CancelToken;
pub use effect::{
    bind_shared_context, EffectOutcome, EffectRunner, EffectStatus, Script, ScriptError,
};
pub use error::ContextError;
pub use generator::{GeneratorContext, GeneratorParams};
pub use shared::{LayerEvent, LayerFactory, SharedContextPool, StoryboardContext, SubscriptionId};
pub use watch::{DependencyWatcher, FsDependencyWatcher, RecordingWatcher};
