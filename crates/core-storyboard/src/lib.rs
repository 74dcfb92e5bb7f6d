//! Storyboard object model: commands, sprites, samples, and nested segments.
//!
//! This crate is the leaf of the workspace. It owns the value types shared by
//! every other crate (easing tags, command values, concrete command kinds,
//! command groups) and the storyboard objects scripts emit into layers. The
//! derived display state a sprite carries alongside its command list is
//! rebuilt through an explicit [`Sprite::rebuild_display_state`] operation;
//! callers replace the command list and the sprite re-derives its per-family
//! timelines, trigger flag, and time bounds in one pass.
//!
//! Core invariants (must hold after every public call):
//! * `ObjectId`s are process-unique and monotonically allocated.
//! * A sprite's display state always reflects its current command list.
//! * Segment time bounds are the min/max over the recursive closure of their
//!   children; an empty segment reports `0.0` for both.
//! * No object stores a back-pointer to its parent; segment trees are acyclic
//!   by construction.

use std::sync::MutexGuard;

pub mod command;
pub mod easing;
pub mod object;
pub mod sprite;
pub mod value;

pub use command::{
    Command, CommandGroup, ColorCommand, FadeCommand, LoopCommand, MoveCommand, MoveXCommand,
    MoveYCommand, ParameterCommand, RotateCommand, ScaleCommand, TriggerCommand, VScaleCommand,
};
pub use easing::Easing;
pub use object::{ObjectHandle, ObjectId, ObjectKind, Sample, Segment, StoryboardObject};
pub use sprite::{DisplayState, FrameLoop, FrameSet, Origin, Sprite, TimelineSpan};
pub use value::{Color, CommandValue, ParameterKind, Vec2};

/// Clamp a possibly non-finite time to a value usable for ordering and merge
/// decisions. NaN and ±∞ map to `0.0`; finite values pass through.
pub fn sanitize_time(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Lock a shared storyboard object. A poisoned lock means a panic occurred
/// while an object was being mutated; there is no recovery path that leaves
/// the storyboard consistent, so this propagates the panic.
pub fn lock_object(handle: &ObjectHandle) -> MutexGuard<'_, StoryboardObject> {
    handle.lock().expect("storyboard object lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_time_maps_non_finite_to_zero() {
        assert_eq!(sanitize_time(f64::NAN), 0.0);
        assert_eq!(sanitize_time(f64::INFINITY), 0.0);
        assert_eq!(sanitize_time(f64::NEG_INFINITY), 0.0);
        assert_eq!(sanitize_time(-125.5), -125.5);
    }
}
