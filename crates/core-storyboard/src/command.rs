//! Storyboard commands: the per-object timeline entries fusion operates on.
//!
//! Commands are value records behind a `dyn Command` seam so the fusion layer
//! can treat kinds polymorphically through a descriptor table instead of
//! matching on a closed enum here. Concrete range kinds are generated by
//! `range_command!`; the point kind (`ParameterCommand`) and the opaque group
//! kinds (`LoopCommand`, `TriggerCommand`) are written out since their shapes
//! differ.
//!
//! Type keys are the `.osb` command letters and double as the stable ordering
//! key for fused output.

use std::any::Any;
use std::fmt;

use crate::easing::Easing;
use crate::value::{Color, ParameterKind, Vec2};

/// A single storyboard command. Implementors are plain value structs;
/// `boxed_clone` must produce a deep copy (groups clone their children).
pub trait Command: fmt::Debug + Send + Sync + 'static {
    /// Stable per-kind key (`"M"`, `"F"`, `"L"`, ...).
    fn type_key(&self) -> &'static str;
    fn start_time(&self) -> f64;
    fn end_time(&self) -> f64;
    fn easing(&self) -> Easing {
        Easing::None
    }
    fn as_any(&self) -> &dyn Any;
    fn boxed_clone(&self) -> Box<dyn Command>;
    /// Groups (loop, trigger) expose their children; all other kinds return
    /// `None`. Fusion treats any group as opaque.
    fn as_group(&self) -> Option<&dyn CommandGroup> {
        None
    }
}

impl Clone for Box<dyn Command> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// A command that owns an ordered inner command list.
pub trait CommandGroup {
    fn commands(&self) -> &[Box<dyn Command>];
    /// Whether the group's span counts toward the owning sprite's time
    /// bounds. Triggers do not: they fire on runtime conditions.
    fn contributes_bounds(&self) -> bool {
        true
    }
    /// Offset applied to child times when rebuilding display timelines.
    /// Loop children are relative to the loop start.
    fn child_offset(&self) -> f64 {
        0.0
    }
}

macro_rules! range_command {
    ($(#[$meta:meta])* $name:ident, $key:literal, $value:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name {
            pub easing: Easing,
            pub start_time: f64,
            pub end_time: f64,
            pub start_value: $value,
            pub end_value: $value,
        }

        impl $name {
            pub fn new(
                easing: Easing,
                start_time: f64,
                end_time: f64,
                start_value: $value,
                end_value: $value,
            ) -> Self {
                Self {
                    easing,
                    start_time,
                    end_time,
                    start_value,
                    end_value,
                }
            }
        }

        impl Command for $name {
            fn type_key(&self) -> &'static str {
                $key
            }
            fn start_time(&self) -> f64 {
                self.start_time
            }
            fn end_time(&self) -> f64 {
                self.end_time
            }
            fn easing(&self) -> Easing {
                self.easing
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn boxed_clone(&self) -> Box<dyn Command> {
                Box::new(*self)
            }
        }
    };
}

range_command!(
    /// Positions the sprite, animating both axes.
    MoveCommand, "M", Vec2
);
range_command!(
    /// Positions the sprite on the X axis only.
    MoveXCommand, "MX", f64
);
range_command!(
    /// Positions the sprite on the Y axis only.
    MoveYCommand, "MY", f64
);
range_command!(
    /// Opacity, `0.0..=1.0`.
    FadeCommand, "F", f64
);
range_command!(
    /// Uniform scale factor.
    ScaleCommand, "S", f64
);
range_command!(
    /// Per-axis scale factors.
    VScaleCommand, "V", Vec2
);
range_command!(
    /// Rotation in radians.
    RotateCommand, "R", f64
);
range_command!(
    /// Color tint.
    ColorCommand, "C", Color
);

/// Applies a discrete render parameter over a time range. A point kind: the
/// value at the end of the range is never distinct from the value at the
/// start, so the constructor takes a single value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterCommand {
    pub easing: Easing,
    pub start_time: f64,
    pub end_time: f64,
    pub value: ParameterKind,
}

impl ParameterCommand {
    pub fn new(easing: Easing, start_time: f64, end_time: f64, value: ParameterKind) -> Self {
        Self {
            easing,
            start_time,
            end_time,
            value,
        }
    }
}

impl Command for ParameterCommand {
    fn type_key(&self) -> &'static str {
        "P"
    }
    fn start_time(&self) -> f64 {
        self.start_time
    }
    fn end_time(&self) -> f64 {
        self.end_time
    }
    fn easing(&self) -> Easing {
        self.easing
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn boxed_clone(&self) -> Box<dyn Command> {
        Box::new(*self)
    }
}

/// Repeats its children `loop_count` times starting at `start_time`. Child
/// times are relative to the loop start.
#[derive(Debug, Clone)]
pub struct LoopCommand {
    pub start_time: f64,
    pub loop_count: u32,
    commands: Vec<Box<dyn Command>>,
}

impl LoopCommand {
    pub fn new(start_time: f64, loop_count: u32) -> Self {
        Self {
            start_time,
            loop_count,
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }

    /// Latest relative end time across children; `0.0` when empty.
    pub fn iteration_span(&self) -> f64 {
        self.commands
            .iter()
            .map(|c| c.end_time())
            .fold(0.0, f64::max)
    }
}

impl Command for LoopCommand {
    fn type_key(&self) -> &'static str {
        "L"
    }
    fn start_time(&self) -> f64 {
        self.start_time
    }
    fn end_time(&self) -> f64 {
        self.start_time + self.iteration_span() * f64::from(self.loop_count.max(1))
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn boxed_clone(&self) -> Box<dyn Command> {
        Box::new(self.clone())
    }
    fn as_group(&self) -> Option<&dyn CommandGroup> {
        Some(self)
    }
}

impl CommandGroup for LoopCommand {
    fn commands(&self) -> &[Box<dyn Command>] {
        &self.commands
    }
    fn child_offset(&self) -> f64 {
        self.start_time
    }
}

/// Runs its children while a runtime condition holds (`trigger_name`, e.g.
/// `"HitSoundClap"`). Child times are relative to the trigger activation, so
/// triggers never contribute to sprite time bounds.
#[derive(Debug, Clone)]
pub struct TriggerCommand {
    pub trigger_name: String,
    pub start_time: f64,
    pub end_time: f64,
    pub group_number: i32,
    commands: Vec<Box<dyn Command>>,
}

impl TriggerCommand {
    pub fn new(
        trigger_name: impl Into<String>,
        start_time: f64,
        end_time: f64,
        group_number: i32,
    ) -> Self {
        Self {
            trigger_name: trigger_name.into(),
            start_time,
            end_time,
            group_number,
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }
}

impl Command for TriggerCommand {
    fn type_key(&self) -> &'static str {
        "T"
    }
    fn start_time(&self) -> f64 {
        self.start_time
    }
    fn end_time(&self) -> f64 {
        self.end_time
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn boxed_clone(&self) -> Box<dyn Command> {
        Box::new(self.clone())
    }
    fn as_group(&self) -> Option<&dyn CommandGroup> {
        Some(self)
    }
}

impl CommandGroup for TriggerCommand {
    fn commands(&self) -> &[Box<dyn Command>] {
        &self.commands
    }
    fn contributes_bounds(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_command_accessors() {
        let cmd = MoveCommand::new(
            Easing::OutCirc,
            100.0,
            400.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(320.0, 240.0),
        );
        assert_eq!(cmd.type_key(), "M");
        assert_eq!(cmd.easing(), Easing::OutCirc);
        assert_eq!(cmd.start_time(), 100.0);
        assert_eq!(cmd.end_time(), 400.0);
        assert!(cmd.as_group().is_none());
    }

    #[test]
    fn boxed_clone_is_deep_for_groups() {
        let mut looped = LoopCommand::new(1000.0, 3);
        looped.push(Box::new(FadeCommand::new(Easing::None, 0.0, 200.0, 0.0, 1.0)));
        let cloned = looped.boxed_clone();
        let group = cloned.as_group().expect("loop exposes its children");
        assert_eq!(group.commands().len(), 1);
        assert_eq!(group.commands()[0].end_time(), 200.0);
    }

    #[test]
    fn loop_end_time_multiplies_iteration_span() {
        let mut looped = LoopCommand::new(500.0, 4);
        looped.push(Box::new(FadeCommand::new(Easing::None, 0.0, 250.0, 0.0, 1.0)));
        looped.push(Box::new(ScaleCommand::new(Easing::None, 0.0, 100.0, 1.0, 2.0)));
        assert_eq!(looped.iteration_span(), 250.0);
        assert_eq!(looped.end_time(), 500.0 + 4.0 * 250.0);
    }

    #[test]
    fn empty_loop_spans_nothing() {
        let looped = LoopCommand::new(500.0, 8);
        assert_eq!(looped.end_time(), 500.0);
    }

    #[test]
    fn trigger_does_not_contribute_bounds() {
        let trigger = TriggerCommand::new("HitSoundClap", 0.0, 10_000.0, 0);
        let group = trigger.as_group().unwrap();
        assert!(!group.contributes_bounds());
        assert_eq!(group.child_offset(), 0.0);
    }
}
