//! Sprite-like objects and their derived display state.
//!
//! A sprite owns an ordered command list plus state derived from it: one
//! timeline of spans per command family, a trigger flag, and cached time
//! bounds. The derived state is rebuilt wholesale whenever the command list
//! is replaced ([`Sprite::rebuild_display_state`]) and incrementally kept in
//! sync by [`Sprite::push_command`]. Rebuilding enters and exits a display
//! scope around each group's children: loop children are offset to the loop
//! start, trigger children set the trigger flag and stay out of the bounds.

use std::collections::BTreeMap;

use crate::command::Command;
use crate::value::Vec2;

/// Anchor point used when the sprite is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Origin {
    TopLeft,
    TopCentre,
    TopRight,
    CentreLeft,
    #[default]
    Centre,
    CentreRight,
    BottomLeft,
    BottomCentre,
    BottomRight,
}

/// How an animated sprite cycles its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameLoop {
    #[default]
    Forever,
    Once,
}

/// Frame data distinguishing an animation from a still sprite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSet {
    pub frame_count: u32,
    pub frame_delay: f64,
    pub loop_kind: FrameLoop,
}

/// A half-open span on a display timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineSpan {
    pub start: f64,
    pub end: f64,
}

/// State derived from a command list. Families are keyed by command type key
/// in stable (sorted) order; spans within a family follow the rebuild walk.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    families: BTreeMap<&'static str, Vec<TimelineSpan>>,
    has_trigger: bool,
    bounds: Option<(f64, f64)>,
}

impl DisplayState {
    pub fn from_commands(commands: &[Box<dyn Command>]) -> Self {
        let mut state = Self::default();
        for command in commands {
            state.absorb(command.as_ref(), 0.0, true);
        }
        state
    }

    fn absorb(&mut self, command: &dyn Command, offset: f64, counts_toward_bounds: bool) {
        let start = offset + command.start_time();
        let end = offset + command.end_time();
        match command.as_group() {
            Some(group) => {
                if !group.contributes_bounds() {
                    self.has_trigger = true;
                }
                let counts = counts_toward_bounds && group.contributes_bounds();
                self.record(command.type_key(), start, end, counts);
                let child_offset = offset + group.child_offset();
                for child in group.commands() {
                    // Children are recorded for their families only; the
                    // group span already covers the sprite bounds.
                    self.absorb(child.as_ref(), child_offset, false);
                }
            }
            None => self.record(command.type_key(), start, end, counts_toward_bounds),
        }
    }

    fn record(&mut self, type_key: &'static str, start: f64, end: f64, counts: bool) {
        self.families
            .entry(type_key)
            .or_default()
            .push(TimelineSpan { start, end });
        if counts {
            self.bounds = match self.bounds {
                None => Some((start, end)),
                Some((lo, hi)) => Some((lo.min(start), hi.max(end))),
            };
        }
    }

    /// Timeline for one command family, if any command of that family exists.
    pub fn family(&self, type_key: &str) -> Option<&[TimelineSpan]> {
        self.families.get(type_key).map(Vec::as_slice)
    }

    pub fn families(&self) -> impl Iterator<Item = (&'static str, &[TimelineSpan])> {
        self.families.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn has_trigger(&self) -> bool {
        self.has_trigger
    }

    pub fn start_bound(&self) -> f64 {
        self.bounds.map_or(0.0, |(lo, _)| lo)
    }

    pub fn end_bound(&self) -> f64 {
        self.bounds.map_or(0.0, |(_, hi)| hi)
    }
}

/// A sprite or animation. `frames` distinguishes the two; everything else is
/// shared, including the command list and derived display state.
#[derive(Debug, Clone)]
pub struct Sprite {
    pub path: String,
    pub origin: Origin,
    pub initial_position: Vec2,
    pub frames: Option<FrameSet>,
    commands: Vec<Box<dyn Command>>,
    display: DisplayState,
}

impl Sprite {
    pub fn new(path: impl Into<String>, origin: Origin, initial_position: Vec2) -> Self {
        Self {
            path: path.into(),
            origin,
            initial_position,
            frames: None,
            commands: Vec::new(),
            display: DisplayState::default(),
        }
    }

    pub fn animation(
        path: impl Into<String>,
        origin: Origin,
        initial_position: Vec2,
        frames: FrameSet,
    ) -> Self {
        Self {
            frames: Some(frames),
            ..Self::new(path, origin, initial_position)
        }
    }

    pub fn commands(&self) -> &[Box<dyn Command>] {
        &self.commands
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Append one command, keeping derived state in sync.
    pub fn push_command(&mut self, command: Box<dyn Command>) {
        self.display.absorb(command.as_ref(), 0.0, true);
        self.commands.push(command);
    }

    /// Replace the command list and rebuild all derived state from it. Total:
    /// an empty list simply clears the timelines and bounds.
    pub fn rebuild_display_state(&mut self, commands: Vec<Box<dyn Command>>) {
        self.commands = commands;
        self.display = DisplayState::from_commands(&self.commands);
        tracing::debug!(
            target: "storyboard.sprite",
            path = %self.path,
            commands = self.commands.len(),
            families = self.display.families.len(),
            has_trigger = self.display.has_trigger,
            "display_state_rebuilt"
        );
    }

    pub fn start_time(&self) -> f64 {
        self.display.start_bound()
    }

    pub fn end_time(&self) -> f64 {
        self.display.end_bound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{FadeCommand, LoopCommand, MoveCommand, TriggerCommand};
    use crate::easing::Easing;

    fn sprite() -> Sprite {
        Sprite::new("sb/dot.png", Origin::Centre, Vec2::new(320.0, 240.0))
    }

    #[test]
    fn push_command_tracks_bounds_and_families() {
        let mut s = sprite();
        s.push_command(Box::new(FadeCommand::new(Easing::None, 500.0, 1_500.0, 0.0, 1.0)));
        s.push_command(Box::new(MoveCommand::new(
            Easing::None,
            0.0,
            1_000.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 100.0),
        )));
        assert_eq!(s.start_time(), 0.0);
        assert_eq!(s.end_time(), 1_500.0);
        assert_eq!(s.display().family("F").unwrap().len(), 1);
        assert_eq!(s.display().family("M").unwrap().len(), 1);
        assert!(s.display().family("S").is_none());
    }

    #[test]
    fn rebuild_replaces_commands_and_derived_state() {
        let mut s = sprite();
        s.push_command(Box::new(FadeCommand::new(Easing::None, 0.0, 9_000.0, 0.0, 1.0)));
        s.rebuild_display_state(vec![Box::new(FadeCommand::new(
            Easing::None,
            100.0,
            200.0,
            1.0,
            0.0,
        ))]);
        assert_eq!(s.commands().len(), 1);
        assert_eq!(s.start_time(), 100.0);
        assert_eq!(s.end_time(), 200.0);
    }

    #[test]
    fn rebuild_with_empty_list_clears_state() {
        let mut s = sprite();
        s.push_command(Box::new(FadeCommand::new(Easing::None, 0.0, 100.0, 0.0, 1.0)));
        s.rebuild_display_state(Vec::new());
        assert_eq!(s.commands().len(), 0);
        assert_eq!(s.start_time(), 0.0);
        assert_eq!(s.end_time(), 0.0);
        assert!(!s.display().has_trigger());
    }

    #[test]
    fn loop_children_are_offset_to_loop_start() {
        let mut looped = LoopCommand::new(2_000.0, 2);
        looped.push(Box::new(FadeCommand::new(Easing::None, 0.0, 300.0, 0.0, 1.0)));
        let mut s = sprite();
        s.push_command(Box::new(looped));
        // Loop span covers the repeats; the child family span sits at the
        // first iteration.
        assert_eq!(s.start_time(), 2_000.0);
        assert_eq!(s.end_time(), 2_600.0);
        let fades = s.display().family("F").unwrap();
        assert_eq!(fades[0].start, 2_000.0);
        assert_eq!(fades[0].end, 2_300.0);
    }

    #[test]
    fn trigger_sets_flag_without_touching_bounds() {
        let mut trigger = TriggerCommand::new("HitSoundWhistle", 0.0, 60_000.0, 0);
        trigger.push(Box::new(FadeCommand::new(Easing::None, 0.0, 100.0, 1.0, 0.0)));
        let mut s = sprite();
        s.push_command(Box::new(FadeCommand::new(Easing::None, 4_000.0, 5_000.0, 0.0, 1.0)));
        s.push_command(Box::new(trigger));
        assert!(s.display().has_trigger());
        assert_eq!(s.start_time(), 4_000.0);
        assert_eq!(s.end_time(), 5_000.0);
    }
}
