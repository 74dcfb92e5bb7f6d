//! Per-kind command descriptors.
//!
//! One descriptor per concrete command kind, registered once into a
//! process-wide table keyed by `TypeId`. A descriptor carries the stable
//! ordering key, the point/supported flags, read accessors that snapshot a
//! command into erased values, and the factory that builds a fused instance.
//! Kinds absent from the table, and kinds registered as unsupported, bypass
//! fusion entirely (clone-through); lookup never panics.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::OnceLock;

use core_storyboard::{
    ColorCommand, Command, CommandValue, Easing, FadeCommand, LoopCommand, MoveCommand,
    MoveXCommand, MoveYCommand, ParameterCommand, RotateCommand, ScaleCommand, TriggerCommand,
    VScaleCommand,
};

/// Erased read-only view of one command, produced by a descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindSnapshot {
    pub easing: Easing,
    pub start_time: f64,
    pub end_time: f64,
    pub start_value: CommandValue,
    pub end_value: CommandValue,
}

type SnapshotFn = fn(&dyn Command) -> Option<KindSnapshot>;
type BuildFn = fn(Easing, f64, f64, &CommandValue, &CommandValue) -> Option<Box<dyn Command>>;

/// Introspection record for one concrete command kind.
pub struct KindDescriptor {
    pub type_key: &'static str,
    /// Point kinds have no end value distinct from the start value; their
    /// factory refuses mismatched values and the caller clones through.
    pub is_point: bool,
    pub supported: bool,
    snapshot_fn: SnapshotFn,
    build_fn: BuildFn,
}

impl KindDescriptor {
    /// Descriptor for a kind fusion must not touch. Snapshots and builds
    /// always decline.
    fn unsupported(type_key: &'static str) -> Self {
        Self {
            type_key,
            is_point: false,
            supported: false,
            snapshot_fn: |_| None,
            build_fn: |_, _, _, _, _| None,
        }
    }

    /// Read the command through this kind's accessors. `None` when the kind
    /// is unsupported or the command is not actually of this kind.
    pub fn snapshot(&self, command: &dyn Command) -> Option<KindSnapshot> {
        if !self.supported {
            return None;
        }
        (self.snapshot_fn)(command)
    }

    /// Build a fused instance. `None` when the kind is unsupported, the
    /// values do not fit the kind, or a point kind sees distinct values.
    pub fn build(
        &self,
        easing: Easing,
        start_time: f64,
        end_time: f64,
        start_value: &CommandValue,
        end_value: &CommandValue,
    ) -> Option<Box<dyn Command>> {
        if !self.supported {
            return None;
        }
        if self.is_point && start_value != end_value {
            return None;
        }
        (self.build_fn)(easing, start_time, end_time, start_value, end_value)
    }
}

macro_rules! register_range_kind {
    ($map:expr, $ty:ty, $key:literal, $variant:ident) => {
        $map.insert(
            TypeId::of::<$ty>(),
            KindDescriptor {
                type_key: $key,
                is_point: false,
                supported: true,
                snapshot_fn: |command| {
                    command.as_any().downcast_ref::<$ty>().map(|c| KindSnapshot {
                        easing: c.easing,
                        start_time: c.start_time,
                        end_time: c.end_time,
                        start_value: CommandValue::$variant(c.start_value),
                        end_value: CommandValue::$variant(c.end_value),
                    })
                },
                build_fn: |easing, start_time, end_time, start_value, end_value| {
                    match (start_value, end_value) {
                        (CommandValue::$variant(a), CommandValue::$variant(b)) => Some(Box::new(
                            <$ty>::new(easing, start_time, end_time, *a, *b),
                        )),
                        _ => None,
                    }
                },
            },
        );
    };
}

fn build_registry() -> HashMap<TypeId, KindDescriptor> {
    let mut map = HashMap::new();
    register_range_kind!(map, MoveCommand, "M", Pair);
    register_range_kind!(map, MoveXCommand, "MX", Scalar);
    register_range_kind!(map, MoveYCommand, "MY", Scalar);
    register_range_kind!(map, FadeCommand, "F", Scalar);
    register_range_kind!(map, ScaleCommand, "S", Scalar);
    register_range_kind!(map, VScaleCommand, "V", Pair);
    register_range_kind!(map, RotateCommand, "R", Scalar);
    register_range_kind!(map, ColorCommand, "C", Color);
    map.insert(
        TypeId::of::<ParameterCommand>(),
        KindDescriptor {
            type_key: "P",
            is_point: true,
            supported: true,
            snapshot_fn: |command| {
                command
                    .as_any()
                    .downcast_ref::<ParameterCommand>()
                    .map(|c| KindSnapshot {
                        easing: c.easing,
                        start_time: c.start_time,
                        end_time: c.end_time,
                        start_value: CommandValue::Parameter(c.value),
                        end_value: CommandValue::Parameter(c.value),
                    })
            },
            build_fn: |easing, start_time, end_time, start_value, _end_value| {
                match start_value {
                    CommandValue::Parameter(p) => Some(Box::new(ParameterCommand::new(
                        easing, start_time, end_time, *p,
                    ))),
                    _ => None,
                }
            },
        },
    );
    // Group kinds are opaque to fusion; registered so callers asking for a
    // descriptor still get the stable type key and the unsupported flag.
    map.insert(
        TypeId::of::<LoopCommand>(),
        KindDescriptor::unsupported("L"),
    );
    map.insert(
        TypeId::of::<TriggerCommand>(),
        KindDescriptor::unsupported("T"),
    );
    map
}

fn registry() -> &'static HashMap<TypeId, KindDescriptor> {
    static REGISTRY: OnceLock<HashMap<TypeId, KindDescriptor>> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

/// Descriptor for a command's concrete kind, if one was registered.
pub fn descriptor_of(command: &dyn Command) -> Option<&'static KindDescriptor> {
    registry().get(&command.as_any().type_id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_storyboard::{ParameterKind, Vec2};

    #[test]
    fn range_kind_round_trips_through_descriptor() {
        let cmd = MoveCommand::new(
            Easing::InOutSine,
            0.0,
            1_000.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 100.0),
        );
        let desc = descriptor_of(&cmd).expect("move is registered");
        assert_eq!(desc.type_key, "M");
        assert!(desc.supported);
        assert!(!desc.is_point);
        let snap = desc.snapshot(&cmd).expect("snapshot");
        assert_eq!(snap.easing, Easing::InOutSine);
        assert_eq!(snap.start_value, CommandValue::Pair(Vec2::new(0.0, 0.0)));
        let rebuilt = desc
            .build(
                snap.easing,
                snap.start_time,
                snap.end_time,
                &snap.start_value,
                &snap.end_value,
            )
            .expect("factory accepts matching values");
        assert_eq!(rebuilt.type_key(), "M");
        assert_eq!(rebuilt.end_time(), 1_000.0);
    }

    #[test]
    fn build_rejects_mismatched_value_shapes() {
        let cmd = FadeCommand::new(Easing::None, 0.0, 100.0, 0.0, 1.0);
        let desc = descriptor_of(&cmd).unwrap();
        let built = desc.build(
            Easing::None,
            0.0,
            100.0,
            &CommandValue::Scalar(0.0),
            &CommandValue::Pair(Vec2::default()),
        );
        assert!(built.is_none());
    }

    #[test]
    fn point_kind_refuses_distinct_values() {
        let cmd = ParameterCommand::new(Easing::None, 0.0, 500.0, ParameterKind::FlipHorizontal);
        let desc = descriptor_of(&cmd).unwrap();
        assert!(desc.is_point);
        let refused = desc.build(
            Easing::None,
            0.0,
            500.0,
            &CommandValue::Parameter(ParameterKind::FlipHorizontal),
            &CommandValue::Parameter(ParameterKind::FlipVertical),
        );
        assert!(refused.is_none());
        let accepted = desc.build(
            Easing::None,
            0.0,
            500.0,
            &CommandValue::Parameter(ParameterKind::FlipHorizontal),
            &CommandValue::Parameter(ParameterKind::FlipHorizontal),
        );
        assert!(accepted.is_some());
    }

    #[test]
    fn group_kinds_are_unsupported() {
        let looped = LoopCommand::new(0.0, 2);
        let desc = descriptor_of(&looped).expect("loop has a descriptor");
        assert!(!desc.supported);
        assert_eq!(desc.type_key, "L");
        assert!(desc.snapshot(&looped).is_none());
    }
}
