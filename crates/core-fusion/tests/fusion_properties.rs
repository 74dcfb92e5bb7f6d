//! Property-based tests for the fusion engine merge and ordering laws.

use core_fusion::{commands_structurally_equal, fuse, OrderingContext, EPSILON};
use core_storyboard::{Command, Easing, FadeCommand, MoveCommand, ScaleCommand, Vec2};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct CmdSpec {
    kind: u8,
    easing: u8,
    start: f64,
    duration: f64,
    v0: f64,
    v1: f64,
}

fn spec_strategy() -> impl Strategy<Value = CmdSpec> {
    (
        0u8..3,
        0u8..3,
        0.0..10_000.0f64,
        prop_oneof![Just(0.0), 0.0..2_000.0f64],
        -10.0..10.0f64,
        -10.0..10.0f64,
    )
        .prop_map(|(kind, easing, start, duration, v0, v1)| CmdSpec {
            kind,
            easing,
            start,
            duration,
            v0,
            v1,
        })
}

fn easing_of(idx: u8) -> Easing {
    match idx % 3 {
        0 => Easing::None,
        1 => Easing::Out,
        _ => Easing::InOutSine,
    }
}

fn command_of(spec: &CmdSpec) -> Box<dyn Command> {
    let easing = easing_of(spec.easing);
    let end = spec.start + spec.duration;
    match spec.kind % 3 {
        0 => Box::new(MoveCommand::new(
            easing,
            spec.start,
            end,
            Vec2::new(spec.v0, spec.v0),
            Vec2::new(spec.v1, spec.v1),
        )),
        1 => Box::new(FadeCommand::new(easing, spec.start, end, spec.v0, spec.v1)),
        _ => Box::new(ScaleCommand::new(easing, spec.start, end, spec.v0, spec.v1)),
    }
}

fn commands_of(specs: &[CmdSpec]) -> Vec<Box<dyn Command>> {
    specs.iter().map(command_of).collect()
}

fn type_key_of(kind: u8) -> &'static str {
    match kind % 3 {
        0 => "M",
        1 => "F",
        _ => "S",
    }
}

proptest! {
    // Re-fusing fused output must change nothing.
    #[test]
    fn fusion_is_idempotent(specs in proptest::collection::vec(spec_strategy(), 0..16)) {
        let input = commands_of(&specs);
        let once = fuse(&input, &OrderingContext::default());
        let twice = fuse(&once, &OrderingContext::default());
        prop_assert!(commands_structurally_equal(&once, &twice));
    }

    // The final order is determined by the sort key, not the input order.
    #[test]
    fn permutation_invariance(
        (original, shuffled) in proptest::collection::vec(spec_strategy(), 0..12)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let a = fuse(&commands_of(&original), &OrderingContext::default());
        let b = fuse(&commands_of(&shuffled), &OrderingContext::default());
        prop_assert!(commands_structurally_equal(&a, &b));
    }

    // If no two same-kind commands overlap (with tolerance), fusion preserves
    // the total count.
    #[test]
    fn non_overlapping_commands_preserve_count(
        shapes in proptest::collection::vec(
            (0u8..3, 0.01..50.0f64, prop_oneof![Just(0.0), 0.01..100.0f64], -10.0..10.0f64),
            0..16,
        )
    ) {
        // Lay commands out per kind with strictly positive gaps so nothing
        // overlaps or edge-touches.
        let mut cursors = [0.0f64; 3];
        let specs: Vec<CmdSpec> = shapes
            .iter()
            .map(|&(kind, gap, duration, v)| {
                let slot = (kind % 3) as usize;
                let start = cursors[slot] + gap + 2.0 * EPSILON;
                cursors[slot] = start + duration;
                CmdSpec { kind, easing: 0, start, duration, v0: v, v1: -v }
            })
            .collect();
        let input = commands_of(&specs);
        let fused = fuse(&input, &OrderingContext::default());
        prop_assert_eq!(fused.len(), input.len());
    }

    // Fusing everything together equals fusing each kind alone: merging
    // never crosses kind boundaries.
    #[test]
    fn type_isolation(specs in proptest::collection::vec(spec_strategy(), 0..14)) {
        let full = fuse(&commands_of(&specs), &OrderingContext::default());
        for kind in 0u8..3 {
            let key = type_key_of(kind);
            let alone: Vec<CmdSpec> = specs
                .iter()
                .filter(|s| s.kind % 3 == kind % 3)
                .cloned()
                .collect();
            let fused_alone = fuse(&commands_of(&alone), &OrderingContext::default());
            let from_full: Vec<Box<dyn Command>> = full
                .iter()
                .filter(|c| c.type_key() == key)
                .cloned()
                .collect();
            prop_assert!(commands_structurally_equal(&fused_alone, &from_full));
        }
    }

    // Every zero-duration input survives as a zero-duration output.
    #[test]
    fn zero_duration_commands_survive(specs in proptest::collection::vec(spec_strategy(), 0..16)) {
        let input = commands_of(&specs);
        let fused = fuse(&input, &OrderingContext::default());
        let points_in = specs.iter().filter(|s| s.duration <= EPSILON).count();
        let points_out = fused
            .iter()
            .filter(|c| (c.end_time() - c.start_time()).abs() <= EPSILON)
            .count();
        prop_assert_eq!(points_in, points_out);
    }
}
