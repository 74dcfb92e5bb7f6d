//! The fusion engine: one object's commands in, a fused ordered sequence out.
//!
//! The algorithm is a single pass of classification, a per-kind sort and
//! merge scan, and one final deterministic sort:
//!
//! 1. Groups (loop/trigger) are deep-cloned and emitted opaque; kinds without
//!    a supported descriptor clone through. Everything else is snapshotted
//!    into a per-kind bucket.
//! 2. Each bucket is sorted by `(start, end, original index)` and scanned
//!    with an open merge group. A record overlapping or edge-touching the
//!    open group (`start <= group_end + EPSILON`) is absorbed; a
//!    zero-duration record always flushes the group and stands alone.
//! 3. Merge groups of one clone through; larger groups are rebuilt through
//!    the kind factory from the earliest member's easing/start/start-value
//!    and the latest member's end/end-value. A refusing factory (point kind
//!    with distinct values) degrades to clone-through for every member.
//! 4. All emissions sort by the ordering-context key; the snapshot index is
//!    the final tiebreaker.
//!
//! Non-finite times are sanitized to `0.0` for every ordering and merge
//! decision, and the emitted commands reflect the sanitized times.

use std::any::TypeId;
use std::collections::HashMap;

use core_storyboard::{sanitize_time, Command, ObjectId};

use crate::registry::{descriptor_of, KindDescriptor, KindSnapshot};

/// Merge tolerance: commands this close (or closer) to touching are treated
/// as overlapping, and commands this short are treated as points.
pub const EPSILON: f64 = 1e-4;

/// Per-object parameters for the final deterministic sort. Object order,
/// contributor priority and contributor order are constant within a single
/// `fuse` call; they take effect when callers pool fused outputs across
/// objects. `snapshot_base` shifts original indices into a range disjoint
/// from other objects so the final tiebreaker stays globally unambiguous.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrderingContext {
    pub object_order: u64,
    pub contributor_priority: i32,
    pub contributor_order: u64,
    pub snapshot_base: u64,
}

/// Outcome of fusing one sprite's commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFusionResult {
    pub object: ObjectId,
    pub original_count: usize,
    pub fused_count: usize,
}

impl CommandFusionResult {
    pub fn has_fusion(&self) -> bool {
        self.fused_count < self.original_count
    }
}

struct Rec {
    /// Index into the caller's input slice.
    index: usize,
    /// Sanitized times used for every ordering/merge decision.
    start: f64,
    end: f64,
    snap: KindSnapshot,
}

struct Emitted {
    command: Box<dyn Command>,
    type_key: &'static str,
    start: f64,
    end: f64,
    index: usize,
}

struct MergeGroup {
    /// Indices into the sorted record list.
    members: Vec<usize>,
    /// Member with the lowest `(start, original index)`.
    first: usize,
    /// Member with the highest `(end, original index)`.
    last: usize,
    /// Max sanitized end across members.
    end: f64,
    mixed_easing: bool,
}

impl MergeGroup {
    fn open(ri: usize, rec: &Rec) -> Self {
        Self {
            members: vec![ri],
            first: ri,
            last: ri,
            end: rec.end,
            mixed_easing: false,
        }
    }
}

/// Fuse one object's command sequence. Inputs are never mutated; every
/// output is freshly constructed. Deterministic and idempotent: re-running
/// on the output returns a structurally identical sequence.
pub fn fuse(commands: &[Box<dyn Command>], ctx: &OrderingContext) -> Vec<Box<dyn Command>> {
    let mut emitted: Vec<Emitted> = Vec::with_capacity(commands.len());
    let mut buckets: HashMap<TypeId, (&'static KindDescriptor, Vec<Rec>)> = HashMap::new();

    for (index, command) in commands.iter().enumerate() {
        if command.as_group().is_some() {
            emitted.push(Emitted {
                command: command.boxed_clone(),
                type_key: command.type_key(),
                start: sanitize_time(command.start_time()),
                end: sanitize_time(command.end_time()),
                index,
            });
            continue;
        }
        let snapshot = descriptor_of(command.as_ref()).and_then(|d| {
            d.snapshot(command.as_ref()).map(|snap| (d, snap))
        });
        match snapshot {
            Some((descriptor, snap)) => {
                let bucket = buckets
                    .entry(command.as_any().type_id())
                    .or_insert_with(|| (descriptor, Vec::new()));
                bucket.1.push(Rec {
                    index,
                    start: sanitize_time(snap.start_time),
                    end: sanitize_time(snap.end_time),
                    snap,
                });
            }
            None => {
                // Unsupported or unregistered kind: clone through untouched.
                emitted.push(Emitted {
                    command: command.boxed_clone(),
                    type_key: command.type_key(),
                    start: sanitize_time(command.start_time()),
                    end: sanitize_time(command.end_time()),
                    index,
                });
            }
        }
    }

    for (descriptor, mut records) in buckets.into_values() {
        records.sort_by(|a, b| {
            a.start
                .total_cmp(&b.start)
                .then(a.end.total_cmp(&b.end))
                .then(a.index.cmp(&b.index))
        });
        let mut open: Option<MergeGroup> = None;
        for ri in 0..records.len() {
            let rec = &records[ri];
            if (rec.end - rec.start).abs() <= EPSILON {
                // Point records never join a group and never end up inside
                // one: flush whatever is open and emit the point alone.
                if let Some(group) = open.take() {
                    emit_merge_group(group, &records, commands, descriptor, &mut emitted);
                }
                emit_single(rec, commands, descriptor, &mut emitted);
                continue;
            }
            open = Some(match open.take() {
                Some(mut group) if rec.start <= group.end + EPSILON => {
                    group.end = group.end.max(rec.end);
                    let first = &records[group.first];
                    if rec.start < first.start
                        || (rec.start == first.start && rec.index < first.index)
                    {
                        group.first = ri;
                    }
                    let last = &records[group.last];
                    if rec.end > last.end || (rec.end == last.end && rec.index > last.index) {
                        group.last = ri;
                    }
                    if rec.snap.easing != records[group.first].snap.easing {
                        group.mixed_easing = true;
                    }
                    group.members.push(ri);
                    group
                }
                Some(group) => {
                    emit_merge_group(group, &records, commands, descriptor, &mut emitted);
                    MergeGroup::open(ri, rec)
                }
                None => MergeGroup::open(ri, rec),
            });
        }
        if let Some(group) = open.take() {
            emit_merge_group(group, &records, commands, descriptor, &mut emitted);
        }
    }

    // Final deterministic order. The leading components (object order,
    // contributor priority, contributor order) are constant here; the
    // snapshot index resolves everything the time keys leave open.
    emitted.sort_by(|a, b| {
        a.type_key
            .cmp(b.type_key)
            .then_with(|| a.start.total_cmp(&b.start))
            .then_with(|| a.end.total_cmp(&b.end))
            .then_with(|| {
                (ctx.snapshot_base + a.index as u64).cmp(&(ctx.snapshot_base + b.index as u64))
            })
    });
    emitted.into_iter().map(|e| e.command).collect()
}

fn emit_merge_group(
    group: MergeGroup,
    records: &[Rec],
    commands: &[Box<dyn Command>],
    descriptor: &KindDescriptor,
    emitted: &mut Vec<Emitted>,
) {
    if group.members.len() == 1 {
        emit_single(&records[group.members[0]], commands, descriptor, emitted);
        return;
    }
    let first = &records[group.first];
    let last = &records[group.last];
    if group.mixed_easing {
        tracing::debug!(
            target: "fusion.engine",
            type_key = descriptor.type_key,
            chosen = ?first.snap.easing,
            members = group.members.len(),
            "mixed_easing_earliest_wins"
        );
    }
    let built = descriptor.build(
        first.snap.easing,
        first.start,
        group.end,
        &first.snap.start_value,
        &last.snap.end_value,
    );
    match built {
        Some(command) => emitted.push(Emitted {
            command,
            type_key: descriptor.type_key,
            start: first.start,
            end: group.end,
            index: first.index,
        }),
        None => {
            // Factory refused (point kind with distinct values): every
            // member clones through in bucket order.
            for &member in &group.members {
                emit_single(&records[member], commands, descriptor, emitted);
            }
        }
    }
}

fn emit_single(
    rec: &Rec,
    commands: &[Box<dyn Command>],
    descriptor: &KindDescriptor,
    emitted: &mut Vec<Emitted>,
) {
    let raw_finite = rec.snap.start_time.is_finite() && rec.snap.end_time.is_finite();
    let command = if raw_finite {
        commands[rec.index].boxed_clone()
    } else {
        // Output reflects sanitized times; fall back to a clone when the
        // factory declines.
        descriptor
            .build(
                rec.snap.easing,
                rec.start,
                rec.end,
                &rec.snap.start_value,
                &rec.snap.end_value,
            )
            .unwrap_or_else(|| commands[rec.index].boxed_clone())
    };
    emitted.push(Emitted {
        command,
        type_key: descriptor.type_key,
        start: rec.start,
        end: rec.end,
        index: rec.index,
    });
}

/// Structural command equality: same kind, times, easing, values, and (for
/// groups) recursively identical children. NaN-valued fields compare
/// unequal, matching `PartialEq` on the underlying values.
pub fn commands_structurally_equal(a: &[Box<dyn Command>], b: &[Box<dyn Command>]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| command_structurally_equal(x.as_ref(), y.as_ref()))
}

fn command_structurally_equal(a: &dyn Command, b: &dyn Command) -> bool {
    if a.type_key() != b.type_key() {
        return false;
    }
    match (a.as_group(), b.as_group()) {
        (Some(ga), Some(gb)) => {
            a.start_time().total_cmp(&b.start_time()).is_eq()
                && a.end_time().total_cmp(&b.end_time()).is_eq()
                && ga.commands().len() == gb.commands().len()
                && ga
                    .commands()
                    .iter()
                    .zip(gb.commands())
                    .all(|(x, y)| command_structurally_equal(x.as_ref(), y.as_ref()))
        }
        (None, None) => {
            let sa = descriptor_of(a).and_then(|d| d.snapshot(a));
            let sb = descriptor_of(b).and_then(|d| d.snapshot(b));
            match (sa, sb) {
                (Some(sa), Some(sb)) => sa == sb,
                (None, None) => {
                    a.start_time().total_cmp(&b.start_time()).is_eq()
                        && a.end_time().total_cmp(&b.end_time()).is_eq()
                }
                _ => false,
            }
        }
        _ => false,
    }
}
