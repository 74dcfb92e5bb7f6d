//! The per-layer command coordinator.
//!
//! Tracks contributors, objects, and object→contributor attribution for one
//! layer, produces the deterministic object order, and drives command fusion
//! recursively through nested segments. All public operations are total for
//! valid inputs: empty contributor tokens and unknown contributors degrade
//! (no-op registration, fallback remap) instead of failing.
//!
//! One mutex guards the whole coordinator state. Ordering and fusion are
//! pure functions of the tracked state at the moment they are called;
//! concurrent mutation of the same layer during a call is excluded by this
//! lock. Object locks are only ever taken while the coordinator lock is
//! held, never the other way around.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use core_fusion::{fuse, CommandFusionResult, OrderingContext};
use core_storyboard::{lock_object, sanitize_time, ObjectHandle, ObjectId};

use crate::contributor::{Contributor, ContributorId};

/// Shift applied to an entry's sequence to derive its snapshot-index base.
/// Each object gets a disjoint final-tiebreaker range covering 2^20
/// commands, far beyond any real command list.
const SNAPSHOT_STRIDE_BITS: u32 = 20;

/// Per-object bookkeeping. `sequence` is the monotonic tracking index used
/// as the last ordering tiebreaker; cached times are refreshed (sanitized)
/// before every ordering pass.
#[derive(Debug, Clone)]
struct TrackedEntry {
    object: ObjectHandle,
    contributor: ContributorId,
    sequence: u64,
    start_time: f64,
    end_time: f64,
}

#[derive(Debug)]
struct CoordinatorState {
    contributors: HashMap<ContributorId, Contributor>,
    entries: HashMap<ObjectId, TrackedEntry>,
    default_contributor: Contributor,
    next_sequence: u64,
    next_order: u64,
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self {
            contributors: HashMap::new(),
            entries: HashMap::new(),
            default_contributor: Contributor::fallback(),
            next_sequence: 0,
            next_order: 0,
        }
    }
}

impl CoordinatorState {
    /// Find or create the entry for `id`, refresh its cached times, and remap
    /// an unknown contributor to the default contributor. Returns the
    /// entry's sequence and the resolved contributor's (priority, order).
    fn resolve_entry(
        &mut self,
        handle: &ObjectHandle,
        id: ObjectId,
        start: f64,
        end: f64,
    ) -> (u64, i32, u64) {
        let default_id = self.default_contributor.id.clone();
        if !self.entries.contains_key(&id) {
            let sequence = self.next_sequence;
            self.next_sequence += 1;
            self.entries.insert(
                id,
                TrackedEntry {
                    object: handle.clone(),
                    contributor: default_id.clone(),
                    sequence,
                    start_time: start,
                    end_time: end,
                },
            );
        }
        let contributor_id = self.entries[&id].contributor.clone();
        let known = self
            .contributors
            .get(&contributor_id)
            .map(|c| (c.priority, c.order));
        let entry = self.entries.get_mut(&id).expect("entry just ensured");
        entry.start_time = start;
        entry.end_time = end;
        let sequence = entry.sequence;
        match known {
            Some((priority, order)) => (sequence, priority, order),
            None => {
                entry.contributor = default_id;
                (
                    sequence,
                    self.default_contributor.priority,
                    self.default_contributor.order,
                )
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct LayerCommandCoordinator {
    state: Mutex<CoordinatorState>,
}

struct SortRec {
    id: ObjectId,
    handle: ObjectHandle,
    start: f64,
    end: f64,
    priority: i32,
    order: u64,
    sequence: u64,
}

impl LayerCommandCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().expect("coordinator lock poisoned")
    }

    /// Register a contributor. No-op when the token is empty or already
    /// registered; the first registration fixes the contributor's order.
    pub fn register_contributor(
        &self,
        id: ContributorId,
        name: impl Into<String>,
        priority: i32,
    ) {
        if id.is_empty() {
            return;
        }
        let mut state = self.lock();
        if state.contributors.contains_key(&id) {
            return;
        }
        let order = state.next_order;
        state.next_order += 1;
        tracing::debug!(
            target: "layer.coordinator",
            contributor = %id,
            order,
            priority,
            "contributor_registered"
        );
        state
            .contributors
            .insert(id.clone(), Contributor::new(id, name, order, priority));
    }

    /// In-place priority update; silent no-op for unknown contributors.
    pub fn update_contributor_priority(&self, id: &ContributorId, priority: i32) {
        if let Some(contributor) = self.lock().contributors.get_mut(id) {
            *contributor = contributor.with_priority(priority);
        }
    }

    pub fn contributor(&self, id: &ContributorId) -> Option<Contributor> {
        self.lock().contributors.get(id).cloned()
    }

    /// Attribute `object` to `contributor`, registering the contributor on
    /// first sight and re-attributing an already tracked object.
    pub fn track(&self, object: &ObjectHandle, contributor: &ContributorId) {
        let id = lock_object(object).id();
        let mut state = self.lock();
        if !contributor.is_empty() && !state.contributors.contains_key(contributor) {
            let order = state.next_order;
            state.next_order += 1;
            state.contributors.insert(
                contributor.clone(),
                Contributor::new(contributor.clone(), contributor.as_str(), order, 0),
            );
        }
        match state.entries.get_mut(&id) {
            Some(entry) => entry.contributor = contributor.clone(),
            None => {
                let sequence = state.next_sequence;
                state.next_sequence += 1;
                state.entries.insert(
                    id,
                    TrackedEntry {
                        object: object.clone(),
                        contributor: contributor.clone(),
                        sequence,
                        start_time: 0.0,
                        end_time: 0.0,
                    },
                );
            }
        }
    }

    /// Stop tracking `object`; no-op when it was never tracked.
    pub fn untrack(&self, object: &ObjectHandle) {
        let id = lock_object(object).id();
        self.lock().entries.remove(&id);
    }

    pub fn tracked_count(&self) -> usize {
        self.lock().entries.len()
    }

    /// Handles of every tracked object, in no particular order.
    pub fn tracked_objects(&self) -> Vec<ObjectHandle> {
        self.lock()
            .entries
            .values()
            .map(|e| e.object.clone())
            .collect()
    }

    /// Compute the deterministic object order for `objects`. Returns `None`
    /// when the input already matches, otherwise the reordered list. Cached
    /// entry times are refreshed first (segments compute recursive bounds);
    /// unknown contributors are remapped to the default contributor.
    pub fn try_build_ordered(&self, objects: &[ObjectHandle]) -> Option<Vec<ObjectHandle>> {
        let mut state = self.lock();
        let mut input_ids = Vec::with_capacity(objects.len());
        let mut recs = Vec::with_capacity(objects.len());
        for handle in objects {
            let (id, start, end) = {
                let guard = lock_object(handle);
                (
                    guard.id(),
                    sanitize_time(guard.start_time()),
                    sanitize_time(guard.end_time()),
                )
            };
            let (sequence, priority, order) = state.resolve_entry(handle, id, start, end);
            input_ids.push(id);
            recs.push(SortRec {
                id,
                handle: handle.clone(),
                start,
                end,
                priority,
                order,
                sequence,
            });
        }
        recs.sort_by(|a, b| {
            a.start
                .total_cmp(&b.start)
                .then(a.priority.cmp(&b.priority))
                .then(a.order.cmp(&b.order))
                .then(a.end.total_cmp(&b.end))
                .then(a.sequence.cmp(&b.sequence))
        });
        if recs.iter().map(|r| r.id).eq(input_ids.iter().copied()) {
            return None;
        }
        tracing::debug!(
            target: "layer.coordinator",
            objects = recs.len(),
            "object_order_changed"
        );
        Some(recs.into_iter().map(|r| r.handle).collect())
    }

    /// Fuse every sprite's commands, recursing through segments. One
    /// [`CommandFusionResult`] is produced per processed sprite; samples are
    /// skipped.
    pub fn merge_commands(&self, objects: &[ObjectHandle]) -> Vec<CommandFusionResult> {
        let mut state = self.lock();
        let mut results = Vec::new();
        merge_into(&mut state, objects, &mut results);
        results
    }
}

fn merge_into(
    state: &mut CoordinatorState,
    objects: &[ObjectHandle],
    results: &mut Vec<CommandFusionResult>,
) {
    for handle in objects {
        let mut guard = lock_object(handle);
        let id = guard.id();
        if let Some(segment) = guard.as_segment() {
            let children: Vec<ObjectHandle> = segment.children().to_vec();
            drop(guard);
            merge_into(state, &children, results);
            continue;
        }
        if guard.as_sprite().is_none() {
            continue;
        }
        let start = sanitize_time(guard.start_time());
        let end = sanitize_time(guard.end_time());
        let (sequence, priority, order) = state.resolve_entry(handle, id, start, end);
        let ctx = OrderingContext {
            object_order: sequence,
            contributor_priority: priority,
            contributor_order: order,
            snapshot_base: sequence << SNAPSHOT_STRIDE_BITS,
        };
        let sprite = guard.as_sprite_mut().expect("checked sprite above");
        let original_count = sprite.commands().len();
        let fused = fuse(sprite.commands(), &ctx);
        let fused_count = fused.len();
        sprite.rebuild_display_state(fused);
        tracing::debug!(
            target: "layer.coordinator",
            object = id.raw(),
            original_count,
            fused_count,
            "commands_fused"
        );
        results.push(CommandFusionResult {
            object: id,
            original_count,
            fused_count,
        });
    }
}
