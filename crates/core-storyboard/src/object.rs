//! Storyboard objects and shared handles.
//!
//! Every object a script emits is wrapped in a process-unique [`ObjectId`]
//! and shared as an [`ObjectHandle`] (`Arc<Mutex<_>>`): layers hold one
//! reference, coordinators another, and segments hold handles to their
//! children. Identity for tracking maps is the id, never the pointer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::lock_object;
use crate::sprite::Sprite;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonically allocated object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn allocate() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Shared reference to a storyboard object.
pub type ObjectHandle = Arc<Mutex<StoryboardObject>>;

/// An audio sample placed at a point in time. Samples carry no commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub path: String,
    pub time: f64,
    pub volume: f64,
}

impl Sample {
    pub fn new(path: impl Into<String>, time: f64, volume: f64) -> Self {
        Self {
            path: path.into(),
            time,
            volume,
        }
    }
}

/// A storyboard object that owns child objects. Segments nest arbitrarily;
/// children never point back at their parent.
#[derive(Debug, Default)]
pub struct Segment {
    children: Vec<ObjectHandle>,
}

impl Segment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, child: ObjectHandle) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[ObjectHandle] {
        &self.children
    }

    /// Min start over the recursive closure; `0.0` when empty.
    fn start_time(&self) -> f64 {
        self.children
            .iter()
            .map(|c| lock_object(c).start_time())
            .fold(None, |acc: Option<f64>, t| {
                Some(acc.map_or(t, |a| a.min(t)))
            })
            .unwrap_or(0.0)
    }

    /// Max end over the recursive closure; `0.0` when empty.
    fn end_time(&self) -> f64 {
        self.children
            .iter()
            .map(|c| lock_object(c).end_time())
            .fold(None, |acc: Option<f64>, t| {
                Some(acc.map_or(t, |a| a.max(t)))
            })
            .unwrap_or(0.0)
    }
}

/// The object subkinds known to the coordinator.
#[derive(Debug)]
pub enum ObjectKind {
    Sprite(Sprite),
    Sample(Sample),
    Segment(Segment),
}

/// A tracked storyboard entity: stable id plus its kind.
#[derive(Debug)]
pub struct StoryboardObject {
    id: ObjectId,
    kind: ObjectKind,
}

impl StoryboardObject {
    pub fn from_kind(kind: ObjectKind) -> Self {
        Self {
            id: ObjectId::allocate(),
            kind,
        }
    }

    pub fn sprite(sprite: Sprite) -> ObjectHandle {
        Arc::new(Mutex::new(Self::from_kind(ObjectKind::Sprite(sprite))))
    }

    pub fn sample(sample: Sample) -> ObjectHandle {
        Arc::new(Mutex::new(Self::from_kind(ObjectKind::Sample(sample))))
    }

    pub fn segment(segment: Segment) -> ObjectHandle {
        Arc::new(Mutex::new(Self::from_kind(ObjectKind::Segment(segment))))
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn as_sprite(&self) -> Option<&Sprite> {
        match &self.kind {
            ObjectKind::Sprite(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sprite_mut(&mut self) -> Option<&mut Sprite> {
        match &mut self.kind {
            ObjectKind::Sprite(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_segment(&self) -> Option<&Segment> {
        match &self.kind {
            ObjectKind::Segment(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_segment_mut(&mut self) -> Option<&mut Segment> {
        match &mut self.kind {
            ObjectKind::Segment(s) => Some(s),
            _ => None,
        }
    }

    /// Raw start time. May be non-finite if a script emitted such a command;
    /// callers ordering by time sanitize first. Callers must not hold locks
    /// on descendants when querying a segment.
    pub fn start_time(&self) -> f64 {
        match &self.kind {
            ObjectKind::Sprite(s) => s.start_time(),
            ObjectKind::Sample(s) => s.time,
            ObjectKind::Segment(s) => s.start_time(),
        }
    }

    pub fn end_time(&self) -> f64 {
        match &self.kind {
            ObjectKind::Sprite(s) => s.end_time(),
            ObjectKind::Sample(s) => s.time,
            ObjectKind::Segment(s) => s.end_time(),
        }
    }
}
